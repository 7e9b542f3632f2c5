//! Subscriber setup shared by the scrape service and the ingest server.

use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

use crate::util::env::{env_flag, env_opt};

/// Install the global fmt subscriber for `service`.
///
/// `RUST_LOG` wins when it parses; a blank or malformed value falls back to
/// `default_filter` instead of silencing the process. `LOG_ANSI=false` turns
/// off colour codes for log collectors.
pub fn init_tracing(service: &'static str, default_filter: &str) -> Result<(), anyhow::Error> {
    let directives = filter_directives(env_opt("RUST_LOG"), default_filter);
    let filter = EnvFilter::try_new(&directives)
        .map_err(|e| anyhow::anyhow!("invalid log filter {directives:?}: {e}"))?;

    SubscriberBuilder::default()
        .with_env_filter(filter)
        .with_ansi(env_flag("LOG_ANSI", true))
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {}", e))?;

    tracing::info!(
        service,
        version = env!("CARGO_PKG_VERSION"),
        filter = %directives,
        "logging initialised"
    );
    Ok(())
}

fn filter_directives(from_env: Option<String>, fallback: &str) -> String {
    match from_env {
        Some(d) if EnvFilter::try_new(&d).is_ok() => d,
        Some(d) => {
            eprintln!("ignoring unparseable RUST_LOG {d:?}; using {fallback:?}");
            fallback.to_string()
        }
        None => fallback.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::filter_directives;

    #[test]
    fn env_filter_wins_when_valid() {
        assert_eq!(
            filter_directives(Some("debug,sqlx=info".into()), "info"),
            "debug,sqlx=info"
        );
        assert_eq!(filter_directives(None, "info,sqlx=warn"), "info,sqlx=warn");
    }

    #[test]
    fn malformed_env_filter_falls_back() {
        assert_eq!(filter_directives(Some("sqlx=loud".into()), "info"), "info");
    }
}
