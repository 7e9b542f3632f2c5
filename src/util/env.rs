//! Environment helpers: centralized dotenv loading and ergonomic getters.
//! Call `init_env()` once early in each binary (or rely on lazy Once).
use std::str::FromStr;
use std::sync::Once;
use tracing::{info, warn};

static INIT: Once = Once::new();

/// Load .env exactly once. Safe to call many times.
pub fn init_env() {
    INIT.call_once(|| {
        if dotenv::dotenv().is_ok() {
            return;
        }
        // Fallback to the crate root when started from elsewhere (e.g. `cargo run` in a subdir).
        let candidate = format!("{}/.env", env!("CARGO_MANIFEST_DIR"));
        let _ = dotenv::from_filename(candidate);
    });
}

/// Get required env var; error if missing or blank.
pub fn env_req(key: &str) -> anyhow::Result<String> {
    env_opt(key).ok_or_else(|| anyhow::anyhow!("missing env var {key}"))
}

/// Get optional env var (None if unset or empty).
pub fn env_opt(key: &str) -> Option<String> {
    init_env();
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

/// Get parsed value with default fallback.
pub fn env_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + Clone,
{
    init_env();
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                warn!(target = "env", key, "unparseable value; using default");
                default
            }
        },
        Err(_) => default,
    }
}

/// Boolean flag; accepts 1/true/on/yes and 0/false/off/no (case-insensitive).
/// Anything else yields the default.
pub fn env_flag(key: &str, default: bool) -> bool {
    init_env();
    match std::env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "on" | "yes" => true,
            "0" | "false" | "off" | "no" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

/// Database URL: `DATABASE_URL`, then `DB_URL`.
pub fn db_url() -> anyhow::Result<String> {
    for k in ["DATABASE_URL", "DB_URL"] {
        if let Some(v) = env_opt(k) {
            info!(target = "env", source = k, "database URL detected (length={})", v.len());
            return Ok(v);
        }
    }
    Err(anyhow::anyhow!(
        "no database URL configured; set DATABASE_URL (postgres://… or sqlite:…)"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Each test owns a distinct key; the process env is shared across test threads.

    #[test]
    fn flag_accepts_common_spellings() {
        std::env::set_var("MANDI_TEST_FLAG_ON", "Yes");
        std::env::set_var("MANDI_TEST_FLAG_OFF", "off");
        std::env::set_var("MANDI_TEST_FLAG_JUNK", "maybe");
        assert!(env_flag("MANDI_TEST_FLAG_ON", false));
        assert!(!env_flag("MANDI_TEST_FLAG_OFF", true));
        assert!(env_flag("MANDI_TEST_FLAG_JUNK", true));
        assert!(!env_flag("MANDI_TEST_FLAG_UNSET", false));
    }

    #[test]
    fn parse_falls_back_on_garbage() {
        std::env::set_var("MANDI_TEST_PARSE_OK", " 12 ");
        std::env::set_var("MANDI_TEST_PARSE_BAD", "twelve");
        assert_eq!(env_parse("MANDI_TEST_PARSE_OK", 6usize), 12);
        assert_eq!(env_parse("MANDI_TEST_PARSE_BAD", 6usize), 6);
        assert_eq!(env_parse("MANDI_TEST_PARSE_UNSET", 6usize), 6);
    }

    #[test]
    fn blank_values_count_as_missing() {
        std::env::set_var("MANDI_TEST_BLANK", "   ");
        assert!(env_opt("MANDI_TEST_BLANK").is_none());
        assert!(env_req("MANDI_TEST_BLANK").is_err());
    }
}
