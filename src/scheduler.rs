//! The background loop that keeps scraping until the process exits.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, info, info_span, Instrument};

use crate::config::ScrapeConfig;
use crate::orchestrator::{RunSummary, ScrapeOrchestrator};
use crate::progress::ProgressTracker;

/// Anything the scheduler can drive once per interval.
#[async_trait]
pub trait ScheduledRun: Send + Sync + 'static {
    async fn run(&self) -> anyhow::Result<RunSummary>;
}

#[async_trait]
impl ScheduledRun for ScrapeOrchestrator {
    async fn run(&self) -> anyhow::Result<RunSummary> {
        self.run_once()
            .await
            .map_err(|e| anyhow::anyhow!("region discovery failed: {e}"))
    }
}

pub struct Scheduler<R: ScheduledRun> {
    job: Arc<R>,
    progress: Arc<ProgressTracker>,
    interval: Duration,
    run_on_start: bool,
}

impl<R: ScheduledRun> Scheduler<R> {
    pub fn new(job: Arc<R>, progress: Arc<ProgressTracker>, config: &ScrapeConfig) -> Self {
        Self {
            job,
            progress,
            interval: config.interval,
            run_on_start: config.run_on_start,
        }
    }

    /// Run, sleep, repeat. Never returns; errors and panics of a run are
    /// logged and the next run happens on schedule.
    pub async fn run_forever(self) {
        info!(
            interval_secs = self.interval.as_secs(),
            run_on_start = self.run_on_start,
            "scheduler started"
        );
        if !self.run_on_start {
            tokio::time::sleep(self.interval).await;
        }
        let mut run: u64 = 0;
        loop {
            run += 1;
            self.tick(run).await;
            tokio::time::sleep(self.interval).await;
        }
    }

    /// One guarded run. The job executes on its own task so that even a
    /// panic is reported here instead of unwinding through the loop.
    pub async fn tick(&self, run: u64) -> Option<RunSummary> {
        let job = self.job.clone();
        let handle = tokio::spawn(
            async move { job.run().await }.instrument(info_span!("scrape.run", run)),
        );
        let outcome = match handle.await {
            Ok(Ok(summary)) => Some(summary),
            Ok(Err(e)) => {
                error!(run, error = %e, "scrape run failed; retrying next interval");
                None
            }
            Err(join_err) => {
                error!(run, error = %join_err, "scrape run aborted; retrying next interval");
                None
            }
        };
        // A failed run must not leave the status endpoint reporting "running".
        if outcome.is_none() {
            self.progress.end_run();
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Fails on the first call, panics on the second, succeeds afterwards.
    struct FlakyRun {
        calls: AtomicU64,
        progress: Arc<ProgressTracker>,
    }

    #[async_trait]
    impl ScheduledRun for FlakyRun {
        async fn run(&self) -> anyhow::Result<RunSummary> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.progress.begin_run(3);
            match call {
                1 => anyhow::bail!("portal unreachable"),
                2 => panic!("driver crashed"),
                _ => {
                    self.progress.end_run();
                    Ok(RunSummary {
                        units: 3,
                        ..RunSummary::default()
                    })
                }
            }
        }
    }

    fn config(interval: Duration) -> ScrapeConfig {
        ScrapeConfig {
            interval,
            run_on_start: true,
            ..ScrapeConfig::default()
        }
    }

    #[tokio::test]
    async fn failed_tick_clears_running_flag() {
        let progress = Arc::new(ProgressTracker::new());
        let job = Arc::new(FlakyRun {
            calls: AtomicU64::new(0),
            progress: progress.clone(),
        });
        let scheduler = Scheduler::new(job.clone(), progress.clone(), &config(Duration::from_secs(1)));

        assert!(scheduler.tick(1).await.is_none());
        assert!(!progress.snapshot().running);

        assert!(scheduler.tick(2).await.is_none());
        assert!(!progress.snapshot().running);

        let summary = scheduler.tick(3).await.expect("third run succeeds");
        assert_eq!(summary.units, 3);
        assert_eq!(job.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn loop_survives_failures_and_keeps_its_interval() {
        let interval = Duration::from_secs(2 * 60 * 60);
        let progress = Arc::new(ProgressTracker::new());
        let job = Arc::new(FlakyRun {
            calls: AtomicU64::new(0),
            progress: progress.clone(),
        });
        let scheduler = Scheduler::new(job.clone(), progress.clone(), &config(interval));
        let handle = tokio::spawn(scheduler.run_forever());

        // First run fires immediately and fails.
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(job.calls.load(Ordering::SeqCst), 1);
        assert!(!progress.snapshot().running);

        // Second run only after the interval, and it panics.
        tokio::time::sleep(interval).await;
        assert_eq!(job.calls.load(Ordering::SeqCst), 2);
        assert!(!progress.snapshot().running);

        tokio::time::sleep(interval).await;
        assert_eq!(job.calls.load(Ordering::SeqCst), 3);
        assert!(!handle.is_finished());
        handle.abort();
    }
}
