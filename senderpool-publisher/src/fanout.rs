//! Parallel task fan-out joined under a deadline.

use senderpool_core::Result;
use std::time::Duration;
use tokio::task::{JoinError, JoinSet};
use tracing::warn;

/// How a fan-out ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOutReport {
    /// Tasks that finished successfully
    pub completed: usize,
    /// Tasks that returned an error or panicked
    pub failed: usize,
    /// Tasks still running at the deadline, then aborted
    pub abandoned: usize,
}

impl FanOutReport {
    /// Every task finished successfully.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.failed == 0 && self.abandoned == 0
    }
}

/// Join every task in `tasks`, handing each success to `on_success` as it
/// arrives. Tasks still pending after `deadline` are aborted; a task that
/// finished before its abort took effect is still handed over.
pub(crate) async fn join_within<T, F>(
    label: &str,
    mut tasks: JoinSet<Result<T>>,
    deadline: Duration,
    mut on_success: F,
) -> FanOutReport
where
    T: Send + 'static,
    F: FnMut(T),
{
    let mut report = FanOutReport::default();

    let joined = tokio::time::timeout(deadline, async {
        while let Some(outcome) = tasks.join_next().await {
            record(label, outcome, &mut report, &mut on_success);
        }
    })
    .await;

    if joined.is_err() {
        tasks.abort_all();
        while let Some(outcome) = tasks.join_next().await {
            match outcome {
                Err(e) if e.is_cancelled() => report.abandoned += 1,
                outcome => record(label, outcome, &mut report, &mut on_success),
            }
        }
        warn!(
            abandoned = report.abandoned,
            "{label} did not finish within {}ms, aborted the rest",
            deadline.as_millis()
        );
    }

    report
}

fn record<T, F>(
    label: &str,
    outcome: std::result::Result<Result<T>, JoinError>,
    report: &mut FanOutReport,
    on_success: &mut F,
) where
    F: FnMut(T),
{
    match outcome {
        Ok(Ok(value)) => {
            report.completed += 1;
            on_success(value);
        },
        Ok(Err(e)) => {
            report.failed += 1;
            warn!("{label} task failed: {e}");
        },
        Err(e) => {
            report.failed += 1;
            warn!("{label} task did not finish: {e}");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use senderpool_core::Error;

    #[tokio::test(start_paused = true)]
    async fn test_counts_each_outcome() {
        let mut tasks = JoinSet::new();
        tasks.spawn(async { Ok(1) });
        tasks.spawn(async { Ok(2) });
        tasks.spawn(async { Err(Error::handle_fault("refused")) });
        tasks.spawn(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(3)
        });

        let mut seen = Vec::new();
        let report = join_within("test", tasks, Duration::from_secs(1), |v| seen.push(v)).await;

        seen.sort_unstable();
        assert_eq!(seen, vec![1, 2]);
        assert_eq!(report, FanOutReport { completed: 2, failed: 1, abandoned: 1 });
        assert!(!report.is_complete());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_result_ready_at_abort_is_kept() {
        let mut tasks = JoinSet::new();
        tasks.spawn(async {
            // Blocks its worker past the deadline so the abort lands mid-poll.
            std::thread::sleep(Duration::from_millis(200));
            Ok(7)
        });
        tasks.spawn(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(8)
        });

        let mut seen = Vec::new();
        let report = join_within("test", tasks, Duration::from_millis(50), |v| seen.push(v)).await;

        assert_eq!(seen, vec![7]);
        assert_eq!(report, FanOutReport { completed: 1, failed: 0, abandoned: 1 });
    }

    #[tokio::test]
    async fn test_empty_set_completes() {
        let tasks: JoinSet<Result<()>> = JoinSet::new();
        let report = join_within("test", tasks, Duration::from_millis(10), |()| {}).await;
        assert!(report.is_complete());
        assert_eq!(report.completed, 0);
    }
}
