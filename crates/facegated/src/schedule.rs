//! Owned periodic tasks.

use std::future::Future;
use std::ops::ControlFlow;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

const MIN_PERIOD: Duration = Duration::from_millis(1);

/// A spawned interval loop with a single owner.
///
/// The loop stops when the callback returns `Break` or when the handle is
/// dropped. The first run happens one period after spawning.
pub struct ScheduledTask {
    name: &'static str,
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    pub fn every<F, Fut>(name: &'static str, period: Duration, mut f: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ControlFlow<()>> + Send + 'static,
    {
        if period.is_zero() {
            tracing::warn!(task = name, "zero period; running every millisecond");
        }
        let period = period.max(MIN_PERIOD);
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if f().await.is_break() {
                    tracing::debug!(task = name, "task finished");
                    break;
                }
            }
        });
        tracing::debug!(task = name, period_ms = period.as_millis() as u64, "task scheduled");
        Self { name, handle }
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        if !self.handle.is_finished() {
            tracing::debug!(task = self.name, "task cancelled");
        }
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_runs_every_period_until_break() {
        let runs = Arc::new(AtomicU32::new(0));
        let counter = runs.clone();
        let task = ScheduledTask::every("count", Duration::from_millis(100), move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) + 1 == 3 {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 3);
        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 3);
        drop(task);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_the_loop() {
        let runs = Arc::new(AtomicU32::new(0));
        let counter = runs.clone();
        let task = ScheduledTask::every("count", Duration::from_millis(100), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                ControlFlow::Continue(())
            }
        });

        tokio::time::sleep(Duration::from_millis(250)).await;
        drop(task);
        let seen = runs.load(Ordering::SeqCst);
        assert_eq!(seen, 2);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(runs.load(Ordering::SeqCst), seen);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_period_is_clamped() {
        let runs = Arc::new(AtomicU32::new(0));
        let counter = runs.clone();
        let _task = ScheduledTask::every("zero", Duration::ZERO, move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                ControlFlow::Continue(())
            }
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        let seen = runs.load(Ordering::SeqCst);
        assert!((5..=10).contains(&seen), "ran {seen} times in 10ms");
    }
}
