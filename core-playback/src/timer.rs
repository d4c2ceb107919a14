//! Repeating timer used for position polling and signal beacons.

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, Instrument};

/// Background task invoking `on_tick` once per period until cancelled.
///
/// The first tick happens one full period after [`RepeatingTask::spawn`].
/// The task also ends when `on_tick` returns `false`, which is how a
/// closed controller channel shuts timers down. Dropping the handle
/// cancels the task.
#[derive(Debug)]
pub(crate) struct RepeatingTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl RepeatingTask {
    /// Must be called from within a tokio runtime.
    pub(crate) fn spawn<F>(name: &'static str, period: Duration, mut on_tick: F) -> Self
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(
            async move {
                let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = ticker.tick() => {
                            if !on_tick() {
                                debug!(timer = name, "Tick receiver gone; stopping timer");
                                break;
                            }
                        }
                    }
                }
            }
            .in_current_span(),
        );

        Self { cancel, handle }
    }

    #[cfg(test)]
    pub(crate) fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub(crate) fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Drop for RepeatingTask {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn ticks_once_per_period_after_first_period() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();
        let task = RepeatingTask::spawn("test", Duration::from_millis(500), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        });

        tokio::time::sleep(Duration::from_millis(499)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(1_002)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
        assert!(!task.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_ticking() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();
        let task = RepeatingTask::spawn("test", Duration::from_secs(1), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        });

        tokio::time::sleep(Duration::from_millis(1_500)).await;
        task.cancel();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(ticks.load(Ordering::SeqCst), 1);
        assert!(task.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn returning_false_ends_the_task() {
        let task = RepeatingTask::spawn("test", Duration::from_secs(1), || false);
        tokio::time::sleep(Duration::from_millis(1_100)).await;
        assert!(task.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_handle_cancels() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();
        let task = RepeatingTask::spawn("test", Duration::from_secs(1), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        });
        drop(task);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 0);
    }
}
