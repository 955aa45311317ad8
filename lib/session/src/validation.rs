//! Cancelable periodic task driving background session validation.
//!
//! The task is driven by `tokio::time`, so under a paused test clock it
//! advances deterministically. Dropping or cancelling the handle aborts the
//! task; it never fires again afterwards.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::debug;

/// Handle to a running periodic task.
#[derive(Debug)]
pub struct PeriodicTask {
    handle: JoinHandle<()>,
}

impl PeriodicTask {
    /// Spawns a task that calls `on_tick` after `first_delay` and then every `period`.
    ///
    /// `on_tick` returns the work to run for that tick, or `None` to stop.
    /// Ticks never overlap: a slow tick delays the next one.
    pub fn spawn<F, Fut>(first_delay: Duration, period: Duration, mut on_tick: F) -> Self
    where
        F: FnMut() -> Option<Fut> + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + first_delay, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match on_tick() {
                    Some(work) => work.await,
                    None => break,
                }
            }
            debug!("periodic task finished");
        });
        Self { handle }
    }

    /// Stops the task.
    pub fn cancel(self) {
        self.handle.abort();
    }

    /// Returns true once the task has stopped.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_task(first_delay: Duration, period: Duration) -> (PeriodicTask, Arc<AtomicUsize>) {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let task = PeriodicTask::spawn(first_delay, period, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Some(async {})
        });
        (task, ticks)
    }

    #[tokio::test(start_paused = true)]
    async fn fires_on_each_period() {
        let (_task, ticks) = counting_task(Duration::from_secs(300), Duration::from_secs(300));

        time::sleep(Duration::from_secs(299)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 0);

        time::sleep(Duration::from_secs(2)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 1);

        time::sleep(Duration::from_secs(600)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_first_delay_fires_immediately() {
        let (_task, ticks) = counting_task(Duration::ZERO, Duration::from_secs(300));
        time::sleep(Duration::from_millis(1)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_future_ticks() {
        let (task, ticks) = counting_task(Duration::from_secs(10), Duration::from_secs(10));
        time::sleep(Duration::from_secs(11)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 1);

        task.cancel();
        time::sleep(Duration::from_secs(100)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn drop_stops_future_ticks() {
        let (task, ticks) = counting_task(Duration::from_secs(10), Duration::from_secs(10));
        drop(task);
        time::sleep(Duration::from_secs(100)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn returning_none_ends_the_task() {
        let task = PeriodicTask::spawn(Duration::ZERO, Duration::from_secs(1), || {
            None::<std::future::Ready<()>>
        });
        time::sleep(Duration::from_secs(1)).await;
        assert!(task.is_finished());
    }
}
