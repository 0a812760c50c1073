//! Fixed-cadence background task with cooperative stop.

use std::future::Future;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// A spawned loop that runs `tick` every `period` until cancelled or dropped.
///
/// The first tick fires one full period after spawning. A tick that overruns
/// its period delays the next one instead of bursting to catch up, so ticks
/// never overlap.
pub struct PeriodicTask {
    name: &'static str,
    stop_tx: broadcast::Sender<()>,
    handle: JoinHandle<()>,
}

impl PeriodicTask {
    pub fn spawn<F, Fut>(name: &'static str, period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (stop_tx, mut stop_rx) = broadcast::channel(1);
        let handle = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = stop_rx.recv() => {
                        tracing::debug!(task = name, "periodic task stopping");
                        break;
                    }
                    _ = interval.tick() => {
                        tick().await;
                    }
                }
            }
        });
        Self {
            name,
            stop_tx,
            handle,
        }
    }

    /// Stop the loop. A tick in progress runs to completion and no further
    /// tick starts. Dropping the task aborts it outright.
    pub fn cancel(&self) {
        tracing::debug!(task = self.name, "cancelling periodic task");
        let _ = self.stop_tx.send(());
    }

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
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn ticks_once_per_period() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let task = PeriodicTask::spawn("test", Duration::from_secs(1), move || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(3_500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);

        task.cancel();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert!(task.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_lets_the_running_tick_finish() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let task = PeriodicTask::spawn("test", Duration::from_secs(1), move || {
            let c = Arc::clone(&c);
            async move {
                tokio::time::sleep(Duration::from_millis(500)).await;
                c.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(1_200)).await;
        task.cancel();
        assert!(!task.is_finished());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(task.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn drop_stops_the_loop() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let task = PeriodicTask::spawn("test", Duration::from_millis(100), move || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
            }
        });
        drop(task);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
