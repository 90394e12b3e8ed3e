//! Periodic trigger facility.
//!
//! Replaces cron-style scheduling with explicit trigger registrations:
//! interval + jitter, firing a callback until shutdown. The skip-if-busy
//! policy lives in the coordinator's atomic gate — a trigger that fires
//! while a cycle is running is a no-op there, never a queued cycle.

use std::time::Duration;

use rand::Rng;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A named periodic trigger.
#[derive(Debug, Clone)]
pub struct PeriodicTrigger {
    name: String,
    interval: Duration,
    jitter: Duration,
    shutdown: CancellationToken,
}

impl PeriodicTrigger {
    /// Create a trigger firing every `interval` until `shutdown` cancels.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            name: name.into(),
            interval,
            jitter: Duration::ZERO,
            shutdown,
        }
    }

    /// Add up to `jitter` of random extra delay per firing, de-synchronizing
    /// triggers that share an interval.
    #[must_use]
    pub const fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Spawn the trigger loop.
    ///
    /// `tick` runs to completion before the next delay starts; a slow tick
    /// therefore delays (never overlaps) the next firing from this trigger.
    pub fn spawn<F, Fut>(self, tick: F) -> JoinHandle<()>
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(async move {
            tracing::info!(
                trigger = %self.name,
                interval_ms = self.interval.as_millis(),
                "Trigger registered"
            );

            loop {
                let delay = self.interval + self.next_jitter();
                tokio::select! {
                    () = self.shutdown.cancelled() => {
                        tracing::info!(trigger = %self.name, "Trigger stopped");
                        break;
                    }
                    () = tokio::time::sleep(delay) => {
                        tick().await;
                    }
                }
            }
        })
    }

    fn next_jitter(&self) -> Duration {
        if self.jitter.is_zero() {
            return Duration::ZERO;
        }
        let max_ms = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(rand::rng().random_range(0..=max_ms))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test]
    async fn fires_repeatedly_until_cancelled() {
        let counter = Arc::new(AtomicUsize::new(0));
        let shutdown = CancellationToken::new();

        let trigger = PeriodicTrigger::new("test", Duration::from_millis(10), shutdown.clone());
        let ticks = Arc::clone(&counter);
        let handle = trigger.spawn(move || {
            let ticks = Arc::clone(&ticks);
            async move {
                ticks.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(80)).await;
        shutdown.cancel();
        handle.await.unwrap();

        let fired = counter.load(Ordering::SeqCst);
        assert!(fired >= 2, "expected at least 2 firings, got {fired}");
    }

    #[tokio::test]
    async fn cancellation_stops_the_loop_promptly() {
        let shutdown = CancellationToken::new();
        let trigger = PeriodicTrigger::new("idle", Duration::from_secs(3600), shutdown.clone());
        let handle = trigger.spawn(|| async {});

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn slow_ticks_do_not_overlap() {
        let running = Arc::new(AtomicUsize::new(0));
        let overlaps = Arc::new(AtomicUsize::new(0));
        let shutdown = CancellationToken::new();

        let trigger = PeriodicTrigger::new("slow", Duration::from_millis(5), shutdown.clone());
        let running_clone = Arc::clone(&running);
        let overlaps_clone = Arc::clone(&overlaps);
        let handle = trigger.spawn(move || {
            let running = Arc::clone(&running_clone);
            let overlaps = Arc::clone(&overlaps_clone);
            async move {
                if running.fetch_add(1, Ordering::SeqCst) > 0 {
                    overlaps.fetch_add(1, Ordering::SeqCst);
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
                running.fetch_sub(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown.cancel();
        handle.await.unwrap();

        assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    }
}
