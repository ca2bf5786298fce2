use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::{debug, info};

use crate::config::ThrottleConfig;
use crate::progress::{ProgressEvent, SharedProgressReporter};

/// Count of download tasks that are still running
#[derive(Debug, Clone, Default)]
pub struct LiveTasks {
    count: Arc<AtomicUsize>,
}

/// Keeps a task counted as live until dropped
#[derive(Debug)]
pub struct LiveTaskGuard {
    count: Arc<AtomicUsize>,
}

impl LiveTasks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&self) -> LiveTaskGuard {
        self.count.fetch_add(1, Ordering::SeqCst);
        LiveTaskGuard {
            count: self.count.clone(),
        }
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl Drop for LiveTaskGuard {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Burst quota with a mandatory cooldown, plus an optional live-task ceiling
/// checked after every cooldown
#[derive(Debug)]
pub struct Throttle {
    config: ThrottleConfig,
    dispatched: usize,
}

impl Throttle {
    pub fn new(config: ThrottleConfig) -> Self {
        Self {
            config,
            dispatched: 0,
        }
    }

    /// Dispatches since the last cooldown
    pub fn dispatch_count(&self) -> usize {
        self.dispatched
    }

    /// Wait until the next dispatch is allowed and count it.
    ///
    /// Only the caller is suspended; running downloads continue meanwhile.
    pub async fn admit(&mut self, live: &LiveTasks, reporter: &SharedProgressReporter) {
        if self.dispatched < self.config.burst_limit {
            debug!(dispatched = self.dispatched + 1, "Dispatching within burst quota");
            self.dispatched += 1;
            return;
        }

        info!(
            dispatched = self.dispatched,
            cooldown_secs = self.config.cooldown.as_secs(),
            "Burst quota reached, cooling down to avoid abuse detection"
        );
        reporter.report(ProgressEvent::Cooldown {
            duration: self.config.cooldown,
        });
        tokio::time::sleep(self.config.cooldown).await;

        if self.config.secondary_cap {
            loop {
                let running = live.count();
                if running <= self.config.max_live_tasks {
                    break;
                }
                info!(
                    running,
                    limit = self.config.max_live_tasks,
                    poll_secs = self.config.poll_interval.as_secs(),
                    "Too many running downloads, waiting"
                );
                reporter.report(ProgressEvent::WaitingForSlots {
                    live: running,
                    limit: self.config.max_live_tasks,
                });
                tokio::time::sleep(self.config.poll_interval).await;
            }
        }

        debug!("Resetting dispatch counter to 1");
        self.dispatched = 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoopReporter;
    use std::time::Duration;
    use tokio::time::Instant;

    #[test]
    fn guards_track_live_tasks() {
        let live = LiveTasks::new();
        let first = live.enter();
        let second = live.enter();
        assert_eq!(live.count(), 2);

        drop(first);
        assert_eq!(live.count(), 1);
        drop(second);
        assert_eq!(live.count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn sixth_dispatch_cools_down_and_resets() {
        let mut throttle = Throttle::new(ThrottleConfig::default());
        let live = LiveTasks::new();
        let reporter = NoopReporter::shared();
        let start = Instant::now();

        for expected in 1..=5 {
            throttle.admit(&live, &reporter).await;
            assert_eq!(throttle.dispatch_count(), expected);
        }
        assert_eq!(start.elapsed(), Duration::ZERO);

        throttle.admit(&live, &reporter).await;
        assert_eq!(throttle.dispatch_count(), 1);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(60) && elapsed < Duration::from_secs(61));
    }

    #[tokio::test(start_paused = true)]
    async fn secondary_cap_polls_until_tasks_drain() {
        let mut throttle = Throttle::new(ThrottleConfig::default());
        let live = LiveTasks::new();
        let reporter = NoopReporter::shared();

        let guards: Vec<_> = (0..7).map(|_| live.enter()).collect();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(75)).await;
            drop(guards);
        });

        for _ in 0..5 {
            throttle.admit(&live, &reporter).await;
        }
        let start = Instant::now();
        throttle.admit(&live, &reporter).await;

        // 60s cooldown, one 30s poll while 7 tasks were still running
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(90) && elapsed < Duration::from_secs(91));
        assert_eq!(throttle.dispatch_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn secondary_cap_can_be_disabled() {
        let config = ThrottleConfig {
            secondary_cap: false,
            ..Default::default()
        };
        let mut throttle = Throttle::new(config);
        let live = LiveTasks::new();
        let reporter = NoopReporter::shared();
        let _guards: Vec<_> = (0..9).map(|_| live.enter()).collect();

        for _ in 0..5 {
            throttle.admit(&live, &reporter).await;
        }
        let start = Instant::now();
        throttle.admit(&live, &reporter).await;

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(60) && elapsed < Duration::from_secs(61));
    }
}
