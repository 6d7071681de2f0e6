//! Periodic full sync check

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

/// Drives a recurring full sync check on the current `LocalSet`.
///
/// Store futures are not `Send`, so the task is spawned locally and
/// [`SyncScheduler::start`] must be called from within a `LocalSet`. A new
/// schedule always supersedes the pending one.
#[derive(Debug, Default)]
pub struct SyncScheduler {
    handle: Option<JoinHandle<()>>,
}

impl SyncScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `check` every `period`, first after one full period.
    pub fn start<F, Fut>(&mut self, period: Duration, mut check: F)
    where
        F: FnMut() -> Fut + 'static,
        Fut: Future<Output = ()> + 'static,
    {
        self.stop();
        tracing::debug!(period_secs = period.as_secs(), "Scheduling full sync checks");
        self.handle = Some(tokio::task::spawn_local(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                check().await;
            }
        }));
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;
    use tokio::task::LocalSet;

    #[tokio::test(start_paused = true)]
    async fn fires_once_per_period() {
        LocalSet::new()
            .run_until(async {
                let ticks = Rc::new(Cell::new(0));
                let mut scheduler = SyncScheduler::new();
                let counter = Rc::clone(&ticks);
                scheduler.start(Duration::from_secs(300), move || {
                    let counter = Rc::clone(&counter);
                    async move { counter.set(counter.get() + 1) }
                });

                time::sleep(Duration::from_secs(299)).await;
                assert_eq!(ticks.get(), 0);
                time::sleep(Duration::from_secs(302)).await;
                assert_eq!(ticks.get(), 2);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn rescheduling_cancels_pending_timer() {
        LocalSet::new()
            .run_until(async {
                let ticks = Rc::new(Cell::new(0));
                let mut scheduler = SyncScheduler::new();
                for period in [10, 1_000] {
                    let counter = Rc::clone(&ticks);
                    scheduler.start(Duration::from_secs(period), move || {
                        let counter = Rc::clone(&counter);
                        async move { counter.set(counter.get() + 1) }
                    });
                }

                time::sleep(Duration::from_secs(60)).await;
                assert_eq!(ticks.get(), 0);
                assert!(scheduler.is_running());

                scheduler.stop();
                assert!(!scheduler.is_running());
            })
            .await;
    }
}
