//! Background sweep of expired prompts

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::models::QueuedNotification;
use crate::services::Clock;

use super::purge;

/// Shared view of a queue's entries that can only remove expired ones
#[derive(Clone)]
pub struct ExpirySweeper<C> {
    entries: Arc<Mutex<Vec<QueuedNotification>>>,
    clock: C,
}

impl<C: Clock> ExpirySweeper<C> {
    pub(super) const fn new(entries: Arc<Mutex<Vec<QueuedNotification>>>, clock: C) -> Self {
        Self { entries, clock }
    }

    pub async fn purge_expired(&self) -> usize {
        purge(&self.entries, self.clock.now()).await
    }
}

/// Runs [`ExpirySweeper::purge_expired`] on a fixed period.
///
/// At most one sweep task is active; starting again replaces it.
#[derive(Debug, Default)]
pub struct PurgeScheduler {
    handle: Option<JoinHandle<()>>,
}

impl PurgeScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start<C>(&mut self, sweeper: ExpirySweeper<C>, period: Duration)
    where
        C: Clock + Send + Sync + 'static,
    {
        self.stop();
        tracing::debug!(period_secs = period.as_secs(), "Starting notification purge timer");
        self.handle = Some(tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                sweeper.purge_expired().await;
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

impl Drop for PurgeScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
