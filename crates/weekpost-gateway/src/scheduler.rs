use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use weekpost_db::Database;
use weekpost_types::clock::{Clock, current_week, is_schedule_reached};
use weekpost_types::config::ConfigStore;

use crate::client::MessagingClient;
use crate::worker::SyncHandle;

pub const STARTUP_DELAY: Duration = Duration::from_secs(5);
pub const TICK_INTERVAL: Duration = Duration::from_secs(30);

/// What a single tick decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    NotConnected,
    NotDue,
    AlreadyPosted,
    /// An unforced sync was queued.
    Requested,
}

/// Periodic trigger for the first post of each week.
///
/// Ticks only queue work; remote calls happen on the sync worker.
pub struct Scheduler {
    db: Arc<Database>,
    client: Arc<dyn MessagingClient>,
    config: ConfigStore,
    clock: Arc<dyn Clock>,
    sync: SyncHandle,
    startup_delay: Duration,
    interval: Duration,
}

impl Scheduler {
    pub fn new(
        db: Arc<Database>,
        client: Arc<dyn MessagingClient>,
        config: ConfigStore,
        clock: Arc<dyn Clock>,
        sync: SyncHandle,
    ) -> Self {
        Self {
            db,
            client,
            config,
            clock,
            sync,
            startup_delay: STARTUP_DELAY,
            interval: TICK_INTERVAL,
        }
    }

    pub fn with_timing(mut self, startup_delay: Duration, interval: Duration) -> Self {
        self.startup_delay = startup_delay;
        self.interval = interval;
        self
    }

    pub async fn tick(&self) -> anyhow::Result<TickOutcome> {
        if !self.client.is_connected() {
            return Ok(TickOutcome::NotConnected);
        }

        let config = self.config.snapshot();
        let now = self.clock.now();
        let week = current_week(&config, now);
        if !is_schedule_reached(&week, &config, now) {
            return Ok(TickOutcome::NotDue);
        }

        let db = self.db.clone();
        let week_start = week.start;
        let record = tokio::task::spawn_blocking(move || db.find_weekly_message(week_start)).await??;
        if record.is_some() {
            return Ok(TickOutcome::AlreadyPosted);
        }

        info!(week_start = %week.start, "Schedule reached, requesting weekly message");
        self.sync.request_sync(false);
        Ok(TickOutcome::Requested)
    }

    /// Tick until cancelled. A failed tick is logged and the loop carries on.
    pub async fn run(self, cancel: CancellationToken) {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(self.startup_delay) => {}
        }

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(interval_secs = self.interval.as_secs(), "Weekly scheduler started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            match self.tick().await {
                Ok(outcome) => debug!(?outcome, "Scheduler tick"),
                Err(e) => error!("Weekly scheduler tick failed: {:#}", e),
            }
        }
        info!("Weekly scheduler stopped");
    }
}
