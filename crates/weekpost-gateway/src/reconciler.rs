//! Brings the remote weekly message in line with the ledger.
//!
//! Per week the stored record moves from absent, to present, to present but
//! stale (remote message deleted). A stale record is never deleted here; it is
//! overwritten once a replacement message was confirmed sent.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use weekpost_db::Database;
use weekpost_render::{RenderedMessage, Renderer};
use weekpost_types::clock::{Clock, current_week, is_schedule_reached};
use weekpost_types::config::{ConfigStore, WeeklyConfig};
use weekpost_types::models::{ChangeEntry, WeekWindow, WeeklyMessageRecord};

use crate::client::{ChannelRef, MessagingClient, RemoteError};
use crate::correlation;
use crate::error::SyncError;

const TAG_SYNC: &str = "sync";
const TAG_TEST: &str = "test_send";

/// What a successful `sync` did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// The existing message was edited in place.
    Edited {
        week_start: NaiveDate,
        message_id: String,
    },
    /// A new message was sent and recorded. `replaced` holds the id of a
    /// stored message that turned out to be gone.
    Created {
        week_start: NaiveDate,
        message_id: String,
        replaced: Option<String>,
    },
    /// No message yet and creation is neither forced nor due.
    NotDue { week_start: NaiveDate },
}

pub struct Reconciler {
    db: Arc<Database>,
    client: Arc<dyn MessagingClient>,
    config: ConfigStore,
    clock: Arc<dyn Clock>,
    renderer: Renderer,
}

impl Reconciler {
    pub fn new(
        db: Arc<Database>,
        client: Arc<dyn MessagingClient>,
        config: ConfigStore,
        clock: Arc<dyn Clock>,
        renderer: Renderer,
    ) -> Self {
        Self {
            db,
            client,
            config,
            clock,
            renderer,
        }
    }

    /// One reconciliation pass for the current week.
    ///
    /// Must only run on the sync worker; two passes running at once could both
    /// take the create path.
    pub async fn sync(&self, force_create: bool) -> Result<SyncOutcome, SyncError> {
        let config = self.config.snapshot();
        let now = self.clock.now();
        let week = current_week(&config, now);

        if !self.client.is_connected() {
            debug!(week_start = %week.start, "Skip weekly sync, client not connected");
            return Err(SyncError::NotConnected);
        }

        let channel = self.resolve_channel(&config, &week, now, TAG_SYNC).await?;
        let (entries, record) = self.load_week(&week, now).await?;
        let rendered = self.renderer.render_weekly(&week, &entries, &config);

        let mut replaced = None;
        if let Some(record) = record {
            match self.update_existing(&channel, &record, &rendered).await {
                Ok(()) => {
                    info!(
                        week_start = %week.start,
                        message_id = %record.message_id,
                        "Updated weekly message"
                    );
                    return Ok(SyncOutcome::Edited {
                        week_start: week.start,
                        message_id: record.message_id,
                    });
                }
                Err(RemoteError::NotFound) => {
                    warn!(
                        week_start = %week.start,
                        message_id = %record.message_id,
                        "Stored weekly message no longer exists, creating a new one"
                    );
                    // A missing channel would also report the message missing.
                    self.resolve_channel(&config, &week, now, TAG_SYNC).await?;
                    replaced = Some(record.message_id);
                }
                Err(e) => {
                    return Err(self.remote_failure(
                        TAG_SYNC,
                        e,
                        format!("Failed to edit weekly message {}", record.message_id),
                        &week,
                        &channel,
                        now,
                    ));
                }
            }
        }

        if !force_create && !is_schedule_reached(&week, &config, now) {
            info!(week_start = %week.start, "Weekly message not created yet (schedule not reached)");
            return Ok(SyncOutcome::NotDue {
                week_start: week.start,
            });
        }

        let message_id = match self.client.send(&channel, &rendered).await {
            Ok(id) => id,
            Err(e) => {
                return Err(self.remote_failure(
                    TAG_SYNC,
                    e,
                    format!("Failed to create weekly message for {}", week.start),
                    &week,
                    &channel,
                    now,
                ));
            }
        };

        let week_start = week.start;
        let channel_id = channel.id.clone();
        let stored_id = message_id.clone();
        let stored = self
            .blocking(move |db| db.upsert_weekly_message(week_start, &channel_id, &stored_id))
            .await;
        if let Err(e) = stored {
            let correlation_id = correlation::capture(
                TAG_SYNC,
                &format!(
                    "Sent weekly message {} for {} but could not record it",
                    message_id, week.start
                ),
                &e,
                now,
            );
            return Err(SyncError::Storage {
                message: e.to_string(),
                correlation_id,
            });
        }

        info!(
            week_start = %week.start,
            channel_id = %channel.id,
            message_id = %message_id,
            replaced = ?replaced,
            "Created weekly message"
        );
        Ok(SyncOutcome::Created {
            week_start: week.start,
            message_id,
            replaced,
        })
    }

    /// Send the test rendering of the current week. Nothing is recorded.
    pub async fn send_test(&self) -> Result<String, SyncError> {
        let config = self.config.snapshot();
        let now = self.clock.now();
        let week = current_week(&config, now);

        if !self.client.is_connected() {
            return Err(SyncError::NotConnected);
        }

        let channel = self.resolve_channel(&config, &week, now, TAG_TEST).await?;
        let (entries, _) = self.load_week(&week, now).await?;
        let rendered = self.renderer.render_test(&week, &entries, &config);

        match self.client.send(&channel, &rendered).await {
            Ok(message_id) => {
                info!(week_start = %week.start, message_id = %message_id, "Sent test weekly message");
                Ok(message_id)
            }
            Err(e) => Err(self.remote_failure(
                TAG_TEST,
                e,
                format!("Failed to send test weekly message for {}", week.start),
                &week,
                &channel,
                now,
            )),
        }
    }

    /// Confirm the stored message exists, then edit it in place.
    async fn update_existing(
        &self,
        channel: &ChannelRef,
        record: &WeeklyMessageRecord,
        rendered: &RenderedMessage,
    ) -> Result<(), RemoteError> {
        self.client.fetch(channel, &record.message_id).await?;
        self.client.edit(channel, &record.message_id, rendered).await
    }

    async fn resolve_channel(
        &self,
        config: &WeeklyConfig,
        week: &WeekWindow,
        now: DateTime<Utc>,
        tag: &str,
    ) -> Result<ChannelRef, SyncError> {
        let channel_id = config.channel_id.trim();
        if channel_id.is_empty() {
            return Err(configuration_error("channel_id is empty", now));
        }

        match self.client.resolve_channel(channel_id).await {
            Ok(Some(channel)) => Ok(channel),
            Ok(None) => Err(configuration_error(
                &format!("Configured channel_id {} not found", channel_id),
                now,
            )),
            Err(e) => {
                let channel = ChannelRef {
                    id: channel_id.to_string(),
                    name: None,
                };
                Err(self.remote_failure(
                    tag,
                    e,
                    format!("Failed to resolve channel {}", channel_id),
                    week,
                    &channel,
                    now,
                ))
            }
        }
    }

    async fn load_week(
        &self,
        week: &WeekWindow,
        now: DateTime<Utc>,
    ) -> Result<(Vec<ChangeEntry>, Option<WeeklyMessageRecord>), SyncError> {
        let week_start = week.start;
        let loaded = self
            .blocking(move |db| {
                let entries = db.entries_for_week(week_start)?;
                let record = db.find_weekly_message(week_start)?;
                Ok((entries, record))
            })
            .await;
        loaded.map_err(|e| {
            let correlation_id = correlation::capture(
                TAG_SYNC,
                &format!("Failed to load week {}", week_start),
                &e,
                now,
            );
            SyncError::Storage {
                message: e.to_string(),
                correlation_id,
            }
        })
    }

    async fn blocking<T, F>(&self, f: F) -> anyhow::Result<T>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(db.as_ref())).await?
    }

    fn remote_failure(
        &self,
        tag: &str,
        source: RemoteError,
        context: String,
        week: &WeekWindow,
        channel: &ChannelRef,
        now: DateTime<Utc>,
    ) -> SyncError {
        let summary = format!("{} (week {}, channel {})", context, week.start, channel.id);
        let correlation_id = correlation::capture(tag, &summary, &source, now);
        SyncError::Remote {
            source,
            context,
            correlation_id,
        }
    }
}

fn configuration_error(message: &str, now: DateTime<Utc>) -> SyncError {
    let correlation_id = correlation::next_id(now);
    warn!(correlation_id = %correlation_id, "{}, skipping", message);
    SyncError::Configuration {
        message: message.to_string(),
        correlation_id,
    }
}
