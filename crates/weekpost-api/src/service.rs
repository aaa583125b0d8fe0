//! Operations offered to front ends (chat commands, console, admin API).
//!
//! Mutations return as soon as the ledger is updated and queue a forced sync;
//! read paths go straight to the database and never wait on the sync worker.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{info, warn};

use weekpost_db::Database;
use weekpost_gateway::{MessagingClient, SyncHandle, SyncOutcome};
use weekpost_render::Renderer;
use weekpost_types::api::{
    AnalyticsReport, CreateEntryRequest, EditEntryRequest, LedgerSnapshot, StatusReport,
};
use weekpost_types::clock::{Clock, current_week, is_schedule_reached, scheduled_instant};
use weekpost_types::config::{ConfigStore, WeeklyConfig};
use weekpost_types::models::{ChangeEntry, WeekWindow, WeeklyCategoryStats};

use crate::error::ApiError;
use crate::validation::{normalize_author, normalize_content};

#[derive(Clone)]
pub struct WeeklyService {
    db: Arc<Database>,
    config: ConfigStore,
    clock: Arc<dyn Clock>,
    client: Arc<dyn MessagingClient>,
    sync: SyncHandle,
    renderer: Renderer,
}

impl WeeklyService {
    pub fn new(
        db: Arc<Database>,
        config: ConfigStore,
        clock: Arc<dyn Clock>,
        client: Arc<dyn MessagingClient>,
        sync: SyncHandle,
        renderer: Renderer,
    ) -> Self {
        Self {
            db,
            config,
            clock,
            client,
            sync,
            renderer,
        }
    }

    pub fn config(&self) -> Arc<WeeklyConfig> {
        self.config.snapshot()
    }

    /// Validate and swap in new config values, then resync so the post
    /// reflects new texts and emojis.
    pub fn update_config(&self, updates: &BTreeMap<String, String>) -> Result<Arc<WeeklyConfig>, ApiError> {
        let next = self.config.update_from_map(updates)?;
        self.sync.request_sync(true);
        Ok(next)
    }

    pub fn current_week_window(&self) -> WeekWindow {
        current_week(&self.config.snapshot(), self.clock.now())
    }

    // -- Entries --

    pub async fn entries_for_current_week(&self) -> Result<Vec<ChangeEntry>, ApiError> {
        let week = self.current_week_window();
        self.blocking(move |db| db.entries_for_week(week.start)).await
    }

    pub async fn create_entry(&self, req: CreateEntryRequest) -> Result<ChangeEntry, ApiError> {
        let content = normalize_content(&req.content)?;
        let author = normalize_author(&req.author);
        let week = self.current_week_window();
        let category = req.category;

        let entry = self
            .blocking(move |db| db.create_entry(week.start, category, &content, &author))
            .await?;
        info!(id = entry.id, category = %entry.category, week_start = %entry.week_start, "Entry created");

        self.sync.request_sync(true);
        Ok(entry)
    }

    /// Change category, content, or author of an entry in the current week.
    pub async fn edit_entry(&self, id: i64, req: EditEntryRequest) -> Result<ChangeEntry, ApiError> {
        let content = req.content.as_deref().map(normalize_content).transpose()?;
        let author = req.author.as_deref().map(normalize_author);
        let week = self.current_week_window();

        let edited = self
            .blocking(move |db| {
                let Some(existing) = db.get_entry_in_week(id, week.start)? else {
                    return Ok(None);
                };
                let category = req.category.unwrap_or(existing.category);
                let content = content.unwrap_or(existing.content);
                let author = author.unwrap_or(existing.author);
                if !db.update_entry_in_week(id, week.start, category, &content, &author)? {
                    return Ok(None);
                }
                db.get_entry(id)
            })
            .await?
            .ok_or(ApiError::NotFound(id))?;
        info!(id, category = %edited.category, "Entry edited");

        self.sync.request_sync(true);
        Ok(edited)
    }

    /// Permanently remove an entry of the current week, returning it.
    pub async fn delete_entry(&self, id: i64) -> Result<ChangeEntry, ApiError> {
        let week = self.current_week_window();
        let deleted = self
            .blocking(move |db| {
                let Some(existing) = db.get_entry_in_week(id, week.start)? else {
                    return Ok(None);
                };
                let removed = db.delete_entry_in_week(id, week.start)?;
                Ok(removed.then_some(existing))
            })
            .await?
            .ok_or(ApiError::NotFound(id))?;
        info!(id, "Entry deleted");

        self.sync.request_sync(true);
        Ok(deleted)
    }

    // -- Sync --

    /// Queue a sync and return immediately.
    pub fn request_sync(&self, force_create: bool) {
        self.sync.request_sync(force_create);
    }

    /// Run a sync on the worker and wait for its result.
    pub async fn sync(&self, force_create: bool) -> Result<SyncOutcome, ApiError> {
        Ok(self.sync.sync(force_create).await?)
    }

    pub fn request_test_message(&self) {
        self.sync.request_test_message();
    }

    pub async fn send_test(&self) -> Result<String, ApiError> {
        Ok(self.sync.send_test().await?)
    }

    // -- Read paths --

    /// Compact rendering of the current week, as it would be posted.
    pub async fn preview(&self) -> Result<String, ApiError> {
        let config = self.config.snapshot();
        let week = current_week(&config, self.clock.now());
        let entries = self.blocking(move |db| db.entries_for_week(week.start)).await?;
        Ok(self.renderer.render_weekly_text(&week, &entries, &config))
    }

    pub async fn list_text(&self) -> Result<String, ApiError> {
        let config = self.config.snapshot();
        let week = current_week(&config, self.clock.now());
        let entries = self.blocking(move |db| db.entries_for_week(week.start)).await?;
        Ok(self.renderer.render_list(&week, &entries, &config))
    }

    pub async fn status(&self) -> Result<StatusReport, ApiError> {
        let config = self.config.snapshot();
        let now = self.clock.now();
        let week = current_week(&config, now);

        let (entry_count, record) = self
            .blocking(move |db| Ok((db.count_for_week(week.start)?, db.find_weekly_message(week.start)?)))
            .await?;

        Ok(StatusReport {
            connected: self.client.is_connected(),
            week_start: week.start,
            week_end: week.end,
            week_label: week.label(),
            entry_count,
            scheduled_at: scheduled_instant(&week, &config).with_timezone(&chrono::Utc),
            schedule_reached: is_schedule_reached(&week, &config, now),
            channel_id: config.channel_id.clone(),
            message_id: record.map(|r| r.message_id),
        })
    }

    /// Category counts for the most recent weeks with entries. `weeks`
    /// overrides the configured window; both are clamped to 1..=52.
    pub async fn analytics(&self, weeks: Option<u32>) -> Result<AnalyticsReport, ApiError> {
        let window = weeks
            .unwrap_or(self.config.snapshot().analytics_weeks)
            .clamp(1, 52);
        let stats = self.blocking(move |db| db.weekly_category_stats(window)).await?;

        let mut totals = WeeklyCategoryStats::default();
        for week in &stats {
            totals.added += week.added;
            totals.changed += week.changed;
            totals.removed += week.removed;
        }
        Ok(AnalyticsReport {
            window_weeks: window,
            weeks: stats,
            totals,
        })
    }

    /// Everything in the ledger, for export.
    pub async fn snapshot(&self) -> Result<LedgerSnapshot, ApiError> {
        let (entries, weekly_messages) = self
            .blocking(|db| Ok((db.all_entries()?, db.all_weekly_messages()?)))
            .await?;
        Ok(LedgerSnapshot {
            exported_at: self.clock.now(),
            entries,
            weekly_messages,
        })
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(db.as_ref()))
            .await
            .map_err(|e| {
                warn!("spawn_blocking join error: {}", e);
                ApiError::Storage(e.to_string())
            })?
            .map_err(ApiError::from)
    }
}
