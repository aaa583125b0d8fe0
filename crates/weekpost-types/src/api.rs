use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Category, ChangeEntry, WeeklyCategoryStats, WeeklyMessageRecord};

// -- Entries --

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateEntryRequest {
    pub category: Category,
    pub content: String,
    pub author: String,
}

/// Partial edit: absent fields keep their current value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EditEntryRequest {
    pub category: Option<Category>,
    pub content: Option<String>,
    pub author: Option<String>,
}

// -- Status --

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub connected: bool,
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub week_label: String,
    pub entry_count: usize,
    pub scheduled_at: DateTime<Utc>,
    pub schedule_reached: bool,
    pub channel_id: String,
    pub message_id: Option<String>,
}

// -- Analytics --

#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsReport {
    pub window_weeks: u32,
    pub weeks: Vec<WeeklyCategoryStats>,
    pub totals: WeeklyCategoryStats,
}

// -- Export --

#[derive(Debug, Clone, Serialize)]
pub struct LedgerSnapshot {
    pub exported_at: DateTime<Utc>,
    pub entries: Vec<ChangeEntry>,
    pub weekly_messages: Vec<WeeklyMessageRecord>,
}
