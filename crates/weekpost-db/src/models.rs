//! Database row types — these map directly to SQLite rows.
//! Conversion into the domain models in weekpost-types happens here so the
//! rest of the workspace never sees raw strings.

use anyhow::{Result, anyhow};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use weekpost_types::models::{Category, ChangeEntry, WeeklyCategoryStats, WeeklyMessageRecord};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct EntryRow {
    pub id: i64,
    pub week_start: String,
    pub category: String,
    pub content: String,
    pub author: String,
    pub created_at: String,
    pub updated_at: String,
}

pub struct WeeklyMessageRow {
    pub week_start: String,
    pub channel_id: String,
    pub message_id: String,
    pub created_at: String,
}

pub struct CategoryCountRow {
    pub week_start: String,
    pub category: String,
    pub count: i64,
}

impl TryFrom<EntryRow> for ChangeEntry {
    type Error = anyhow::Error;

    fn try_from(row: EntryRow) -> Result<Self> {
        Ok(ChangeEntry {
            id: row.id,
            week_start: parse_date(&row.week_start)?,
            category: Category::from_key(&row.category)
                .ok_or_else(|| anyhow!("Corrupt category '{}' on entry {}", row.category, row.id))?,
            content: row.content,
            author: row.author,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
        })
    }
}

impl TryFrom<WeeklyMessageRow> for WeeklyMessageRecord {
    type Error = anyhow::Error;

    fn try_from(row: WeeklyMessageRow) -> Result<Self> {
        Ok(WeeklyMessageRecord {
            week_start: parse_date(&row.week_start)?,
            channel_id: row.channel_id,
            message_id: row.message_id,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}

/// Fold `(week, category, count)` rows into one stats value per week,
/// preserving row order.
pub fn fold_category_counts(rows: Vec<CategoryCountRow>) -> Result<Vec<WeeklyCategoryStats>> {
    let mut weeks: Vec<WeeklyCategoryStats> = Vec::new();
    for row in rows {
        let week = parse_date(&row.week_start)?;
        let category = Category::from_key(&row.category)
            .ok_or_else(|| anyhow!("Corrupt category '{}' in week {}", row.category, row.week_start))?;
        let count = usize::try_from(row.count).unwrap_or(0);

        match weeks.last_mut() {
            Some(last) if last.week_start == Some(week) => last.bump(category, count),
            _ => {
                let mut stats = WeeklyCategoryStats {
                    week_start: Some(week),
                    ..Default::default()
                };
                stats.bump(category, count);
                weeks.push(stats);
            }
        }
    }
    Ok(weeks)
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|e| anyhow!("Corrupt date '{}': {}", raw, e))
}

/// SQLite's `datetime('now')` stores "YYYY-MM-DD HH:MM:SS" without a zone;
/// imported rows may carry RFC 3339. Both are UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc()))
        .map_err(|e| anyhow!("Corrupt timestamp '{}': {}", raw, e))
}
