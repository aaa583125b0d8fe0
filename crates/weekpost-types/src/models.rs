use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Kind of change an entry describes. The declaration order is the render order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Added,
    Changed,
    Removed,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Added, Category::Changed, Category::Removed];

    /// Stable key used in storage and on the wire.
    pub fn key(self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Changed => "changed",
            Self::Removed => "removed",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key.trim().to_ascii_lowercase().as_str() {
            "added" => Some(Self::Added),
            "changed" => Some(Self::Changed),
            "removed" => Some(Self::Removed),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_key(s).ok_or_else(|| format!("unknown category: {}", s))
    }
}

/// A single dated change in the ledger.
///
/// `id` and `week_start` are fixed at creation. Category, content and author
/// can be edited while the week is current.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEntry {
    pub id: i64,
    pub week_start: NaiveDate,
    pub category: Category,
    pub content: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The stored pointer to the one canonical remote message of a week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyMessageRecord {
    pub week_start: NaiveDate,
    pub channel_id: String,
    pub message_id: String,
    pub created_at: DateTime<Utc>,
}

/// Monday-aligned week. Derived, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WeekWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl WeekWindow {
    pub fn starting(start: NaiveDate) -> Self {
        Self {
            start,
            end: start + Duration::days(6),
        }
    }

    /// Short human label, e.g. `01.01 - 07.01`.
    pub fn label(&self) -> String {
        format!("{} - {}", self.start.format("%d.%m"), self.end.format("%d.%m"))
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// Per-week entry counts, one row per week that has entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyCategoryStats {
    pub week_start: Option<NaiveDate>,
    pub added: usize,
    pub changed: usize,
    pub removed: usize,
}

impl WeeklyCategoryStats {
    pub fn total(&self) -> usize {
        self.added + self.changed + self.removed
    }

    pub fn bump(&mut self, category: Category, count: usize) {
        match category {
            Category::Added => self.added += count,
            Category::Changed => self.changed += count,
            Category::Removed => self.removed += count,
        }
    }
}
