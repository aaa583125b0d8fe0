use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{NaiveTime, Weekday};
use chrono_tz::Tz;
use tokio::sync::watch;
use tracing::info;

pub const KEY_GUILD_ID: &str = "guild_id";
pub const KEY_CHANNEL_ID: &str = "channel_id";
pub const KEY_TIMEZONE: &str = "timezone";
pub const KEY_SCHEDULE_DAY: &str = "schedule_day";
pub const KEY_SCHEDULE_TIME: &str = "schedule_time";
pub const KEY_TITLE_TEXT: &str = "title_text";
pub const KEY_NOTICE_TEXT: &str = "notice_text";
pub const KEY_NO_CHANGE_TEXT: &str = "no_change_text";
pub const KEY_LOCALE: &str = "locale";
pub const KEY_FALLBACK_LOCALE: &str = "fallback_locale";
pub const KEY_I18N_ENABLED: &str = "i18n_enabled";
pub const KEY_ANALYTICS_WEEKS: &str = "analytics_weeks";

/// Prefixes of the emoji key triples (`<prefix>_emoji`, `<prefix>_emoji_id`, `<prefix>_emoji_animated`).
pub const EMOJI_PREFIXES: [&str; 5] = ["title", "added", "changed", "removed", "notice"];

const DEFAULTS: &[(&str, &str)] = &[
    (KEY_GUILD_ID, ""),
    (KEY_CHANNEL_ID, ""),
    (KEY_TIMEZONE, "Europe/Berlin"),
    (KEY_SCHEDULE_DAY, "MONDAY"),
    (KEY_SCHEDULE_TIME, "12:00"),
    ("title_emoji", "🎮"),
    ("title_emoji_id", ""),
    ("title_emoji_animated", "false"),
    (KEY_TITLE_TEXT, "WEEKLY RECAP"),
    ("added_emoji", "🟢"),
    ("added_emoji_id", ""),
    ("added_emoji_animated", "false"),
    ("changed_emoji", "🟠"),
    ("changed_emoji_id", ""),
    ("changed_emoji_animated", "false"),
    ("removed_emoji", "🔴"),
    ("removed_emoji_id", ""),
    ("removed_emoji_animated", "false"),
    ("notice_emoji", "➡️"),
    ("notice_emoji_id", ""),
    ("notice_emoji_animated", "false"),
    (KEY_NOTICE_TEXT, "This message is edited with every new change this week."),
    (KEY_NO_CHANGE_TEXT, "There were no changes this week."),
    (KEY_LOCALE, "en"),
    (KEY_FALLBACK_LOCALE, "en"),
    (KEY_I18N_ENABLED, "true"),
    (KEY_ANALYTICS_WEEKS, "8"),
];

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Invalid schedule day: {0}")]
    InvalidScheduleDay(String),

    #[error("Invalid schedule time (HH:mm): {0}")]
    InvalidScheduleTime(String),

    #[error("Invalid number for {key}: {value}")]
    InvalidNumber { key: String, value: String },
}

/// How an emoji is configured: literal text, or a custom emoji id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmojiSpec {
    pub emoji: String,
    pub emoji_id: String,
    pub animated: bool,
}

/// Immutable, validated configuration snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct WeeklyConfig {
    pub guild_id: String,
    pub channel_id: String,
    pub timezone: Tz,
    pub schedule_day: Weekday,
    pub schedule_time: NaiveTime,
    pub title_emoji: EmojiSpec,
    pub title_text: String,
    pub added_emoji: EmojiSpec,
    pub changed_emoji: EmojiSpec,
    pub removed_emoji: EmojiSpec,
    pub notice_emoji: EmojiSpec,
    pub notice_text: String,
    pub no_change_text: String,
    pub locale: String,
    pub fallback_locale: String,
    pub i18n_enabled: bool,
    pub analytics_weeks: u32,
}

impl Default for WeeklyConfig {
    fn default() -> Self {
        Self::from_map(&BTreeMap::new()).unwrap_or_else(|_| Self {
            guild_id: String::new(),
            channel_id: String::new(),
            timezone: chrono_tz::Europe::Berlin,
            schedule_day: Weekday::Mon,
            schedule_time: NaiveTime::from_hms_opt(12, 0, 0).unwrap_or_default(),
            title_emoji: EmojiSpec::default(),
            title_text: String::new(),
            added_emoji: EmojiSpec::default(),
            changed_emoji: EmojiSpec::default(),
            removed_emoji: EmojiSpec::default(),
            notice_emoji: EmojiSpec::default(),
            notice_text: String::new(),
            no_change_text: String::new(),
            locale: "en".into(),
            fallback_locale: "en".into(),
            i18n_enabled: true,
            analytics_weeks: 8,
        })
    }
}

impl WeeklyConfig {
    /// All keys understood by [`WeeklyConfig::from_map`].
    pub fn supported_keys() -> impl Iterator<Item = &'static str> {
        DEFAULTS.iter().map(|(k, _)| *k)
    }

    pub fn default_map() -> BTreeMap<String, String> {
        DEFAULTS
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    /// Build a snapshot from raw key/value pairs. Missing keys take defaults,
    /// unknown keys are ignored.
    pub fn from_map(raw: &BTreeMap<String, String>) -> Result<Self, ConfigError> {
        let mut source = Self::default_map();
        for (key, value) in raw {
            if source.contains_key(key) {
                source.insert(key.clone(), value.trim().to_string());
            }
        }
        let get = |key: &str| source.get(key).cloned().unwrap_or_default();
        let emoji = |prefix: &str| EmojiSpec {
            emoji: get(&format!("{}_emoji", prefix)),
            emoji_id: get(&format!("{}_emoji_id", prefix)),
            animated: parse_bool(&get(&format!("{}_emoji_animated", prefix))),
        };

        let tz_raw = get(KEY_TIMEZONE);
        let timezone: Tz = tz_raw
            .parse()
            .map_err(|_| ConfigError::InvalidTimezone(tz_raw.clone()))?;

        let day_raw = get(KEY_SCHEDULE_DAY);
        let schedule_day: Weekday = day_raw
            .parse()
            .map_err(|_| ConfigError::InvalidScheduleDay(day_raw.clone()))?;

        let schedule_time = parse_schedule_time(&get(KEY_SCHEDULE_TIME))?;

        let weeks_raw = get(KEY_ANALYTICS_WEEKS);
        let analytics_weeks: u32 = weeks_raw.parse().map_err(|_| ConfigError::InvalidNumber {
            key: KEY_ANALYTICS_WEEKS.into(),
            value: weeks_raw.clone(),
        })?;

        Ok(Self {
            guild_id: get(KEY_GUILD_ID),
            channel_id: get(KEY_CHANNEL_ID),
            timezone,
            schedule_day,
            schedule_time,
            title_emoji: emoji("title"),
            title_text: get(KEY_TITLE_TEXT),
            added_emoji: emoji("added"),
            changed_emoji: emoji("changed"),
            removed_emoji: emoji("removed"),
            notice_emoji: emoji("notice"),
            notice_text: get(KEY_NOTICE_TEXT),
            no_change_text: get(KEY_NO_CHANGE_TEXT),
            locale: get(KEY_LOCALE),
            fallback_locale: get(KEY_FALLBACK_LOCALE),
            i18n_enabled: parse_bool(&get(KEY_I18N_ENABLED)),
            analytics_weeks: analytics_weeks.clamp(1, 52),
        })
    }

    /// Inverse of [`WeeklyConfig::from_map`], in normalized form.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        map.insert(KEY_GUILD_ID.into(), self.guild_id.clone());
        map.insert(KEY_CHANNEL_ID.into(), self.channel_id.clone());
        map.insert(KEY_TIMEZONE.into(), self.timezone.name().to_string());
        map.insert(KEY_SCHEDULE_DAY.into(), weekday_name(self.schedule_day).into());
        map.insert(
            KEY_SCHEDULE_TIME.into(),
            self.schedule_time.format("%H:%M").to_string(),
        );
        for (prefix, spec) in [
            ("title", &self.title_emoji),
            ("added", &self.added_emoji),
            ("changed", &self.changed_emoji),
            ("removed", &self.removed_emoji),
            ("notice", &self.notice_emoji),
        ] {
            map.insert(format!("{}_emoji", prefix), spec.emoji.clone());
            map.insert(format!("{}_emoji_id", prefix), spec.emoji_id.clone());
            map.insert(format!("{}_emoji_animated", prefix), spec.animated.to_string());
        }
        map.insert(KEY_TITLE_TEXT.into(), self.title_text.clone());
        map.insert(KEY_NOTICE_TEXT.into(), self.notice_text.clone());
        map.insert(KEY_NO_CHANGE_TEXT.into(), self.no_change_text.clone());
        map.insert(KEY_LOCALE.into(), self.locale.clone());
        map.insert(KEY_FALLBACK_LOCALE.into(), self.fallback_locale.clone());
        map.insert(KEY_I18N_ENABLED.into(), self.i18n_enabled.to_string());
        map.insert(KEY_ANALYTICS_WEEKS.into(), self.analytics_weeks.to_string());
        map
    }
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "MONDAY",
        Weekday::Tue => "TUESDAY",
        Weekday::Wed => "WEDNESDAY",
        Weekday::Thu => "THURSDAY",
        Weekday::Fri => "FRIDAY",
        Weekday::Sat => "SATURDAY",
        Weekday::Sun => "SUNDAY",
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "ja" | "on"
    )
}

/// Accepts 24h (`9:30`, `09:30`, `09:30:00`) and 12h (`9:30 pm`) forms.
/// `24:00` is treated as midnight.
pub fn parse_schedule_time(raw: &str) -> Result<NaiveTime, ConfigError> {
    let value = raw.trim().to_ascii_uppercase();
    if value.is_empty() {
        return Err(ConfigError::InvalidScheduleTime(raw.to_string()));
    }
    if value == "24:00" || value == "24:00:00" {
        return Ok(NaiveTime::MIN);
    }

    const FORMATS: [&str; 4] = ["%H:%M:%S", "%H:%M", "%I:%M:%S %p", "%I:%M %p"];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(&value, fmt).ok())
        .ok_or_else(|| ConfigError::InvalidScheduleTime(raw.to_string()))
}

/// Shared holder of the current config snapshot.
///
/// Readers clone the `Arc` out and never block writers; updates validate a
/// whole new snapshot and swap it in.
#[derive(Clone)]
pub struct ConfigStore {
    tx: Arc<watch::Sender<Arc<WeeklyConfig>>>,
}

impl ConfigStore {
    pub fn new(initial: WeeklyConfig) -> Self {
        let (tx, _) = watch::channel(Arc::new(initial));
        Self { tx: Arc::new(tx) }
    }

    pub fn snapshot(&self) -> Arc<WeeklyConfig> {
        self.tx.borrow().clone()
    }

    pub fn replace(&self, next: WeeklyConfig) -> Arc<WeeklyConfig> {
        let next = Arc::new(next);
        self.tx.send_replace(next.clone());
        next
    }

    /// Merge supported keys from `updates` over the current snapshot,
    /// validate, and swap. The current snapshot stays in place on error.
    pub fn update_from_map(
        &self,
        updates: &BTreeMap<String, String>,
    ) -> Result<Arc<WeeklyConfig>, ConfigError> {
        let mut raw = self.snapshot().to_map();
        for (key, value) in updates {
            if raw.contains_key(key) {
                raw.insert(key.clone(), value.trim().to_string());
            }
        }
        let validated = WeeklyConfig::from_map(&raw)?;
        info!("Configuration updated");
        Ok(self.replace(validated))
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<WeeklyConfig>> {
        self.tx.subscribe()
    }
}
