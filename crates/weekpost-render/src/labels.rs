use weekpost_types::config::WeeklyConfig;

/// Fixed texts the renderer needs besides what the config carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LabelKey {
    Added,
    Changed,
    Removed,
    NoEntries,
    CurrentWeek,
    TestPrefix,
    TestNotice,
    NoText,
    Truncated,
    UnknownAuthor,
}

impl LabelKey {
    /// Text used when no lookup has a translation.
    pub fn default_text(self) -> &'static str {
        match self {
            Self::Added => "Added",
            Self::Changed => "Changed",
            Self::Removed => "Removed",
            Self::NoEntries => "No entries.",
            Self::CurrentWeek => "Current week",
            Self::TestPrefix => "TEST",
            Self::TestNotice => "This message is a test and will not be saved as the weekly post.",
            Self::NoText => "(no text)",
            Self::Truncated => "... (truncated)",
            Self::UnknownAuthor => "@Unknown",
        }
    }
}

/// Translation capability injected into the renderer.
pub trait LabelLookup: Send + Sync {
    fn lookup(&self, locale: &str, key: LabelKey) -> Option<&str>;
}

/// Resolve a label: configured locale, then fallback locale, then the
/// built-in default. Disabled i18n always yields the default.
pub fn resolve(lookup: &dyn LabelLookup, config: &WeeklyConfig, key: LabelKey) -> String {
    if !config.i18n_enabled {
        return key.default_text().to_string();
    }
    let locale = normalize_locale(&config.locale);
    let fallback = normalize_locale(&config.fallback_locale);
    lookup
        .lookup(&locale, key)
        .or_else(|| lookup.lookup(&fallback, key))
        .unwrap_or(key.default_text())
        .to_string()
}

fn normalize_locale(raw: &str) -> String {
    let lower = raw.trim().to_ascii_lowercase();
    // "de-DE" / "en_US" -> language part only
    lower
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Built-in English and German tables.
pub struct StaticLabels;

impl LabelLookup for StaticLabels {
    fn lookup(&self, locale: &str, key: LabelKey) -> Option<&str> {
        match locale {
            "en" => Some(key.default_text()),
            "de" => Some(match key {
                LabelKey::Added => "Neu",
                LabelKey::Changed => "Geändert",
                LabelKey::Removed => "Entfernt",
                LabelKey::NoEntries => "Keine Einträge.",
                LabelKey::CurrentWeek => "Aktuelle Woche",
                LabelKey::TestPrefix => "TEST",
                LabelKey::TestNotice => {
                    "Diese Nachricht ist ein Test und wird nicht als Wochenpost gespeichert."
                }
                LabelKey::NoText => "(kein Text)",
                LabelKey::Truncated => "... (gekürzt)",
                LabelKey::UnknownAuthor => "@Unbekannt",
            }),
            _ => None,
        }
    }
}
