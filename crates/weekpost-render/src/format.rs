use std::sync::LazyLock;

use regex::Regex;

use weekpost_types::config::EmojiSpec;

static CUSTOM_EMOJI: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^<a?:[\w-]+:\d+>$").expect("static pattern"));
static USER_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{15,25}$").expect("static pattern"));
static USER_MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^<@!?(\d{15,25})>$").expect("static pattern"));
static NON_NAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_]").expect("static pattern"));

/// Turn an emoji config into the markup to emit.
///
/// Custom emoji markup passes through, a configured id builds custom markup
/// (named after `:name:` text when present), plain text passes through, and a
/// blank config falls back to `:<fallback>:`.
pub fn resolve_emoji(spec: &EmojiSpec, fallback_name: &str) -> String {
    let value = spec.emoji.trim();
    if CUSTOM_EMOJI.is_match(value) {
        return value.to_string();
    }

    let id = spec.emoji_id.trim();
    if !id.is_empty() {
        let name = value
            .strip_prefix(':')
            .and_then(|v| v.strip_suffix(':'))
            .filter(|v| !v.is_empty())
            .map(sanitize_emoji_name)
            .unwrap_or_else(|| fallback_name.to_string());
        let prefix = if spec.animated { "<a:" } else { "<:" };
        return format!("{}{}:{}>", prefix, name, id);
    }

    if !value.is_empty() {
        return value.to_string();
    }
    format!(":{}:", sanitize_emoji_name(fallback_name))
}

fn sanitize_emoji_name(value: &str) -> String {
    let cleaned = NON_NAME_CHARS.replace_all(value, "_");
    if cleaned.trim().is_empty() {
        "emoji".to_string()
    } else {
        cleaned.into_owned()
    }
}

/// Render an author as a mention-like handle.
pub fn format_author(author: &str, unknown: &str) -> String {
    let value = author.trim();
    if value.is_empty() {
        return unknown.to_string();
    }
    if let Some(caps) = USER_MENTION.captures(value) {
        return format!("<@{}>", &caps[1]);
    }
    if USER_ID.is_match(value) {
        return format!("<@{}>", value);
    }
    if value.starts_with('@') {
        return value.to_string();
    }
    format!("@{}", value)
}

/// Quote every line of `content`; blank content becomes the quoted placeholder.
pub fn quote_block(content: &str, no_text: &str) -> String {
    let cleaned = content.replace('\r', "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return format!("> {}", no_text);
    }
    cleaned
        .split('\n')
        .map(|line| {
            let line = line.trim();
            if line.is_empty() {
                "> ".to_string()
            } else {
                format!("> {}", line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Cut `value` to at most `max` characters, ending in `...` when cut.
pub fn truncate(value: &str, max: usize) -> String {
    if char_len(value) <= max {
        return value.to_string();
    }
    if max < 3 {
        return value.chars().take(max).collect();
    }
    let mut out: String = value.chars().take(max - 3).collect();
    out.push_str("...");
    out
}

/// Append-only text buffer with a hard character budget.
///
/// A unit either fits whole or is refused; on the first refusal the marker is
/// appended if it still fits and the buffer is closed.
pub struct BoundedText {
    buf: String,
    len: usize,
    limit: usize,
    marker: String,
    closed: bool,
}

impl BoundedText {
    pub fn new(limit: usize, marker: &str) -> Self {
        Self {
            buf: String::new(),
            len: 0,
            limit,
            marker: marker.to_string(),
            closed: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn push(&mut self, unit: &str) -> bool {
        if self.closed {
            return false;
        }
        let n = char_len(unit);
        if self.len + n <= self.limit {
            self.buf.push_str(unit);
            self.len += n;
            return true;
        }
        let m = char_len(&self.marker);
        if self.len + m <= self.limit {
            self.buf.push_str(&self.marker);
            self.len += m;
        }
        self.closed = true;
        false
    }

    pub fn into_string(self) -> String {
        self.buf
    }
}
