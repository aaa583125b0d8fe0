//! Short ids tying a logged failure to what the caller was told.

use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use tracing::{error, warn};

static COUNTER: AtomicU64 = AtomicU64::new(0);

/// `YYYYMMDD-HHMMSS-<counter in base 36>`.
pub fn next_id(now: DateTime<Utc>) -> String {
    let n = COUNTER.fetch_add(1, Ordering::Relaxed) + 1;
    format!("{}-{}", now.format("%Y%m%d-%H%M%S"), base36(n))
}

fn base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    if n == 0 {
        return "0".into();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

/// Log a failure once (short line plus detailed line) and return its id.
pub fn capture(tag: &str, summary: &str, detail: &dyn Display, now: DateTime<Utc>) -> String {
    let id = next_id(now);
    let tag = if tag.trim().is_empty() {
        "GENERAL".to_string()
    } else {
        tag.trim().to_ascii_uppercase()
    };
    warn!(correlation_id = %id, "[{}] {}", tag, summary);
    error!(correlation_id = %id, "[{}] {}: {}", tag, summary, detail);
    id
}
