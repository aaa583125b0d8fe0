//! Week window and schedule computation.
//!
//! Everything here is a pure function of the config and an explicit wall-clock
//! reading. The [`Clock`] trait is the only place "now" comes from.

use std::sync::Mutex;

use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;

use crate::config::WeeklyConfig;
use crate::models::WeekWindow;

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = now;
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut guard) = self.now.lock() {
            *guard += by;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// The week containing `now` in the configured zone: Monday through Sunday.
pub fn current_week(config: &WeeklyConfig, now: DateTime<Utc>) -> WeekWindow {
    let today = now.with_timezone(&config.timezone).date_naive();
    week_of(today)
}

pub fn week_of(date: NaiveDate) -> WeekWindow {
    let offset = date.weekday().num_days_from_monday() as i64;
    WeekWindow::starting(date - Duration::days(offset))
}

/// The instant after which the week's first message may be created unforced.
pub fn scheduled_instant(week: &WeekWindow, config: &WeeklyConfig) -> DateTime<Tz> {
    let wanted = config.schedule_day.num_days_from_monday() as i64;
    let current = week.start.weekday().num_days_from_monday() as i64;
    let mut date = week.start + Duration::days((wanted - current).rem_euclid(7));
    if !week.contains(date) {
        date = week.end;
    }
    localize(&config.timezone, date.and_time(config.schedule_time))
}

pub fn is_schedule_reached(week: &WeekWindow, config: &WeeklyConfig, now: DateTime<Utc>) -> bool {
    now >= scheduled_instant(week, config).with_timezone(&Utc)
}

/// Resolve a wall-clock time in `tz`. Ambiguous times (DST fall-back) take the
/// earlier instant; times inside a DST gap move forward past the gap.
fn localize(tz: &Tz, local: NaiveDateTime) -> DateTime<Tz> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(earliest, _) => earliest,
        // Inside a gap: keep the offset in force before the transition, which
        // pushes the time forward by the length of the gap.
        LocalResult::None => {
            let before = tz
                .offset_from_utc_datetime(&(local - Duration::days(1)))
                .fix()
                .local_minus_utc();
            tz.from_utc_datetime(&(local - Duration::seconds(i64::from(before))))
        }
    }
}
