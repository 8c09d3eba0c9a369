use std::sync::Mutex;

use chrono::Datelike;
use lazy_static::lazy_static;
use time::{macros::format_description, Duration, Month};
pub use time::Date;

use crate::util::basic::SError;

pub type StaticDateFormat<'a> =
    &'static [time::format_description::BorrowedFormatItem<'a>];

pub const STANDARD_DATE_FORMAT: StaticDateFormat =
    format_description!("[year]-[month]-[day]");

// Owned variant, for user-provided --date-fmt strings.
pub type DynDateFormat = time::format_description::OwnedFormatItem;

pub fn parse_standard_date(date_str: &str) -> Result<Date, SError> {
    Date::parse(date_str, STANDARD_DATE_FORMAT).map_err(|e| e.to_string())
}

pub fn parse_dyn_date_format(fmt: &str) -> Result<DynDateFormat, SError> {
    time::format_description::parse_owned::<2>(fmt).map_err(|e| e.to_string())
}

pub fn parse_date(
    date_str: &str,
    custom_format: &Option<DynDateFormat>,
) -> Result<Date, SError> {
    match custom_format {
        Some(fmt) => Date::parse(date_str, fmt).map_err(|e| e.to_string()),
        None => parse_standard_date(date_str),
    }
}

pub fn add_days(d: Date, days: i64) -> Date {
    d.saturating_add(Duration::days(days))
}

lazy_static! {
    static ref TODAY_OVERRIDE: Mutex<Option<Date>> = Mutex::new(None);
}

/// Overrides today_local() for the remainder of the process.
/// Tests which exercise date-sensitive behaviour (summary freshness,
/// rate-cache fills) must call this to stay deterministic.
pub fn set_todays_date_for_test(d: Date) {
    *TODAY_OVERRIDE.lock().unwrap() = Some(d);
}

pub fn today_local() -> Date {
    if let Some(d) = *TODAY_OVERRIDE.lock().unwrap() {
        return d;
    }
    let now = chrono::offset::Local::now().date_naive();
    // chrono months are 1-based; time's Month enum round-trips through u8.
    let month = Month::January.nth_next((now.month() - 1) as u8);
    Date::from_calendar_date(now.year(), month, now.day() as u8)
        .unwrap_or(Date::MIN)
}

pub mod testlib {
    use std::sync::{Mutex, MutexGuard};

    use lazy_static::lazy_static;
    use time::{Date, Duration, Month};

    /// Date at `day` days after Jan 1 of `year`.
    pub fn doy_date(year: i32, day: i64) -> Date {
        Date::from_calendar_date(year, Month::January, 1)
            .unwrap()
            .saturating_add(Duration::days(day))
    }

    lazy_static! {
        static ref TODAY_TEST_LOCK: Mutex<()> = Mutex::new(());
    }

    /// Overrides today_local() and serializes against every other test doing
    /// the same. Hold the returned guard for the duration of the test; the
    /// override is global state.
    pub fn hold_today_for_test(d: Date) -> MutexGuard<'static, ()> {
        let guard = match TODAY_TEST_LOCK.lock() {
            Ok(g) => g,
            // A previous test panicked while holding the lock; the lock
            // itself is still fine.
            Err(poisoned) => poisoned.into_inner(),
        };
        super::set_todays_date_for_test(d);
        guard
    }
}
