//! Calendar windows in the agency's civil time.
//!
//! Offer dates are stored as UTC instants, but "July 2025" means July in
//! India Standard Time. A window is the half-open UTC range `[start, end)`
//! between two civil midnights at the fixed UTC+05:30 offset, so a range
//! query on the stored instants captures exactly the events whose local
//! date falls in the month or year.

use std::fmt;

use jiff::{
    civil::{Date, Time},
    tz::{Offset, TimeZone},
    Timestamp, ToSpan,
};
use serde::Serialize;

use crate::{
    error::{DeskError, Result},
    plan::TimeUnit,
};

/// Zone name the catalog and plans default to.
pub const CIVIL_TIMEZONE: &str = "Asia/Kolkata";

/// UTC+05:30 in seconds. IST has no daylight saving, so a fixed offset is
/// exact for every date.
pub const CIVIL_OFFSET_SECONDS: i32 = 5 * 3600 + 30 * 60;

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Half-open UTC instant range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl TimeWindow {
    pub fn contains(&self, instant: Timestamp) -> bool {
        self.start <= instant && instant < self.end
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

fn calendar_error(reason: impl fmt::Display) -> DeskError {
    DeskError::invalid_input("time").with_reason(reason.to_string())
}

/// The fixed civil offset as a jiff zone.
pub fn civil_zone() -> Result<TimeZone> {
    let offset = Offset::from_seconds(CIVIL_OFFSET_SECONDS).map_err(calendar_error)?;
    Ok(TimeZone::fixed(offset))
}

/// UTC instant of civil midnight on the first of `month`.
fn civil_month_start(year: i16, month: i8) -> Result<Timestamp> {
    let date = Date::new(year, month, 1).map_err(calendar_error)?;
    let zoned = date
        .to_datetime(Time::midnight())
        .to_zoned(civil_zone()?)
        .map_err(calendar_error)?;
    Ok(zoned.timestamp())
}

/// Window covering one civil calendar month. `month` is 1..=12.
///
/// December ends at January 1st of the following year.
pub fn month_range(year: i16, month: u8) -> Result<TimeWindow> {
    if !(1..=12).contains(&month) {
        return Err(calendar_error(format!("month {month} is outside 1..=12")));
    }
    let (end_year, end_month) = if month == 12 {
        let next = year
            .checked_add(1)
            .ok_or_else(|| calendar_error(format!("year {year} has no successor")))?;
        (next, 1)
    } else {
        (year, month + 1)
    };
    Ok(TimeWindow {
        start: civil_month_start(year, month as i8)?,
        end: civil_month_start(end_year, end_month as i8)?,
    })
}

/// Window covering one civil calendar year.
pub fn year_range(year: i16) -> Result<TimeWindow> {
    let next = year
        .checked_add(1)
        .ok_or_else(|| calendar_error(format!("year {year} has no successor")))?;
    Ok(TimeWindow {
        start: civil_month_start(year, 1)?,
        end: civil_month_start(next, 1)?,
    })
}

/// English month name for 1..=12, empty otherwise.
pub fn month_name(month: u8) -> &'static str {
    match month {
        1..=12 => MONTH_NAMES[usize::from(month - 1)],
        _ => "",
    }
}

/// Parses an RFC 3339 instant, or a bare `YYYY-MM-DD` meaning UTC midnight.
pub fn parse_instant(text: &str) -> Result<Timestamp> {
    let text = text.trim();
    if let Ok(instant) = text.parse::<Timestamp>() {
        return Ok(instant);
    }
    let date: Date = text
        .parse()
        .map_err(|_| calendar_error(format!("'{text}' is not a date")))?;
    let zoned = date
        .to_datetime(Time::midnight())
        .to_zoned(TimeZone::UTC)
        .map_err(calendar_error)?;
    Ok(zoned.timestamp())
}

/// Resolves a plan's zone name. The catalog zone maps to the fixed civil
/// offset; anything else goes through the bundled tz database.
pub fn resolve_zone(name: &str) -> Result<TimeZone> {
    match name.trim() {
        CIVIL_TIMEZONE | "IST" | "+05:30" => civil_zone(),
        "UTC" | "Z" => Ok(TimeZone::UTC),
        other => TimeZone::get(other).map_err(|e| DeskError::Configuration {
            message: format!("unknown time zone '{other}': {e}"),
        }),
    }
}

/// Civil date of `instant` in `zone`.
pub fn civil_date(instant: Timestamp, zone: &TimeZone) -> Date {
    zone.to_datetime(instant).date()
}

/// Truncates `instant` to the start of its civil `unit` in `zone`.
///
/// Weeks start on Sunday.
pub fn truncate(instant: Timestamp, unit: TimeUnit, zone: &TimeZone) -> Result<Timestamp> {
    let date = civil_date(instant, zone);
    let start = match unit {
        TimeUnit::Day => date,
        TimeUnit::Week => {
            let back = i64::from(date.weekday().to_sunday_zero_offset());
            date.checked_sub(back.days()).map_err(calendar_error)?
        }
        TimeUnit::Month => date.first_of_month(),
        TimeUnit::Quarter => {
            let month = (date.month() - 1) / 3 * 3 + 1;
            Date::new(date.year(), month, 1).map_err(calendar_error)?
        }
        TimeUnit::Year => date.first_of_year(),
    };
    let zoned = start
        .to_datetime(Time::midnight())
        .to_zoned(zone.clone())
        .map_err(calendar_error)?;
    Ok(zoned.timestamp())
}

/// Current year on the civil calendar.
pub fn current_civil_year() -> Result<i16> {
    Ok(civil_date(Timestamp::now(), &civil_zone()?).year())
}
