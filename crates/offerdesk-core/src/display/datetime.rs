//! DateTime display utilities.
//!
//! Offer dates are stored as UTC instants but read by people in India, so
//! every instant shown to a user is rendered on the civil clock.

use std::fmt;

use jiff::{tz::TimeZone, Timestamp};

use crate::time_window::civil_zone;

/// A wrapper around `Timestamp` that formats it in the civil time zone as
/// `YYYY-MM-DD HH:MM +05:30`.
pub struct CivilDateTime<'a>(pub &'a Timestamp);

impl fmt::Display for CivilDateTime<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let zone = civil_zone().unwrap_or(TimeZone::UTC);
        write!(f, "{}", self.0.to_zoned(zone).strftime("%Y-%m-%d %H:%M %:z"))
    }
}

/// A wrapper around `Timestamp` that formats only its civil date.
pub struct CivilDate<'a>(pub &'a Timestamp);

impl fmt::Display for CivilDate<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let zone = civil_zone().unwrap_or(TimeZone::UTC);
        write!(f, "{}", self.0.to_zoned(zone).date())
    }
}
