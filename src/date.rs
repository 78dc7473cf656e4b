use std::fmt;
use std::str::FromStr;

use time::macros::{date, format_description};
use time::{Date, OffsetDateTime, Time};

/// Inclusive lower bound on review timestamps, as a UTC calendar day.
/// Reviews carry millisecond epoch timestamps; the comparison happens in ms.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CutoffDate(Date);

impl CutoffDate {
    pub fn new(day: Date) -> Self {
        Self(day)
    }

    pub fn date(self) -> Date {
        self.0
    }

    /// Midnight UTC of the cutoff day, in epoch milliseconds.
    pub fn as_millis(self) -> i64 {
        let dt = OffsetDateTime::new_utc(self.0, Time::MIDNIGHT);
        (dt.unix_timestamp_nanos() / 1_000_000) as i64
    }

    /// `ts_ms >= cutoff`
    #[inline]
    pub fn admits(self, ts_ms: i64) -> bool {
        ts_ms >= self.as_millis()
    }
}

impl Default for CutoffDate {
    fn default() -> Self {
        Self(date!(2020 - 01 - 01))
    }
}

impl fmt::Display for CutoffDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.0.year(), self.0.month() as u8, self.0.day())
    }
}

impl FromStr for CutoffDate {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fmt = format_description!("[year]-[month]-[day]");
        Date::parse(s.trim(), &fmt)
            .map(Self)
            .map_err(|e| format!("expected YYYY-MM-DD: {e}"))
    }
}
