//! Booking-day windows.
//!
//! Booking dates are stored as `YYYY-MM-DD` strings in the county's local
//! calendar, so "today" is whatever date the configured zone shows for the
//! current instant. The zone database resolves the local date; day offsets
//! are then calendar arithmetic on that date, never fixed-hour subtraction,
//! which keeps windows correct across DST transitions.

use chrono::{DateTime, Days, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Serialize;

pub const DEFAULT_TIMEZONE: Tz = chrono_tz::America::Chicago;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Window {
    #[serde(rename = "24h")]
    Last24h,
    #[serde(rename = "48h")]
    Last48h,
    #[serde(rename = "72h")]
    Last72h,
    #[serde(rename = "7d")]
    Last7d,
    #[serde(rename = "30d")]
    Last30d,
    #[serde(rename = "rolling72")]
    Rolling72,
}

impl Window {
    /// Unknown or missing identifiers fall back to `24h`.
    pub fn parse(s: Option<&str>) -> Window {
        match s.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("48h") => Window::Last48h,
            Some("72h") => Window::Last72h,
            Some("7d") => Window::Last7d,
            Some("30d") => Window::Last30d,
            Some("rolling72") => Window::Rolling72,
            _ => Window::Last24h,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Window::Last24h => "24h",
            Window::Last48h => "48h",
            Window::Last72h => "72h",
            Window::Last7d => "7d",
            Window::Last30d => "30d",
            Window::Rolling72 => "rolling72",
        }
    }

    /// Day offsets covered, most recent first. `24h`, `48h` and `72h` are
    /// the disjoint day buckets (today, yesterday, two days ago); `rolling72`
    /// is their union.
    fn offsets(self) -> std::ops::Range<u64> {
        match self {
            Window::Last24h => 0..1,
            Window::Last48h => 1..2,
            Window::Last72h => 2..3,
            Window::Rolling72 => 0..3,
            Window::Last7d => 0..7,
            Window::Last30d => 0..30,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BookingDays {
    tz: Tz,
}

impl Default for BookingDays {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEZONE)
    }
}

impl BookingDays {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    /// Parses an IANA zone name, falling back to `America/Chicago`.
    pub fn from_name(name: &str) -> Self {
        match name.trim().parse::<Tz>() {
            Ok(tz) => Self::new(tz),
            Err(_) => {
                tracing::warn!(timezone = name, "Unknown timezone, using America/Chicago");
                Self::default()
            }
        }
    }

    pub fn tz(&self) -> Tz {
        self.tz
    }

    pub fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.tz).date_naive()
    }

    /// `YYYY-MM-DD` for the day `offset` days before today (0 = today).
    pub fn day(&self, now: DateTime<Utc>, offset: u64) -> String {
        format_day(
            self.local_date(now)
                .checked_sub_days(Days::new(offset))
                .unwrap_or(NaiveDate::MIN),
        )
    }

    pub fn today(&self, now: DateTime<Utc>) -> String {
        self.day(now, 0)
    }

    /// The last `n` days including today, most recent first.
    pub fn last_n_days(&self, now: DateTime<Utc>, n: u64) -> Vec<String> {
        (0..n).map(|offset| self.day(now, offset)).collect()
    }

    pub fn window_days(&self, now: DateTime<Utc>, window: Window) -> Vec<String> {
        window.offsets().map(|offset| self.day(now, offset)).collect()
    }
}

pub fn format_day(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Clamps a caller-supplied day count into `[1, 60]`.
pub fn clamp_days(days: Option<i64>, default: u64) -> u64 {
    days.map(|d| d.clamp(1, 60) as u64).unwrap_or(default)
}
