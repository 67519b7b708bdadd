// crates/carbon-core/src/measurement.rs

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CarbonError;

/// Measurement period accepted by the Carbon API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodType {
    Day,
    Week,
    Month,
}

impl PeriodType {
    /// Query-string form used by the Carbon API (`day`, `week`, `month`).
    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodType::Day => "day",
            PeriodType::Week => "week",
            PeriodType::Month => "month",
        }
    }
}

impl fmt::Display for PeriodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PeriodType {
    type Err = CarbonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" => Ok(PeriodType::Day),
            "week" => Ok(PeriodType::Week),
            "month" => Ok(PeriodType::Month),
            other => Err(CarbonError::InvalidResponse(format!(
                "Unknown period type '{}'. Use 'day', 'week', or 'month'.",
                other
            ))),
        }
    }
}

/// A simulated capture reading for one system over one period.
///
/// Produced by the measurement source; read-only to the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Capture system identifier, e.g. `AC:XX0001`.
    pub system_identifier: String,
    pub period_type: PeriodType,
    /// Simulated captured units (decimal, not yet rounded).
    pub simulated_units: f64,
    /// End of the calculation interval as reported by the source.
    pub observed_at_end_time: DateTime<Utc>,
    /// Human-readable system name, when the source provides one.
    #[serde(default)]
    pub system_name: Option<String>,
    /// Start of the calculation interval, when the source provides one.
    #[serde(default)]
    pub calculation_start_time: Option<DateTime<Utc>>,
}

impl Measurement {
    /// The calendar window this measurement belongs to.
    pub fn window(&self) -> PeriodWindow {
        PeriodWindow::containing(self.period_type, self.observed_at_end_time)
    }
}

/// The UTC calendar interval `[start, end)` covered by a period.
///
/// Two readings taken at different moments of the same day (or week, or
/// month) share a window, which is what makes the window usable as an
/// idempotency key for minting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeriodWindow {
    pub period_type: PeriodType,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl PeriodWindow {
    /// Compute the window of the given period type that contains `at`.
    ///
    /// Days start at midnight UTC, weeks on Monday, months on the 1st.
    pub fn containing(period_type: PeriodType, at: DateTime<Utc>) -> Self {
        let date = at.date_naive();
        let (start_date, end_date) = match period_type {
            PeriodType::Day => (date, date + Duration::days(1)),
            PeriodType::Week => {
                let monday = date - Duration::days(date.weekday().num_days_from_monday() as i64);
                (monday, monday + Duration::days(7))
            }
            PeriodType::Month => {
                let first = first_of_month(date.year(), date.month());
                let next = if date.month() == 12 {
                    first_of_month(date.year() + 1, 1)
                } else {
                    first_of_month(date.year(), date.month() + 1)
                };
                (first, next)
            }
        };

        Self {
            period_type,
            start: midnight_utc(start_date),
            end: midnight_utc(end_date),
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at < self.end
    }
}

fn first_of_month(year: i32, month: u32) -> NaiveDate {
    // Day 1 exists for every valid month.
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MIN)
}

fn midnight_utc(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(0, 0, 0)
        .unwrap_or_default()
        .and_utc()
}
