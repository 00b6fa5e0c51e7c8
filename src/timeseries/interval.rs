//! Calendar grid for history series
//!
//! An [`Interval`] maps any date onto the start of its bucket and steps the
//! grid forward; [`parse_date`] reads the date cells of a history upload.
//!
//! ```rust
//! use chainsight::timeseries::{parse_date, Interval};
//!
//! let date = parse_date("2024-01-31T17:45:00").unwrap();
//! let month = Interval::Monthly.bucket(date);
//! assert_eq!(month.to_string(), "2024-01-01");
//! assert_eq!(Interval::Monthly.advance(month, 2).unwrap().to_string(), "2024-03-01");
//! assert_eq!(Interval::Daily.advance(date, 1).unwrap().to_string(), "2024-02-01");
//! ```

use chrono::{Datelike, Days, Months, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Resampling grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interval {
    /// One bucket per calendar day
    Daily,
    /// One bucket per calendar month, stamped on the first day
    Monthly,
}

impl Interval {
    /// Bucket start containing `date`
    #[must_use]
    pub fn bucket(self, date: NaiveDate) -> NaiveDate {
        match self {
            Self::Daily => date,
            Self::Monthly => date.with_day(1).unwrap_or(date),
        }
    }

    /// `date` moved forward by `periods` grid steps
    #[must_use]
    pub fn advance(self, date: NaiveDate, periods: u32) -> Option<NaiveDate> {
        match self {
            Self::Daily => date.checked_add_days(Days::new(u64::from(periods))),
            Self::Monthly => date.checked_add_months(Months::new(periods)),
        }
    }

    /// Default forecast horizon in periods
    #[must_use]
    pub const fn default_horizon(self) -> usize {
        match self {
            Self::Daily => 15,
            Self::Monthly => 6,
        }
    }

    /// Default seasonal period (weekly for daily data, yearly for monthly)
    #[must_use]
    pub const fn default_seasonal_period(self) -> usize {
        match self {
            Self::Daily => 7,
            Self::Monthly => 12,
        }
    }
}

impl std::str::FromStr for Interval {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" | "d" => Ok(Self::Daily),
            "monthly" | "m" => Ok(Self::Monthly),
            other => Err(crate::Error::InvalidInput(format!(
                "unknown interval '{other}' (expected daily or monthly)"
            ))),
        }
    }
}

/// How observations inside one bucket are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketAggregation {
    /// Σ of the observations (flows, e.g. units sold)
    Sum,
    /// Latest observation (levels, e.g. stock on hand)
    #[default]
    Last,
    /// Arithmetic mean
    Mean,
}

/// Parse an ISO-8601 date, dropping a `THH:MM:SS` or ` HH:MM:SS` suffix
#[must_use]
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

    let value = raw.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok().or_else(|| {
        DATETIME_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
            .map(|dt| dt.date())
    })
}
