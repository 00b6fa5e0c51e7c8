//! History preparation for forecasting
//!
//! Turns the rows of a sales/stock history upload into one regular series
//! for one product:
//!
//! 1. filter to the product (exact match)
//! 2. parse dates and values, discarding and counting bad cells
//! 3. bucket onto the interval grid and combine per [`BucketAggregation`]
//! 4. forward-fill empty buckets from the previous bucket
//! 5. reject series shorter than [`MIN_HISTORY_PERIODS`]
//!
//! The grid starts at the first observed bucket, so a prepared series never
//! has a leading gap and every point after the first is exactly one interval
//! after its predecessor.

mod interval;

pub use interval::{parse_date, BucketAggregation, Interval};

use crate::config::SeriesConfig;
use crate::storage::schema::{columns, ColumnAliases};
use crate::storage::RawTable;
use crate::{Error, Result};
use chrono::NaiveDate;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fewest periods a forecast may be fitted on
pub const MIN_HISTORY_PERIODS: usize = 12;

/// Feature label for history preparation
pub const FEATURE_FORECAST: &str = "demand forecasting";

/// One observation on the interval grid
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    /// Bucket start (the day itself, or the first of the month)
    pub timestamp: NaiveDate,
    /// Non-negative value
    pub value: f64,
}

/// What preparation dropped or synthesized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PreparationReport {
    /// Rows of the selected product
    pub matched_rows: usize,
    /// Rows dropped for an unparseable date
    pub discarded_dates: usize,
    /// Rows dropped for a missing, non-numeric or negative value
    pub discarded_values: usize,
    /// Buckets that were forward-filled
    pub filled_periods: usize,
}

/// Regular, gap-free series for one product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreparedSeries {
    product: String,
    value_column: String,
    interval: Interval,
    points: Vec<TimeSeriesPoint>,
    report: PreparationReport,
}

impl PreparedSeries {
    /// Build a series from points that are already on the grid
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the points are not strictly
    /// increasing and contiguous for `interval`, or a value is negative or
    /// non-finite
    pub fn from_points(
        product: &str,
        value_column: &str,
        interval: Interval,
        points: Vec<TimeSeriesPoint>,
    ) -> Result<Self> {
        for pair in points.windows(2) {
            if interval.advance(pair[0].timestamp, 1) != Some(pair[1].timestamp) {
                return Err(Error::InvalidInput(format!(
                    "series is not contiguous at {} -> {}",
                    pair[0].timestamp, pair[1].timestamp
                )));
            }
        }
        if let Some(p) = points.iter().find(|p| !(p.value.is_finite() && p.value >= 0.0)) {
            return Err(Error::InvalidInput(format!(
                "series value {} at {} must be a non-negative number",
                p.value, p.timestamp
            )));
        }
        Ok(Self {
            product: product.to_string(),
            value_column: value_column.to_string(),
            interval,
            points,
            report: PreparationReport::default(),
        })
    }

    /// Selected product
    #[must_use]
    pub fn product(&self) -> &str {
        &self.product
    }

    /// Canonical value column the series was read from
    #[must_use]
    pub fn value_column(&self) -> &str {
        &self.value_column
    }

    /// Grid interval
    #[must_use]
    pub const fn interval(&self) -> Interval {
        self.interval
    }

    /// Points in time order
    #[must_use]
    pub fn points(&self) -> &[TimeSeriesPoint] {
        &self.points
    }

    /// Values in time order
    #[must_use]
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    /// Number of periods
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the series has no points
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Timestamp of the last period
    #[must_use]
    pub fn last_timestamp(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.timestamp)
    }

    /// Discard/fill counters
    #[must_use]
    pub const fn report(&self) -> &PreparationReport {
        &self.report
    }
}

/// Prepare a history series using the default column aliases
///
/// # Errors
///
/// See [`prepare_with_aliases`]
pub fn prepare(raw: &RawTable, product: &str, config: &SeriesConfig) -> Result<PreparedSeries> {
    prepare_with_aliases(raw, product, config, &ColumnAliases::default())
}

/// Prepare a history series
///
/// # Errors
///
/// - [`Error::MissingColumn`] if `Date`, `Product` or the value column
///   cannot be resolved
/// - [`Error::InsufficientData`] if fewer than the minimum number of
///   periods exist (`got: 0` for an unknown product)
/// - [`Error::InvalidInput`] if the grid runs past the supported date range
pub fn prepare_with_aliases(
    raw: &RawTable,
    product: &str,
    config: &SeriesConfig,
    aliases: &ColumnAliases,
) -> Result<PreparedSeries> {
    let schema = raw.schema();
    let date_idx = schema.require(columns::DATE, FEATURE_FORECAST, aliases)?;
    let product_idx = schema.require(columns::PRODUCT, FEATURE_FORECAST, aliases)?;
    let value_idx = schema.require(&config.value_column, FEATURE_FORECAST, aliases)?;
    let required = config.effective_min_history();

    let mut report = PreparationReport::default();
    let mut observations: Vec<(NaiveDate, f64)> = Vec::new();

    for row in raw.rows() {
        if row.get(product_idx) != Some(product) {
            continue;
        }
        report.matched_rows += 1;

        let Some(date) = row.get(date_idx).and_then(parse_date) else {
            report.discarded_dates += 1;
            continue;
        };
        let value = row
            .get(value_idx)
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|v| v.is_finite() && *v >= 0.0);
        let Some(value) = value else {
            report.discarded_values += 1;
            continue;
        };
        observations.push((date, value));
    }

    if report.discarded_dates + report.discarded_values > 0 {
        tracing::warn!(
            product,
            discarded_dates = report.discarded_dates,
            discarded_values = report.discarded_values,
            "discarded history rows"
        );
    }

    // stable: equal dates keep file order, so `Last` means last in the file
    observations.sort_by_key(|(date, _)| *date);

    let mut buckets: BTreeMap<NaiveDate, Accumulator> = BTreeMap::new();
    for (date, value) in observations {
        buckets
            .entry(config.interval.bucket(date))
            .or_default()
            .push(value);
    }

    let points = fill_grid(&buckets, config.interval, config.aggregation, &mut report)?;

    if points.len() < required {
        return Err(Error::InsufficientData {
            required,
            got: points.len(),
        });
    }

    tracing::debug!(
        product,
        periods = points.len(),
        filled = report.filled_periods,
        interval = ?config.interval,
        "prepared history series"
    );

    Ok(PreparedSeries {
        product: product.to_string(),
        value_column: config.value_column.clone(),
        interval: config.interval,
        points,
        report,
    })
}

/// Distinct products in a history upload, sorted
///
/// # Errors
///
/// Returns [`Error::MissingColumn`] if the upload has no `Product` column
pub fn products(raw: &RawTable, aliases: &ColumnAliases) -> Result<Vec<String>> {
    let idx = raw
        .schema()
        .require(columns::PRODUCT, FEATURE_FORECAST, aliases)?;
    let mut seen: FxHashSet<&str> = FxHashSet::default();
    let mut out: Vec<String> = raw
        .rows()
        .iter()
        .filter_map(|row| row.get(idx))
        .filter(|p| !p.is_empty() && seen.insert(*p))
        .map(str::to_string)
        .collect();
    out.sort();
    Ok(out)
}

#[derive(Debug, Default)]
struct Accumulator {
    sum: f64,
    count: usize,
    last: f64,
}

impl Accumulator {
    fn push(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
        self.last = value;
    }

    #[allow(clippy::cast_precision_loss)]
    fn combine(&self, aggregation: BucketAggregation) -> f64 {
        match aggregation {
            BucketAggregation::Sum => self.sum,
            BucketAggregation::Last => self.last,
            BucketAggregation::Mean => self.sum / self.count as f64,
        }
    }
}

fn fill_grid(
    buckets: &BTreeMap<NaiveDate, Accumulator>,
    interval: Interval,
    aggregation: BucketAggregation,
    report: &mut PreparationReport,
) -> Result<Vec<TimeSeriesPoint>> {
    let (Some(first), Some(last)) = (buckets.keys().next(), buckets.keys().next_back()) else {
        return Ok(Vec::new());
    };

    let mut points = Vec::with_capacity(buckets.len());
    let mut cursor = *first;
    let mut carried = 0.0;
    while cursor <= *last {
        let value = match buckets.get(&cursor) {
            Some(acc) => acc.combine(aggregation),
            None => {
                report.filled_periods += 1;
                carried
            }
        };
        carried = value;
        points.push(TimeSeriesPoint {
            timestamp: cursor,
            value,
        });
        cursor = interval
            .advance(cursor, 1)
            .ok_or_else(|| Error::InvalidInput(format!("date {cursor} is out of range")))?;
    }
    Ok(points)
}
