//! Pipeline configuration
//!
//! One [`PipelineConfig`] drives every stage. It deserializes from JSON with
//! `#[serde(default)]` on every field, so a config file only names what it
//! overrides:
//!
//! ```rust
//! use chainsight::config::PipelineConfig;
//!
//! # fn main() -> chainsight::Result<()> {
//! let config = PipelineConfig::from_json_str(r#"{ "low_stock_threshold": 25 }"#)?;
//! assert_eq!(config.low_stock_threshold, 25);
//! assert_eq!(config.supplier_delay_days, 10);
//! # Ok(())
//! # }
//! ```

use crate::forecast::{ArimaOrder, SeasonalOrder};
use crate::storage::schema::{columns, ColumnAliases};
use crate::timeseries::{BucketAggregation, Interval, MIN_HISTORY_PERIODS};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default strict-less-than threshold for the low-stock set
pub const DEFAULT_LOW_STOCK_THRESHOLD: u64 = 10;

/// Default "delayed supplier" cut-off in days (strictly greater than)
pub const DEFAULT_SUPPLIER_DELAY_DAYS: u64 = 10;

/// Default number of rows in the "top items by value" ranking
pub const DEFAULT_TOP_N: usize = 10;

/// Default two-sided confidence level for forecast intervals
pub const DEFAULT_CONFIDENCE: f64 = 0.95;

/// Default bound on Nelder-Mead iterations
pub const DEFAULT_MAX_ITERATIONS: usize = 2_000;

/// How reorder alerts pick their threshold
///
/// The source data carries the threshold either as a literal or as a
/// per-row `Reorder_Level` column. `PerRow` prefers the column and falls
/// back to the literal for rows (or tables) without one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ReorderPolicy {
    /// Compare every row against one literal threshold
    Fixed {
        /// Strict-less-than threshold
        threshold: u64,
    },
    /// Compare against the row's `Reorder_Level`, else `fallback`
    PerRow {
        /// Threshold for rows without a reorder level
        fallback: u64,
    },
}

impl Default for ReorderPolicy {
    fn default() -> Self {
        Self::PerRow {
            fallback: DEFAULT_LOW_STOCK_THRESHOLD,
        }
    }
}

/// Time-series preparation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeriesConfig {
    /// Resampling grid
    pub interval: Interval,
    /// How observations inside one bucket are combined
    pub aggregation: BucketAggregation,
    /// Canonical name of the value column (`Available_Stock` or `Units_Sold`)
    pub value_column: String,
    /// Minimum number of periods; never below [`MIN_HISTORY_PERIODS`]
    pub min_history: usize,
}

impl Default for SeriesConfig {
    fn default() -> Self {
        Self {
            interval: Interval::Monthly,
            aggregation: BucketAggregation::Last,
            value_column: columns::AVAILABLE_STOCK.to_string(),
            min_history: MIN_HISTORY_PERIODS,
        }
    }
}

impl SeriesConfig {
    /// Effective minimum history (clamped to [`MIN_HISTORY_PERIODS`])
    #[must_use]
    pub fn effective_min_history(&self) -> usize {
        self.min_history.max(MIN_HISTORY_PERIODS)
    }
}

/// Forecast engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Non-seasonal (p, d, q)
    pub order: ArimaOrder,
    /// Seasonal (P, D, Q); the period comes from `seasonal_period`
    pub seasonal: SeasonalOrder,
    /// Seasonal period; `None` derives it from the series interval
    pub seasonal_period: Option<usize>,
    /// Number of future periods; `None` derives it from the series interval
    pub horizon: Option<usize>,
    /// Two-sided confidence level in (0, 1)
    pub confidence: f64,
    /// Nelder-Mead iteration bound
    pub max_iterations: usize,
    /// Relative tolerance on the simplex objective spread
    pub tolerance: f64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            order: ArimaOrder::default(),
            seasonal: SeasonalOrder::default(),
            seasonal_period: None,
            horizon: None,
            confidence: DEFAULT_CONFIDENCE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            tolerance: 1e-10,
        }
    }
}

impl ForecastConfig {
    /// Horizon for a series on `interval`
    #[must_use]
    pub fn horizon_for(&self, interval: Interval) -> usize {
        self.horizon.unwrap_or_else(|| interval.default_horizon())
    }

    /// Seasonal period for a series on `interval`
    #[must_use]
    pub fn seasonal_period_for(&self, interval: Interval) -> usize {
        self.seasonal_period
            .unwrap_or_else(|| interval.default_seasonal_period())
    }
}

/// Complete pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Canonical column → accepted alternates
    pub aliases: ColumnAliases,
    /// Strict-less-than threshold for the low-stock set
    pub low_stock_threshold: u64,
    /// Reorder alert policy
    pub reorder_policy: ReorderPolicy,
    /// Supplier delay cut-off (strictly greater than)
    pub supplier_delay_days: u64,
    /// Rows in the top-by-value ranking
    pub top_n: usize,
    /// Time-series preparation
    pub series: SeriesConfig,
    /// Forecast engine
    pub forecast: ForecastConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            aliases: ColumnAliases::default(),
            low_stock_threshold: DEFAULT_LOW_STOCK_THRESHOLD,
            reorder_policy: ReorderPolicy::default(),
            supplier_delay_days: DEFAULT_SUPPLIER_DELAY_DAYS,
            top_n: DEFAULT_TOP_N,
            series: SeriesConfig::default(),
            forecast: ForecastConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration builder
    #[must_use]
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Parse and validate a JSON configuration
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] for malformed JSON and [`Error::Config`] for
    /// values that fail [`validate`](Self::validate)
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read, otherwise as
    /// [`from_json_str`](Self::from_json_str)
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// Check value ranges
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first invalid field
    pub fn validate(&self) -> Result<()> {
        if self.top_n == 0 {
            return Err(Error::Config("top_n must be greater than 0".to_string()));
        }
        let canonical = self.series.value_column.as_str();
        if canonical != columns::AVAILABLE_STOCK && canonical != columns::UNITS_SOLD {
            return Err(Error::Config(format!(
                "series.value_column must be '{}' or '{}', got '{canonical}'",
                columns::AVAILABLE_STOCK,
                columns::UNITS_SOLD
            )));
        }
        let confidence = self.forecast.confidence;
        if !(confidence > 0.0 && confidence < 1.0) {
            return Err(Error::Config(format!(
                "forecast.confidence must be in (0, 1), got {confidence}"
            )));
        }
        if self.forecast.horizon == Some(0) {
            return Err(Error::Config(
                "forecast.horizon must be greater than 0".to_string(),
            ));
        }
        if self.forecast.max_iterations == 0 {
            return Err(Error::Config(
                "forecast.max_iterations must be greater than 0".to_string(),
            ));
        }
        if !(self.forecast.tolerance.is_finite() && self.forecast.tolerance > 0.0) {
            return Err(Error::Config(
                "forecast.tolerance must be a positive number".to_string(),
            ));
        }
        self.forecast.order.validate()?;
        self.forecast
            .seasonal
            .validate(self.forecast.seasonal_period_for(self.series.interval))?;
        Ok(())
    }
}

/// Builder for [`PipelineConfig`]
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// Set the low-stock threshold
    #[must_use]
    pub const fn low_stock_threshold(mut self, threshold: u64) -> Self {
        self.config.low_stock_threshold = threshold;
        self
    }

    /// Set the reorder alert policy
    #[must_use]
    pub const fn reorder_policy(mut self, policy: ReorderPolicy) -> Self {
        self.config.reorder_policy = policy;
        self
    }

    /// Set the supplier delay cut-off in days
    #[must_use]
    pub const fn supplier_delay_days(mut self, days: u64) -> Self {
        self.config.supplier_delay_days = days;
        self
    }

    /// Set the size of the top-by-value ranking
    #[must_use]
    pub const fn top_n(mut self, n: usize) -> Self {
        self.config.top_n = n;
        self
    }

    /// Add an alias for a canonical column
    #[must_use]
    pub fn alias(mut self, canonical: &str, alternate: &str) -> Self {
        self.config.aliases.insert(canonical, alternate);
        self
    }

    /// Set the resampling interval
    #[must_use]
    pub const fn interval(mut self, interval: Interval) -> Self {
        self.config.series.interval = interval;
        self
    }

    /// Set the bucket aggregation
    #[must_use]
    pub const fn aggregation(mut self, aggregation: BucketAggregation) -> Self {
        self.config.series.aggregation = aggregation;
        self
    }

    /// Set the canonical value column for history series
    #[must_use]
    pub fn value_column(mut self, column: &str) -> Self {
        self.config.series.value_column = column.to_string();
        self
    }

    /// Set the forecast horizon
    #[must_use]
    pub const fn horizon(mut self, horizon: usize) -> Self {
        self.config.forecast.horizon = Some(horizon);
        self
    }

    /// Set the seasonal period
    #[must_use]
    pub const fn seasonal_period(mut self, period: usize) -> Self {
        self.config.forecast.seasonal_period = Some(period);
        self
    }

    /// Set the confidence level
    #[must_use]
    pub const fn confidence(mut self, confidence: f64) -> Self {
        self.config.forecast.confidence = confidence;
        self
    }

    /// Set the optimizer iteration bound
    #[must_use]
    pub const fn max_iterations(mut self, iterations: usize) -> Self {
        self.config.forecast.max_iterations = iterations;
        self
    }

    /// Build and validate the configuration
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if validation fails
    pub fn build(self) -> Result<PipelineConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.low_stock_threshold, 10);
        assert_eq!(config.series.interval, Interval::Monthly);
        assert_eq!(config.forecast.horizon_for(Interval::Monthly), 6);
        assert_eq!(config.forecast.horizon_for(Interval::Daily), 15);
        assert_eq!(config.forecast.seasonal_period_for(Interval::Monthly), 12);
        assert_eq!(config.forecast.seasonal_period_for(Interval::Daily), 7);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = PipelineConfig::from_json_str(
            r#"{ "supplier_delay_days": 3, "series": { "interval": "daily" } }"#,
        )
        .unwrap();
        assert_eq!(config.supplier_delay_days, 3);
        assert_eq!(config.series.interval, Interval::Daily);
        assert_eq!(config.series.aggregation, BucketAggregation::Last);
        assert_eq!(config.top_n, DEFAULT_TOP_N);
    }

    #[test]
    fn test_reorder_policy_json() {
        let config =
            PipelineConfig::from_json_str(r#"{ "reorder_policy": { "mode": "fixed", "threshold": 4 } }"#)
                .unwrap();
        assert_eq!(config.reorder_policy, ReorderPolicy::Fixed { threshold: 4 });
    }

    #[test]
    fn test_invalid_confidence_rejected() {
        let result = PipelineConfig::builder().confidence(1.5).build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_zero_horizon_rejected() {
        let result = PipelineConfig::builder().horizon(0).build();
        assert!(result.unwrap_err().to_string().contains("horizon"));
    }

    #[test]
    fn test_unknown_value_column_rejected() {
        let result = PipelineConfig::builder().value_column("Revenue").build();
        assert!(result.unwrap_err().to_string().contains("value_column"));
    }

    #[test]
    fn test_min_history_never_below_floor() {
        let series = SeriesConfig {
            min_history: 3,
            ..SeriesConfig::default()
        };
        assert_eq!(series.effective_min_history(), MIN_HISTORY_PERIODS);
    }

    #[test]
    fn test_builder_alias() {
        let config = PipelineConfig::builder()
            .alias(columns::AVAILABLE_STOCK, "On Hand")
            .build()
            .unwrap();
        assert!(config
            .aliases
            .alternates(columns::AVAILABLE_STOCK)
            .iter()
            .any(|a| a == "On Hand"));
    }
}
