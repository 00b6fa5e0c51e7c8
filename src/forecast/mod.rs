//! Seasonal ARIMA demand forecasting
//!
//! Fits SARIMA(p,d,q)(P,D,Q)\[s\] to one prepared series and projects it
//! `horizon` periods ahead with two-sided prediction intervals.
//!
//! Toyota Way Principles:
//! - Jidoka: degenerate or non-finite input stops with a [`ModelFitError`]
//!   before the optimizer runs
//! - Poka-Yoke: the fit can only visit stationary/invertible coefficients,
//!   and `lower_bound <= forecast <= upper_bound` holds for every point
//!
//! ```rust
//! use chainsight::config::ForecastConfig;
//! use chainsight::forecast::forecast_points;
//! use chainsight::timeseries::{Interval, TimeSeriesPoint};
//! use chrono::NaiveDate;
//!
//! # fn main() -> chainsight::Result<()> {
//! let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
//! let points: Vec<TimeSeriesPoint> = (0..15u32)
//!     .map(|i| TimeSeriesPoint {
//!         timestamp: Interval::Monthly.advance(start, i).unwrap(),
//!         value: 100.0 + 5.0 * f64::from(i) + 0.3 * f64::from(i * i),
//!     })
//!     .collect();
//!
//! let result = forecast_points(&points, Interval::Monthly, "Available_Stock", &ForecastConfig::default())?;
//! assert_eq!(result.points.len(), 6);
//! assert!(result.points.iter().all(|p| p.lower_bound <= p.forecast && p.forecast <= p.upper_bound));
//! # Ok(())
//! # }
//! ```

pub mod normal;
pub mod optimizer;
pub mod sarima;

use crate::config::ForecastConfig;
use crate::error::ModelFitError;
use crate::timeseries::{Interval, PreparedSeries, TimeSeriesPoint, MIN_HISTORY_PERIODS};
use crate::{Error, Result};
use chrono::NaiveDate;
use optimizer::NelderMead;
use sarima::{FittedSarima, SarimaSpec};
use serde::{Deserialize, Serialize};

/// Highest AR/MA order accepted (seasonal or not)
pub const MAX_ARMA_ORDER: usize = 3;

/// Highest differencing order accepted (seasonal or not)
pub const MAX_DIFFERENCING: usize = 2;

/// Non-seasonal (p, d, q)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArimaOrder {
    /// Autoregressive order
    pub p: usize,
    /// Differencing order
    pub d: usize,
    /// Moving-average order
    pub q: usize,
}

impl Default for ArimaOrder {
    fn default() -> Self {
        Self { p: 1, d: 1, q: 1 }
    }
}

impl ArimaOrder {
    /// Check the order bounds
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `p` or `q` exceeds 3 or `d` exceeds 2
    pub fn validate(&self) -> Result<()> {
        check_orders("order", self.p, self.d, self.q)
    }
}

/// Seasonal (P, D, Q)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeasonalOrder {
    /// Seasonal autoregressive order
    pub p: usize,
    /// Seasonal differencing order
    pub d: usize,
    /// Seasonal moving-average order
    pub q: usize,
}

impl Default for SeasonalOrder {
    fn default() -> Self {
        Self { p: 1, d: 1, q: 1 }
    }
}

impl SeasonalOrder {
    /// No seasonal terms
    pub const NONE: Self = Self { p: 0, d: 0, q: 0 };

    /// Whether any seasonal term is requested
    #[must_use]
    pub const fn is_seasonal(&self) -> bool {
        self.p + self.d + self.q > 0
    }

    /// Check the order bounds and the period
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for out-of-range orders, or a period below
    /// 2 when seasonal terms are requested
    pub fn validate(&self, period: usize) -> Result<()> {
        check_orders("seasonal", self.p, self.d, self.q)?;
        if self.is_seasonal() && period < 2 {
            return Err(Error::Config(format!(
                "seasonal_period must be at least 2 when seasonal terms are used, got {period}"
            )));
        }
        Ok(())
    }
}

fn check_orders(name: &str, p: usize, d: usize, q: usize) -> Result<()> {
    if p > MAX_ARMA_ORDER || q > MAX_ARMA_ORDER {
        return Err(Error::Config(format!(
            "{name} AR/MA orders must be at most {MAX_ARMA_ORDER}, got p={p} q={q}"
        )));
    }
    if d > MAX_DIFFERENCING {
        return Err(Error::Config(format!(
            "{name} differencing must be at most {MAX_DIFFERENCING}, got d={d}"
        )));
    }
    Ok(())
}

/// One projected period
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    /// Period start
    pub timestamp: NaiveDate,
    /// Point forecast
    pub forecast: f64,
    /// Lower prediction bound
    pub lower_bound: f64,
    /// Upper prediction bound
    pub upper_bound: f64,
}

/// What was actually fitted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSummary {
    /// Non-seasonal orders
    pub order: ArimaOrder,
    /// Seasonal orders requested
    pub seasonal: SeasonalOrder,
    /// Seasonal period
    pub seasonal_period: usize,
    /// False when the series was too short and seasonal terms were dropped
    pub seasonal_applied: bool,
    /// φ
    pub ar: Vec<f64>,
    /// θ
    pub ma: Vec<f64>,
    /// Φ
    pub seasonal_ar: Vec<f64>,
    /// Θ
    pub seasonal_ma: Vec<f64>,
    /// Innovation variance
    pub sigma2: f64,
    /// Conditional sum of squares
    pub css: f64,
    /// CSS-based Akaike criterion
    pub aic: f64,
    /// Observations in the input series
    pub observations: usize,
    /// Optimizer iterations
    pub iterations: usize,
}

/// Forecast for one product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    /// Product the series belongs to (empty for anonymous series)
    pub product: String,
    /// Value column that was forecast
    pub value_field: String,
    /// Grid interval
    pub interval: Interval,
    /// Number of projected periods
    pub horizon: usize,
    /// Two-sided confidence level
    pub confidence: f64,
    /// Projected periods
    pub points: Vec<ForecastPoint>,
    /// Fitted model
    pub model: ModelSummary,
}

impl ForecastResult {
    /// Copy with forecasts and bounds floored at zero, for display
    #[must_use]
    pub fn clipped_non_negative(&self) -> Self {
        let mut clipped = self.clone();
        for p in &mut clipped.points {
            p.forecast = p.forecast.max(0.0);
            p.lower_bound = p.lower_bound.max(0.0);
            p.upper_bound = p.upper_bound.max(0.0);
        }
        clipped
    }
}

/// Forecast a prepared series
///
/// # Errors
///
/// See [`forecast_points`]
pub fn forecast(series: &PreparedSeries, config: &ForecastConfig) -> Result<ForecastResult> {
    let mut result = forecast_points(series.points(), series.interval(), series.value_column(), config)?;
    result.product = series.product().to_string();
    tracing::debug!(
        product = series.product(),
        horizon = result.horizon,
        seasonal_applied = result.model.seasonal_applied,
        sigma2 = result.model.sigma2,
        "forecast complete"
    );
    Ok(result)
}

/// Forecast raw grid points
///
/// # Errors
///
/// - [`Error::InvalidInput`] for `horizon == 0` or `confidence` outside (0, 1)
/// - [`Error::Config`] for out-of-range model orders
/// - [`Error::InsufficientData`] for fewer than 12 points
/// - [`Error::ModelFit`] for degenerate or non-finite series, a series too
///   short for the differencing, or an optimizer that does not converge
pub fn forecast_points(
    points: &[TimeSeriesPoint],
    interval: Interval,
    value_field: &str,
    config: &ForecastConfig,
) -> Result<ForecastResult> {
    let horizon = config.horizon_for(interval);
    if horizon == 0 {
        return Err(Error::InvalidInput("horizon must be greater than 0".to_string()));
    }
    let confidence = config.confidence;
    if !(confidence > 0.0 && confidence < 1.0) {
        return Err(Error::InvalidInput(format!(
            "confidence must be in (0, 1), got {confidence}"
        )));
    }
    let period = config.seasonal_period_for(interval);
    config.order.validate()?;
    config.seasonal.validate(period)?;

    if points.len() < MIN_HISTORY_PERIODS {
        return Err(Error::InsufficientData {
            required: MIN_HISTORY_PERIODS,
            got: points.len(),
        });
    }
    let values: Vec<f64> = points.iter().map(|p| p.value).collect();
    check_series(&values)?;

    let spec = resolve_spec(config, period, values.len());
    let optimizer = NelderMead {
        max_iterations: config.max_iterations,
        tolerance: config.tolerance,
        ..NelderMead::default()
    };
    let fitted = FittedSarima::fit(&values, spec, &optimizer)?;
    check_residuals(&fitted, &values)?;
    let (means, std_errors) = fitted.predict(horizon);

    let z = normal::two_sided_z(confidence);
    let mut timestamp = points
        .last()
        .map(|p| p.timestamp)
        .ok_or_else(|| Error::Other("empty series after validation".to_string()))?;
    let mut projected = Vec::with_capacity(horizon);
    for (forecast, se) in means.into_iter().zip(std_errors) {
        if !(forecast.is_finite() && se.is_finite()) {
            return Err(ModelFitError::NonFinite.into());
        }
        timestamp = interval
            .advance(timestamp, 1)
            .ok_or_else(|| Error::InvalidInput(format!("forecast runs past {timestamp}")))?;
        projected.push(ForecastPoint {
            timestamp,
            forecast,
            lower_bound: forecast - z * se,
            upper_bound: forecast + z * se,
        });
    }

    Ok(ForecastResult {
        product: String::new(),
        value_field: value_field.to_string(),
        interval,
        horizon,
        confidence,
        points: projected,
        model: summarize(&fitted, config, period, values.len()),
    })
}

/// Reject non-finite and zero-variance input
#[allow(clippy::cast_precision_loss)]
fn check_series(values: &[f64]) -> std::result::Result<(), ModelFitError> {
    if values.iter().any(|v| !v.is_finite()) {
        return Err(ModelFitError::NonFinite);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    if variance <= f64::EPSILON * mean.abs().max(1.0).powi(2) {
        return Err(ModelFitError::Degenerate { len: values.len() });
    }
    Ok(())
}

/// Reject a fit that reproduces the series exactly
///
/// A zero residual variance would yield zero-width intervals.
#[allow(clippy::cast_precision_loss)]
fn check_residuals(fitted: &FittedSarima, values: &[f64]) -> std::result::Result<(), ModelFitError> {
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    if fitted.sigma2() <= f64::EPSILON * mean.abs().max(1.0).powi(2) {
        tracing::warn!(observations = values.len(), "fitted model leaves no residual variance");
        return Err(ModelFitError::Degenerate { len: values.len() });
    }
    Ok(())
}

/// Drop the seasonal part when the series cannot carry it
fn resolve_spec(config: &ForecastConfig, period: usize, len: usize) -> SarimaSpec {
    let seasonal_loss = period * config.seasonal.d;
    let required = config.order.d + seasonal_loss + 2;
    let seasonal = if config.seasonal.is_seasonal() && len < required {
        tracing::warn!(
            observations = len,
            required,
            period,
            "series too short for seasonal terms; fitting non-seasonal model"
        );
        SeasonalOrder::NONE
    } else {
        config.seasonal
    };
    SarimaSpec {
        order: config.order,
        seasonal,
        period,
    }
}

#[allow(clippy::cast_precision_loss)]
fn summarize(fitted: &FittedSarima, config: &ForecastConfig, period: usize, observations: usize) -> ModelSummary {
    let coefficients = fitted.coefficients();
    let spec = fitted.spec();
    let m = fitted.differenced_len() as f64;
    let k = (spec.order.p + spec.order.q + spec.seasonal.p + spec.seasonal.q + 1) as f64;
    let aic = m * fitted.sigma2().ln() + 2.0 * k;

    ModelSummary {
        order: config.order,
        seasonal: config.seasonal,
        seasonal_period: period,
        seasonal_applied: !config.seasonal.is_seasonal() || spec.seasonal.is_seasonal(),
        ar: coefficients.ar.clone(),
        ma: coefficients.ma.clone(),
        seasonal_ar: coefficients.seasonal_ar.clone(),
        seasonal_ma: coefficients.seasonal_ma.clone(),
        sigma2: fitted.sigma2(),
        css: fitted.css(),
        aic,
        observations,
        iterations: fitted.iterations(),
    }
}
