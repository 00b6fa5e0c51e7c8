//! Seasonal ARIMA estimation and prediction
//!
//! Model, with `B` the backshift operator:
//!
//! ```text
//! φ(B) Φ(B^s) (1-B)^d (1-B^s)^D y_t = θ(B) Θ(B^s) e_t
//! ```
//!
//! Estimation is conditional sum of squares (CSS) on the differenced series
//! `w` with zero pre-sample values. Each coefficient block is reached
//! through a `tanh` → partial-autocorrelation → Durbin-Levinson map, so
//! every point the optimizer visits is stationary (AR) and invertible (MA).

use super::optimizer::NelderMead;
use super::{ArimaOrder, SeasonalOrder};
use crate::error::ModelFitError;

/// Resolved model structure for one fit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SarimaSpec {
    /// Non-seasonal orders
    pub order: ArimaOrder,
    /// Seasonal orders (all zero when the seasonal part was dropped)
    pub seasonal: SeasonalOrder,
    /// Seasonal period
    pub period: usize,
}

impl SarimaSpec {
    fn n_params(&self) -> usize {
        self.order.p + self.order.q + self.seasonal.p + self.seasonal.q
    }

    /// Observations consumed by differencing
    #[must_use]
    pub const fn differencing_loss(&self) -> usize {
        self.order.d + self.period * self.seasonal.d
    }
}

/// Estimated coefficients in textbook sign convention
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Coefficients {
    /// φ: `y_t = Σ φ_i y_{t-i} + ...`
    pub ar: Vec<f64>,
    /// θ: `... + e_t + Σ θ_j e_{t-j}`
    pub ma: Vec<f64>,
    /// Φ (seasonal AR)
    pub seasonal_ar: Vec<f64>,
    /// Θ (seasonal MA)
    pub seasonal_ma: Vec<f64>,
}

/// Fitted model
#[derive(Debug, Clone)]
pub struct FittedSarima {
    spec: SarimaSpec,
    coefficients: Coefficients,
    /// `A(B) = φ(B) Φ(B^s)` as `[1, A_1, ...]`
    ar_poly: Vec<f64>,
    /// `M(B) = θ(B) Θ(B^s)` as `[1, M_1, ...]`
    ma_poly: Vec<f64>,
    /// `(1-B)^d (1-B^s)^D`
    diff_poly: Vec<f64>,
    history: Vec<f64>,
    w: Vec<f64>,
    residuals: Vec<f64>,
    mean: f64,
    css: f64,
    sigma2: f64,
    iterations: usize,
}

impl FittedSarima {
    /// Fit `spec` to `y`
    ///
    /// # Errors
    ///
    /// - [`ModelFitError::TooShort`] if differencing leaves fewer than two
    ///   observations
    /// - [`ModelFitError::NotConverged`] if the optimizer hits its bound
    #[allow(clippy::cast_precision_loss)]
    pub fn fit(y: &[f64], spec: SarimaSpec, optimizer: &NelderMead) -> Result<Self, ModelFitError> {
        let diff_poly = differencing_polynomial(spec.order.d, spec.seasonal.d, spec.period);
        let loss = diff_poly.len() - 1;
        if y.len() < loss + 2 {
            return Err(ModelFitError::TooShort {
                len: y.len(),
                order: loss,
            });
        }

        let mut w = apply_filter(y, &diff_poly);
        let mean = if loss == 0 {
            w.iter().sum::<f64>() / w.len() as f64
        } else {
            0.0
        };
        w.iter_mut().for_each(|v| *v -= mean);

        let scale = w.iter().map(|v| v * v).sum::<f64>().max(f64::MIN_POSITIVE);
        let objective = |u: &[f64]| {
            let (ar_poly, ma_poly) = polynomials(&unpack(u, &spec), spec.period);
            css_residuals(&w, &ar_poly, &ma_poly)
                .iter()
                .map(|e| e * e)
                .sum::<f64>()
                / scale
        };

        let start = vec![0.0; spec.n_params()];
        let minimum = optimizer.minimize(objective, &start)?;

        let coefficients = unpack(&minimum.x, &spec);
        let (ar_poly, ma_poly) = polynomials(&coefficients, spec.period);
        let residuals = css_residuals(&w, &ar_poly, &ma_poly);
        let css: f64 = residuals.iter().map(|e| e * e).sum();
        let sigma2 = css / w.len() as f64;

        Ok(Self {
            spec,
            coefficients,
            ar_poly,
            ma_poly,
            diff_poly,
            history: y.to_vec(),
            w,
            residuals,
            mean,
            css,
            sigma2,
            iterations: minimum.iterations,
        })
    }

    /// Point forecasts and standard errors for `horizon` steps
    #[must_use]
    pub fn predict(&self, horizon: usize) -> (Vec<f64>, Vec<f64>) {
        let m = self.w.len();

        let mut w_ext = self.w.clone();
        w_ext.reserve(horizon);
        let mut e_ext = self.residuals.clone();
        e_ext.resize(m + horizon, 0.0);
        for t in m..m + horizon {
            let mut value = 0.0;
            for (i, a) in self.ar_poly.iter().enumerate().skip(1) {
                if let Some(prev) = t.checked_sub(i).map(|j| w_ext[j]) {
                    value -= a * prev;
                }
            }
            for (j, c) in self.ma_poly.iter().enumerate().skip(1) {
                if let Some(prev) = t.checked_sub(j).map(|k| e_ext[k]) {
                    value += c * prev;
                }
            }
            w_ext.push(value);
        }

        let n = self.history.len();
        let mut y_ext = self.history.clone();
        y_ext.reserve(horizon);
        for h in 0..horizon {
            let t = n + h;
            let mut value = w_ext[m + h] + self.mean;
            for (i, c) in self.diff_poly.iter().enumerate().skip(1) {
                value -= c * y_ext[t - i];
            }
            y_ext.push(value);
        }

        let full_ar = multiply(&self.ar_poly, &self.diff_poly);
        let psi = psi_weights(&full_ar, &self.ma_poly, horizon);
        let mut accumulated = 0.0;
        let std_errors = psi
            .iter()
            .map(|p| {
                accumulated += p * p;
                (self.sigma2 * accumulated).sqrt()
            })
            .collect();

        (y_ext.split_off(n), std_errors)
    }

    /// Model structure
    #[must_use]
    pub const fn spec(&self) -> &SarimaSpec {
        &self.spec
    }

    /// Estimated coefficients
    #[must_use]
    pub const fn coefficients(&self) -> &Coefficients {
        &self.coefficients
    }

    /// Innovation variance (CSS / m)
    #[must_use]
    pub const fn sigma2(&self) -> f64 {
        self.sigma2
    }

    /// Conditional sum of squares at the optimum
    #[must_use]
    pub const fn css(&self) -> f64 {
        self.css
    }

    /// Optimizer iterations
    #[must_use]
    pub const fn iterations(&self) -> usize {
        self.iterations
    }

    /// Length of the differenced series
    #[must_use]
    pub fn differenced_len(&self) -> usize {
        self.w.len()
    }
}

/// Split the unconstrained vector into constrained coefficient blocks
fn unpack(u: &[f64], spec: &SarimaSpec) -> Coefficients {
    let (p, q) = (spec.order.p, spec.order.q);
    let (sp, sq) = (spec.seasonal.p, spec.seasonal.q);
    let (ar, rest) = u.split_at(p);
    let (ma, rest) = rest.split_at(q);
    let (sar, sma) = rest.split_at(sp);
    debug_assert_eq!(sma.len(), sq);

    Coefficients {
        ar: constrain(ar),
        ma: constrain(ma).into_iter().map(|v| -v).collect(),
        seasonal_ar: constrain(sar),
        seasonal_ma: constrain(sma).into_iter().map(|v| -v).collect(),
    }
}

/// Map `R^k` onto the coefficients of a stationary AR(k) polynomial
fn constrain(u: &[f64]) -> Vec<f64> {
    let mut phi: Vec<f64> = Vec::with_capacity(u.len());
    for (k, &raw) in u.iter().enumerate() {
        let r = raw.tanh();
        let previous = phi.clone();
        for j in 0..k {
            phi[j] = previous[j] - r * previous[k - 1 - j];
        }
        phi.push(r);
    }
    phi
}

/// `(A(B), M(B))` from coefficient blocks
fn polynomials(c: &Coefficients, period: usize) -> (Vec<f64>, Vec<f64>) {
    let ar = multiply(
        &lag_polynomial(&c.ar, 1, -1.0),
        &lag_polynomial(&c.seasonal_ar, period, -1.0),
    );
    let ma = multiply(
        &lag_polynomial(&c.ma, 1, 1.0),
        &lag_polynomial(&c.seasonal_ma, period, 1.0),
    );
    (ar, ma)
}

/// `1 + sign * Σ coef_k B^(k * stride)`
fn lag_polynomial(coefficients: &[f64], stride: usize, sign: f64) -> Vec<f64> {
    let mut poly = vec![0.0; coefficients.len() * stride + 1];
    poly[0] = 1.0;
    for (k, c) in coefficients.iter().enumerate() {
        poly[(k + 1) * stride] = sign * c;
    }
    poly
}

fn multiply(a: &[f64], b: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; a.len() + b.len() - 1];
    for (i, x) in a.iter().enumerate() {
        for (j, y) in b.iter().enumerate() {
            out[i + j] += x * y;
        }
    }
    out
}

/// `(1-B)^d (1-B^s)^D`
pub(crate) fn differencing_polynomial(d: usize, seasonal_d: usize, period: usize) -> Vec<f64> {
    let mut poly = vec![1.0];
    for _ in 0..d {
        poly = multiply(&poly, &[1.0, -1.0]);
    }
    let seasonal = lag_polynomial(&[1.0], period, -1.0);
    for _ in 0..seasonal_d {
        poly = multiply(&poly, &seasonal);
    }
    poly
}

/// `w_t = Σ poly_i y_{t+k-i}` for the `n - k` points with full history
fn apply_filter(y: &[f64], poly: &[f64]) -> Vec<f64> {
    let k = poly.len() - 1;
    (k..y.len())
        .map(|t| poly.iter().enumerate().map(|(i, c)| c * y[t - i]).sum())
        .collect()
}

/// `e_t = Σ A_i w_{t-i} - Σ_{j>=1} M_j e_{t-j}`, zero before the sample
fn css_residuals(w: &[f64], ar_poly: &[f64], ma_poly: &[f64]) -> Vec<f64> {
    let mut e = Vec::with_capacity(w.len());
    for t in 0..w.len() {
        let mut value = 0.0;
        for (i, a) in ar_poly.iter().enumerate().take(t + 1) {
            value += a * w[t - i];
        }
        for (j, m) in ma_poly.iter().enumerate().skip(1).take(t) {
            value -= m * e[t - j];
        }
        e.push(value);
    }
    e
}

/// First `count` MA(∞) weights of `ma / ar` (both with leading 1)
fn psi_weights(ar: &[f64], ma: &[f64], count: usize) -> Vec<f64> {
    let mut psi = Vec::with_capacity(count);
    for j in 0..count {
        let mut value = ma.get(j).copied().unwrap_or(0.0);
        for i in 1..=j.min(ar.len() - 1) {
            value -= ar[i] * psi[j - i];
        }
        psi.push(value);
    }
    psi
}
