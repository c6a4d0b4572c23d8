//! Autoregressive integrated moving-average forecasting.
//!
//! Estimation is Hannan–Rissanen two-step conditional least squares: a long
//! autoregression supplies residual proxies, then the AR and MA
//! coefficients come from one OLS pass over lagged values and lagged
//! residuals. Singular normal equations (short or degenerate series) fall
//! back to an AR-only regression and finally to a mean model, so a flat
//! series still yields a usable forecast instead of a failed fit.
//!
//! Forecast intervals come from the psi-weight recursion: the h-step error
//! variance is `sigma² * Σ psi_j²` with the weights accumulated once per
//! differencing pass.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Model order (p, d, q).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArimaOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
}

impl ArimaOrder {
    pub const fn new(p: usize, d: usize, q: usize) -> Self {
        Self { p, d, q }
    }
}

impl Default for ArimaOrder {
    fn default() -> Self {
        Self::new(1, 1, 1)
    }
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("series too short for the model order: {actual} observations, need {required}")]
    TooShort { required: usize, actual: usize },

    #[error("series contains non-finite values")]
    NonFinite,
}

/// A fitted ARIMA model, self-contained for forecasting: it carries the
/// coefficient estimates plus the series tails that seed the recursions.
#[derive(Debug, Clone)]
pub struct ArimaModel {
    pub order: ArimaOrder,
    pub ar: Vec<f64>,
    pub ma: Vec<f64>,
    pub intercept: f64,
    pub sigma2: f64,
    /// Last `p` values of the differenced series, oldest first.
    diff_tail: Vec<f64>,
    /// Last `q` in-sample residuals, oldest first (zero-padded when the
    /// regression produced fewer).
    resid_tail: Vec<f64>,
    /// Last value of the series at each differencing stage; undoes the
    /// differencing when forecasts are mapped back to level scale.
    seeds: Vec<f64>,
}

/// Point forecasts with a two-sided confidence band.
#[derive(Debug, Clone)]
pub struct Forecast {
    pub point: Vec<f64>,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
    pub confidence: f64,
}

impl ArimaModel {
    /// Fit the model on a complete (gap-filled) series of levels.
    pub fn fit(series: &[f64], order: ArimaOrder) -> Result<Self, ModelError> {
        if series.iter().any(|v| !v.is_finite()) {
            return Err(ModelError::NonFinite);
        }
        let required = order.d + order.p.max(order.q) + 2;
        if series.len() < required {
            return Err(ModelError::TooShort {
                required,
                actual: series.len(),
            });
        }

        let mut seeds = Vec::with_capacity(order.d);
        let mut diff = series.to_vec();
        for _ in 0..order.d {
            seeds.push(diff[diff.len() - 1]);
            diff = difference(&diff, 1);
        }

        let (ar, ma, intercept, residuals) = estimate(&diff, order.p, order.q);

        // A flat series fits with zero residual variance; a scale-aware
        // floor keeps its confidence band strictly wider than the point
        // forecast.
        let scale = series.iter().map(|v| v.abs()).sum::<f64>() / series.len() as f64;
        let floor = (scale.max(1.0) * 1e-6).powi(2);
        let sigma2 = (residuals.iter().map(|r| r * r).sum::<f64>()
            / residuals.len().max(1) as f64)
            .max(floor);

        let diff_tail = diff[diff.len() - order.p..].to_vec();

        let mut resid_tail = vec![0.0; order.q];
        let take = order.q.min(residuals.len());
        resid_tail[order.q - take..].copy_from_slice(&residuals[residuals.len() - take..]);

        Ok(Self {
            order,
            ar,
            ma,
            intercept,
            sigma2,
            diff_tail,
            resid_tail,
            seeds,
        })
    }

    /// Forecast `steps` ahead with a two-sided band at `confidence`.
    pub fn forecast(&self, steps: usize, confidence: f64) -> Forecast {
        // Point forecasts on the differenced scale: ARMA recursion with
        // expected future shocks of zero.
        let mut diffs = self.diff_tail.clone();
        let mut resids = self.resid_tail.clone();
        let mut points = Vec::with_capacity(steps);

        for _ in 0..steps {
            let mut value = self.intercept;
            for (i, &phi) in self.ar.iter().enumerate() {
                if i < diffs.len() {
                    value += phi * diffs[diffs.len() - 1 - i];
                }
            }
            for (i, &theta) in self.ma.iter().enumerate() {
                if i < resids.len() {
                    value += theta * resids[resids.len() - 1 - i];
                }
            }
            diffs.push(value);
            resids.push(0.0);
            points.push(value);
        }

        // Map back to level scale, undoing one differencing stage per seed.
        let mut levels = points;
        for &seed in self.seeds.iter().rev() {
            let mut running = seed;
            for v in levels.iter_mut() {
                running += *v;
                *v = running;
            }
        }

        // Forecast-error variance from cumulative psi weights.
        let mut psi = psi_weights(&self.ar, &self.ma, steps);
        for _ in 0..self.order.d {
            for j in 1..psi.len() {
                psi[j] += psi[j - 1];
            }
        }

        let sigma = self.sigma2.sqrt();
        let z = z_score(confidence);
        let mut lower = Vec::with_capacity(steps);
        let mut upper = Vec::with_capacity(steps);
        let mut cum = 0.0;
        for (h, &point) in levels.iter().enumerate() {
            cum += psi[h] * psi[h];
            let se = sigma * cum.sqrt();
            lower.push(point - z * se);
            upper.push(point + z * se);
        }

        Forecast {
            point: levels,
            lower,
            upper,
            confidence,
        }
    }
}

/// Difference a series `d` times.
pub fn difference(series: &[f64], d: usize) -> Vec<f64> {
    let mut result = series.to_vec();
    for _ in 0..d {
        if result.len() < 2 {
            return Vec::new();
        }
        result = result.windows(2).map(|w| w[1] - w[0]).collect();
    }
    result
}

/// Estimation cascade: full ARMA, then AR-only, then a mean model.
///
/// Returns `(ar, ma, intercept, residuals)` with coefficient vectors always
/// sized `p` and `q`.
fn estimate(diff: &[f64], p: usize, q: usize) -> (Vec<f64>, Vec<f64>, f64, Vec<f64>) {
    if q > 0 {
        if let Some(fit) = hannan_rissanen(diff, p, q) {
            return fit;
        }
    }
    if p > 0 {
        if let Some((ar, intercept, residuals)) = least_squares_ar(diff, p) {
            if is_stationary(&ar) {
                return (ar, vec![0.0; q], intercept, residuals);
            }
        }
    }
    let mean = diff.iter().sum::<f64>() / diff.len().max(1) as f64;
    let residuals = diff.iter().map(|v| v - mean).collect();
    (vec![0.0; p], vec![0.0; q], mean, residuals)
}

/// Hannan–Rissanen two-step ARMA estimation on a differenced series.
fn hannan_rissanen(
    diff: &[f64],
    p: usize,
    q: usize,
) -> Option<(Vec<f64>, Vec<f64>, f64, Vec<f64>)> {
    let n = diff.len();

    // Step 1: long autoregression for residual proxies. proxies[k] is the
    // residual at diff index long_ar + k.
    let long_ar = (p + q).max(2).min(n.saturating_sub(1) / 2).max(1);
    let (_, _, proxies) = least_squares_ar(diff, long_ar)?;

    // Step 2: OLS over AR lags and lagged residual proxies.
    let start = p.max(long_ar + q);
    if n <= start {
        return None;
    }
    let rows = n - start;
    let cols = p + q + 1;
    if rows < cols {
        return None;
    }

    let mut x = Vec::with_capacity(rows * cols);
    let mut y = Vec::with_capacity(rows);
    for t in start..n {
        y.push(diff[t]);
        x.push(1.0);
        for i in 1..=p {
            x.push(diff[t - i]);
        }
        for i in 1..=q {
            x.push(proxies[t - i - long_ar]);
        }
    }

    let beta = solve_ols(rows, cols, &x, &y)?;
    let intercept = beta[0];
    let ar: Vec<f64> = beta.iter().skip(1).take(p).copied().collect();
    let ma: Vec<f64> = beta.iter().skip(1 + p).take(q).copied().collect();
    if !is_stationary(&ar) {
        return None;
    }
    let residuals = regression_residuals(rows, cols, &x, &y, &beta);

    Some((ar, ma, intercept, residuals))
}

/// Stationarity guard on the AR part, so forecasts cannot explode over the
/// horizon. `Σ|phi| < 1` is a sufficient condition, and exact for p = 1
/// (the default order). A non-stationary estimate drops to the next stage
/// of the cascade instead.
fn is_stationary(ar: &[f64]) -> bool {
    ar.iter().map(|c| c.abs()).sum::<f64>() < 1.0
}

/// AR(p) by OLS: regress the series on a constant and its own lags.
///
/// Returns `(ar, intercept, residuals)`; residuals are chronological and
/// start at index `p` of the input.
fn least_squares_ar(diff: &[f64], p: usize) -> Option<(Vec<f64>, f64, Vec<f64>)> {
    let n = diff.len();
    if n < p + 2 {
        return None;
    }
    let rows = n - p;
    let cols = p + 1;

    let mut x = Vec::with_capacity(rows * cols);
    let mut y = Vec::with_capacity(rows);
    for t in p..n {
        y.push(diff[t]);
        x.push(1.0);
        for i in 1..=p {
            x.push(diff[t - i]);
        }
    }

    let beta = solve_ols(rows, cols, &x, &y)?;
    let intercept = beta[0];
    let ar: Vec<f64> = beta.iter().skip(1).copied().collect();
    let residuals = regression_residuals(rows, cols, &x, &y, &beta);

    Some((ar, intercept, residuals))
}

/// OLS via the normal equations: `beta = (X'X)^-1 X'y`.
///
/// `None` when the system is underdetermined or singular.
fn solve_ols(rows: usize, cols: usize, x_data: &[f64], y_data: &[f64]) -> Option<DVector<f64>> {
    if rows < cols {
        return None;
    }
    let x = DMatrix::from_row_slice(rows, cols, x_data);
    let y = DVector::from_column_slice(y_data);

    let xtx = x.transpose() * &x;
    let xty = x.transpose() * y;

    let beta = xtx.try_inverse()? * xty;
    beta.iter().all(|b| b.is_finite()).then_some(beta)
}

fn regression_residuals(
    rows: usize,
    cols: usize,
    x_data: &[f64],
    y_data: &[f64],
    beta: &DVector<f64>,
) -> Vec<f64> {
    let x = DMatrix::from_row_slice(rows, cols, x_data);
    let y = DVector::from_column_slice(y_data);
    let y_hat = x * beta;
    (y - y_hat).iter().copied().collect()
}

/// Psi weights of the ARMA part: `psi_0 = 1`,
/// `psi_j = theta_j + Σ phi_i * psi_{j-i}`.
fn psi_weights(ar: &[f64], ma: &[f64], steps: usize) -> Vec<f64> {
    let mut psi = vec![0.0; steps];
    if steps == 0 {
        return psi;
    }
    psi[0] = 1.0;
    for j in 1..steps {
        let mut value = if j <= ma.len() { ma[j - 1] } else { 0.0 };
        for (i, &phi) in ar.iter().enumerate() {
            let lag = i + 1;
            if j >= lag {
                value += phi * psi[j - lag];
            }
        }
        psi[j] = value;
    }
    psi
}

/// Two-sided normal quantile for the usual confidence levels.
fn z_score(confidence: f64) -> f64 {
    match confidence {
        c if c >= 0.99 => 2.576,
        c if c >= 0.95 => 1.960,
        c if c >= 0.90 => 1.645,
        c if c >= 0.80 => 1.282,
        _ => 1.960,
    }
}
