// src/models/essvi/essvi_model.rs

//! Extended SSVI surface model
//!
//! A single four-parameter surface spanning every maturity. Total implied
//! variance at log-moneyness k and maturity T is
//!
//! w(k, T) = ½·θ(T)·(1 + ρηk + sqrt((ηk + ρ)² + 4(1 − ρ²))),   θ(T) = a0 + a1·T
//!
//! where:
//! - a0: variance scale at T = 0 (must be > 0)
//! - a1: variance scale slope in T (must be ≥ 0)
//! - ρ: skew, in (−1, 1)
//! - η: curvature, > 0
//!
//! With ρ ∈ (−1, 1) the radicand is bounded below by 4(1 − ρ²) > 0, so the
//! square root is always real. Skew makes the smile asymmetric in k.

use crate::error::{SurfaceError, SurfaceResult};
use crate::models::traits::SurfaceModel;
use serde::{Deserialize, Serialize};

/// Calibrated surface parameters.
///
/// Fields are public so degenerate sets can be built for testing the pricer;
/// use [`EssviParams::new`] to get a validated set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EssviParams {
    /// Variance scale intercept
    pub a0: f64,
    /// Variance scale slope in maturity
    pub a1: f64,
    /// Skew, must be in (-1, 1)
    pub rho: f64,
    /// Curvature, must be > 0
    pub eta: f64,
}

/// Helper function to validate parameters against the surface domain.
fn validate_essvi_params(a0: f64, a1: f64, rho: f64, eta: f64) -> SurfaceResult<()> {
    if a0 <= 0.0 || !a0.is_finite() {
        return Err(SurfaceError::invalid_parameters(format!(
            "a0 (a0={}) must be > 0 and finite",
            a0
        )));
    }
    if a1 < 0.0 || !a1.is_finite() {
        return Err(SurfaceError::invalid_parameters(format!(
            "a1 (a1={}) must be >= 0 and finite",
            a1
        )));
    }
    if rho <= -1.0 || rho >= 1.0 || !rho.is_finite() {
        return Err(SurfaceError::invalid_parameters(format!(
            "rho (rho={}) must be in (-1, 1)",
            rho
        )));
    }
    if eta <= 0.0 || !eta.is_finite() {
        return Err(SurfaceError::invalid_parameters(format!(
            "eta (eta={}) must be > 0 and finite",
            eta
        )));
    }
    Ok(())
}

impl EssviParams {
    /// Creates new parameters with validation.
    pub fn new(a0: f64, a1: f64, rho: f64, eta: f64) -> SurfaceResult<Self> {
        validate_essvi_params(a0, a1, rho, eta)?;
        Ok(Self { a0, a1, rho, eta })
    }

    /// Builds parameters from an optimizer vector `[a0, a1, rho, eta]`.
    pub fn from_slice(x: &[f64]) -> SurfaceResult<Self> {
        match x {
            [a0, a1, rho, eta] => Self::new(*a0, *a1, *rho, *eta),
            _ => Err(SurfaceError::invalid_parameters(format!(
                "expected 4 parameters [a0, a1, rho, eta], got {}",
                x.len()
            ))),
        }
    }

    pub fn to_vec(&self) -> Vec<f64> {
        vec![self.a0, self.a1, self.rho, self.eta]
    }

    pub fn validate(&self) -> SurfaceResult<()> {
        validate_essvi_params(self.a0, self.a1, self.rho, self.eta)
    }

    /// Variance scale θ(T) = a0 + a1·T.
    pub fn theta(&self, t: f64) -> f64 {
        self.a0 + self.a1 * t
    }

    /// (ηk + ρ)² + 4(1 − ρ²), the term under the square root.
    pub fn radicand(&self, k: f64) -> f64 {
        let u = self.eta * k + self.rho;
        u * u + 4.0 * (1.0 - self.rho * self.rho)
    }

    /// Total implied variance w(k, T).
    pub fn total_variance(&self, k: f64, t: f64) -> f64 {
        0.5 * self.theta(t) * (1.0 + self.rho * self.eta * k + self.radicand(k).sqrt())
    }

    /// Partial derivatives of w(k, T) with respect to `[a0, a1, rho, eta]`.
    pub fn gradient(&self, k: f64, t: f64) -> [f64; 4] {
        let theta = self.theta(t);
        let u = self.eta * k + self.rho;
        let s = self.radicand(k).sqrt().max(f64::MIN_POSITIVE);
        let shape = 0.5 * (1.0 + self.rho * self.eta * k + s);

        [
            shape,
            t * shape,
            0.5 * theta * (self.eta * k + (u - 4.0 * self.rho) / s),
            0.5 * theta * (self.rho * k + u * k / s),
        ]
    }
}

/// Total variance for a batch of `(k, T)` pairs sharing one parameter set.
///
/// Evaluates exactly like [`EssviParams::total_variance`] element by element.
pub fn total_variance_batch(
    params: &EssviParams,
    ks: &[f64],
    ts: &[f64],
) -> SurfaceResult<Vec<f64>> {
    if ks.len() != ts.len() {
        return Err(SurfaceError::invalid_input(format!(
            "batch length mismatch: {} log-moneyness values vs {} maturities",
            ks.len(),
            ts.len()
        )));
    }
    Ok(ks
        .iter()
        .zip(ts)
        .map(|(&k, &t)| params.total_variance(k, t))
        .collect())
}

/// The calibrated surface. Wraps one parameter set and implements the
/// shared [`SurfaceModel`] interface.
#[derive(Debug, Clone, PartialEq)]
pub struct EssviSurface {
    pub params: EssviParams,
}

/// Violations found by [`EssviSurface::arbitrage_report`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArbitrageReport {
    pub calendar_violations: Vec<(f64, f64, f64)>,
    pub butterfly_violations: Vec<(f64, f64)>,
}

impl ArbitrageReport {
    pub fn is_clean(&self) -> bool {
        self.calendar_violations.is_empty() && self.butterfly_violations.is_empty()
    }
}

impl EssviSurface {
    pub fn new(params: EssviParams) -> Self {
        Self { params }
    }

    /// Implied volatility sqrt(w / T); `None` for non-positive T or variance.
    pub fn implied_vol(&self, k: f64, t: f64) -> Option<f64> {
        if t <= 0.0 {
            return None;
        }
        let w = self.params.total_variance(k, t);
        (w > 0.0).then(|| (w / t).sqrt())
    }

    pub fn total_variance_batch(&self, ks: &[f64], ts: &[f64]) -> SurfaceResult<Vec<f64>> {
        total_variance_batch(&self.params, ks, ts)
    }

    /// Runs both arbitrage checks over a (k, T) grid. Calendar checks compare
    /// consecutive maturities in `ts`, which must be ascending.
    pub fn arbitrage_report(&self, ks: &[f64], ts: &[f64]) -> ArbitrageReport {
        let mut report = ArbitrageReport::default();
        for &k in ks {
            for pair in ts.windows(2) {
                if self.check_calendar_arbitrage(k, pair[0], pair[1]).is_err() {
                    report.calendar_violations.push((k, pair[0], pair[1]));
                }
            }
            for &t in ts {
                if self.check_butterfly_arbitrage_at_k(k, t).is_err() {
                    report.butterfly_violations.push((k, t));
                }
            }
        }
        report
    }
}

impl SurfaceModel for EssviSurface {
    type Parameters = EssviParams;

    fn parameters(&self) -> &Self::Parameters {
        &self.params
    }

    fn validate_params(&self) -> SurfaceResult<()> {
        self.params.validate()
    }

    fn total_variance(&self, k: f64, t: f64) -> f64 {
        self.params.total_variance(k, t)
    }

    /// Total variance must not decrease from `t1` to `t2` at fixed `k`.
    fn check_calendar_arbitrage(&self, k: f64, t1: f64, t2: f64) -> SurfaceResult<()> {
        const TOLERANCE: f64 = 1e-12;
        let (t_lo, t_hi) = if t1 <= t2 { (t1, t2) } else { (t2, t1) };
        let w_lo = self.params.total_variance(k, t_lo);
        let w_hi = self.params.total_variance(k, t_hi);
        if w_hi < w_lo - TOLERANCE {
            return Err(SurfaceError::invalid_parameters(format!(
                "calendar arbitrage at k={:.4}: w(t={:.4})={:.6e} < w(t={:.4})={:.6e}",
                k, t_hi, w_hi, t_lo, w_lo
            )));
        }
        Ok(())
    }

    /// Gatheral's density condition
    /// g(k) = (1 - k*w'/(2*w))² - (w')²/4 * (1/w + 1/4) + w''/2 >= 0,
    /// with derivatives taken by central differences.
    fn check_butterfly_arbitrage_at_k(&self, k: f64, t: f64) -> SurfaceResult<()> {
        const EPSILON: f64 = 1e-4;
        const TOLERANCE: f64 = 1e-9;

        let w = self.params.total_variance(k, t);
        if w <= TOLERANCE {
            return Ok(());
        }
        let w_p = self.params.total_variance(k - EPSILON, t);
        let w_n = self.params.total_variance(k + EPSILON, t);

        let w_k = (w_n - w_p) / (2.0 * EPSILON);
        let w_kk = (w_n - 2.0 * w + w_p) / (EPSILON * EPSILON);

        let term1 = 1.0 - k * w_k / (2.0 * w);
        let g_k = term1 * term1 - (w_k * w_k / 4.0) * (1.0 / w + 0.25) + w_kk / 2.0;

        if g_k < -TOLERANCE {
            Err(SurfaceError::invalid_parameters(format!(
                "butterfly arbitrage at k={:.6}, t={:.4}: g(k) = {:.6e} < 0",
                k, t, g_k
            )))
        } else {
            Ok(())
        }
    }
}
