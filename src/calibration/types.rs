use serde::{Deserialize, Serialize};
use std::any::Any;

use crate::models::essvi::essvi_model::EssviParams;
use crate::pricing::DEFAULT_RISK_FREE_RATE;
use crate::quotes::OptionType;

/// Calibration input derived from one normalized quote.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationPoint {
    /// Log-moneyness ln(K/S)
    pub k: f64,
    /// Time to expiry in years
    pub t: f64,
    /// Market total implied variance iv² · t
    pub w: f64,
}

/// Output of one calibration run, handed off for persistence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationResult {
    pub params: EssviParams,
    /// Least-squares cost ½·Σr² of the selected attempt.
    pub cost: f64,
    pub num_points: usize,
}

/// Which option side feeds the calibration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalibrationSide {
    #[default]
    Calls,
    Puts,
    Both,
}

impl CalibrationSide {
    pub fn includes(&self, option_type: OptionType) -> bool {
        match self {
            Self::Calls => option_type == OptionType::Call,
            Self::Puts => option_type == OptionType::Put,
            Self::Both => true,
        }
    }
}

/// Fixed parameters that are not calibrated by the optimizer
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FixedParameters {
    /// Flat continuously-compounded risk-free rate
    pub r: f64,
}

impl Default for FixedParameters {
    fn default() -> Self {
        Self {
            r: DEFAULT_RISK_FREE_RATE,
        }
    }
}

/// Least-squares cost ½·Σr².
#[inline]
pub fn least_squares_cost(residuals: &[f64]) -> f64 {
    0.5 * residuals.iter().map(|r| r * r).sum::<f64>()
}

/// Model calibrator trait for bounded least-squares parameter fitting.
///
/// The calibrator owns its point batch; the solver only sees parameter vectors.
pub trait ModelCalibrator: Send + Sync {
    /// Returns the name of the model (e.g., "essvi")
    fn model_name(&self) -> &str;

    /// How many parameters are in the model's optimization vector
    fn param_count(&self) -> usize;

    /// Returns the vector of (min, max) bounds for each parameter
    fn param_bounds(&self) -> &[(f64, f64)];

    /// Number of residuals produced per evaluation
    fn point_count(&self) -> usize;

    /// Model minus market value for every point, unweighted
    fn residuals(&self, x: &[f64]) -> Vec<f64>;

    /// Jacobian of the residuals, one row per point.
    ///
    /// The default takes forward differences, stepping backwards when the
    /// forward step would leave the bounds.
    fn jacobian(&self, x: &[f64]) -> Vec<Vec<f64>> {
        const EPS_SCALE: f64 = 1e-6;
        let base = self.residuals(x);
        let bounds = self.param_bounds();
        let mut jac = vec![vec![0.0; x.len()]; base.len()];

        for c in 0..x.len() {
            let h = (x[c].abs() * EPS_SCALE).max(1e-8);
            let mut xp = x.to_vec();
            xp[c] = (x[c] + h).min(bounds[c].1);
            if (xp[c] - x[c]).abs() < 1e-14 {
                xp[c] = (x[c] - h).max(bounds[c].0);
            }
            let denom = xp[c] - x[c];
            if denom.abs() < 1e-14 {
                continue;
            }
            let rp = self.residuals(&xp);
            for (row, (p, b)) in jac.iter_mut().zip(rp.iter().zip(&base)) {
                row[c] = (p - b) / denom;
            }
        }
        jac
    }

    /// Given a parameter vector `x`, returns the least-squares cost
    fn evaluate_objective(&self, x: &[f64]) -> f64 {
        least_squares_cost(&self.residuals(x))
    }

    /// Uniform ranges each attempt's starting point is drawn from
    fn initial_guess_ranges(&self) -> Vec<(f64, f64)>;

    /// Returns parameter names in the order they appear in the optimization vector
    fn param_names(&self) -> Vec<&str>;

    /// Support for downcasting
    fn as_any(&self) -> &dyn Any;
}

/// Model price next to the market mid for one quote
#[derive(Debug, Clone)]
pub struct PricingResult {
    pub option_type: OptionType,
    pub strike: f64,
    pub underlying_price: f64,
    pub time_to_expiry: f64,
    pub model_price: f64,
    /// Absent when the surface was degenerate or the quote had expired
    pub model_iv: Option<f64>,
    pub market_mid: Option<f64>,
}
