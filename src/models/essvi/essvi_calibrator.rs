// src/models/essvi/essvi_calibrator.rs

//! eSSVI model calibrator
//!
//! Fits `[a0, a1, rho, eta]` to a batch of calibration points across all
//! maturities at once. The objective is the plain unweighted residual
//! `w_model(k_i, T_i) - w_i`; no point is discounted for liquidity,
//! moneyness or maturity.

use crate::calibration::types::{CalibrationPoint, ModelCalibrator};
use crate::error::{SurfaceError, SurfaceResult};
use crate::model_params::{EssviModelParams, ModelParams};
use crate::models::essvi::essvi_model::{total_variance_batch, EssviParams};
use serde::{Deserialize, Serialize};

/// Structure to hold parameter bounds for the eSSVI calibration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EssviParamBounds {
    pub a0: (f64, f64),
    pub a1: (f64, f64),
    pub rho: (f64, f64),
    pub eta: (f64, f64),
}

impl Default for EssviParamBounds {
    fn default() -> Self {
        Self {
            a0: (1e-6, 10.0),
            a1: (0.0, 10.0),
            rho: (-0.999, 0.999),
            eta: (1e-6, 100.0),
        }
    }
}

impl From<&[(f64, f64)]> for EssviParamBounds {
    fn from(bounds: &[(f64, f64)]) -> Self {
        match bounds {
            [a0, a1, rho, eta] => Self {
                a0: *a0,
                a1: *a1,
                rho: *rho,
                eta: *eta,
            },
            _ => Self::default(),
        }
    }
}

impl EssviParamBounds {
    pub fn to_vec(&self) -> Vec<(f64, f64)> {
        vec![self.a0, self.a1, self.rho, self.eta]
    }
}

/// Calibrator for the eSSVI surface with 4 parameters: [a0, a1, rho, eta]
#[derive(Debug, Clone)]
pub struct EssviModelCalibrator {
    ks: Vec<f64>,
    ts: Vec<f64>,
    ws: Vec<f64>,
    mean_w: f64,
    param_bounds: Vec<(f64, f64)>,
    /// Model-specific parameters (start-point sampling ranges)
    params: EssviModelParams,
}

impl EssviModelCalibrator {
    /// Constructor from calibration points and optional overrides.
    pub fn new(
        points: &[CalibrationPoint],
        param_bounds_opt: Option<EssviParamBounds>,
        model_params: Option<Box<dyn ModelParams>>,
    ) -> SurfaceResult<Self> {
        if points.is_empty() {
            return Err(SurfaceError::insufficient_data(
                "calibration requires at least one point",
            ));
        }

        let ks = points.iter().map(|p| p.k).collect();
        let ts = points.iter().map(|p| p.t).collect();
        let ws: Vec<f64> = points.iter().map(|p| p.w).collect();
        let mean_w = ws.iter().sum::<f64>() / ws.len() as f64;

        let bounds = param_bounds_opt.unwrap_or_default();
        for (name, (lo, hi)) in ["a0", "a1", "rho", "eta"].iter().zip(bounds.to_vec()) {
            if !(lo.is_finite() && hi.is_finite()) || lo > hi {
                return Err(SurfaceError::invalid_input(format!(
                    "invalid bounds for {}: ({}, {})",
                    name, lo, hi
                )));
            }
        }

        // Resolve model-specific parameters (default if not supplied or type mismatch)
        let params = model_params
            .and_then(|mp| mp.as_any().downcast_ref::<EssviModelParams>().cloned())
            .unwrap_or_default();

        Ok(Self {
            ks,
            ts,
            ws,
            mean_w,
            param_bounds: bounds.to_vec(),
            params,
        })
    }

    /// Params from an optimizer vector without domain validation; the vector
    /// is always within bounds when it comes from the solver.
    fn unchecked(x: &[f64]) -> Option<EssviParams> {
        match x {
            &[a0, a1, rho, eta] => Some(EssviParams { a0, a1, rho, eta }),
            _ => None,
        }
    }
}

impl ModelCalibrator for EssviModelCalibrator {
    fn model_name(&self) -> &str {
        "essvi"
    }

    fn param_count(&self) -> usize {
        self.param_bounds.len()
    }

    fn param_bounds(&self) -> &[(f64, f64)] {
        &self.param_bounds
    }

    fn point_count(&self) -> usize {
        self.ws.len()
    }

    fn residuals(&self, x: &[f64]) -> Vec<f64> {
        let model_w = Self::unchecked(x)
            .ok_or_else(|| SurfaceError::invalid_parameters("expected [a0, a1, rho, eta]"))
            .and_then(|params| total_variance_batch(&params, &self.ks, &self.ts));
        match model_w {
            Ok(model_w) => model_w.iter().zip(&self.ws).map(|(m, w)| m - w).collect(),
            Err(_) => vec![f64::NAN; self.ws.len()],
        }
    }

    /// Analytic Jacobian: the residual gradient is the model gradient.
    fn jacobian(&self, x: &[f64]) -> Vec<Vec<f64>> {
        let Some(params) = Self::unchecked(x) else {
            return vec![vec![f64::NAN; x.len()]; self.ws.len()];
        };
        self.ks
            .iter()
            .zip(&self.ts)
            .map(|(&k, &t)| params.gradient(k, t).to_vec())
            .collect()
    }

    fn initial_guess_ranges(&self) -> Vec<(f64, f64)> {
        let p = &self.params;
        vec![
            (p.a0_scale.0 * self.mean_w, p.a0_scale.1 * self.mean_w),
            p.a1,
            p.rho,
            p.eta,
        ]
    }

    fn param_names(&self) -> Vec<&str> {
        vec!["a0", "a1", "rho", "eta"]
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
