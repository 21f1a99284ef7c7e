use crate::calibration::types::{CalibrationSide, FixedParameters};
use crate::error::SurfaceResult;
use serde::Deserialize;
use std::path::Path;

/// Levenberg-Marquardt settings applied to every attempt
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LmConfig {
    /// Maximum accepted-or-rejected iterations per attempt
    pub max_iterations: usize,
    /// Starting damping factor
    pub initial_lambda: f64,
    /// Damping multiplier after a rejected step
    pub lambda_up: f64,
    /// Damping multiplier after an accepted step
    pub lambda_down: f64,
    /// Relative cost-reduction tolerance
    pub ftol: f64,
    /// Relative step-size tolerance
    pub xtol: f64,
    /// Projected-gradient tolerance
    pub gtol: f64,
}

impl Default for LmConfig {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            initial_lambda: 1e-3,
            lambda_up: 10.0,
            lambda_down: 0.3,
            ftol: 1e-12,
            xtol: 1e-12,
            gtol: 1e-12,
        }
    }
}

/// Main configuration struct for calibration
#[derive(Debug, Deserialize, Clone)]
pub struct OptimizationConfig {
    /// Number of independent randomized attempts
    #[serde(default = "default_attempts")]
    pub attempts: usize,

    /// Seed for the attempt start points
    #[serde(default = "default_seed")]
    pub seed: u64,

    #[serde(default)]
    pub lm: LmConfig,

    /// Refine each attempt with bounded L-BFGS-B, keeping it only if it improves
    #[serde(default = "default_lbfgsb_polish")]
    pub lbfgsb_polish: bool,

    /// Max iterations for L-BFGS-B
    #[serde(default = "default_lbfgsb_max_iterations")]
    pub lbfgsb_max_iterations: usize,

    /// L-BFGS-B convergence tolerance
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,

    #[serde(default)]
    pub calibration_side: CalibrationSide,

    #[serde(default)]
    pub fixed_params: FixedParameters,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            seed: default_seed(),
            lm: LmConfig::default(),
            lbfgsb_polish: default_lbfgsb_polish(),
            lbfgsb_max_iterations: default_lbfgsb_max_iterations(),
            tolerance: default_tolerance(),
            calibration_side: CalibrationSide::default(),
            fixed_params: FixedParameters::default(),
        }
    }
}

impl OptimizationConfig {
    /// Parse a TOML document; missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> SurfaceResult<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> SurfaceResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Default configuration for production calibration with high accuracy
    pub fn production() -> Self {
        Self {
            attempts: 10,
            lm: LmConfig {
                max_iterations: 500,
                ..LmConfig::default()
            },
            lbfgsb_max_iterations: 300,
            tolerance: 1e-10,
            ..Self::default()
        }
    }

    /// Fast configuration for development and testing
    pub fn fast() -> Self {
        Self {
            attempts: 5,
            lm: LmConfig {
                max_iterations: 200,
                ftol: 1e-10,
                xtol: 1e-10,
                gtol: 1e-10,
                ..LmConfig::default()
            },
            lbfgsb_max_iterations: 100,
            tolerance: 1e-8,
            ..Self::default()
        }
    }

    /// High-precision configuration for research and backtesting
    pub fn research() -> Self {
        Self {
            attempts: 25,
            lm: LmConfig {
                max_iterations: 2000,
                ftol: 1e-14,
                xtol: 1e-14,
                gtol: 1e-14,
                ..LmConfig::default()
            },
            lbfgsb_max_iterations: 1000,
            tolerance: 1e-12,
            ..Self::default()
        }
    }

    /// Minimal configuration for quick validation and debugging
    pub fn minimal() -> Self {
        Self {
            attempts: 2,
            lm: LmConfig {
                max_iterations: 50,
                ftol: 1e-8,
                xtol: 1e-8,
                gtol: 1e-8,
                ..LmConfig::default()
            },
            lbfgsb_polish: false,
            tolerance: 1e-6,
            ..Self::default()
        }
    }
}

fn default_attempts() -> usize {
    5
}

fn default_seed() -> u64 {
    123456
}

fn default_lbfgsb_polish() -> bool {
    true
}

fn default_lbfgsb_max_iterations() -> usize {
    200
}

fn default_tolerance() -> f64 {
    1e-10
}
