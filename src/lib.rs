//! # eSSVI-Surface: Implied-Volatility Surface Calibration and Option Pricing
//!
//! `essvi-surface` calibrates a four-parameter extended SSVI surface to a
//! snapshot of option quotes and prices arbitrary European options off it by
//! interpolation and extrapolation across strike and maturity.
//!
//! ## Pipeline
//!
//! 1. **Normalize**: a raw option chain (call and put columns side by side) becomes
//!    one [`NormalizedQuote`] per (quote date, expiry, strike, side).
//! 2. **Transform**: each quote with a positive implied vol becomes a
//!    [`CalibrationPoint`] `(k = ln(K/S), T, w = iv²·T)`.
//! 3. **Calibrate**: multi-start bounded least squares over `[a0, a1, rho, eta]`.
//! 4. **Price**: surface variance → volatility → Black-Scholes.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chrono::NaiveDate;
//! use essvi_surface::{
//!     calibrate_essvi_seeded, calibration_points, default_configs, normalize, price,
//!     CalibrationParams, ColumnAliases, OptionType,
//! };
//! use essvi_surface::quotes::io::read_raw_table;
//!
//! let table = read_raw_table("options_raw.csv")?;
//! let normalized = normalize(&table, &ColumnAliases::default());
//!
//! let config = default_configs::fast();
//! let points = calibration_points(&normalized.quotes, config.calibration_side);
//! let result = calibrate_essvi_seeded(&points, &config, CalibrationParams::default())?;
//!
//! let today = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
//! let expiry = NaiveDate::from_ymd_opt(2024, 6, 21).unwrap();
//! let px = price(480.0, expiry, OptionType::Call, 475.0, 0.01, &result.params, today);
//! println!("model price {:.4}", px);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Configuration Presets
//!
//! - `production()`: more attempts and iterations for live use
//! - `fast()`: balanced speed/accuracy for development
//! - `research()`: large attempt budget, tight tolerances
//! - `minimal()`: quick validation settings

// ================================================================================================
// MODULES
// ================================================================================================

pub mod calibration;
pub mod error;
pub mod model_params;
pub mod models;
pub mod plot;
pub mod pricing;
pub mod quotes;

// ================================================================================================
// IMPORTS
// ================================================================================================

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cmp::Ordering;
use tracing::warn;

use calibration::pipeline::calibrate_model;
use calibration::types::ModelCalibrator;
use models::essvi::essvi_calibrator::EssviModelCalibrator;
use models::utils::price_option;

// ================================================================================================
// PUBLIC RE-EXPORTS
// ================================================================================================

pub use calibration::{
    artifact::{read_artifact, write_artifact, CalibrationArtifact},
    config::{LmConfig, OptimizationConfig},
    transform::{calibration_points, to_calibration_point},
    types::{CalibrationPoint, CalibrationResult, CalibrationSide, FixedParameters, PricingResult},
};
pub use error::{SurfaceError, SurfaceResult};
pub use model_params::{EssviModelParams, ModelParams};
pub use models::essvi::{
    essvi_calibrator::EssviParamBounds,
    essvi_model::{total_variance_batch, ArbitrageReport, EssviParams, EssviSurface},
};
pub use pricing::{
    price, NoMarketData, PriceRequest, Pricer, QuotedPrice, SpotProvider, SpotSource,
    DEFAULT_RISK_FREE_RATE,
};
pub use quotes::{
    normalize, ColumnAliases, NormalizationReport, Normalized, NormalizedQuote, OptionType,
    RawTable,
};

// ================================================================================================
// DEFAULT CONFIGURATIONS
// ================================================================================================

/// Pre-configured optimization settings for common use cases.
pub mod default_configs {
    use crate::calibration::config::OptimizationConfig;

    /// Production-grade configuration.
    ///
    /// **Characteristics:**
    /// - Attempts: 10
    /// - Levenberg-Marquardt iterations per attempt: 500
    /// - L-BFGS-B polish enabled
    pub fn production() -> OptimizationConfig {
        OptimizationConfig::production()
    }

    /// Fast configuration for development and testing.
    ///
    /// # Example
    ///
    /// ```rust
    /// use essvi_surface::default_configs;
    ///
    /// let config = default_configs::fast();
    /// assert_eq!(config.attempts, 5);
    /// ```
    pub fn fast() -> OptimizationConfig {
        OptimizationConfig::fast()
    }

    /// High-precision configuration for research and backtesting.
    pub fn research() -> OptimizationConfig {
        OptimizationConfig::research()
    }

    /// Minimal configuration: two attempts, no L-BFGS-B polish.
    pub fn minimal() -> OptimizationConfig {
        OptimizationConfig::minimal()
    }
}

/// Overrides for eSSVI calibration.
#[derive(Debug)]
pub struct CalibrationParams {
    /// Custom parameter bounds (None for the standard bounds)
    pub param_bounds: Option<EssviParamBounds>,
    /// Optional model-specific parameters (type-erased)
    pub model_params: Option<Box<dyn ModelParams>>,
}

impl Default for CalibrationParams {
    fn default() -> Self {
        Self {
            param_bounds: None,
            model_params: Some(Box::new(EssviModelParams::default())),
        }
    }
}

/// Calibrate the eSSVI surface to `points` with `attempts` randomized starts
/// drawn from `rng`, using default solver settings.
///
/// # Errors
///
/// * [`SurfaceError::InsufficientData`] if `points` is empty
/// * [`SurfaceError::InvalidInput`] if `attempts` is zero
/// * [`SurfaceError::CalibrationFailed`] if every attempt ends with a non-finite cost
pub fn calibrate<R: Rng + ?Sized>(
    points: &[CalibrationPoint],
    attempts: usize,
    rng: &mut R,
) -> SurfaceResult<CalibrationResult> {
    let config = OptimizationConfig {
        attempts,
        ..OptimizationConfig::default()
    };
    calibrate_essvi(points, &config, CalibrationParams::default(), rng)
}

/// Calibrate the eSSVI surface to `points`.
///
/// Runs `config.attempts` independent attempts. Each starts from a point drawn
/// uniformly from the model's start ranges (a0 scaled by the mean market total
/// variance), runs bounded Levenberg-Marquardt on the unweighted residuals
/// `w_model − w_market`, and optionally polishes with L-BFGS-B. The attempt
/// with the lowest cost ½·Σr² wins, ties going to the earliest.
///
/// The random source is supplied by the caller, so a fixed seed reproduces a
/// run exactly.
///
/// # Errors
///
/// Same as [`calibrate`].
///
/// # Example
///
/// ```rust
/// use essvi_surface::{
///     calibrate_essvi, default_configs, CalibrationParams, CalibrationPoint, EssviParams,
/// };
/// use rand::{rngs::StdRng, SeedableRng};
///
/// let truth = EssviParams::new(0.04, 0.05, -0.3, 1.2)?;
/// let points: Vec<CalibrationPoint> = [0.25, 0.5, 1.0]
///     .iter()
///     .flat_map(|&t| (-4..=4).map(move |i| (i as f64 * 0.1, t)))
///     .map(|(k, t)| CalibrationPoint { k, t, w: truth.total_variance(k, t) })
///     .collect();
///
/// let mut rng = StdRng::seed_from_u64(7);
/// let config = default_configs::fast();
/// let result = calibrate_essvi(&points, &config, CalibrationParams::default(), &mut rng)?;
/// assert_eq!(result.num_points, points.len());
/// # Ok::<(), essvi_surface::SurfaceError>(())
/// ```
pub fn calibrate_essvi<R: Rng + ?Sized>(
    points: &[CalibrationPoint],
    config: &OptimizationConfig,
    calib_params: CalibrationParams,
    rng: &mut R,
) -> SurfaceResult<CalibrationResult> {
    let calibrator =
        EssviModelCalibrator::new(points, calib_params.param_bounds, calib_params.model_params)?;

    let (cost, best) = calibrate_model(&calibrator, config, rng)?;
    let params = EssviParams::from_slice(&best)?;

    let report = surface_diagnostics(&params, points);
    if !report.is_clean() {
        warn!(
            calendar = report.calendar_violations.len(),
            butterfly = report.butterfly_violations.len(),
            "calibrated surface shows static-arbitrage violations"
        );
    }

    Ok(CalibrationResult {
        params,
        cost,
        num_points: points.len(),
    })
}

/// [`calibrate_essvi`] with a `StdRng` seeded from `config.seed`.
pub fn calibrate_essvi_seeded(
    points: &[CalibrationPoint],
    config: &OptimizationConfig,
    calib_params: CalibrationParams,
) -> SurfaceResult<CalibrationResult> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    calibrate_essvi(points, config, calib_params, &mut rng)
}

/// Evaluate the calibration cost ½·Σr² for a fixed parameter set.
///
/// Produces exactly the value `calibrate_essvi` minimises, so a stored surface
/// can be checked against fresh quotes without re-running the optimiser.
pub fn evaluate_essvi(points: &[CalibrationPoint], params: &EssviParams) -> SurfaceResult<f64> {
    let calibrator = EssviModelCalibrator::new(points, None, None)?;
    Ok(calibrator.evaluate_objective(&params.to_vec()))
}

/// Arbitrage checks over the strike and maturity span of `points`.
pub fn surface_diagnostics(params: &EssviParams, points: &[CalibrationPoint]) -> ArbitrageReport {
    const GRID: usize = 9;
    let surface = EssviSurface::new(*params);
    let span = |f: fn(&CalibrationPoint) -> f64| {
        points
            .iter()
            .map(f)
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            })
    };
    let (k_lo, k_hi) = span(|p| p.k);
    let (t_lo, t_hi) = span(|p| p.t);
    if !(k_lo.is_finite() && t_lo.is_finite()) {
        return Default::default();
    }
    let grid = |lo: f64, hi: f64| -> Vec<f64> {
        (0..GRID)
            .map(|i| lo + (hi - lo) * i as f64 / (GRID - 1) as f64)
            .collect()
    };
    surface.arbitrage_report(&grid(k_lo, k_hi), &grid(t_lo, t_hi))
}

/// Price normalized quotes off a calibrated surface, next to their market mids.
///
/// Each quote is priced at its own underlying price and time to expiry.
/// Results are sorted by strike price in ascending order.
pub fn price_quotes(
    params: &EssviParams,
    quotes: &[NormalizedQuote],
    fixed_params: FixedParameters,
) -> Vec<PricingResult> {
    let surface = EssviSurface::new(*params);

    let mut results: Vec<PricingResult> = quotes
        .iter()
        .map(|q| {
            let priced = price_option(
                q.option_type,
                q.strike,
                q.underlying_last,
                fixed_params.r,
                q.time_to_expiry_years,
                &surface,
            );
            PricingResult {
                option_type: q.option_type,
                strike: q.strike,
                underlying_price: q.underlying_last,
                time_to_expiry: q.time_to_expiry_years,
                model_price: priced.price,
                model_iv: priced.model_iv,
                market_mid: q.mid_price,
            }
        })
        .collect();

    results.sort_by(|a, b| a.strike.partial_cmp(&b.strike).unwrap_or(Ordering::Equal));
    results
}
