//! Pricing off a calibrated surface.
//!
//! Two paths, chosen by the live time to expiry:
//! - `T_live <= 0`: intrinsic value, surface not consulted.
//! - `T_live > 0`: surface total variance → volatility → Black-Scholes.
//!   A non-positive total variance prices the option at zero.
//!
//! Spot comes from the caller, from a [`SpotProvider`], or as a last resort
//! from the strike itself. The strike fallback is reported through
//! [`QuotedPrice::spot_source`] so a caller can tell it apart from a normal
//! price.

use chrono::NaiveDate;
use tracing::warn;

use crate::calibration::types::FixedParameters;
use crate::error::{SurfaceError, SurfaceResult};
use crate::models::essvi::essvi_model::{EssviParams, EssviSurface};
use crate::models::traits::SurfaceModel;
use crate::models::utils::price_option;
use crate::quotes::OptionType;

pub const DEFAULT_RISK_FREE_RATE: f64 = 0.01;

const DAYS_PER_YEAR: f64 = 365.0;

/// max(days from `now` to `expiry`, 0) / 365.
pub fn time_to_expiry_years(now: NaiveDate, expiry: NaiveDate) -> f64 {
    (expiry - now).num_days().max(0) as f64 / DAYS_PER_YEAR
}

/// Price one option off the surface. Always returns a non-negative value.
pub fn price(
    strike: f64,
    expiry_date: NaiveDate,
    option_type: OptionType,
    spot: f64,
    risk_free_rate: f64,
    params: &EssviParams,
    now: NaiveDate,
) -> f64 {
    let t_live = time_to_expiry_years(now, expiry_date);
    let surface = EssviSurface::new(*params);
    price_option(option_type, strike, spot, risk_free_rate, t_live, &surface).price
}

/// Market-data collaborator: latest traded price for an underlying, if any.
pub trait SpotProvider {
    fn latest_price(&self, symbol: &str) -> Option<f64>;
}

impl<F> SpotProvider for F
where
    F: Fn(&str) -> Option<f64>,
{
    fn latest_price(&self, symbol: &str) -> Option<f64> {
        self(symbol)
    }
}

/// Provider for offline use; never has a price.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMarketData;

impl SpotProvider for NoMarketData {
    fn latest_price(&self, _symbol: &str) -> Option<f64> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpotSource {
    /// Supplied on the request
    Override,
    /// Returned by the market-data provider
    Market,
    /// Neither was available; the strike stands in for spot
    StrikeFallback,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceRequest {
    pub strike: f64,
    pub expiry: NaiveDate,
    pub option_type: OptionType,
    pub spot: Option<f64>,
    pub risk_free_rate: Option<f64>,
}

impl PriceRequest {
    pub fn new(strike: f64, expiry: NaiveDate, option_type: OptionType) -> Self {
        Self {
            strike,
            expiry,
            option_type,
            spot: None,
            risk_free_rate: None,
        }
    }

    pub fn with_spot(mut self, spot: f64) -> Self {
        self.spot = Some(spot);
        self
    }

    pub fn with_rate(mut self, rate: f64) -> Self {
        self.risk_free_rate = Some(rate);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuotedPrice {
    pub price: f64,
    pub spot: f64,
    pub spot_source: SpotSource,
    pub time_to_expiry: f64,
    /// Surface volatility used, absent on the intrinsic and degenerate paths
    pub model_iv: Option<f64>,
}

impl QuotedPrice {
    /// True when spot fell back to the strike.
    pub fn is_degraded(&self) -> bool {
        self.spot_source == SpotSource::StrikeFallback
    }
}

/// Prices requests for one underlying against one calibrated surface.
///
/// Requests without their own rate are priced at `fixed_params.r`.
#[derive(Debug, Clone)]
pub struct Pricer<P: SpotProvider> {
    surface: EssviSurface,
    provider: P,
    symbol: String,
    fixed_params: FixedParameters,
}

impl<P: SpotProvider> Pricer<P> {
    pub fn new(params: EssviParams, provider: P, symbol: impl Into<String>) -> Self {
        Self {
            surface: EssviSurface::new(params),
            provider,
            symbol: symbol.into(),
            fixed_params: FixedParameters::default(),
        }
    }

    pub fn with_fixed_params(mut self, fixed_params: FixedParameters) -> Self {
        self.fixed_params = fixed_params;
        self
    }

    pub fn params(&self) -> &EssviParams {
        self.surface.parameters()
    }

    fn resolve_spot(&self, request: &PriceRequest) -> (f64, SpotSource) {
        if let Some(spot) = request.spot {
            return (spot, SpotSource::Override);
        }
        match self.provider.latest_price(&self.symbol) {
            Some(spot) if spot > 0.0 && spot.is_finite() => (spot, SpotSource::Market),
            _ => {
                warn!(
                    symbol = %self.symbol,
                    strike = request.strike,
                    "spot unavailable, falling back to strike; price is degraded"
                );
                (request.strike, SpotSource::StrikeFallback)
            }
        }
    }

    pub fn quote(&self, request: &PriceRequest, now: NaiveDate) -> SurfaceResult<QuotedPrice> {
        if !(request.strike > 0.0 && request.strike.is_finite()) {
            return Err(SurfaceError::invalid_input(format!(
                "strike must be positive and finite, got {}",
                request.strike
            )));
        }

        let (spot, spot_source) = self.resolve_spot(request);
        if !(spot > 0.0 && spot.is_finite()) {
            return Err(SurfaceError::invalid_input(format!(
                "spot must be positive and finite, got {}",
                spot
            )));
        }

        let r = request.risk_free_rate.unwrap_or(self.fixed_params.r);
        let t = time_to_expiry_years(now, request.expiry);
        let result = price_option(
            request.option_type,
            request.strike,
            spot,
            r,
            t,
            &self.surface,
        );

        Ok(QuotedPrice {
            price: result.price,
            spot,
            spot_source,
            time_to_expiry: t,
            model_iv: result.model_iv,
        })
    }
}
