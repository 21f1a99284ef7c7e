pub mod bs;
pub mod essvi;

/// Common traits used by all surface models
pub mod traits {
    use crate::error::SurfaceResult;

    /// Surface model trait for total-variance and implied volatility calculations
    pub trait SurfaceModel {
        type Parameters;

        fn parameters(&self) -> &Self::Parameters;
        fn validate_params(&self) -> SurfaceResult<()>;
        /// Raw model total variance at log-moneyness `k` and maturity `t`.
        /// No domain restriction is applied; degenerate values are returned as-is.
        fn total_variance(&self, k: f64, t: f64) -> f64;
        fn check_calendar_arbitrage(&self, k: f64, t1: f64, t2: f64) -> SurfaceResult<()>;
        fn check_butterfly_arbitrage_at_k(&self, k: f64, t: f64) -> SurfaceResult<()>;
    }
}

/// Utility functions for option pricing and calculations
pub mod utils {
    use crate::models::bs::{bs_price, intrinsic_value};
    use crate::models::traits::SurfaceModel;
    use crate::quotes::OptionType;
    use tracing::debug;

    /// Calculate log-moneyness: ln(K/S)
    pub fn log_moneyness(strike: f64, spot: f64) -> f64 {
        (strike / spot).ln()
    }

    /// Option pricing result. `model_iv` is absent on the intrinsic and
    /// degenerate-variance paths.
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct OptionPricingResult {
        pub price: f64,
        pub model_iv: Option<f64>,
    }

    /// Price an option off a surface model.
    ///
    /// * `t <= 0`: intrinsic value, the surface is not consulted.
    /// * `w(k, t) <= 0`: priced at zero regardless of side or moneyness.
    /// * otherwise Black-Scholes with `σ = sqrt(w / t)`.
    pub fn price_option<T: SurfaceModel>(
        option_type: OptionType,
        strike: f64,
        spot: f64,
        r: f64,
        t: f64,
        model: &T,
    ) -> OptionPricingResult {
        if t <= 0.0 {
            return OptionPricingResult {
                price: intrinsic_value(option_type, spot, strike),
                model_iv: None,
            };
        }

        let k = log_moneyness(strike, spot);
        let total_var = model.total_variance(k, t);
        if total_var.is_nan() || total_var <= 0.0 {
            debug!(k, t, total_var, "degenerate total variance");
            return OptionPricingResult {
                price: 0.0,
                model_iv: None,
            };
        }

        let model_iv = (total_var / t).sqrt();
        let price = bs_price(option_type, spot, strike, r, t, model_iv).max(0.0);
        OptionPricingResult {
            price,
            model_iv: Some(model_iv),
        }
    }
}
