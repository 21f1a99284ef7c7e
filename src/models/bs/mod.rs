// A minimal Black-Scholes implementation providing the call and put closed forms
// used by the surface pricer. European exercise, flat rate, no dividends.

use crate::quotes::OptionType;

fn norm_cdf(x: f64) -> f64 {
    // 0.5 * [1 + erf(x / sqrt(2))]
    0.5 * (1.0 + libm::erf(x / (2.0_f64).sqrt()))
}

/// Payoff at immediate expiry.
pub fn intrinsic_value(option_type: OptionType, spot: f64, strike: f64) -> f64 {
    match option_type {
        OptionType::Call => (spot - strike).max(0.0),
        OptionType::Put => (strike - spot).max(0.0),
    }
}

#[allow(non_snake_case)]
fn d1_d2(S: f64, K: f64, r: f64, T: f64, sigma: f64) -> (f64, f64) {
    let sqrt_t = T.sqrt();
    let d1 = ((S / K).ln() + (r + 0.5 * sigma * sigma) * T) / (sigma * sqrt_t);
    (d1, d1 - sigma * sqrt_t)
}

/// Price of a European call option under Black-Scholes assumptions.
#[allow(non_snake_case)]
pub fn bs_call_price(S: f64, K: f64, r: f64, T: f64, sigma: f64) -> f64 {
    if T <= 0.0 || sigma <= 0.0 {
        return intrinsic_value(OptionType::Call, S, K);
    }
    let (d1, d2) = d1_d2(S, K, r, T, sigma);
    S * norm_cdf(d1) - K * (-r * T).exp() * norm_cdf(d2)
}

/// Price of a European put option under Black-Scholes assumptions.
#[allow(non_snake_case)]
pub fn bs_put_price(S: f64, K: f64, r: f64, T: f64, sigma: f64) -> f64 {
    if T <= 0.0 || sigma <= 0.0 {
        return intrinsic_value(OptionType::Put, S, K);
    }
    let (d1, d2) = d1_d2(S, K, r, T, sigma);
    K * (-r * T).exp() * norm_cdf(-d2) - S * norm_cdf(-d1)
}

#[allow(non_snake_case)]
pub fn bs_price(option_type: OptionType, S: f64, K: f64, r: f64, T: f64, sigma: f64) -> f64 {
    match option_type {
        OptionType::Call => bs_call_price(S, K, r, T, sigma),
        OptionType::Put => bs_put_price(S, K, r, T, sigma),
    }
}
