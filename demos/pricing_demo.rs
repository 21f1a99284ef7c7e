// demos/pricing_demo.rs

//! Demonstration of eSSVI surface calibration and option pricing
//!
//! This example shows how to:
//! 1. Build a synthetic market snapshot across several maturities
//! 2. Calibrate the eSSVI surface parameters
//! 3. Price options off the calibrated surface
//! 4. Compare model prices against the market mids

use anyhow::Result;
use chrono::{Duration, NaiveDate};
use essvi_surface::models::bs::bs_price;
use essvi_surface::{
    calibrate_essvi_seeded, calibration_points, default_configs, price_quotes, CalibrationParams,
    CalibrationSide, EssviParams, NormalizedQuote, OptionType, PriceRequest, Pricer, SpotProvider,
};

const SPOT: f64 = 4500.0;
const RATE: f64 = 0.01;

fn main() -> Result<()> {
    println!("eSSVI Surface Calibration and Pricing Demo");
    println!("==========================================");

    let today = NaiveDate::from_ymd_opt(2024, 1, 2).expect("valid date");
    let quotes = create_demo_data(today)?;

    println!("Market data loaded: {} quotes", quotes.len());
    println!("Underlying price: ${:.0}", SPOT);

    let config = default_configs::fast();
    let points = calibration_points(&quotes, CalibrationSide::Calls);

    println!("\nStep 1: Calibrating on {} call points...", points.len());
    let result = calibrate_essvi_seeded(&points, &config, CalibrationParams::default())?;

    println!("Calibration completed!");
    println!("  Cost: {:.6e}", result.cost);
    println!("  a0  (variance intercept): {:.6}", result.params.a0);
    println!("  a1  (variance slope):     {:.6}", result.params.a1);
    println!("  rho (skew):               {:.6}", result.params.rho);
    println!("  eta (curvature):          {:.6}", result.params.eta);

    println!("\nStep 2: Repricing the market snapshot...");
    let priced = price_quotes(&result.params, &quotes, config.fixed_params);

    println!(
        "{:<6} {:>8} {:>7} {:>10} {:>10} {:>8}",
        "Side", "Strike", "T", "Model", "Market", "IV"
    );
    for p in priced.iter().filter(|p| p.time_to_expiry < 0.1) {
        println!(
            "{:<6} {:>8.0} {:>7.4} {:>10.4} {:>10.4} {:>8.4}",
            p.option_type,
            p.strike,
            p.time_to_expiry,
            p.model_price,
            p.market_mid.unwrap_or(f64::NAN),
            p.model_iv.unwrap_or(f64::NAN)
        );
    }

    println!("\nStep 3: Pricing off-grid options with a live spot feed...");
    let feed = |symbol: &str| (symbol == "SPX").then_some(SPOT * 1.01);
    let pricer = Pricer::new(result.params, feed, "SPX").with_fixed_params(config.fixed_params);
    println!("  Feed spot for SPX: {:?}", feed.latest_price("SPX"));

    let expiry = today + Duration::days(200);
    for strike in [4200.0, 4500.0, 4800.0] {
        for side in [OptionType::Call, OptionType::Put] {
            let q = pricer.quote(&PriceRequest::new(strike, expiry, side), today)?;
            println!(
                "  {} K={:.0} T={:.4}: price {:.4} (spot {:.2}, {:?})",
                side, strike, q.time_to_expiry, q.price, q.spot, q.spot_source
            );
        }
    }

    Ok(())
}

/// Quotes generated from a known surface so the fit can be judged by eye.
fn create_demo_data(today: NaiveDate) -> Result<Vec<NormalizedQuote>> {
    let truth = EssviParams::new(0.03, 0.02, -0.5, 1.8)?;
    let surface_iv = |k: f64, t: f64| (truth.total_variance(k, t) / t).sqrt();

    let mut quotes = Vec::new();
    for days in [30_i64, 91, 182, 365] {
        let expire_date = today + Duration::days(days);
        let t = days as f64 / 365.0;
        for strike in (0..13).map(|i| 3900.0 + 100.0 * i as f64) {
            let iv = surface_iv((strike / SPOT).ln(), t);
            for option_type in [OptionType::Call, OptionType::Put] {
                let mid = bs_price(option_type, SPOT, strike, RATE, t, iv);
                quotes.push(NormalizedQuote {
                    quote_date: today,
                    expire_date,
                    option_type,
                    strike,
                    underlying_last: SPOT,
                    implied_vol: Some(iv),
                    mid_price: Some(mid),
                    time_to_expiry_years: t,
                });
            }
        }
    }
    Ok(quotes)
}
