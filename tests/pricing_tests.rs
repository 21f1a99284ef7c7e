
use std::cell::Cell;

use chrono::Duration;
use essvi_surface::models::bs::{bs_call_price, bs_put_price, intrinsic_value};
use essvi_surface::pricing::time_to_expiry_years;
use essvi_surface::{
    price, price_quotes, EssviParams, FixedParameters, NoMarketData, OptimizationConfig,
    OptionType, PriceRequest, Pricer, SpotSource, SurfaceError, DEFAULT_RISK_FREE_RATE,
};
use test_utils::{date, quote, reference_params};

/// a0 < 0 drives total variance negative everywhere.
fn degenerate_params() -> EssviParams {
    EssviParams {
        a0: -0.5,
        a1: 0.0,
        rho: 0.0,
        eta: 1.0,
    }
}

#[test]
fn test_black_scholes_reference_values() {
    let call = bs_call_price(100.0, 100.0, 0.05, 1.0, 0.2);
    let put = bs_put_price(100.0, 100.0, 0.05, 1.0, 0.2);
    assert!((call - 10.450583572185565).abs() < 1e-6, "call {}", call);
    assert!((put - 5.573526022256971).abs() < 1e-6, "put {}", put);

    assert_eq!(intrinsic_value(OptionType::Call, 110.0, 100.0), 10.0);
    assert_eq!(intrinsic_value(OptionType::Put, 110.0, 100.0), 0.0);
}

#[test]
fn test_time_to_expiry_years() {
    let today = date(2024, 1, 2);
    let tte = |days| time_to_expiry_years(today, today + Duration::days(days));
    assert_eq!(tte(0), 0.0);
    assert_eq!(tte(1), 1.0 / 365.0);
    assert_eq!(tte(365), 1.0);
    assert_eq!(tte(-10), 0.0);
}

#[test]
fn test_expired_options_price_at_intrinsic() {
    let today = date(2024, 1, 2);
    let params = reference_params();

    let call = price(100.0, today, OptionType::Call, 110.0, 0.01, &params, today);
    let put = price(100.0, today, OptionType::Put, 90.0, 0.01, &params, today);
    assert_eq!(call, 10.0);
    assert_eq!(put, 10.0);

    let past = today - Duration::days(30);
    let call = price(100.0, past, OptionType::Call, 90.0, 0.01, &params, today);
    let put = price(100.0, past, OptionType::Put, 90.0, 0.01, &params, today);
    assert_eq!(call, 0.0);
    assert_eq!(put, 10.0);

    // The surface is not consulted on the intrinsic path
    let params = degenerate_params();
    let call = price(100.0, today, OptionType::Call, 110.0, 0.01, &params, today);
    assert_eq!(call, 10.0);
}

#[test]
fn test_degenerate_variance_prices_at_zero() {
    let today = date(2024, 1, 2);
    let expiry = today + Duration::days(90);
    let params = degenerate_params();

    for option_type in [OptionType::Call, OptionType::Put] {
        for (strike, spot) in [(100.0, 100.0), (50.0, 100.0), (150.0, 100.0)] {
            let px = price(strike, expiry, option_type, spot, 0.01, &params, today);
            assert_eq!(px, 0.0, "{} K={} S={}", option_type, strike, spot);
        }
    }

    let nan = EssviParams {
        a0: f64::NAN,
        ..reference_params()
    };
    let px = price(100.0, expiry, OptionType::Call, 100.0, 0.01, &nan, today);
    assert_eq!(px, 0.0);
}

#[test]
fn test_prices_are_non_negative_and_monotone_in_strike() {
    let today = date(2024, 1, 2);
    let expiry = today + Duration::days(182);
    let params = reference_params();

    let strikes: Vec<f64> = (0..=20).map(|i| 60.0 + 4.0 * i as f64).collect();
    let calls: Vec<f64> = strikes
        .iter()
        .map(|&k| price(k, expiry, OptionType::Call, 100.0, 0.01, &params, today))
        .collect();
    let puts: Vec<f64> = strikes
        .iter()
        .map(|&k| price(k, expiry, OptionType::Put, 100.0, 0.01, &params, today))
        .collect();

    assert!(calls.iter().chain(&puts).all(|p| *p >= 0.0 && p.is_finite()));
    for w in calls.windows(2) {
        assert!(w[1] <= w[0] + 1e-12, "call prices must fall with strike");
    }
    for w in puts.windows(2) {
        assert!(w[1] + 1e-12 >= w[0], "put prices must rise with strike");
    }
}

#[test]
fn test_put_call_parity() {
    let today = date(2024, 1, 2);
    let expiry = today + Duration::days(146);
    let t = 146.0 / 365.0;
    let params = reference_params();
    let (spot, r) = (100.0, 0.03);

    for strike in [80.0, 95.0, 100.0, 105.0, 130.0] {
        let c = price(strike, expiry, OptionType::Call, spot, r, &params, today);
        let p = price(strike, expiry, OptionType::Put, spot, r, &params, today);
        let parity = spot - strike * (-r * t).exp();
        assert!(
            (c - p - parity).abs() < 1e-9,
            "K={}: C-P={} vs {}",
            strike,
            c - p,
            parity
        );
    }
}

#[test]
fn test_price_uses_surface_vol() {
    let today = date(2024, 1, 2);
    let expiry = today + Duration::days(365);
    let params = reference_params();

    let strike: f64 = 110.0;
    let spot: f64 = 100.0;
    let k = (strike / spot).ln();
    let sigma = (params.total_variance(k, 1.0) / 1.0).sqrt();
    let expected = bs_call_price(spot, strike, 0.01, 1.0, sigma);

    let px = price(strike, expiry, OptionType::Call, spot, 0.01, &params, today);
    assert!((px - expected).abs() < 1e-12);
}

#[test]
fn test_pricer_spot_override() {
    let today = date(2024, 1, 2);
    let pricer = Pricer::new(reference_params(), |_: &str| Some(200.0), "SPY");
    let expiry = today + Duration::days(30);
    let request = PriceRequest::new(100.0, expiry, OptionType::Call).with_spot(105.0);

    let q = pricer.quote(&request, today).unwrap();
    assert_eq!(q.spot, 105.0);
    assert_eq!(q.spot_source, SpotSource::Override);
    assert!(!q.is_degraded());
    assert!(q.model_iv.is_some());
}

#[test]
fn test_pricer_uses_provider_for_symbol() {
    let today = date(2024, 1, 2);
    let expiry = today + Duration::days(60);
    let calls = Cell::new(0);
    let provider = |symbol: &str| {
        calls.set(calls.get() + 1);
        (symbol == "QQQ").then_some(400.0)
    };
    let params = reference_params();
    let pricer = Pricer::new(params, provider, "QQQ");
    assert_eq!(pricer.params(), &params);

    let request = PriceRequest::new(410.0, expiry, OptionType::Put).with_rate(0.02);
    let q = pricer.quote(&request, today).unwrap();
    assert_eq!(calls.get(), 1);
    assert_eq!(q.spot, 400.0);
    assert_eq!(q.spot_source, SpotSource::Market);

    let expected = price(410.0, expiry, OptionType::Put, 400.0, 0.02, &params, today);
    assert_eq!(q.price, expected);
}

#[test]
fn test_pricer_falls_back_to_strike_and_flags_it() {
    let today = date(2024, 1, 2);
    let expiry = today + Duration::days(60);
    let params = reference_params();
    let pricer = Pricer::new(params, NoMarketData, "SPY");

    let q = pricer
        .quote(&PriceRequest::new(450.0, expiry, OptionType::Call), today)
        .unwrap();
    assert_eq!(q.spot, 450.0);
    assert_eq!(q.spot_source, SpotSource::StrikeFallback);
    assert!(q.is_degraded());

    let r = DEFAULT_RISK_FREE_RATE;
    let expected = price(450.0, expiry, OptionType::Call, 450.0, r, &params, today);
    assert_eq!(q.price, expected);

    // A non-positive market print is treated as unavailable
    let bad_feed = Pricer::new(reference_params(), |_: &str| Some(-1.0), "SPY");
    let q = bad_feed
        .quote(&PriceRequest::new(450.0, expiry, OptionType::Call), today)
        .unwrap();
    assert!(q.is_degraded());
}

#[test]
fn test_pricer_rejects_invalid_inputs() {
    let today = date(2024, 1, 2);
    let expiry = today + Duration::days(60);
    let pricer = Pricer::new(reference_params(), NoMarketData, "SPY");

    let err = pricer
        .quote(&PriceRequest::new(0.0, expiry, OptionType::Call), today)
        .unwrap_err();
    assert!(matches!(err, SurfaceError::InvalidInput(_)));

    let request = PriceRequest::new(100.0, expiry, OptionType::Call).with_spot(-5.0);
    let err = pricer.quote(&request, today).unwrap_err();
    assert!(matches!(err, SurfaceError::InvalidInput(_)));
}

#[test]
fn test_price_quotes_sorted_with_market_mids() {
    let params = reference_params();
    let quotes = vec![
        quote(OptionType::Call, 110.0, Some(0.2), 91),
        quote(OptionType::Put, 90.0, Some(0.25), 91),
        quote(OptionType::Call, 100.0, Some(0.22), 91),
        quote(OptionType::Put, 100.0, None, 0),
    ];

    let results = price_quotes(&params, &quotes, FixedParameters::default());
    assert_eq!(results.len(), 4);

    let strikes: Vec<f64> = results.iter().map(|r| r.strike).collect();
    assert_eq!(strikes, vec![90.0, 100.0, 100.0, 110.0]);
    assert!(results.iter().all(|r| r.market_mid == Some(1.0)));
    assert!(results.iter().all(|r| r.model_price >= 0.0));

    let expired = results
        .iter()
        .find(|r| r.time_to_expiry == 0.0)
        .expect("expired quote is priced");
    assert_eq!(expired.model_price, 0.0, "expired ATM put is worthless");
    assert_eq!(expired.model_iv, None);

    let live = results.iter().find(|r| r.strike == 110.0).unwrap();
    let expected = price(
        110.0,
        date(2024, 1, 2) + Duration::days(91),
        OptionType::Call,
        100.0,
        0.01,
        &params,
        date(2024, 1, 2),
    );
    assert!((live.model_price - expected).abs() < 1e-12);
}

#[test]
fn test_pricer_rate_comes_from_config_fixed_params() {
    let today = date(2024, 1, 2);
    let expiry = today + Duration::days(120);
    let params = reference_params();
    let config = OptimizationConfig::from_toml_str("[fixed_params]\nr = 0.05\n").unwrap();
    let fixed = config.fixed_params;
    let pricer = Pricer::new(params, NoMarketData, "SPY").with_fixed_params(fixed);

    let request = PriceRequest::new(95.0, expiry, OptionType::Call).with_spot(100.0);
    let q = pricer.quote(&request, today).unwrap();
    let at_config_rate = price(95.0, expiry, OptionType::Call, 100.0, 0.05, &params, today);
    let at_default_rate = price(95.0, expiry, OptionType::Call, 100.0, 0.01, &params, today);
    assert_eq!(q.price, at_config_rate);
    assert!(q.price > at_default_rate, "a higher rate lifts the call");

    // A rate on the request still wins
    let q = pricer.quote(&request.with_rate(0.01), today).unwrap();
    assert_eq!(q.price, at_default_rate);

    let quotes = [quote(OptionType::Call, 95.0, None, 120)];
    let results = price_quotes(&params, &quotes, fixed);
    assert!((results[0].model_price - at_config_rate).abs() < 1e-12);
}
