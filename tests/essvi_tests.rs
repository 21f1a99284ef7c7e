
use essvi_surface::calibration::artifact::{read_artifact_from, write_artifact_to};
use essvi_surface::{
    calibrate, calibrate_essvi, calibrate_essvi_seeded, calibration_points, evaluate_essvi,
    read_artifact, to_calibration_point, total_variance_batch, write_artifact, CalibrationParams,
    CalibrationPoint, CalibrationResult, CalibrationSide, EssviParamBounds, EssviParams,
    EssviSurface, OptimizationConfig, OptionType, SurfaceError,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use test_utils::{create_test_config, noisy_points, quote, reference_params, synthetic_points};

#[test]
fn test_total_variance_formula() {
    let params = EssviParams::new(0.04, 0.1, 0.0, 1.5).unwrap();
    // At k = 0 with no skew the bracket is 1 + sqrt(4) = 3
    let w = params.total_variance(0.0, 1.0);
    assert!((w - 1.5 * 0.14).abs() < 1e-15, "w = {}", w);

    let skewed = reference_params();
    let (k, t): (f64, f64) = (0.2, 0.5);
    let theta = 0.04 + 0.1 * t;
    let u = 1.5 * k - 0.4;
    let expected = 0.5 * theta * (1.0 - 0.4 * 1.5 * k + (u * u + 4.0 * (1.0 - 0.16)).sqrt());
    assert!((skewed.total_variance(k, t) - expected).abs() < 1e-15);
}

#[test]
fn test_total_variance_is_deterministic_and_batch_consistent() {
    let params = reference_params();
    let mut rng = StdRng::seed_from_u64(11);
    let ks: Vec<f64> = (0..200).map(|_| rng.gen_range(-2.0..2.0)).collect();
    let ts: Vec<f64> = (0..200).map(|_| rng.gen_range(0.01..3.0)).collect();

    let batch = total_variance_batch(&params, &ks, &ts).unwrap();
    for ((&k, &t), &w) in ks.iter().zip(&ts).zip(&batch) {
        assert_eq!(params.total_variance(k, t), w);
        assert_eq!(params.total_variance(k, t), params.total_variance(k, t));
    }

    let surface = EssviSurface::new(params);
    assert_eq!(surface.total_variance_batch(&ks, &ts).unwrap(), batch);
}

#[test]
fn test_batch_length_mismatch_is_rejected() {
    let err = total_variance_batch(&reference_params(), &[0.0, 0.1], &[1.0]).unwrap_err();
    assert!(matches!(err, SurfaceError::InvalidInput(_)));
}

#[test]
fn test_radicand_positive_inside_rho_bounds() {
    let mut rng = StdRng::seed_from_u64(5);
    for _ in 0..1000 {
        let params = EssviParams {
            a0: 0.04,
            a1: 0.1,
            rho: rng.gen_range(-0.999..0.999),
            eta: rng.gen_range(1e-6..100.0),
        };
        let k = rng.gen_range(-5.0..5.0);
        let radicand = params.radicand(k);
        assert!(
            radicand > 0.0,
            "radicand {} at rho={} eta={} k={}",
            radicand,
            params.rho,
            params.eta,
            k
        );
        assert!(params.total_variance(k, 1.0) > 0.0);
    }
}

#[test]
fn test_param_validation() {
    assert!(EssviParams::new(0.04, 0.1, -0.4, 1.5).is_ok());
    assert!(matches!(
        EssviParams::new(0.0, 0.1, -0.4, 1.5),
        Err(SurfaceError::InvalidParameters(_))
    ));
    assert!(EssviParams::new(0.04, -0.1, -0.4, 1.5).is_err());
    assert!(EssviParams::new(0.04, 0.1, 1.0, 1.5).is_err());
    assert!(EssviParams::new(0.04, 0.1, -0.4, 0.0).is_err());
    assert!(EssviParams::new(f64::NAN, 0.1, -0.4, 1.5).is_err());
    assert!(EssviParams::from_slice(&[0.04, 0.1, -0.4]).is_err());
    assert_eq!(
        EssviParams::from_slice(&[0.04, 0.1, -0.4, 1.5]).unwrap(),
        reference_params()
    );
}

#[test]
fn test_gradient_matches_finite_differences() {
    let params = reference_params();
    let h = 1e-7;
    for &(k, t) in &[(-0.4, 0.25), (0.0, 1.0), (0.3, 2.0)] {
        let analytic = params.gradient(k, t);
        let base = params.to_vec();
        for i in 0..4 {
            let mut up = base.clone();
            let mut down = base.clone();
            up[i] += h;
            down[i] -= h;
            let w_up = EssviParams::from_slice(&up).unwrap().total_variance(k, t);
            let w_down = EssviParams::from_slice(&down).unwrap().total_variance(k, t);
            let numeric = (w_up - w_down) / (2.0 * h);
            assert!(
                (analytic[i] - numeric).abs() < 1e-6,
                "d/dp{} at k={} t={}: analytic {} vs numeric {}",
                i,
                k,
                t,
                analytic[i],
                numeric
            );
        }
    }
}

#[test]
fn test_implied_vol_slice() {
    let surface = EssviSurface::new(reference_params());
    assert_eq!(surface.implied_vol(0.0, 0.0), None);
    assert_eq!(surface.implied_vol(0.0, -1.0), None);

    let iv = surface.implied_vol(0.0, 1.0).unwrap();
    let w = reference_params().total_variance(0.0, 1.0);
    assert!((iv * iv - w).abs() < 1e-15);

    // Negative skew: downside strikes carry more vol
    let downside = surface.implied_vol(-0.3, 0.5).unwrap();
    let upside = surface.implied_vol(0.3, 0.5).unwrap();
    assert!(downside > upside);
}

#[test]
fn test_arbitrage_report() {
    let ks: Vec<f64> = (-5..=5).map(|i| i as f64 * 0.1).collect();
    let ts = [0.1, 0.5, 1.0, 2.0];

    let clean = EssviSurface::new(reference_params()).arbitrage_report(&ks, &ts);
    assert!(
        clean.calendar_violations.is_empty(),
        "increasing theta never violates calendar ordering"
    );

    // a1 < 0 makes total variance shrink with maturity
    let shrinking = EssviSurface::new(EssviParams {
        a0: 0.2,
        a1: -0.05,
        rho: -0.4,
        eta: 1.5,
    });
    let report = shrinking.arbitrage_report(&ks, &ts);
    assert!(!report.is_clean());
    assert_eq!(report.calendar_violations.len(), ks.len() * (ts.len() - 1));
}

#[test]
fn test_to_calibration_point() {
    let q = quote(OptionType::Call, 110.0, Some(0.2), 73);
    let p = to_calibration_point(&q).unwrap();
    let t = 73.0 / 365.0;
    assert!((p.k - (1.1f64).ln()).abs() < 1e-15);
    assert_eq!(p.t, t);
    assert!((p.w - 0.04 * t).abs() < 1e-15);

    let call_point = |strike, iv| to_calibration_point(&quote(OptionType::Call, strike, iv, 73));
    assert!(call_point(110.0, None).is_none());
    assert!(call_point(110.0, Some(0.0)).is_none());
    assert!(call_point(110.0, Some(-0.1)).is_none());
    assert!(call_point(0.0, Some(0.2)).is_none());

    let mut no_spot = quote(OptionType::Put, 110.0, Some(0.2), 73);
    no_spot.underlying_last = 0.0;
    assert!(to_calibration_point(&no_spot).is_none());
}

#[test]
fn test_calibration_points_side_selection() {
    let quotes = vec![
        quote(OptionType::Call, 90.0, Some(0.25), 30),
        quote(OptionType::Put, 90.0, Some(0.26), 30),
        quote(OptionType::Call, 100.0, None, 30),
        quote(OptionType::Put, 100.0, Some(0.22), 30),
        quote(OptionType::Call, 110.0, Some(0.2), 30),
    ];

    let calls = calibration_points(&quotes, CalibrationSide::Calls);
    assert_eq!(calls.len(), 2);
    assert!(calls[0].k < calls[1].k);

    assert_eq!(calibration_points(&quotes, CalibrationSide::Puts).len(), 2);
    assert_eq!(calibration_points(&quotes, CalibrationSide::Both).len(), 4);
    assert_eq!(CalibrationSide::default(), CalibrationSide::Calls);
}

#[test]
fn test_calibration_recovers_reference_surface() {
    let truth = reference_params();
    let points = synthetic_points(&truth);
    let config = create_test_config();
    let mut rng = StdRng::seed_from_u64(42);

    let result = calibrate_essvi(&points, &config, CalibrationParams::default(), &mut rng)
        .expect("calibration should succeed");
    let p = result.params;

    println!("Recovered: {:?} cost {:.3e}", p, result.cost);
    assert_eq!(result.num_points, points.len());
    assert!(result.cost.is_finite() && result.cost >= 0.0);
    assert!(
        result.cost < 1e-10,
        "cost {} should be near zero on exact data",
        result.cost
    );
    assert!((p.a0 - truth.a0).abs() < 5e-3, "a0 {}", p.a0);
    assert!((p.a1 - truth.a1).abs() < 5e-3, "a1 {}", p.a1);
    assert!((p.rho - truth.rho).abs() < 5e-2, "rho {}", p.rho);
    assert!((p.eta - truth.eta).abs() < 5e-2, "eta {}", p.eta);
}

#[test]
fn test_calibration_on_noisy_data_beats_truth() {
    let truth = reference_params();
    let points = noisy_points(&truth, 0.02, 99);
    let config = create_test_config();

    let result = calibrate_essvi_seeded(&points, &config, CalibrationParams::default())
        .expect("calibration should succeed");
    let truth_cost = evaluate_essvi(&points, &truth).unwrap();

    println!(
        "Calibrated cost {:.6e}, truth cost {:.6e}",
        result.cost, truth_cost
    );
    assert!(result.cost <= truth_cost * 1.01 + 1e-14);

    let baseline = EssviParams::new(0.1, 0.0, 0.0, 1.0).unwrap();
    assert!(result.cost < evaluate_essvi(&points, &baseline).unwrap());
    assert!(
        (evaluate_essvi(&points, &result.params).unwrap() - result.cost).abs() < 1e-12,
        "reported cost must match the objective at the returned params"
    );
}

#[test]
fn test_calibration_recovers_parameters_under_noise() {
    let truth = reference_params();

    for seed in 0..5 {
        let points = noisy_points(&truth, 0.01, seed);
        let mut rng = StdRng::seed_from_u64(seed);
        let p = calibrate(&points, 5, &mut rng).unwrap().params;

        println!("seed {}: {:?}", seed, p);
        assert!((p.a0 - truth.a0).abs() < 0.01, "{:?}", p);
        assert!((p.a1 - truth.a1).abs() < 0.01, "{:?}", p);
        assert!((p.rho - truth.rho).abs() < 0.05, "{:?}", p);
        assert!((p.eta - truth.eta).abs() < 0.1, "{:?}", p);
    }
}

#[test]
fn test_calibration_is_reproducible_for_a_seed() {
    let points = noisy_points(&reference_params(), 0.05, 3);
    let config = OptimizationConfig::minimal();

    let run = |seed: u64| {
        let mut rng = StdRng::seed_from_u64(seed);
        calibrate_essvi(&points, &config, CalibrationParams::default(), &mut rng).unwrap()
    };
    assert_eq!(run(8), run(8));
}

#[test]
fn test_calibration_respects_bounds() {
    let points = synthetic_points(&reference_params());
    let bounds = EssviParamBounds {
        rho: (-0.2, 0.2),
        eta: (0.5, 1.0),
        ..EssviParamBounds::default()
    };
    let calib_params = CalibrationParams {
        param_bounds: Some(bounds.clone()),
        ..CalibrationParams::default()
    };

    let result = calibrate_essvi_seeded(&points, &create_test_config(), calib_params).unwrap();
    let p = result.params;
    assert!(p.rho >= bounds.rho.0 && p.rho <= bounds.rho.1);
    assert!(p.eta >= bounds.eta.0 && p.eta <= bounds.eta.1);
    assert!(p.a0 >= bounds.a0.0 && p.a0 <= bounds.a0.1);
    assert!(p.a1 >= bounds.a1.0 && p.a1 <= bounds.a1.1);
}

#[test]
fn test_calibrate_with_attempt_count() {
    let points = synthetic_points(&reference_params());
    let mut rng = StdRng::seed_from_u64(1);
    let result = calibrate(&points, 3, &mut rng).unwrap();
    assert!(result.cost < 1e-8);

    let err = calibrate(&points, 0, &mut rng).unwrap_err();
    assert!(matches!(err, SurfaceError::InvalidInput(_)));
}

#[test]
fn test_empty_input_is_insufficient_data() {
    let mut rng = StdRng::seed_from_u64(1);
    let err = calibrate(&[], 5, &mut rng).unwrap_err();
    assert!(
        matches!(err, SurfaceError::InsufficientData(_)),
        "got {:?}",
        err
    );
}

#[test]
fn test_non_finite_market_data_fails_calibration() {
    let points = vec![
        CalibrationPoint {
            k: 0.0,
            t: 0.5,
            w: f64::NAN,
        },
        CalibrationPoint {
            k: 0.1,
            t: 0.5,
            w: 0.02,
        },
    ];
    let mut rng = StdRng::seed_from_u64(1);
    let err = calibrate(&points, 4, &mut rng).unwrap_err();
    assert!(
        matches!(err, SurfaceError::CalibrationFailed { attempts: 4 }),
        "got {:?}",
        err
    );
}

#[test]
fn test_artifact_round_trip() {
    let result = CalibrationResult {
        params: reference_params(),
        cost: 1.25e-7,
        num_points: 55,
    };

    let mut buf = Vec::new();
    write_artifact_to(&mut buf, &result).unwrap();
    let text = String::from_utf8(buf.clone()).unwrap();
    assert_eq!(
        text.lines().next().unwrap(),
        "a0,a1,rho,eta,residual,num_points"
    );
    assert_eq!(read_artifact_from(buf.as_slice()).unwrap(), result);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("essvi_params.csv");
    write_artifact(&path, &result).unwrap();
    assert_eq!(read_artifact(&path).unwrap(), result);
}

#[test]
fn test_artifact_rejects_bad_rows() {
    let empty = "a0,a1,rho,eta,residual,num_points\n";
    assert!(matches!(
        read_artifact_from(empty.as_bytes()),
        Err(SurfaceError::InvalidInput(_))
    ));

    let bad_rho = "a0,a1,rho,eta,residual,num_points\n0.04,0.1,1.5,1.5,0.0,10\n";
    assert!(matches!(
        read_artifact_from(bad_rho.as_bytes()),
        Err(SurfaceError::InvalidParameters(_))
    ));
}

#[test]
fn test_optimization_config_from_toml() {
    let text = r#"
        attempts = 3
        seed = 7
        calibration_side = "both"
        lbfgsb_polish = false

        [lm]
        max_iterations = 50

        [fixed_params]
        r = 0.02
    "#;
    let config = OptimizationConfig::from_toml_str(text).unwrap();
    assert_eq!(config.attempts, 3);
    assert_eq!(config.seed, 7);
    assert_eq!(config.calibration_side, CalibrationSide::Both);
    assert!(!config.lbfgsb_polish);
    assert_eq!(config.lm.max_iterations, 50);
    assert_eq!(config.lm.lambda_up, 10.0, "unset keys keep defaults");
    assert_eq!(config.fixed_params.r, 0.02);
    assert_eq!(config.tolerance, OptimizationConfig::default().tolerance);

    let defaults = OptimizationConfig::from_toml_str("").unwrap();
    assert_eq!(defaults.attempts, 5);
    assert_eq!(defaults.calibration_side, CalibrationSide::Calls);
    assert_eq!(defaults.fixed_params.r, 0.01);

    assert!(matches!(
        OptimizationConfig::from_toml_str("attempts = \"many\""),
        Err(SurfaceError::Config(_))
    ));
}

#[test]
fn test_optimization_config_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("calibration.toml");
    std::fs::write(&path, "attempts = 12\n").unwrap();
    assert_eq!(OptimizationConfig::from_file(&path).unwrap().attempts, 12);

    assert!(matches!(
        OptimizationConfig::from_file(dir.path().join("missing.toml")),
        Err(SurfaceError::Io(_))
    ));
}

#[test]
fn test_plot_iv_slices_writes_svg() {
    use essvi_surface::plot::{iv_slice, plot_iv_slices, PlotConfig};

    let params = reference_params();
    let ks = [-0.2, 0.0, 0.2];
    let slice = iv_slice(&params, 0.5, &ks).unwrap();
    assert_eq!(slice.len(), 3);
    for (&(k, iv), &k_in) in slice.iter().zip(&ks) {
        assert_eq!(k, k_in);
        let w = params.total_variance(k, 0.5);
        assert!((iv * iv * 0.5 - w).abs() < 1e-14);
    }
    assert!(iv_slice(&params, 0.0, &ks).unwrap().is_empty());

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("iv_slices.svg");
    plot_iv_slices(&params, &path, &PlotConfig::default()).expect("plot should render");
    let svg = std::fs::read_to_string(&path).unwrap();
    assert!(svg.contains("<svg"));
    assert!(svg.contains("<polyline") || svg.contains("<path"));

    let expired_only = PlotConfig {
        t_slices: vec![0.0],
        ..PlotConfig::default()
    };
    assert!(matches!(
        plot_iv_slices(&params, dir.path().join("empty.svg"), &expired_only),
        Err(SurfaceError::Plot(_))
    ));
}

#[test]
fn test_plot_rejects_invalid_params() {
    use essvi_surface::plot::{plot_iv_slices, PlotConfig};

    let degenerate = EssviParams {
        a0: -1.0,
        a1: 0.0,
        rho: 0.0,
        eta: 1.0,
    };
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("degenerate.svg");

    let err = plot_iv_slices(&degenerate, &path, &PlotConfig::default()).unwrap_err();
    assert!(matches!(err, SurfaceError::InvalidParameters(_)));
    assert!(!path.exists(), "nothing is drawn for invalid params");
}
