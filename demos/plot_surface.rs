// Example: plot_surface.rs
// Calibrates the surface to a normalized quotes CSV (or reads a stored
// parameter artifact) and writes implied-vol slices to an SVG.
//
// Usage:
//     cargo run --example plot_surface -- <options_clean.csv | essvi_params.csv> [out.svg]
//
// A file whose header starts with `a0,` is treated as a parameter artifact;
// anything else is read as normalized quotes and calibrated first.

use std::env;
use std::fs;

use anyhow::{bail, Result};
use essvi_surface::plot::{plot_iv_slices, PlotConfig};
use essvi_surface::quotes::io::read_normalized;
use essvi_surface::{
    calibrate_essvi_seeded, calibration_points, default_configs, read_artifact, CalibrationParams,
};

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        bail!("usage: plot_surface <csv_path> [out.svg]");
    }
    let input = &args[1];
    let output = args.get(2).map(String::as_str).unwrap_or("iv_slices.svg");

    let header = fs::read_to_string(input)?
        .lines()
        .next()
        .unwrap_or_default()
        .to_string();

    let params = if header.starts_with("a0,") {
        read_artifact(input)?.params
    } else {
        let quotes = read_normalized(input)?;
        let config = default_configs::fast();
        let points = calibration_points(&quotes, config.calibration_side);
        println!(
            "Calibrating on {} points from {} quotes",
            points.len(),
            quotes.len()
        );
        let result = calibrate_essvi_seeded(&points, &config, CalibrationParams::default())?;
        println!("Cost {:.6e}", result.cost);
        result.params
    };

    println!(
        "a0={:.6} a1={:.6} rho={:.4} eta={:.4}",
        params.a0, params.a1, params.rho, params.eta
    );

    let config = PlotConfig::default();
    plot_iv_slices(&params, output, &config)?;
    println!(
        "Wrote {} slices (T = {:?}) to {}",
        config.t_slices.len(),
        config.t_slices,
        output
    );
    Ok(())
}
