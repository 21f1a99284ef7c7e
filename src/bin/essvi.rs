//! eSSVI surface command-line tool
//!
//! # Usage
//!
//! ```bash
//! # Normalize a raw option chain
//! essvi normalize --input options_raw.csv --output options_clean.csv
//!
//! # Calibrate the surface from normalized quotes
//! essvi calibrate --input options_clean.csv --output essvi_params.csv --preset fast
//!
//! # Price one option off the stored surface
//! essvi price --params essvi_params.csv --strike 480 --expiry 2024-06-21 --spot 475
//!
//! # Plot implied-vol slices
//! essvi plot --params essvi_params.csv --output iv_slices.svg
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

use essvi_surface::plot::{plot_iv_slices, PlotConfig};
use essvi_surface::quotes::io::{read_normalized, read_raw_table, write_normalized};
use essvi_surface::{
    calibrate_essvi_seeded, calibration_points, normalize, read_artifact, write_artifact,
    CalibrationParams, CalibrationSide, ColumnAliases, FixedParameters, NoMarketData,
    OptimizationConfig, OptionType, PriceRequest, Pricer,
};

const SEPARATOR: &str = "============================================================";

#[derive(Parser)]
#[command(name = "essvi")]
#[command(about = "Calibrate an eSSVI surface and price options off it")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Preset {
    Production,
    Fast,
    Research,
    Minimal,
}

#[derive(Clone, Copy, ValueEnum)]
enum Side {
    Calls,
    Puts,
    Both,
}

impl From<Side> for CalibrationSide {
    fn from(side: Side) -> Self {
        match side {
            Side::Calls => CalibrationSide::Calls,
            Side::Puts => CalibrationSide::Puts,
            Side::Both => CalibrationSide::Both,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Reshape a raw option chain into one record per (date, expiry, strike, side)
    Normalize {
        #[arg(long, default_value = "options_raw.csv")]
        input: PathBuf,

        #[arg(long, default_value = "options_clean.csv")]
        output: PathBuf,
    },

    /// Fit the surface to normalized quotes
    Calibrate {
        #[arg(long, default_value = "options_clean.csv")]
        input: PathBuf,

        #[arg(long, default_value = "essvi_params.csv")]
        output: PathBuf,

        /// TOML optimization config; takes precedence over --preset
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long, value_enum, default_value = "production")]
        preset: Preset,

        /// Override the number of randomized attempts
        #[arg(long)]
        attempts: Option<usize>,

        /// Override the start-point seed
        #[arg(long)]
        seed: Option<u64>,

        /// Which option side feeds the fit
        #[arg(long, value_enum)]
        side: Option<Side>,
    },

    /// Price one option off a stored surface
    Price {
        #[arg(long, default_value = "essvi_params.csv")]
        params: PathBuf,

        #[arg(long)]
        strike: f64,

        /// Expiry date (YYYY-MM-DD)
        #[arg(long)]
        expiry: NaiveDate,

        /// call or put
        #[arg(long, default_value = "call")]
        side: OptionType,

        /// Underlying price; falls back to the strike when absent
        #[arg(long)]
        spot: Option<f64>,

        /// Risk-free rate; defaults to the config's fixed_params.r
        #[arg(long)]
        rate: Option<f64>,

        /// TOML config supplying [fixed_params]
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long, default_value = "SPY")]
        symbol: String,

        /// Valuation date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        asof: Option<NaiveDate>,
    },

    /// Render implied-vol slices of a stored surface to SVG
    Plot {
        #[arg(long, default_value = "essvi_params.csv")]
        params: PathBuf,

        #[arg(long, default_value = "iv_slices.svg")]
        output: PathBuf,
    },
}

fn load_config(path: &Path) -> Result<OptimizationConfig> {
    OptimizationConfig::from_file(path)
        .with_context(|| format!("loading config {}", path.display()))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("essvi_surface=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Normalize { input, output } => {
            let table = read_raw_table(&input)
                .with_context(|| format!("reading raw chain {}", input.display()))?;
            let normalized = normalize(&table, &ColumnAliases::default());
            write_normalized(&output, &normalized.quotes)
                .with_context(|| format!("writing {}", output.display()))?;

            let report = normalized.report;
            println!("{}", SEPARATOR);
            println!("Rows read:        {}", report.rows_in);
            println!("Side candidates:  {}", report.candidates);
            println!("Records kept:     {}", report.kept);
            println!("Records dropped:  {}", report.dropped());
            println!("Output:           {}", output.display());
        }

        Commands::Calibrate {
            input,
            output,
            config,
            preset,
            attempts,
            seed,
            side,
        } => {
            let mut opt = match config {
                Some(path) => load_config(&path)?,
                None => match preset {
                    Preset::Production => OptimizationConfig::production(),
                    Preset::Fast => OptimizationConfig::fast(),
                    Preset::Research => OptimizationConfig::research(),
                    Preset::Minimal => OptimizationConfig::minimal(),
                },
            };
            if let Some(attempts) = attempts {
                opt.attempts = attempts;
            }
            if let Some(seed) = seed {
                opt.seed = seed;
            }
            if let Some(side) = side {
                opt.calibration_side = side.into();
            }

            let quotes = read_normalized(&input)
                .with_context(|| format!("reading normalized quotes {}", input.display()))?;
            let points = calibration_points(&quotes, opt.calibration_side);
            info!(
                quotes = quotes.len(),
                points = points.len(),
                "prepared calibration points"
            );

            let result = calibrate_essvi_seeded(&points, &opt, CalibrationParams::default())?;
            write_artifact(&output, &result)
                .with_context(|| format!("writing {}", output.display()))?;

            let p = result.params;
            println!("{}", SEPARATOR);
            println!("a0   = {:.6}", p.a0);
            println!("a1   = {:.6}", p.a1);
            println!("rho  = {:.6}", p.rho);
            println!("eta  = {:.6}", p.eta);
            println!("cost = {:.6e} ({} points)", result.cost, result.num_points);
            println!("Saved to {}", output.display());
        }

        Commands::Price {
            params,
            strike,
            expiry,
            side,
            spot,
            rate,
            config,
            symbol,
            asof,
        } => {
            let fixed = match config {
                Some(path) => load_config(&path)?.fixed_params,
                None => FixedParameters::default(),
            };
            let stored = read_artifact(&params)
                .with_context(|| format!("reading surface {}", params.display()))?;
            let pricer = Pricer::new(stored.params, NoMarketData, symbol).with_fixed_params(fixed);

            let mut request = PriceRequest::new(strike, expiry, side);
            if let Some(spot) = spot {
                request = request.with_spot(spot);
            }
            if let Some(rate) = rate {
                request = request.with_rate(rate);
            }

            let now = asof.unwrap_or_else(|| Local::now().date_naive());
            let quoted = pricer.quote(&request, now)?;

            println!("{}", SEPARATOR);
            println!(
                "{} K={} expiry={} (T={:.4}y)",
                side, strike, expiry, quoted.time_to_expiry
            );
            println!("Spot:   {:.4} ({:?})", quoted.spot, quoted.spot_source);
            match quoted.model_iv {
                Some(iv) => println!("IV:     {:.4}", iv),
                None => println!("IV:     n/a"),
            }
            println!("Price:  {:.4}", quoted.price);
            if quoted.is_degraded() {
                println!("WARNING: spot unavailable, strike used in its place");
            }
        }

        Commands::Plot { params, output } => {
            let stored = read_artifact(&params)
                .with_context(|| format!("reading surface {}", params.display()))?;
            plot_iv_slices(&stored.params, &output, &PlotConfig::default())?;
            println!("Saved plot to {}", output.display());
        }
    }

    Ok(())
}
