// Renders implied-volatility slices of a calibrated surface to SVG.

use plotters::prelude::*;
use std::path::Path;

use crate::error::{SurfaceError, SurfaceResult};
use crate::models::essvi::essvi_model::{total_variance_batch, EssviParams, EssviSurface};
use crate::models::traits::SurfaceModel;

#[derive(Debug, Clone)]
pub struct PlotConfig {
    /// Maturities (years) to draw one slice for
    pub t_slices: Vec<f64>,
    pub k_min: f64,
    pub k_max: f64,
    pub steps: usize,
    pub size: (u32, u32),
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            t_slices: vec![0.1, 0.5, 1.0, 2.0],
            k_min: -0.6,
            k_max: 0.6,
            steps: 100,
            size: (1024, 640),
        }
    }
}

/// `(k, σ(k, t))` points along one maturity slice, σ = sqrt(w / t).
/// Points with non-positive variance are skipped.
pub fn iv_slice(params: &EssviParams, t: f64, ks: &[f64]) -> SurfaceResult<Vec<(f64, f64)>> {
    let ts = vec![t; ks.len()];
    let ws = total_variance_batch(params, ks, &ts)?;
    Ok(ks
        .iter()
        .zip(ws)
        .filter(|(_, w)| *w > 0.0 && t > 0.0)
        .map(|(&k, w)| (k, (w / t).sqrt()))
        .collect())
}

fn k_grid(config: &PlotConfig) -> Vec<f64> {
    let steps = config.steps.max(1);
    (0..=steps)
        .map(|i| config.k_min + (config.k_max - config.k_min) * i as f64 / steps as f64)
        .collect()
}

fn plot_err<E: std::fmt::Display>(e: E) -> SurfaceError {
    SurfaceError::Plot(e.to_string())
}

/// Draw one implied-vol line per maturity in `config.t_slices`.
///
/// Parameters outside the model domain are rejected before anything is drawn.
pub fn plot_iv_slices<P: AsRef<Path>>(
    params: &EssviParams,
    path: P,
    config: &PlotConfig,
) -> SurfaceResult<()> {
    EssviSurface::new(*params).validate_params()?;

    let ks = k_grid(config);
    let slices = config
        .t_slices
        .iter()
        .map(|&t| iv_slice(params, t, &ks).map(|line| (t, line)))
        .collect::<SurfaceResult<Vec<_>>>()?;

    let (min_iv, max_iv) = slices
        .iter()
        .flat_map(|(_, line)| line.iter().map(|&(_, iv)| iv))
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if !min_iv.is_finite() || !max_iv.is_finite() {
        return Err(SurfaceError::Plot(
            "surface has no positive variance on the plot grid".to_string(),
        ));
    }
    let padding = ((max_iv - min_iv) * 0.05).max(1e-3);
    let y_min = (min_iv - padding).max(0.0);
    let y_max = max_iv + padding;

    let root = SVGBackend::new(path.as_ref(), config.size).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    let mut chart = ChartBuilder::on(&root)
        .margin(20)
        .caption(
            format!(
                "eSSVI implied vol | a0={:.4} a1={:.4} rho={:.3} eta={:.3}",
                params.a0, params.a1, params.rho, params.eta
            ),
            ("sans-serif", 24),
        )
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(config.k_min..config.k_max, y_min..y_max)
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .x_desc("Log-moneyness k")
        .y_desc("Implied Vol")
        .draw()
        .map_err(plot_err)?;

    for (i, (t, line)) in slices.into_iter().enumerate() {
        let style = Palette99::pick(i).to_rgba().stroke_width(2);
        chart
            .draw_series(std::iter::once(PathElement::new(line, style)))
            .map_err(plot_err)?
            .label(format!("T={}y", t))
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], style));
    }

    chart
        .configure_series_labels()
        .border_style(BLACK)
        .background_style(WHITE.mix(0.8))
        .draw()
        .map_err(plot_err)?;

    root.present().map_err(plot_err)?;
    Ok(())
}
