use crate::calibration::config::OptimizationConfig;
use crate::calibration::lm::{levenberg_marquardt, project, Termination};
use crate::calibration::types::ModelCalibrator;
use crate::error::{SurfaceError, SurfaceResult};
use cmaes_lbfgsb::lbfgsb_optimize::lbfgsb_optimize;
use rand::Rng;
use tracing::{debug, info, trace, warn};

/// Result of one randomized attempt
#[derive(Debug, Clone)]
pub struct AttemptOutcome {
    pub index: usize,
    pub initial: Vec<f64>,
    pub params: Vec<f64>,
    pub cost: f64,
    pub iterations: usize,
    pub termination: Termination,
    /// Levenberg-Marquardt stopped on one of its tolerances
    pub converged: bool,
    pub polished: bool,
}

fn sample_uniform<R: Rng + ?Sized>(rng: &mut R, (lo, hi): (f64, f64)) -> f64 {
    if hi > lo {
        rng.gen_range(lo..hi)
    } else {
        lo
    }
}

/// Draw every attempt's start point up front, projected onto the bounds.
///
/// Drawing before any attempt runs keeps the start points, and therefore the
/// selected result, independent of the order attempts are evaluated in.
pub fn draw_initial_guesses<R: Rng + ?Sized>(
    model: &dyn ModelCalibrator,
    attempts: usize,
    rng: &mut R,
) -> Vec<Vec<f64>> {
    let ranges = model.initial_guess_ranges();
    (0..attempts)
        .map(|_| {
            let guess: Vec<f64> = ranges.iter().map(|&r| sample_uniform(rng, r)).collect();
            project(&guess, model.param_bounds())
        })
        .collect()
}

/// Run one attempt: Levenberg-Marquardt from `initial`, then optional L-BFGS-B
/// refinement that is kept only when it lowers the cost.
pub fn run_attempt(
    model: &dyn ModelCalibrator,
    index: usize,
    initial: &[f64],
    config: &OptimizationConfig,
) -> AttemptOutcome {
    let lm = levenberg_marquardt(model, initial, &config.lm);
    let converged = lm.converged();
    let mut outcome = AttemptOutcome {
        index,
        initial: initial.to_vec(),
        params: lm.x,
        cost: lm.cost,
        iterations: lm.iterations,
        termination: lm.termination,
        converged,
        polished: false,
    };

    if config.lbfgsb_polish && outcome.cost.is_finite() {
        let bounds = model.param_bounds();
        let obj_fn = |x: &[f64]| model.evaluate_objective(x);
        let mut refined_solution = outcome.params.clone();
        let refine_res = lbfgsb_optimize(
            &mut refined_solution,
            bounds,
            &obj_fn,
            config.lbfgsb_max_iterations,
            config.tolerance,
            if tracing::enabled!(tracing::Level::TRACE) {
                Some(|_current_x: &[f64], current_obj: f64| {
                    trace!(attempt = index, cost = current_obj, "L-BFGS-B step");
                })
            } else {
                None
            },
            None,
        );

        match refine_res {
            Ok((_, loc_sol)) => {
                let loc_sol = project(&loc_sol, bounds);
                let loc_obj = model.evaluate_objective(&loc_sol);
                if loc_obj.is_finite() && loc_obj < outcome.cost {
                    debug!(
                        attempt = index,
                        before = outcome.cost,
                        after = loc_obj,
                        "L-BFGS-B improved attempt"
                    );
                    outcome.params = loc_sol;
                    outcome.cost = loc_obj;
                    outcome.polished = true;
                }
            }
            Err(e) => {
                debug!(
                    attempt = index,
                    error = ?e,
                    "L-BFGS-B failed, keeping Levenberg-Marquardt iterate"
                );
            }
        }
    }

    outcome
}

/// Lowest finite cost wins; ties keep the earliest attempt.
pub fn select_best(outcomes: &[AttemptOutcome]) -> Option<&AttemptOutcome> {
    outcomes
        .iter()
        .filter(|o| o.cost.is_finite())
        .fold(None, |best: Option<&AttemptOutcome>, o| match best {
            Some(b) if b.cost <= o.cost => Some(b),
            _ => Some(o),
        })
}

/// Multi-start bounded least-squares calibration.
///
/// Returns the best `(cost, params)` over `config.attempts` randomized
/// attempts. Fails only when every attempt ends with a non-finite cost.
pub fn calibrate_model<R: Rng + ?Sized>(
    model: &dyn ModelCalibrator,
    config: &OptimizationConfig,
    rng: &mut R,
) -> SurfaceResult<(f64, Vec<f64>)> {
    if config.attempts == 0 {
        return Err(SurfaceError::invalid_input("attempts must be positive"));
    }
    if model.param_bounds().len() != model.param_count() {
        return Err(SurfaceError::invalid_parameters(format!(
            "{} declares {} parameters but has {} bounds",
            model.model_name(),
            model.param_count(),
            model.param_bounds().len()
        )));
    }

    let guesses = draw_initial_guesses(model, config.attempts, rng);
    let outcomes: Vec<AttemptOutcome> = guesses
        .iter()
        .enumerate()
        .map(|(index, guess)| run_attempt(model, index, guess, config))
        .collect();

    for o in &outcomes {
        if o.cost.is_finite() {
            debug!(
                attempt = o.index,
                cost = o.cost,
                iterations = o.iterations,
                termination = ?o.termination,
                converged = o.converged,
                polished = o.polished,
                params = ?o.params,
                "attempt finished"
            );
        } else {
            warn!(
                attempt = o.index,
                initial = ?o.initial,
                "attempt produced a non-finite cost"
            );
        }
    }

    let best = select_best(&outcomes).ok_or(SurfaceError::CalibrationFailed {
        attempts: config.attempts,
    })?;

    let named: Vec<String> = model
        .param_names()
        .iter()
        .zip(&best.params)
        .map(|(name, value)| format!("{}={:.6}", name, value))
        .collect();
    info!(
        model = model.model_name(),
        attempt = best.index,
        cost = best.cost,
        points = model.point_count(),
        params = %named.join(" "),
        "selected best attempt"
    );
    Ok((best.cost, best.params.clone()))
}
