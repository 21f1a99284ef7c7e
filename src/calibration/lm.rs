//! Box-constrained Levenberg-Marquardt.
//!
//! Every trial step is projected onto the parameter bounds before it is
//! evaluated, so iterates never leave the box. The solver does not fail: an
//! attempt that stops without converging still reports its last accepted
//! iterate and cost.

use crate::calibration::config::LmConfig;
use crate::calibration::types::{least_squares_cost, ModelCalibrator};

const MAX_LAMBDA: f64 = 1e16;
const MIN_LAMBDA: f64 = 1e-15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Relative cost reduction fell below `ftol`
    CostTolerance,
    /// Relative step size fell below `xtol`
    StepTolerance,
    /// Projected gradient fell below `gtol`
    GradientTolerance,
    /// No damping level produced a lower cost
    Stalled,
    MaxIterations,
    /// Cost was not finite at the starting point
    NonFiniteStart,
}

#[derive(Debug, Clone)]
pub struct LmOutcome {
    pub x: Vec<f64>,
    pub cost: f64,
    pub iterations: usize,
    pub termination: Termination,
}

impl LmOutcome {
    pub fn converged(&self) -> bool {
        matches!(
            self.termination,
            Termination::CostTolerance | Termination::StepTolerance | Termination::GradientTolerance
        )
    }
}

pub fn project(x: &[f64], bounds: &[(f64, f64)]) -> Vec<f64> {
    x.iter()
        .zip(bounds)
        .map(|(&v, &(lo, hi))| if v.is_nan() { lo } else { v.clamp(lo, hi) })
        .collect()
}

/// Solve `a · x = b` by Gaussian elimination with partial pivoting.
fn solve_linear_system(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < 1e-300 || !a[pivot][col].is_finite() {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        for row in (col + 1)..n {
            let factor = a[row][col] / a[col][col];
            for c in col..n {
                a[row][c] -= factor * a[col][c];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = ((row + 1)..n).map(|c| a[row][c] * x[c]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    x.iter().all(|v| v.is_finite()).then_some(x)
}

/// Infinity norm of the cost gradient `Jᵀr`, ignoring components that would
/// push an iterate sitting on a bound further outside.
fn projected_gradient_norm(x: &[f64], grad: &[f64], bounds: &[(f64, f64)]) -> f64 {
    x.iter()
        .zip(grad)
        .zip(bounds)
        .map(|((&xi, &gi), &(lo, hi))| {
            if (xi <= lo && gi > 0.0) || (xi >= hi && gi < 0.0) {
                0.0
            } else {
                gi.abs()
            }
        })
        .fold(0.0, f64::max)
}

fn norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

pub fn levenberg_marquardt(
    model: &dyn ModelCalibrator,
    initial: &[f64],
    options: &LmConfig,
) -> LmOutcome {
    let bounds = model.param_bounds();
    let n = bounds.len();
    let mut x = project(initial, bounds);
    let mut residuals = model.residuals(&x);
    let mut cost = least_squares_cost(&residuals);

    if !cost.is_finite() {
        return LmOutcome {
            x,
            cost: f64::INFINITY,
            iterations: 0,
            termination: Termination::NonFiniteStart,
        };
    }

    let mut lambda = options.initial_lambda.max(MIN_LAMBDA);

    for iteration in 0..options.max_iterations {
        let jac = model.jacobian(&x);

        let mut jtj = vec![vec![0.0; n]; n];
        let mut jtr = vec![0.0; n];
        for (row, &r) in jac.iter().zip(&residuals) {
            for i in 0..n {
                jtr[i] += row[i] * r;
                for j in i..n {
                    jtj[i][j] += row[i] * row[j];
                }
            }
        }
        for i in 0..n {
            for j in 0..i {
                jtj[i][j] = jtj[j][i];
            }
        }

        if projected_gradient_norm(&x, &jtr, bounds) <= options.gtol {
            return LmOutcome {
                x,
                cost,
                iterations: iteration,
                termination: Termination::GradientTolerance,
            };
        }

        let mut accepted = None;
        while lambda <= MAX_LAMBDA {
            let mut damped = jtj.clone();
            for (i, row) in damped.iter_mut().enumerate() {
                row[i] += lambda * jtj[i][i].max(1e-12);
            }
            let rhs: Vec<f64> = jtr.iter().map(|g| -g).collect();

            let Some(step) = solve_linear_system(damped, rhs) else {
                lambda *= options.lambda_up;
                continue;
            };

            let candidate: Vec<f64> = x.iter().zip(&step).map(|(xi, si)| xi + si).collect();
            let candidate = project(&candidate, bounds);
            let candidate_residuals = model.residuals(&candidate);
            let candidate_cost = least_squares_cost(&candidate_residuals);

            if candidate_cost.is_finite() && candidate_cost < cost {
                lambda = (lambda * options.lambda_down).max(MIN_LAMBDA);
                accepted = Some((candidate, candidate_residuals, candidate_cost));
                break;
            }
            lambda *= options.lambda_up;
        }

        let Some((candidate, candidate_residuals, candidate_cost)) = accepted else {
            return LmOutcome {
                x,
                cost,
                iterations: iteration,
                termination: Termination::Stalled,
            };
        };

        let step: Vec<f64> = candidate.iter().zip(&x).map(|(c, p)| c - p).collect();
        let reduction = cost - candidate_cost;
        let step_small = norm(&step) <= options.xtol * (options.xtol + norm(&x));
        let cost_small = reduction <= options.ftol * cost;

        x = candidate;
        residuals = candidate_residuals;
        cost = candidate_cost;

        if cost_small {
            return LmOutcome {
                x,
                cost,
                iterations: iteration + 1,
                termination: Termination::CostTolerance,
            };
        }
        if step_small {
            return LmOutcome {
                x,
                cost,
                iterations: iteration + 1,
                termination: Termination::StepTolerance,
            };
        }
    }

    LmOutcome {
        x,
        cost,
        iterations: options.max_iterations,
        termination: Termination::MaxIterations,
    }
}
