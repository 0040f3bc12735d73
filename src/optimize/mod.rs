//! Damped Gauss-Newton (Levenberg-Marquardt) least squares.
//!
//! Minimizes `|observed - model(p)|^2`. Each outer iteration linearizes the
//! model and tries up to `inner_iterations` damped steps: a step that lowers
//! the residual norm is accepted and the damping divided by ten, a step that
//! does not multiplies the damping by ten. The solver stops when the residual
//! norm or its relative improvement falls below tolerance, and reports
//! `ConvergenceFailure` when either loop runs out of iterations.

use crate::util::{CorrStereoError, CorrStereoResult};
use nalgebra::{DMatrix, DVector};

/// Model function fitted by `levenberg_marquardt`.
pub trait LeastSquaresModel {
    /// Model prediction for `params`; errors count as a rejected step.
    fn evaluate(&self, params: &DVector<f64>) -> CorrStereoResult<DVector<f64>>;

    /// Jacobian of `evaluate`, forward differences by default.
    fn jacobian(&self, params: &DVector<f64>) -> CorrStereoResult<DMatrix<f64>> {
        numeric_jacobian(self, params)
    }

    /// Residual between an observation and a prediction.
    fn difference(&self, observed: &DVector<f64>, predicted: &DVector<f64>) -> DVector<f64> {
        observed - predicted
    }
}

/// Forward-difference Jacobian with step `1e-7 + |p_i| * 1e-7`.
pub fn numeric_jacobian<M: LeastSquaresModel + ?Sized>(
    model: &M,
    params: &DVector<f64>,
) -> CorrStereoResult<DMatrix<f64>> {
    let base = model.evaluate(params)?;
    let mut jac = DMatrix::zeros(base.len(), params.len());
    let mut nudged = params.clone();
    for i in 0..params.len() {
        let eps = 1e-7 + params[i].abs() * 1e-7;
        nudged[i] = params[i] + eps;
        let shifted = model.evaluate(&nudged)?;
        nudged[i] = params[i];
        jac.set_column(i, &((shifted - &base) / eps));
    }
    Ok(jac)
}

/// Solver settings.
#[derive(Clone, Copy, Debug)]
pub struct LmConfig {
    pub max_iterations: usize,
    /// Damped step attempts per outer iteration.
    pub inner_iterations: usize,
    pub abs_tolerance: f64,
    pub rel_tolerance: f64,
    pub initial_lambda: f64,
}

impl Default for LmConfig {
    fn default() -> Self {
        Self {
            max_iterations: 20,
            inner_iterations: 5,
            abs_tolerance: 1e-3,
            rel_tolerance: 1e-3,
            initial_lambda: 0.1,
        }
    }
}

/// Converged parameters and diagnostics.
#[derive(Clone, Debug)]
pub struct LmSolution {
    pub params: DVector<f64>,
    pub residual_norm: f64,
    pub iterations: usize,
}

/// Fits `model` to `observed` starting from `initial`.
pub fn levenberg_marquardt<M: LeastSquaresModel + ?Sized>(
    model: &M,
    initial: &DVector<f64>,
    observed: &DVector<f64>,
    config: &LmConfig,
) -> CorrStereoResult<LmSolution> {
    let mut params = initial.clone();
    let mut error = model.difference(observed, &model.evaluate(&params)?);
    let mut norm = error.norm();
    let mut lambda = config.initial_lambda;

    if norm < config.abs_tolerance {
        return Ok(LmSolution {
            params,
            residual_norm: norm,
            iterations: 0,
        });
    }

    for iteration in 1..=config.max_iterations {
        let jac = model.jacobian(&params)?;
        let jt = jac.transpose();
        let normal = &jt * &jac;
        let gradient = &jt * &error;

        let mut improvement = None;
        for _ in 0..config.inner_iterations {
            let mut damped = normal.clone();
            for i in 0..damped.nrows() {
                let d = damped[(i, i)];
                damped[(i, i)] = d + d * lambda + lambda;
            }
            let Some(step) = solve_spd(damped, &gradient) else {
                lambda *= 10.0;
                continue;
            };
            let trial = &params + step;
            let trial_error = match model.evaluate(&trial) {
                Ok(pred) => model.difference(observed, &pred),
                Err(_) => {
                    lambda *= 10.0;
                    continue;
                }
            };
            let trial_norm = trial_error.norm();
            if trial_norm.is_finite() && trial_norm < norm {
                improvement = Some((norm - trial_norm) / norm);
                params = trial;
                error = trial_error;
                norm = trial_norm;
                lambda /= 10.0;
                break;
            }
            lambda *= 10.0;
        }

        let Some(rel) = improvement else {
            return Err(CorrStereoError::ConvergenceFailure {
                iterations: iteration,
            });
        };
        if norm < config.abs_tolerance || rel < config.rel_tolerance {
            return Ok(LmSolution {
                params,
                residual_norm: norm,
                iterations: iteration,
            });
        }
    }

    Err(CorrStereoError::ConvergenceFailure {
        iterations: config.max_iterations,
    })
}

fn solve_spd(matrix: DMatrix<f64>, rhs: &DVector<f64>) -> Option<DVector<f64>> {
    if let Some(chol) = matrix.clone().cholesky() {
        return Some(chol.solve(rhs));
    }
    matrix.lu().solve(rhs)
}
