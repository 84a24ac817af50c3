//! Levenberg–Marquardt nonlinear least squares.
//!
//! Used for the multi-Gaussian peak fit and the delay-coincidence exponential
//! fit. The implementation is the classic damped Gauss–Newton iteration:
//!
//! - solve `(JᵀJ + μ·diag(JᵀJ)) δ = -Jᵀ r` for a trial step
//! - accept the step if it reduces the SSE, shrinking the damping `μ`
//! - otherwise grow `μ` and retry
//!
//! Notes:
//! - Problems expose residuals `r(p)` and the residual Jacobian `∂r/∂p`; the
//!   solver never sees the data directly.
//! - Trial steps that produce non-finite residuals are rejected like any
//!   non-improving step, which keeps parameter excursions (e.g. a negative
//!   Gaussian variance) from poisoning the iteration.
//! - When no damping value yields an improvement after at least one accepted
//!   step, the iterate is a numerical local minimum and we report success.

use nalgebra::{DMatrix, DVector};

use crate::math::solve_least_squares;

/// A residual-form nonlinear least squares problem.
pub trait LmProblem {
    /// Residual vector `r(p)` (observation minus model).
    fn residuals(&self, params: &DVector<f64>) -> DVector<f64>;

    /// Jacobian of the residuals, `J[(i, j)] = ∂r_i/∂p_j`.
    fn jacobian(&self, params: &DVector<f64>) -> DMatrix<f64>;
}

/// Solver tolerances and budgets.
#[derive(Debug, Clone, Copy)]
pub struct LmOptions {
    pub max_iters: usize,
    /// Relative SSE improvement below which the fit is converged.
    pub ftol: f64,
    /// Relative step norm below which the fit is converged.
    pub xtol: f64,
    /// Initial damping factor.
    pub damping_init: f64,
    /// Damping ceiling; exceeding it means no improving step exists.
    pub damping_max: f64,
}

impl Default for LmOptions {
    fn default() -> Self {
        Self {
            max_iters: 200,
            ftol: 1e-10,
            xtol: 1e-10,
            damping_init: 1e-3,
            damping_max: 1e10,
        }
    }
}

/// A converged fit.
#[derive(Debug, Clone)]
pub struct LmFit {
    pub params: DVector<f64>,
    pub sse: f64,
    pub iterations: usize,
}

/// Solver failure; carries the last parameter estimate for diagnosis.
#[derive(Debug, Clone)]
pub enum LmError {
    /// Iteration budget exhausted before the tolerances were met.
    MaxIterations { last: Vec<f64> },
    /// No improving step was ever found (bad seed or degenerate Jacobian).
    StalledAtStart { last: Vec<f64> },
}

impl LmError {
    pub fn last_params(&self) -> &[f64] {
        match self {
            LmError::MaxIterations { last } => last,
            LmError::StalledAtStart { last } => last,
        }
    }
}

impl std::fmt::Display for LmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LmError::MaxIterations { .. } => {
                write!(f, "Levenberg-Marquardt did not converge within the iteration budget")
            }
            LmError::StalledAtStart { .. } => {
                write!(f, "Levenberg-Marquardt found no improving step from the initial guess")
            }
        }
    }
}

/// Minimize `|r(p)|^2` starting from `p0`.
pub fn lm_fit<P: LmProblem>(
    problem: &P,
    p0: DVector<f64>,
    opts: &LmOptions,
) -> Result<LmFit, LmError> {
    let mut params = p0;
    let mut residuals = problem.residuals(&params);
    let mut sse = residuals.norm_squared();
    if !sse.is_finite() {
        return Err(LmError::StalledAtStart {
            last: params.iter().copied().collect(),
        });
    }

    let mut damping = opts.damping_init;
    let mut accepted_any = false;

    for iter in 0..opts.max_iters {
        let jac = problem.jacobian(&params);
        let jtj = jac.transpose() * &jac;
        let gradient = jac.transpose() * &residuals;
        let diag = jtj.diagonal();

        // Inner loop: escalate damping until a step improves the SSE.
        let mut improved = false;
        while damping <= opts.damping_max {
            let mut lhs = jtj.clone();
            for i in 0..lhs.nrows() {
                lhs[(i, i)] += damping * diag[i].max(1e-12);
            }
            let rhs = -&gradient;

            let Some(step) = solve_least_squares(&lhs, &rhs) else {
                damping *= 10.0;
                continue;
            };

            let trial = &params + &step;
            let trial_residuals = problem.residuals(&trial);
            let trial_sse = trial_residuals.norm_squared();

            if trial_sse.is_finite() && trial_sse < sse {
                let improvement = sse - trial_sse;
                let step_norm = step.norm();
                let converged = improvement <= opts.ftol * sse.max(f64::MIN_POSITIVE)
                    || step_norm <= opts.xtol * (params.norm() + opts.xtol);

                params = trial;
                residuals = trial_residuals;
                sse = trial_sse;
                damping = (damping / 10.0).max(1e-12);
                accepted_any = true;
                improved = true;

                if converged {
                    return Ok(LmFit {
                        params,
                        sse,
                        iterations: iter + 1,
                    });
                }
                break;
            }

            damping *= 10.0;
        }

        if !improved {
            // Even near-pure gradient steps cannot reduce the SSE.
            if accepted_any || sse == 0.0 {
                return Ok(LmFit {
                    params,
                    sse,
                    iterations: iter + 1,
                });
            }
            return Err(LmError::StalledAtStart {
                last: params.iter().copied().collect(),
            });
        }
    }

    Err(LmError::MaxIterations {
        last: params.iter().copied().collect(),
    })
}
