//! Box-bounded least squares on top of the `levenberg-marquardt` crate.
//!
//! Minimizes `½·Σ rᵢ(x)²` for a residual function `r` over a small parameter
//! vector with per-parameter bounds. The crate runs an unconstrained MINPACK
//! style trust region, so bounds are enforced by reparameterization: the
//! solver moves an internal coordinate `u` and every evaluation sees
//!
//! ```text
//! x = lo + (hi - lo)·(sin u + 1) / 2
//! ```
//!
//! which can never leave `[lo, hi]`. The Jacobian is estimated by forward
//! differences in `u`.
//!
//! A residual function that fails at a trial point is reported to the
//! solver as a residual vector larger than the best one seen, so the trial
//! step is rejected and the trust region shrinks.

use core::cell::Cell;

use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt, TerminationReason};
use nalgebra::storage::Owned;
use nalgebra::{DMatrix, DVector, Dyn};
use xover_core::{EngineError, Result};

/// Relative finite-difference step (square root of machine epsilon).
const DIFF_STEP: f64 = 1.49e-8;

/// Stopping criteria.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverSettings {
    /// Evaluation budget, in units of one Jacobian (`n + 1` residual calls).
    pub max_iterations: usize,
    /// Stop when the residual is orthogonal to the Jacobian columns to
    /// within this cosine.
    pub gradient_tolerance: f64,
    /// Stop when the relative step size falls below this.
    pub step_tolerance: f64,
    /// Stop when the relative cost reduction falls below this.
    pub cost_tolerance: f64,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            gradient_tolerance: 1e-10,
            step_tolerance: 1e-10,
            cost_tolerance: 1e-12,
        }
    }
}

/// Why the solver stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The cost reached zero.
    ExactFit,
    /// The gradient vanished.
    SmallGradient,
    /// The step size vanished.
    SmallStep,
    /// An accepted step barely improved the cost.
    SmallImprovement,
    /// No step produced a better point.
    Stalled,
    /// The evaluation budget ran out.
    IterationLimit,
}

impl From<TerminationReason> for Termination {
    fn from(reason: TerminationReason) -> Self {
        match reason {
            TerminationReason::ResidualsZero => Termination::ExactFit,
            TerminationReason::Orthogonal => Termination::SmallGradient,
            TerminationReason::Converged { xtol: true, .. } => Termination::SmallStep,
            TerminationReason::Converged { .. } => Termination::SmallImprovement,
            TerminationReason::LostPatience => Termination::IterationLimit,
            _ => Termination::Stalled,
        }
    }
}

/// Solver outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct Fit {
    /// Best parameters found.
    pub params: Vec<f64>,
    /// RMS residual at `params`.
    pub rms: f64,
    /// Jacobian evaluations performed.
    pub iterations: usize,
    /// Residual evaluations performed, including finite differences.
    pub evaluations: usize,
    /// Stop reason.
    pub termination: Termination,
    /// RMS residual at the start and after every improvement.
    pub trace: Vec<f64>,
}

/// Minimizes the squared norm of `residuals` inside `bounds`.
///
/// `residuals` may fail (for example when a trial parameter makes a filter
/// undesignable); a failing trial step is treated as a rejected step. A
/// failure at the starting point is returned as is.
///
/// # Errors
///
/// Errors from `residuals` at the starting point, or on both sides of a
/// finite-difference step.
pub fn levenberg_marquardt<F>(
    residuals: F,
    initial: &[f64],
    bounds: &[(f64, f64)],
    settings: &SolverSettings,
) -> Result<Fit>
where
    F: Fn(&[f64]) -> Result<Vec<f64>>,
{
    if bounds.len() != initial.len() {
        return Err(EngineError::invalid_spec(format!(
            "{} parameters but {} bounds",
            initial.len(),
            bounds.len()
        )));
    }
    if let Some(&(lo, hi)) = bounds.iter().find(|(lo, hi)| !(lo <= hi)) {
        return Err(EngineError::invalid_spec(format!(
            "bounds [{lo}, {hi}] are empty"
        )));
    }

    let start = project(initial, bounds);
    let r0 = residuals(&start)?;
    let start_rms = rms(&r0);
    let start_len = r0.len();
    if start_rms == 0.0 || start.is_empty() {
        let termination = if start_rms == 0.0 {
            Termination::ExactFit
        } else {
            Termination::SmallGradient
        };
        return Ok(Fit {
            params: start,
            rms: start_rms,
            iterations: 0,
            evaluations: 1,
            termination,
            trace: vec![start_rms],
        });
    }

    // The start is already evaluated; `u` maps back onto it up to rounding.
    let problem = BoundedProblem {
        residuals: &residuals,
        bounds,
        internal: to_internal(&start, bounds),
        current: Some(r0),
        len: start_len,
        best: start,
        best_rms: start_rms,
        trace: vec![start_rms],
        evaluations: Cell::new(1),
        jacobians: Cell::new(0),
        failed_difference: Cell::new(false),
    };

    let (problem, report) = LevenbergMarquardt::new()
        .with_ftol(settings.cost_tolerance)
        .with_xtol(settings.step_tolerance)
        .with_gtol(settings.gradient_tolerance)
        .with_patience(settings.max_iterations.max(1))
        .minimize(problem);

    if problem.failed_difference.get() {
        return Err(EngineError::invalid_spec(
            "residuals failed on both sides of a finite difference",
        ));
    }

    let termination = if problem.best_rms == 0.0 {
        Termination::ExactFit
    } else {
        Termination::from(report.termination)
    };

    Ok(Fit {
        params: problem.best,
        rms: problem.best_rms,
        iterations: problem.jacobians.get(),
        evaluations: problem.evaluations.get(),
        termination,
        trace: problem.trace,
    })
}

struct BoundedProblem<'a, F> {
    residuals: &'a F,
    bounds: &'a [(f64, f64)],
    internal: DVector<f64>,
    /// Residuals at `internal`, `None` when the evaluation failed.
    current: Option<Vec<f64>>,
    len: usize,
    best: Vec<f64>,
    best_rms: f64,
    trace: Vec<f64>,
    evaluations: Cell<usize>,
    jacobians: Cell<usize>,
    failed_difference: Cell<bool>,
}

impl<F> BoundedProblem<'_, F>
where
    F: Fn(&[f64]) -> Result<Vec<f64>>,
{
    fn evaluate(&self, internal: &DVector<f64>) -> Option<Vec<f64>> {
        self.evaluations.set(self.evaluations.get() + 1);
        (self.residuals)(&to_external(internal, self.bounds))
            .ok()
            .filter(|r| r.len() == self.len && r.iter().all(|v| v.is_finite()))
    }

    // Strictly worse than the best point, so the step is always rejected.
    fn penalty(&self) -> DVector<f64> {
        DVector::from_element(self.len, 1e3 * self.best_rms + 1.0)
    }
}

impl<F> LeastSquaresProblem<f64, Dyn, Dyn> for BoundedProblem<'_, F>
where
    F: Fn(&[f64]) -> Result<Vec<f64>>,
{
    type ResidualStorage = Owned<f64, Dyn>;
    type JacobianStorage = Owned<f64, Dyn, Dyn>;
    type ParameterStorage = Owned<f64, Dyn>;

    fn set_params(&mut self, internal: &DVector<f64>) {
        self.internal.copy_from(internal);
        self.current = self.evaluate(internal);
        if let Some(r) = &self.current {
            let value = rms(r);
            if value < self.best_rms {
                self.best = to_external(internal, self.bounds);
                self.best_rms = value;
                self.trace.push(value);
            }
        }
    }

    fn params(&self) -> DVector<f64> {
        self.internal.clone()
    }

    fn residuals(&self) -> Option<DVector<f64>> {
        Some(match &self.current {
            Some(r) => DVector::from_column_slice(r),
            None => self.penalty(),
        })
    }

    fn jacobian(&self) -> Option<DMatrix<f64>> {
        let r = self.current.as_ref()?;
        self.jacobians.set(self.jacobians.get() + 1);
        let n = self.internal.len();
        let mut jacobian = DMatrix::zeros(self.len, n);
        for j in 0..n {
            let mut h = DIFF_STEP * self.internal[j].abs().max(1.0);
            let mut shifted = self.internal.clone();
            shifted[j] += h;
            let column = match self.evaluate(&shifted) {
                Some(column) => column,
                None => {
                    h = -h;
                    shifted[j] = self.internal[j] + h;
                    if let Some(column) = self.evaluate(&shifted) {
                        column
                    } else {
                        self.failed_difference.set(true);
                        return None;
                    }
                }
            };
            for (i, (a, b)) in column.iter().zip(r).enumerate() {
                jacobian[(i, j)] = (a - b) / h;
            }
        }
        Some(jacobian)
    }
}

fn project(x: &[f64], bounds: &[(f64, f64)]) -> Vec<f64> {
    x.iter()
        .zip(bounds)
        .map(|(&v, &(lo, hi))| v.clamp(lo, hi))
        .collect()
}

fn to_external(internal: &DVector<f64>, bounds: &[(f64, f64)]) -> Vec<f64> {
    internal
        .iter()
        .zip(bounds)
        .map(|(&u, &(lo, hi))| (lo + (hi - lo) * (u.sin() + 1.0) / 2.0).clamp(lo, hi))
        .collect()
}

fn to_internal(x: &[f64], bounds: &[(f64, f64)]) -> DVector<f64> {
    DVector::from_iterator(
        x.len(),
        x.iter().zip(bounds).map(|(&v, &(lo, hi))| {
            if hi > lo {
                (2.0 * (v - lo) / (hi - lo) - 1.0).clamp(-1.0, 1.0).asin()
            } else {
                0.0
            }
        }),
    )
}

/// Root mean square of a residual vector.
pub fn rms(r: &[f64]) -> f64 {
    if r.is_empty() {
        return 0.0;
    }
    (r.iter().map(|v| v * v).sum::<f64>() / r.len() as f64).sqrt()
}
