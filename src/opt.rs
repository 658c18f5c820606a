//! Maximisers of a [LogLikelihood].
//!
//! [irls] is Newton's method on the observed information, which for the canonical links of both
//! models coincides with iteratively reweighted least squares. [bounded_lbfgs] is a limited-memory
//! quasi-Newton search confined to a box, for data so sparse that the Newton system is poorly
//! conditioned.

use std::collections::VecDeque;

use anyhow::bail;
use nalgebra::{Cholesky, DMatrix, DVector, Dyn};
use serde::{Deserialize, Serialize};
use strum_macros::Display;
use tracing::{debug, trace};

use crate::error::{ConvergenceError, FitError, NumericalError, NumericalFault};
use crate::model::LogLikelihood;
use crate::probs::SliceExt;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IrlsConfig {
    pub max_iterations: u64,
    /// Relative log-likelihood improvement below which the fit has converged.
    pub tolerance: f64,
    pub max_step_halvings: u32,
}
impl IrlsConfig {
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.max_iterations == 0 {
            bail!("at least one iteration must be allowed");
        }
        if self.tolerance <= 0.0 {
            bail!("tolerance must be positive");
        }
        Ok(())
    }
}

impl Default for IrlsConfig {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            tolerance: 1e-10,
            max_step_halvings: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LbfgsConfig {
    pub max_iterations: u64,
    /// Relative log-likelihood improvement below which the fit has converged.
    pub tolerance: f64,
    /// Largest projected-gradient component at which the fit has converged.
    pub gradient_tolerance: f64,
    /// Number of correction pairs retained.
    pub memory: usize,
    /// Every parameter is confined to `[-bound, bound]`.
    pub bound: f64,
}
impl LbfgsConfig {
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.max_iterations == 0 {
            bail!("at least one iteration must be allowed");
        }
        if self.tolerance <= 0.0 {
            bail!("tolerance must be positive");
        }
        if self.gradient_tolerance <= 0.0 {
            bail!("gradient tolerance must be positive");
        }
        if self.memory == 0 {
            bail!("at least one correction pair must be retained");
        }
        if !(self.bound > 0.0 && self.bound.is_finite()) {
            bail!("parameter bound must be positive and finite");
        }
        Ok(())
    }
}

impl Default for LbfgsConfig {
    fn default() -> Self {
        Self {
            max_iterations: 2_000,
            tolerance: 1e-12,
            gradient_tolerance: 1e-6,
            memory: 10,
            bound: 10.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Display)]
pub enum Strategy {
    Irls(IrlsConfig),
    BoundedLbfgs(LbfgsConfig),
}
impl Strategy {
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        match self {
            Strategy::Irls(config) => config.validate(),
            Strategy::BoundedLbfgs(config) => config.validate(),
        }
    }

    pub fn maximise(&self, objective: &impl LogLikelihood, init: &[f64]) -> Result<OptimiserOutcome, FitError> {
        match self {
            Strategy::Irls(config) => irls(objective, init, config),
            Strategy::BoundedLbfgs(config) => bounded_lbfgs(objective, init, config),
        }
    }
}

impl Default for Strategy {
    fn default() -> Self {
        Self::Irls(IrlsConfig::default())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimiserOutcome {
    pub iterations: u64,
    pub optimal_values: Vec<f64>,
    pub log_likelihood: f64,
}

fn converged(improvement: f64, log_likelihood: f64, tolerance: f64) -> bool {
    improvement.abs() <= tolerance * (log_likelihood.abs() + 0.1)
}

fn non_finite(iterations: u64, estimate: &[f64]) -> FitError {
    numerical(NumericalFault::NonFiniteLikelihood, iterations, estimate)
}

fn numerical(fault: NumericalFault, iterations: u64, estimate: &[f64]) -> FitError {
    NumericalError {
        fault,
        iterations,
        estimate: estimate.to_vec(),
    }
    .into()
}

/// Cholesky factor of a positive-definite information matrix; `None` if any pivot vanishes.
fn decompose(information: DMatrix<f64>) -> Option<Cholesky<f64, Dyn>> {
    let cholesky = Cholesky::new(information)?;
    let factor = cholesky.l_dirty();
    (0..factor.nrows())
        .map(|index| factor[(index, index)])
        .all(|pivot| pivot > 0.0 && pivot.is_finite())
        .then_some(cholesky)
}

/// Newton–Raphson with step halving. Each iteration solves the information system by Cholesky
/// decomposition; a step that lowers the log-likelihood is halved until it does not.
pub fn irls(objective: &impl LogLikelihood, init: &[f64], config: &IrlsConfig) -> Result<OptimiserOutcome, FitError> {
    let dimension = objective.dimension();
    let mut values = init.to_vec();
    let mut gradient = vec![0.0; dimension];
    let mut log_likelihood = objective.gradient(&values, &mut gradient);
    if !log_likelihood.is_finite() {
        return Err(non_finite(0, &values));
    }

    let mut candidate = vec![0.0; dimension];
    for iteration in 1..=config.max_iterations {
        let information = objective.information(&values);
        let Some(cholesky) = decompose(information) else {
            return Err(numerical(NumericalFault::SingularInformation, iteration, &values));
        };
        let step = cholesky.solve(&DVector::from_column_slice(&gradient));

        let mut scale = 1.0;
        let mut halvings = 0;
        let candidate_log_likelihood = loop {
            for ((candidate, value), step) in candidate.iter_mut().zip(&values).zip(step.iter()) {
                *candidate = value + scale * step;
            }
            let candidate_log_likelihood = objective.log_likelihood(&candidate);
            if candidate_log_likelihood.is_finite()
                && (candidate_log_likelihood >= log_likelihood
                    || converged(candidate_log_likelihood - log_likelihood, log_likelihood, config.tolerance))
            {
                break candidate_log_likelihood;
            }
            halvings += 1;
            if halvings > config.max_step_halvings {
                return Err(if candidate_log_likelihood.is_finite() {
                    numerical(NumericalFault::LineSearch, iteration, &values)
                } else {
                    non_finite(iteration, &values)
                });
            }
            scale *= 0.5;
        };

        let improvement = candidate_log_likelihood - log_likelihood;
        std::mem::swap(&mut values, &mut candidate);
        log_likelihood = objective.gradient(&values, &mut gradient);
        debug!("iteration {iteration}: log-likelihood {log_likelihood:.6}, improvement {improvement:.3e}, halvings {halvings}");

        if converged(improvement, log_likelihood, config.tolerance) {
            return Ok(OptimiserOutcome {
                iterations: iteration,
                optimal_values: values,
                log_likelihood,
            });
        }
    }

    Err(ConvergenceError {
        iterations: config.max_iterations,
        log_likelihood,
        estimate: values,
    }
    .into())
}

struct Correction {
    s: Vec<f64>,
    y: Vec<f64>,
    rho: f64,
}

/// Limited-memory BFGS over the box `[-bound, bound]ⁿ`, minimising the negated log-likelihood.
///
/// Parameters pinned at a bound by the gradient are held fixed for the iteration; the remaining
/// free parameters follow the two-loop search direction, and every trial point is projected back
/// onto the box. A backtracking Armijo search picks the step length.
pub fn bounded_lbfgs(
    objective: &impl LogLikelihood,
    init: &[f64],
    config: &LbfgsConfig,
) -> Result<OptimiserOutcome, FitError> {
    const ARMIJO: f64 = 1e-4;
    const MIN_STEP: f64 = 1e-20;

    let dimension = objective.dimension();
    let bound = config.bound;
    let project = |value: f64| value.clamp(-bound, bound);

    let mut values: Vec<_> = init.iter().copied().map(project).collect();
    let mut gradient = vec![0.0; dimension];
    let mut loss = -objective.gradient(&values, &mut gradient);
    gradient.scale(-1.0);
    if !loss.is_finite() {
        return Err(non_finite(0, &values));
    }

    let mut corrections: VecDeque<Correction> = VecDeque::with_capacity(config.memory);
    let mut free = vec![true; dimension];
    let mut direction = vec![0.0; dimension];
    let mut candidate = vec![0.0; dimension];
    let mut candidate_gradient = vec![0.0; dimension];
    for iteration in 1..=config.max_iterations {
        let mut projected_gradient: f64 = 0.0;
        for index in 0..dimension {
            let value = values[index];
            let grad = gradient[index];
            free[index] = !((value <= -bound && grad > 0.0) || (value >= bound && grad < 0.0));
            projected_gradient = projected_gradient.max((value - project(value - grad)).abs());
        }
        if projected_gradient < config.gradient_tolerance {
            return Ok(OptimiserOutcome {
                iterations: iteration - 1,
                optimal_values: values,
                log_likelihood: -loss,
            });
        }

        search_direction(&gradient, &free, &corrections, &mut direction);
        let mut slope = direction.dot(&gradient);
        if slope >= 0.0 {
            corrections.clear();
            search_direction(&gradient, &free, &corrections, &mut direction);
            slope = direction.dot(&gradient);
        }
        let mut step = if corrections.is_empty() {
            f64::min(1.0, 1.0 / direction.norm_inf())
        } else {
            1.0
        };

        let candidate_loss = loop {
            for index in 0..dimension {
                candidate[index] = project(values[index] + step * direction[index]);
            }
            let candidate_loss = -objective.log_likelihood(&candidate);
            let moved: f64 = candidate
                .iter()
                .zip(&values)
                .zip(&gradient)
                .map(|((candidate, value), grad)| (candidate - value) * grad)
                .sum();
            if candidate_loss.is_finite() && candidate_loss <= loss + ARMIJO * moved.min(0.0) {
                break Some(candidate_loss);
            }
            step *= 0.5;
            if step < MIN_STEP {
                break None;
            }
        };
        let Some(candidate_loss) = candidate_loss else {
            if corrections.is_empty() {
                return Err(numerical(NumericalFault::LineSearch, iteration, &values));
            }
            trace!("iteration {iteration}: line search failed on slope {slope:.3e}; discarding curvature pairs");
            corrections.clear();
            continue;
        };

        objective.gradient(&candidate, &mut candidate_gradient);
        candidate_gradient.scale(-1.0);
        let s: Vec<_> = candidate.iter().zip(&values).map(|(a, b)| a - b).collect();
        let y: Vec<_> = candidate_gradient.iter().zip(&gradient).map(|(a, b)| a - b).collect();
        let curvature = s.dot(&y);
        if curvature > f64::EPSILON * y.dot(&y) {
            if corrections.len() == config.memory {
                corrections.pop_front();
            }
            corrections.push_back(Correction {
                s,
                y,
                rho: 1.0 / curvature,
            });
        }

        let improvement = loss - candidate_loss;
        std::mem::swap(&mut values, &mut candidate);
        std::mem::swap(&mut gradient, &mut candidate_gradient);
        loss = candidate_loss;
        debug!("iteration {iteration}: log-likelihood {:.6}, improvement {improvement:.3e}, step {step:.3e}", -loss);

        if converged(improvement, loss, config.tolerance) {
            return Ok(OptimiserOutcome {
                iterations: iteration,
                optimal_values: values,
                log_likelihood: -loss,
            });
        }
    }

    Err(ConvergenceError {
        iterations: config.max_iterations,
        log_likelihood: -loss,
        estimate: values,
    }
    .into())
}

/// Two-loop recursion over the free coordinates; the result is a descent direction for the loss.
fn search_direction(gradient: &[f64], free: &[bool], corrections: &VecDeque<Correction>, direction: &mut [f64]) {
    for ((direction, &grad), &free) in direction.iter_mut().zip(gradient).zip(free) {
        *direction = if free { grad } else { 0.0 };
    }

    let mut alphas = Vec::with_capacity(corrections.len());
    for correction in corrections.iter().rev() {
        let alpha = correction.rho * masked_dot(&correction.s, direction, free);
        for ((direction, y), &free) in direction.iter_mut().zip(&correction.y).zip(free) {
            if free {
                *direction -= alpha * y;
            }
        }
        alphas.push(alpha);
    }

    if let Some(latest) = corrections.back() {
        let gamma = masked_dot(&latest.s, &latest.y, free) / masked_dot(&latest.y, &latest.y, free);
        if gamma.is_finite() && gamma > 0.0 {
            direction.scale(gamma);
        }
    }

    for (correction, alpha) in corrections.iter().zip(alphas.into_iter().rev()) {
        let beta = correction.rho * masked_dot(&correction.y, direction, free);
        for ((direction, s), &free) in direction.iter_mut().zip(&correction.s).zip(free) {
            if free {
                *direction += (alpha - beta) * s;
            }
        }
    }

    direction.scale(-1.0);
}

fn masked_dot(a: &[f64], b: &[f64], mask: &[bool]) -> f64 {
    a.iter()
        .zip(b)
        .zip(mask)
        .filter(|(_, free)| **free)
        .map(|((a, b), _)| a * b)
        .sum()
}

/// Square roots of the diagonal of the inverse information at `values`.
pub fn standard_errors(objective: &impl LogLikelihood, values: &[f64]) -> Result<Vec<f64>, FitError> {
    let information = objective.information(values);
    let Some(cholesky) = decompose(information) else {
        return Err(numerical(NumericalFault::SingularInformation, 0, values));
    };
    let covariance: DMatrix<f64> = cholesky.inverse();
    Ok(covariance.diagonal().iter().map(|variance| variance.sqrt()).collect())
}
