//! Likelihood models over the `[θ | φ | aux]` parameter layout.

use nalgebra::DMatrix;

use crate::design::Layout;

pub mod runs;
pub mod wicket;

/// A twice-differentiable, concave log-likelihood.
pub trait LogLikelihood {
    /// Number of free parameters.
    fn dimension(&self) -> usize;

    fn log_likelihood(&self, params: &[f64]) -> f64;

    /// Writes the gradient into `gradient` and returns the log-likelihood at `params`.
    fn gradient(&self, params: &[f64], gradient: &mut [f64]) -> f64;

    /// Observed information (the negated Hessian) at `params`.
    fn information(&self, params: &[f64]) -> DMatrix<f64>;
}

/// A log-likelihood whose abilities follow a [Layout], trailed by auxiliary parameters.
pub trait AbilityModel: LogLikelihood {
    fn layout(&self) -> &Layout;

    fn auxiliary_labels(&self) -> &[String];

    /// How much each auxiliary parameter must move to absorb a unit shift of the ability
    /// contrast θ − φ across every row.
    fn auxiliary_loadings(&self) -> Vec<f64>;
}

/// Accumulates `weight · x xᵀ` for a sparse `x` into `information`.
pub(crate) fn add_outer(
    information: &mut DMatrix<f64>,
    x: impl Iterator<Item = (usize, f64)> + Clone,
    weight: f64,
) {
    for (row, x_row) in x.clone() {
        for (col, x_col) in x.clone() {
            information[(row, col)] += weight * x_row * x_col;
        }
    }
}
