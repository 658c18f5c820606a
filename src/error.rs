//! Error taxonomy for the estimation pipeline.

use std::fmt::{Display, Formatter};

use thiserror::Error;
use tokio::task::JoinError;

use crate::data::Competitor;

#[derive(Debug, Error)]
pub enum FitError {
    #[error("{0}")]
    DataShape(#[from] DataShapeError),

    #[error("{0}")]
    Identifiability(#[from] IdentifiabilityError),

    #[error("{0}")]
    Convergence(#[from] ConvergenceError),

    #[error("{0}")]
    Numerical(#[from] NumericalError),

    #[error("fitting task did not complete: {0}")]
    Task(#[from] JoinError),
}
impl FitError {
    /// The last valid parameter estimate, if the failure occurred inside the optimiser.
    pub fn estimate(&self) -> Option<&[f64]> {
        match self {
            FitError::Convergence(err) => Some(&err.estimate),
            FitError::Numerical(err) => Some(&err.estimate),
            _ => None,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
#[error("malformed input: {reason}")]
pub struct DataShapeError {
    pub reason: String,
}
impl DataShapeError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
#[error("{competitor} has no mass against the reference competitor")]
pub struct IdentifiabilityError {
    pub competitor: Competitor,
}

#[derive(Debug, Error, Clone, PartialEq)]
#[error("no convergence after {iterations} iterations (log-likelihood {log_likelihood})")]
pub struct ConvergenceError {
    pub iterations: u64,
    pub log_likelihood: f64,
    pub estimate: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericalFault {
    SingularInformation,
    NonFiniteLikelihood,
    LineSearch,
}
impl Display for NumericalFault {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            NumericalFault::SingularInformation => write!(f, "singular information matrix"),
            NumericalFault::NonFiniteLikelihood => write!(f, "non-finite log-likelihood"),
            NumericalFault::LineSearch => write!(f, "line search failed to find a descent step"),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
#[error("{fault} at iteration {iterations}")]
pub struct NumericalError {
    pub fault: NumericalFault,
    pub iterations: u64,
    pub estimate: Vec<f64>,
}
