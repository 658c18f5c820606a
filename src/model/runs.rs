//! Log-linear model of runs scored off the bat, with the per-pairing nuisance profiled out.
//!
//! For a pairing of batter `a` and bowler `b` with ability contrast δ = θ<sub>a</sub> − φ<sub>b</sub>,
//! the expected count of deliveries yielding `v` runs is exp(α<sub>ab</sub> + ρ<sub>v</sub> + v·δ),
//! where ρ<sub>0</sub> = 0 and α<sub>ab</sub> absorbs the number of balls in the pairing. Maximising
//! over α<sub>ab</sub> in closed form leaves the multinomial log-likelihood
//! Σ<sub>v</sub> N<sub>v</sub> ln p<sub>v</sub>, with p = softmax(ρ + v·δ), so the dense parameter
//! vector holds only abilities and the category log-weights ρ.

use nalgebra::DMatrix;

use crate::aggregate::RunCategories;
use crate::design::{Categorical, DesignMatrix, DesignRow, Layout, SparseRow};
use crate::error::DataShapeError;
use crate::model::{add_outer, AbilityModel, LogLikelihood};
use crate::probs::softmax;

#[derive(Debug, Clone)]
pub struct RunsModel {
    design: DesignMatrix<Categorical>,
    runs: Vec<u8>,
}
impl RunsModel {
    pub fn new(design: DesignMatrix<Categorical>, categories: &RunCategories) -> Result<Self, DataShapeError> {
        if design.auxiliary.len() + 1 != categories.len() {
            return Err(DataShapeError::new(format!(
                "{} category weights for {} run categories",
                design.auxiliary.len(),
                categories.len()
            )));
        }
        Ok(Self {
            design,
            runs: categories.values().to_vec(),
        })
    }

    pub fn design(&self) -> &DesignMatrix<Categorical> {
        &self.design
    }

    /// Run value of each category.
    pub fn runs(&self) -> &[u8] {
        &self.runs
    }

    /// Probability of each run category for the pairing; `None` on either side stands for the
    /// Average competitor.
    pub fn distribution(&self, params: &[f64], batter: Option<usize>, bowler: Option<usize>) -> Vec<f64> {
        let row = DesignRow {
            batter,
            bowler,
            stratum: 0,
            outcome: Categorical { counts: vec![] },
            synthetic: true,
        };
        let mut scratch = Scratch::new(self.runs.len());
        self.evaluate(params, &row, &mut scratch);
        scratch.probs
    }

    /// Expected runs per delivery for the pairing.
    pub fn expected_runs(&self, params: &[f64], batter: Option<usize>, bowler: Option<usize>) -> f64 {
        self.distribution(params, batter, bowler)
            .iter()
            .zip(&self.runs)
            .map(|(prob, &runs)| prob * runs as f64)
            .sum()
    }

    /// Conditional maximum-likelihood value of each row's nuisance log-rate α, in row order:
    /// ln(n / Σ<sub>v</sub> e<sup>ρ<sub>v</sub> + v·δ</sup>).
    pub fn pair_nuisance(&self, params: &[f64]) -> Vec<f64> {
        let mut scratch = Scratch::new(self.runs.len());
        self.design
            .rows
            .iter()
            .map(|row| {
                let normaliser = self.evaluate(params, row, &mut scratch);
                row.outcome.trials().ln() - normaliser
            })
            .collect()
    }

    /// Poisson log-likelihood (without the count factorials) with every row's nuisance fixed at
    /// `nuisance`.
    pub fn poisson_log_likelihood(&self, params: &[f64], nuisance: &[f64]) -> f64 {
        let mut scratch = Scratch::new(self.runs.len());
        self.design
            .rows
            .iter()
            .zip(nuisance)
            .map(|(row, alpha)| {
                self.evaluate(params, row, &mut scratch);
                row.outcome
                    .counts
                    .iter()
                    .zip(&scratch.logits)
                    .map(|(count, logit)| {
                        let log_rate = alpha + logit;
                        count * log_rate - log_rate.exp()
                    })
                    .sum::<f64>()
            })
            .sum()
    }

    /// Fills the scratch space with the row's per-category sparse rows, logits and probabilities,
    /// returning the log normaliser.
    fn evaluate(&self, params: &[f64], row: &DesignRow<Categorical>, scratch: &mut Scratch) -> f64 {
        for (category, &runs) in self.runs.iter().enumerate() {
            let coefficients = self.design.coefficients(row, category, runs);
            scratch.logits[category] = coefficients.dot(params);
            scratch.coefficients[category] = coefficients;
        }
        softmax(&scratch.logits, &mut scratch.probs)
    }
}

struct Scratch {
    coefficients: Vec<SparseRow>,
    logits: Vec<f64>,
    probs: Vec<f64>,
    /// Columns touched by the current row, and the probability-weighted mean coefficient of each.
    columns: Vec<usize>,
    means: Vec<f64>,
}
impl Scratch {
    fn new(categories: usize) -> Self {
        Self {
            coefficients: vec![SparseRow::default(); categories],
            logits: vec![0.0; categories],
            probs: vec![0.0; categories],
            columns: Vec::with_capacity(categories + 2),
            means: Vec::with_capacity(categories + 2),
        }
    }

    /// Accumulates Σ<sub>v</sub> p<sub>v</sub> x<sub>v</sub> over the columns the row touches.
    fn accumulate_means(&mut self) {
        self.columns.clear();
        self.means.clear();
        for (coefficients, &prob) in self.coefficients.iter().zip(&self.probs) {
            for (column, coefficient) in coefficients.iter() {
                match self.columns.iter().position(|&existing| existing == column) {
                    Some(index) => self.means[index] += prob * coefficient,
                    None => {
                        self.columns.push(column);
                        self.means.push(prob * coefficient);
                    }
                }
            }
        }
    }
}

impl LogLikelihood for RunsModel {
    fn dimension(&self) -> usize {
        self.design.dimension()
    }

    fn log_likelihood(&self, params: &[f64]) -> f64 {
        let mut scratch = Scratch::new(self.runs.len());
        self.design
            .rows
            .iter()
            .map(|row| {
                let normaliser = self.evaluate(params, row, &mut scratch);
                row.outcome
                    .counts
                    .iter()
                    .zip(&scratch.logits)
                    .map(|(count, logit)| count * (logit - normaliser))
                    .sum::<f64>()
            })
            .sum()
    }

    fn gradient(&self, params: &[f64], gradient: &mut [f64]) -> f64 {
        gradient.fill(0.0);
        let mut scratch = Scratch::new(self.runs.len());
        let mut log_likelihood = 0.0;
        for row in &self.design.rows {
            let normaliser = self.evaluate(params, row, &mut scratch);
            let trials = row.outcome.trials();
            for (category, &count) in row.outcome.counts.iter().enumerate() {
                log_likelihood += count * (scratch.logits[category] - normaliser);
                let residual = count - trials * scratch.probs[category];
                for (column, coefficient) in scratch.coefficients[category].iter() {
                    gradient[column] += residual * coefficient;
                }
            }
        }
        log_likelihood
    }

    /// n (Σ<sub>v</sub> p<sub>v</sub> x<sub>v</sub> x<sub>v</sub>ᵀ − x̄ x̄ᵀ) per row, x̄ being the
    /// probability-weighted mean coefficient vector.
    fn information(&self, params: &[f64]) -> DMatrix<f64> {
        let dimension = self.dimension();
        let mut information = DMatrix::zeros(dimension, dimension);
        let mut scratch = Scratch::new(self.runs.len());
        for row in &self.design.rows {
            self.evaluate(params, row, &mut scratch);
            let trials = row.outcome.trials();
            for (coefficients, &prob) in scratch.coefficients.iter().zip(&scratch.probs) {
                add_outer(&mut information, coefficients.iter(), trials * prob);
            }
            scratch.accumulate_means();
            let means = scratch.columns.iter().copied().zip(scratch.means.iter().copied());
            add_outer(&mut information, means, -trials);
        }
        information
    }
}

impl AbilityModel for RunsModel {
    fn layout(&self) -> &Layout {
        &self.design.layout
    }

    fn auxiliary_labels(&self) -> &[String] {
        &self.design.auxiliary
    }

    fn auxiliary_loadings(&self) -> Vec<f64> {
        self.runs[1..].iter().map(|&runs| runs as f64).collect()
    }
}
