//! Binomial-logit model of surviving a delivery.
//!
//! The log-odds of survival of batter `a` facing bowler `b` in stratum `k` are
//! ν<sub>k</sub> + θ<sub>a</sub> − φ<sub>b</sub>. The binomial coefficients are omitted from the
//! log-likelihood; they depend on the counts only.

use nalgebra::DMatrix;

use crate::design::{Binomial, DesignMatrix, DesignRow, Layout};
use crate::model::{add_outer, AbilityModel, LogLikelihood};
use crate::probs::{log1p_exp, logistic};

#[derive(Debug, Clone)]
pub struct WicketModel {
    design: DesignMatrix<Binomial>,
}
impl WicketModel {
    pub fn new(design: DesignMatrix<Binomial>) -> Self {
        Self { design }
    }

    pub fn design(&self) -> &DesignMatrix<Binomial> {
        &self.design
    }

    pub fn strata(&self) -> usize {
        self.design.auxiliary.len()
    }

    /// Probability of the batter surviving one delivery from the bowler in the given stratum.
    /// `None` on either side stands for the Average competitor.
    pub fn survival(
        &self,
        params: &[f64],
        batter: Option<usize>,
        bowler: Option<usize>,
        stratum: usize,
    ) -> f64 {
        let row = DesignRow {
            batter,
            bowler,
            stratum,
            outcome: Binomial {
                wickets: 0.0,
                survivals: 0.0,
            },
            synthetic: true,
        };
        logistic(self.design.coefficients(&row).dot(params))
    }

    /// Fitted survival probability of every row, in row order.
    pub fn fitted(&self, params: &[f64]) -> Vec<f64> {
        self.design
            .rows
            .iter()
            .map(|row| logistic(self.design.coefficients(row).dot(params)))
            .collect()
    }
}

impl LogLikelihood for WicketModel {
    fn dimension(&self) -> usize {
        self.design.dimension()
    }

    fn log_likelihood(&self, params: &[f64]) -> f64 {
        self.design
            .rows
            .iter()
            .map(|row| {
                let logit = self.design.coefficients(row).dot(params);
                row.outcome.survivals * logit - row.outcome.trials() * log1p_exp(logit)
            })
            .sum()
    }

    fn gradient(&self, params: &[f64], gradient: &mut [f64]) -> f64 {
        gradient.fill(0.0);
        let mut log_likelihood = 0.0;
        for row in &self.design.rows {
            let coefficients = self.design.coefficients(row);
            let logit = coefficients.dot(params);
            let trials = row.outcome.trials();
            log_likelihood += row.outcome.survivals * logit - trials * log1p_exp(logit);
            let residual = row.outcome.survivals - trials * logistic(logit);
            for (column, coefficient) in coefficients.iter() {
                gradient[column] += residual * coefficient;
            }
        }
        log_likelihood
    }

    fn information(&self, params: &[f64]) -> DMatrix<f64> {
        let dimension = self.dimension();
        let mut information = DMatrix::zeros(dimension, dimension);
        for row in &self.design.rows {
            let coefficients = self.design.coefficients(row);
            let survival = logistic(coefficients.dot(params));
            let weight = row.outcome.trials() * survival * (1.0 - survival);
            add_outer(&mut information, coefficients.iter(), weight);
        }
        information
    }
}

impl AbilityModel for WicketModel {
    fn layout(&self) -> &Layout {
        &self.design.layout
    }

    fn auxiliary_labels(&self) -> &[String] {
        &self.design.auxiliary
    }

    fn auxiliary_loadings(&self) -> Vec<f64> {
        vec![1.0; self.strata()]
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use assert_float_eq::*;

    use super::*;
    use crate::aggregate::{aggregate_runs, aggregate_wickets, RunCategories};
    use crate::design::wicket_design;
    use crate::model::tests::{numerical_gradient, numerical_information};
    use crate::prior::{inject_wicket_prior, WicketPrior};
    use crate::stratum::{Strata, StratumScheme};
    use crate::testing::{assert_slice_f64_absolute, delivery, repeat, wicket};

    fn model() -> WicketModel {
        let mut deliveries = repeat(delivery("Root", "Starc", 1), 9);
        deliveries.push(wicket("Root", "Starc", "bowled"));
        deliveries.extend(repeat(delivery("Pope", "Cummins", 0), 4));
        deliveries.push(wicket("Pope", "Starc", "caught"));
        let mut strata = Strata::new(StratumScheme::None);
        let wickets = aggregate_wickets(&deliveries, &mut strata).unwrap();
        let runs = aggregate_runs(&deliveries, &RunCategories::default()).unwrap();
        let layout = Arc::new(Layout::from_tables(&wickets, &runs));
        let mut design = wicket_design(&wickets, layout, &strata).unwrap();
        inject_wicket_prior(&mut design, &WicketPrior::standard());
        WicketModel::new(design)
    }

    #[test]
    fn log_likelihood_at_origin() {
        let model = model();
        assert_eq!(5, model.dimension());
        // every row has survival probability ½ at the origin
        let trials: f64 = model.design().rows.iter().map(|row| row.outcome.trials()).sum();
        assert_float_relative_eq!(
            -trials * 2.0f64.ln(),
            model.log_likelihood(&[0.0; 5]),
            1e-12
        );
    }

    #[test]
    fn gradient_matches_finite_differences() {
        let model = model();
        let params = [0.3, -0.2, 0.1, 0.4, 2.5];
        let mut gradient = vec![0.0; 5];
        let log_likelihood = model.gradient(&params, &mut gradient);
        assert_float_relative_eq!(model.log_likelihood(&params), log_likelihood, 1e-12);
        assert_slice_f64_absolute(&numerical_gradient(&model, &params, 1e-6), &gradient, 1e-5);
    }

    #[test]
    fn information_matches_finite_differences() {
        let model = model();
        let params = [0.3, -0.2, 0.1, 0.4, 2.5];
        let information = model.information(&params);
        let numerical = numerical_information(&model, &params, 1e-6);
        assert_slice_f64_absolute(numerical.as_slice(), information.as_slice(), 1e-5);
        assert_eq!(information, information.transpose());
    }

    #[test]
    fn survival_uses_average_reference() {
        let model = model();
        let params = [0.3, -0.2, 0.1, 0.4, 2.5];
        assert_float_relative_eq!(logistic(2.5), model.survival(&params, None, None, 0), 1e-15);
        assert_float_relative_eq!(logistic(2.7), model.survival(&params, Some(0), Some(2), 0), 1e-15);
        assert_float_relative_eq!(logistic(2.1), model.survival(&params, None, Some(3), 0), 1e-15);
        assert_eq!(model.design().rows.len(), model.fitted(&params).len());
    }

    #[test]
    fn auxiliary() {
        let model = model();
        assert_eq!(vec!["ν[all]"], model.auxiliary_labels());
        assert_eq!(vec![1.0], model.auxiliary_loadings());
        assert_eq!(4, model.layout().len());
    }
}
