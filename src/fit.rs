//! The estimation pipeline: aggregation, design, prior, optimisation, normalisation and scoring.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::aggregate::{aggregate_runs, aggregate_wickets, RunCategories};
use crate::data::{Competitor, Delivery, Role};
use crate::design::{runs_design, wicket_design, Binomial, Categorical, Layout};
use crate::error::{DataShapeError, FitError};
use crate::model::runs::RunsModel;
use crate::model::wicket::WicketModel;
use crate::model::AbilityModel;
use crate::normalise::{normalise, Abilities};
use crate::opt::{standard_errors, Strategy};
use crate::prior::{check_identifiable, inject_runs_prior, inject_wicket_prior, RunsPrior, WicketPrior};
use crate::probs::logistic;
use crate::score::{mean_runs, run_distribution, score, Scores};
use crate::stratum::{Strata, StratumScheme};
use crate::timed::Timed;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Ghost pseudo-counts of the unstratified wicket model.
    pub wicket_prior: WicketPrior,
    /// Ghost pseudo-counts of the wicket model when the order effect is stratified, by phase or by
    /// venue.
    #[serde(alias = "phase_prior")]
    pub stratified_prior: WicketPrior,
    pub runs_prior: RunsPrior,
    pub stratum_scheme: StratumScheme,
    pub strategy: Strategy,
    /// Run values dropped before fitting the runs model.
    pub excluded_runs: Vec<u8>,
}
impl Config {
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.wicket_prior.validate()?;
        self.stratified_prior.validate()?;
        self.runs_prior.validate()?;
        self.stratum_scheme.validate()?;
        self.strategy.validate()?;
        let categories = RunCategories::excluding(&self.excluded_runs)?;
        self.runs_prior.aligned(&categories)?;
        Ok(())
    }

    /// Reads a JSON configuration; absent fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, anyhow::Error> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(file)?)
    }

    /// The ghost pseudo-counts that apply under the configured stratum scheme.
    pub fn effective_wicket_prior(&self) -> &WicketPrior {
        if self.stratum_scheme.is_stratified() {
            &self.stratified_prior
        } else {
            &self.wicket_prior
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            wicket_prior: WicketPrior::standard(),
            stratified_prior: WicketPrior::stratified(),
            runs_prior: RunsPrior::default(),
            stratum_scheme: StratumScheme::default(),
            strategy: Strategy::default(),
            excluded_runs: vec![5, 7],
        }
    }
}

/// Both likelihood models, ready for optimisation.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub layout: Arc<Layout>,
    pub wicket: WicketModel,
    pub runs: RunsModel,
    /// Deliveries dropped from the runs model for falling in an excluded run category.
    pub excluded: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Estimator {
    config: Config,
    categories: RunCategories,
    runs_prior: Vec<f64>,
}
impl Estimator {
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Aggregates the deliveries, builds both design matrices over a shared layout and injects the
    /// priors.
    pub fn prepare(&self, deliveries: &[Delivery]) -> Result<Prepared, FitError> {
        if deliveries.is_empty() {
            return Err(DataShapeError::new("no deliveries to fit").into());
        }
        let mut strata = Strata::new(self.config.stratum_scheme.clone());
        let wickets = aggregate_wickets(deliveries, &mut strata)?;
        let runs = aggregate_runs(deliveries, &self.categories)?;
        let layout = Arc::new(Layout::from_tables(&wickets, &runs));
        info!(
            "aggregated {} deliveries into {} wicket cells over {} strata and {} pairings; {} batters, {} bowlers",
            deliveries.len(),
            wickets.cells.len(),
            strata.len(),
            runs.cells.len(),
            layout.batters().len(),
            layout.bowlers().len()
        );

        let mut wicket_matrix = wicket_design(&wickets, layout.clone(), &strata)?;
        inject_wicket_prior(&mut wicket_matrix, self.config.effective_wicket_prior());
        check_identifiable(&wicket_matrix, Binomial::trials)?;

        let mut runs_matrix = runs_design(&runs, layout.clone())?;
        inject_runs_prior(&mut runs_matrix, &self.runs_prior);
        check_identifiable(&runs_matrix, Categorical::trials)?;

        Ok(Prepared {
            layout,
            wicket: WicketModel::new(wicket_matrix),
            runs: RunsModel::new(runs_matrix, &self.categories)?,
            excluded: runs.excluded,
        })
    }

    /// Fits both models one after the other.
    pub fn fit(&self, deliveries: &[Delivery]) -> Result<Ratings, FitError> {
        let prepared = self.prepare(deliveries)?;
        let wicket = fit_model(&prepared.wicket, &self.config.strategy)?;
        let runs = fit_model(&prepared.runs, &self.config.strategy)?;
        Ok(Ratings::new(&prepared, wicket, runs))
    }
}

impl TryFrom<Config> for Estimator {
    type Error = anyhow::Error;

    fn try_from(config: Config) -> Result<Self, Self::Error> {
        config.validate()?;
        let categories = RunCategories::excluding(&config.excluded_runs)?;
        let runs_prior = config.runs_prior.aligned(&categories)?;
        Ok(Self {
            config,
            categories,
            runs_prior,
        })
    }
}

/// Fits the wicket and runs models on separate blocking tasks. Fails as [Estimator::fit] does, or
/// with [FitError::Task] if a task panics or is cancelled.
pub async fn fit_concurrently(estimator: &Estimator, deliveries: &[Delivery]) -> Result<Ratings, FitError> {
    let Prepared {
        layout,
        wicket,
        runs,
        excluded,
    } = estimator.prepare(deliveries)?;
    let strategy = estimator.config.strategy;
    let wicket_task = tokio::task::spawn_blocking(move || {
        let fit = fit_model(&wicket, &strategy);
        (wicket, fit)
    });
    let runs_task = tokio::task::spawn_blocking(move || {
        let fit = fit_model(&runs, &strategy);
        (runs, fit)
    });
    let (wicket, wicket_fit) = wicket_task.await?;
    let (runs, runs_fit) = runs_task.await?;
    let prepared = Prepared {
        layout,
        wicket,
        runs,
        excluded,
    };
    Ok(Ratings::new(&prepared, wicket_fit?, runs_fit?))
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostics {
    pub log_likelihood: f64,
    pub iterations: u64,
    pub elapsed: Duration,
    pub strategy: String,
}

/// Estimates of one model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelFit {
    /// Maximum-likelihood parameters relative to the Average competitors.
    pub raw: Vec<f64>,
    /// Standard errors of `raw`.
    pub standard_errors: Vec<f64>,
    pub abilities: Abilities,
    pub auxiliary_labels: Vec<String>,
    pub diagnostics: Diagnostics,
}

pub fn fit_model(model: &impl AbilityModel, strategy: &Strategy) -> Result<ModelFit, FitError> {
    let init = vec![0.0; model.dimension()];
    let Timed {
        value: outcome,
        elapsed,
    } = Timed::result(|| strategy.maximise(model, &init))?;
    let standard_errors = standard_errors(model, &outcome.optimal_values)?;
    let abilities = normalise(&outcome.optimal_values, model.layout(), &model.auxiliary_loadings());
    info!(
        "fitted {} parameters by {strategy} in {} iterations ({elapsed:?}); log-likelihood {:.4}",
        model.dimension(),
        outcome.iterations,
        outcome.log_likelihood
    );
    Ok(ModelFit {
        raw: outcome.optimal_values,
        standard_errors,
        abilities,
        auxiliary_labels: model.auxiliary_labels().to_vec(),
        diagnostics: Diagnostics {
            log_likelihood: outcome.log_likelihood,
            iterations: outcome.iterations,
            elapsed,
            strategy: strategy.to_string(),
        },
    })
}

/// Normalised log-abilities of one competitor in both models.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ability {
    pub wicket: f64,
    pub runs: f64,
}

/// Predicted outcome distribution of one batter facing one bowler.
#[derive(Debug, Clone, PartialEq)]
pub struct Matchup {
    pub batter: Competitor,
    pub bowler: Competitor,
    pub survival: f64,
    /// Probability of each modelled run value.
    pub runs: Vec<(u8, f64)>,
    pub expected_runs: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ratings {
    pub layout: Arc<Layout>,
    pub run_values: Vec<u8>,
    pub wicket: ModelFit,
    pub runs: ModelFit,
    pub scores: Scores,
    pub excluded: u64,
}
impl Ratings {
    fn new(prepared: &Prepared, wicket: ModelFit, runs: ModelFit) -> Self {
        let run_values = prepared.runs.runs().to_vec();
        let scores = score(&prepared.layout, &wicket.abilities, &runs.abilities, &run_values);
        Self {
            layout: prepared.layout.clone(),
            run_values,
            wicket,
            runs,
            scores,
            excluded: prepared.excluded,
        }
    }

    /// Normalised abilities of a competitor; the Average competitor resolves to the reference.
    /// `None` for an unobserved competitor.
    pub fn ability(&self, competitor: &Competitor) -> Option<Ability> {
        let column = match self.layout.column(competitor) {
            Some(column) => Some(column),
            None if competitor.is_average() => None,
            None => return None,
        };
        Some(match competitor.role {
            Role::Bat => Ability {
                wicket: self.wicket.abilities.batting_ability(column),
                runs: self.runs.abilities.batting_ability(column),
            },
            Role::Bowl => Ability {
                wicket: self.wicket.abilities.bowling_ability(column),
                runs: self.runs.abilities.bowling_ability(column),
            },
        })
    }

    /// Predicts the batter facing the bowler in the given stratum. Names that were not observed
    /// resolve to the Average competitor. `None` if the stratum does not exist.
    pub fn matchup(&self, batter: &str, bowler: &str, stratum: usize) -> Option<Matchup> {
        let order_effect = *self.wicket.abilities.auxiliary.get(stratum)?;
        let batter = self.resolve(batter, Role::Bat);
        let bowler = self.resolve(bowler, Role::Bowl);
        let (batting, bowling) = (self.ability(&batter)?, self.ability(&bowler)?);

        let survival = logistic(order_effect + batting.wicket - bowling.wicket);
        let probs = run_distribution(&self.runs.abilities.auxiliary, &self.run_values, batting.runs - bowling.runs);
        let expected_runs = mean_runs(&probs, &self.run_values);
        Some(Matchup {
            batter,
            bowler,
            survival,
            runs: self.run_values.iter().copied().zip(probs).collect(),
            expected_runs,
        })
    }

    fn resolve(&self, name: &str, role: Role) -> Competitor {
        let competitor = Competitor::new(name, role);
        if self.layout.column(&competitor).is_some() {
            competitor
        } else {
            Competitor::average(role)
        }
    }
}

#[cfg(test)]
mod tests;
