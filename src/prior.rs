//! Ghost observations against the Average competitor.
//!
//! Every competitor is paired once with the Average competitor of the opposing role, carrying a
//! configured pseudo-count. The ghosts make the likelihood strictly concave in every ability column
//! and shrink sparsely observed competitors towards the reference. One further ghost per stratum
//! pits Average against Average, anchoring the auxiliary parameters.

use std::collections::BTreeMap;

use anyhow::bail;
use serde::{Deserialize, Serialize};

use crate::aggregate::RunCategories;
use crate::design::{Binomial, Categorical, DesignMatrix, DesignRow};
use crate::error::IdentifiabilityError;

/// Pseudo-counts of a wicket ghost observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WicketPrior {
    pub wickets: f64,
    pub survivals: f64,
}
impl WicketPrior {
    /// Used by the unstratified model.
    pub fn standard() -> Self {
        Self {
            wickets: 1.0,
            survivals: 37.0,
        }
    }

    /// Used when the order effect is split into strata.
    pub fn stratified() -> Self {
        Self {
            wickets: 2.0,
            survivals: 75.0,
        }
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !(self.wickets > 0.0 && self.wickets.is_finite()) {
            bail!("prior wickets must be positive and finite");
        }
        if !(self.survivals > 0.0 && self.survivals.is_finite()) {
            bail!("prior survivals must be positive and finite");
        }
        Ok(())
    }

    fn outcome(&self) -> Binomial {
        Binomial {
            wickets: self.wickets,
            survivals: self.survivals,
        }
    }
}

impl Default for WicketPrior {
    fn default() -> Self {
        Self::standard()
    }
}

/// Pseudo-count per run value of a runs ghost observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunsPrior {
    pub counts: BTreeMap<u8, f64>,
}
impl RunsPrior {
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        for (runs, count) in &self.counts {
            if !(*count > 0.0 && count.is_finite()) {
                bail!("prior count for {runs} runs must be positive and finite");
            }
        }
        Ok(())
    }

    /// Pseudo-counts aligned with the modelled categories; every category must be covered.
    pub fn aligned(&self, categories: &RunCategories) -> Result<Vec<f64>, anyhow::Error> {
        categories
            .values()
            .iter()
            .map(|runs| match self.counts.get(runs) {
                Some(&count) => Ok(count),
                None => bail!("no prior count for {runs} runs"),
            })
            .collect()
    }
}

impl Default for RunsPrior {
    /// Roughly the run distribution of 38 one-day deliveries.
    fn default() -> Self {
        Self {
            counts: BTreeMap::from([
                (0, 19.0),
                (1, 12.5),
                (2, 2.3),
                (3, 0.4),
                (4, 3.0),
                (6, 0.8),
                (5, 0.05),
                (7, 0.01),
            ]),
        }
    }
}

/// Appends one ghost per batter (against the Average bowler) and per bowler (against the Average
/// batter), both in the reference stratum, and one Average-versus-Average anchor per stratum.
pub fn inject_wicket_prior(design: &mut DesignMatrix<Binomial>, prior: &WicketPrior) {
    let outcome = prior.outcome();
    let strata = design.auxiliary.len();
    inject(design, strata, || outcome);
}

/// As [inject_wicket_prior], with per-category pseudo-counts and a single anchor.
pub fn inject_runs_prior(design: &mut DesignMatrix<Categorical>, counts: &[f64]) {
    inject(design, 1, || Categorical {
        counts: counts.to_vec(),
    });
}

fn inject<O>(design: &mut DesignMatrix<O>, anchors: usize, mut outcome: impl FnMut() -> O) {
    let layout = design.layout.clone();
    design.rows.reserve(layout.len() + anchors);
    for column in layout.batting_range() {
        design.rows.push(ghost(Some(column), None, 0, outcome()));
    }
    for column in layout.bowling_range() {
        design.rows.push(ghost(None, Some(column), 0, outcome()));
    }
    for stratum in 0..anchors {
        design.rows.push(ghost(None, None, stratum, outcome()));
    }
}

fn ghost<O>(batter: Option<usize>, bowler: Option<usize>, stratum: usize, outcome: O) -> DesignRow<O> {
    DesignRow {
        batter,
        bowler,
        stratum,
        outcome,
        synthetic: true,
    }
}

/// Verifies that every ability column is paired with the reference competitor in a row of
/// positive mass.
pub fn check_identifiable<O>(
    design: &DesignMatrix<O>,
    trials: impl Fn(&O) -> f64,
) -> Result<(), IdentifiabilityError> {
    let mut anchored = vec![false; design.layout.len()];
    for row in &design.rows {
        if trials(&row.outcome) <= 0.0 {
            continue;
        }
        match (row.batter, row.bowler) {
            (Some(column), None) | (None, Some(column)) => anchored[column] = true,
            _ => {}
        }
    }
    let competitors = design.layout.batters().iter().chain(design.layout.bowlers());
    match competitors.zip(anchored).find(|(_, anchored)| !anchored) {
        None => Ok(()),
        Some((competitor, _)) => Err(IdentifiabilityError {
            competitor: competitor.clone(),
        }),
    }
}
