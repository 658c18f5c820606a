//! Composite per-competitor statistics against an opponent of zero (mean) normalised ability.

use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::data::{Competitor, Role};
use crate::design::Layout;
use crate::normalise::Abilities;
use crate::probs::{logistic, softmax, SliceExt};

/// Expected runs per dismissal. Undefined when the dismissal probability is zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum EffectiveAverage {
    Finite(f64),
    Undefined,
}
impl EffectiveAverage {
    pub fn new(expected_runs: f64, dismissal: f64) -> Self {
        if dismissal > 0.0 {
            let average = expected_runs / dismissal;
            if average.is_finite() {
                return Self::Finite(average);
            }
        }
        Self::Undefined
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            EffectiveAverage::Finite(value) => Some(*value),
            EffectiveAverage::Undefined => None,
        }
    }
}

impl Display for EffectiveAverage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            EffectiveAverage::Finite(value) => write!(f, "{value:.2}"),
            EffectiveAverage::Undefined => write!(f, "undefined"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Composite {
    pub competitor: Competitor,
    pub dismissal: f64,
    pub expected_runs: f64,
    pub effective_average: EffectiveAverage,
}

/// Probability of a dismissal on one delivery when the survival log-odds contrast is `contrast`.
pub fn dismissal_probability(order_effect: f64, contrast: f64) -> f64 {
    logistic(-(order_effect + contrast))
}

/// Probability of each run value under softmax(ρ<sub>v</sub> + v·contrast), with ρ<sub>0</sub> = 0
/// prepended to `weights`.
pub fn run_distribution(weights: &[f64], runs: &[u8], contrast: f64) -> Vec<f64> {
    let logits: Vec<_> = runs
        .iter()
        .enumerate()
        .map(|(category, &runs)| {
            let weight = if category == 0 { 0.0 } else { weights[category - 1] };
            weight + runs as f64 * contrast
        })
        .collect();
    let mut probs = vec![0.0; logits.len()];
    softmax(&logits, &mut probs);
    probs
}

pub fn mean_runs(probs: &[f64], runs: &[u8]) -> f64 {
    probs.iter().zip(runs).map(|(prob, &runs)| prob * runs as f64).sum()
}

/// Mean of [run_distribution].
pub fn expected_runs(weights: &[f64], runs: &[u8], contrast: f64) -> f64 {
    mean_runs(&run_distribution(weights, runs, contrast), runs)
}

/// Batting and bowling composites, each in ranked order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Scores {
    pub batting: Vec<Composite>,
    pub bowling: Vec<Composite>,
}
impl Scores {
    pub fn by_role(&self, role: Role) -> &[Composite] {
        match role {
            Role::Bat => &self.batting,
            Role::Bowl => &self.bowling,
        }
    }
}

/// Scores every competitor in the layout from the normalised abilities of both models. The order
/// effect is the mean of the per-stratum order effects.
pub fn score(layout: &Layout, wicket: &Abilities, runs: &Abilities, run_values: &[u8]) -> Scores {
    let order_effect = wicket.auxiliary.mean();
    let composite = |competitor: &Competitor, survival_contrast: f64, runs_contrast: f64| {
        let dismissal = dismissal_probability(order_effect, survival_contrast);
        let expected_runs = expected_runs(&runs.auxiliary, run_values, runs_contrast);
        Composite {
            competitor: competitor.clone(),
            dismissal,
            expected_runs,
            effective_average: EffectiveAverage::new(expected_runs, dismissal),
        }
    };

    let mut batting: Vec<_> = layout
        .batters()
        .iter()
        .enumerate()
        .map(|(index, competitor)| composite(competitor, wicket.batting[index], runs.batting[index]))
        .collect();
    let mut bowling: Vec<_> = layout
        .bowlers()
        .iter()
        .enumerate()
        .map(|(index, competitor)| composite(competitor, -wicket.bowling[index], -runs.bowling[index]))
        .collect();
    rank(&mut batting, true);
    rank(&mut bowling, false);
    Scores { batting, bowling }
}

/// Sorts by effective average, descending for batters and ascending for bowlers. Undefined
/// averages cannot be ranked and go last.
pub fn rank(composites: &mut [Composite], descending: bool) {
    composites.sort_by(|a, b| match (a.effective_average.value(), b.effective_average.value()) {
        (Some(a), Some(b)) => {
            let ordering = a.total_cmp(&b);
            if descending {
                ordering.reverse()
            } else {
                ordering
            }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}
