//! Synthetic deliveries drawn from known abilities.

use anyhow::bail;
use chrono::NaiveDate;
use tinyrand::{Rand, Seeded, StdRand};

use crate::aggregate::RunCategories;
use crate::data::Delivery;
use crate::probs::logistic;
use crate::score::run_distribution;

#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub batters: usize,
    pub bowlers: usize,
    pub balls_per_pairing: usize,
    /// True log-abilities are drawn uniformly from `[-spread, spread]`.
    pub wicket_spread: f64,
    pub runs_spread: f64,
    /// Survival log-odds between two mean competitors.
    pub order_effect: f64,
    /// Log-weights ρ of the non-zero run categories, relative to zero runs.
    pub run_weights: Vec<f64>,
    pub seed: u64,
}
impl Scenario {
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.batters == 0 || self.bowlers == 0 {
            bail!("at least one batter and one bowler must be specified");
        }
        if self.balls_per_pairing == 0 {
            bail!("at least one ball per pairing must be specified");
        }
        if self.wicket_spread < 0.0 || self.runs_spread < 0.0 {
            bail!("ability spreads must be non-negative");
        }
        let categories = RunCategories::default();
        if self.run_weights.len() + 1 != categories.len() {
            bail!(
                "{} run weights specified for {} non-zero run categories",
                self.run_weights.len(),
                categories.len() - 1
            );
        }
        Ok(())
    }

    pub fn generate(&self) -> Synthetic {
        let mut rand = StdRand::seed(self.seed);
        let mut draw = |count: usize, spread: f64| -> Vec<f64> {
            (0..count)
                .map(|_| (uniform(&mut rand) * 2.0 - 1.0) * spread)
                .collect()
        };
        let wicket_batting = draw(self.batters, self.wicket_spread);
        let wicket_bowling = draw(self.bowlers, self.wicket_spread);
        let runs_batting = draw(self.batters, self.runs_spread);
        let runs_bowling = draw(self.bowlers, self.runs_spread);

        let categories = RunCategories::default();
        let date = NaiveDate::from_ymd_opt(2023, 10, 5).unwrap_or_default();
        let mut deliveries = Vec::with_capacity(self.batters * self.bowlers * self.balls_per_pairing);
        for batter in 0..self.batters {
            for bowler in 0..self.bowlers {
                let survival = logistic(self.order_effect + wicket_batting[batter] - wicket_bowling[bowler]);
                let probs = run_distribution(
                    &self.run_weights,
                    categories.values(),
                    runs_batting[batter] - runs_bowling[bowler],
                );

                for ball in 0..self.balls_per_pairing {
                    let dismissed = uniform(&mut rand) >= survival;
                    let runs_off_bat = categories.values()[sample(&probs, uniform(&mut rand))];
                    let batter_name = format!("Batter {}", batter + 1);
                    deliveries.push(Delivery {
                        match_id: format!("synthetic {}", batter * self.bowlers + bowler + 1),
                        date,
                        venue: "Nowhere".into(),
                        innings: 1,
                        over: (ball / 6 % 50) as u16,
                        ball: (ball % 6 + 1) as u8,
                        player_dismissed: dismissed.then(|| batter_name.clone()),
                        wicket_type: dismissed.then(|| "caught".into()),
                        batter: batter_name,
                        bowler: format!("Bowler {}", bowler + 1),
                        runs_off_bat,
                        extras: 0,
                    });
                }
            }
        }

        Synthetic {
            deliveries,
            wicket_batting,
            wicket_bowling,
            runs_batting,
            runs_bowling,
        }
    }
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            batters: 12,
            bowlers: 8,
            balls_per_pairing: 120,
            wicket_spread: 0.5,
            runs_spread: 0.1,
            order_effect: 3.6,
            run_weights: [12.5, 2.3, 0.4, 3.0, 0.8]
                .iter()
                .map(|count: &f64| (count / 19.0).ln())
                .collect(),
            seed: 0,
        }
    }
}

/// Deliveries together with the abilities that generated them. Competitor `i` is named
/// `Batter {i + 1}` or `Bowler {i + 1}`. Runs are drawn independently of the dismissal, so a
/// dismissal may carry runs.
#[derive(Debug, Clone, PartialEq)]
pub struct Synthetic {
    pub deliveries: Vec<Delivery>,
    pub wicket_batting: Vec<f64>,
    pub wicket_bowling: Vec<f64>,
    pub runs_batting: Vec<f64>,
    pub runs_bowling: Vec<f64>,
}

fn uniform(rand: &mut impl Rand) -> f64 {
    rand.next_u64() as f64 / u64::MAX as f64
}

/// Inverse-CDF draw from `probs`.
fn sample(probs: &[f64], uniform: f64) -> usize {
    let mut cumulative = 0.0;
    for (index, prob) in probs.iter().enumerate() {
        cumulative += prob;
        if uniform < cumulative {
            return index;
        }
    }
    probs.len() - 1
}
