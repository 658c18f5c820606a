use assert_float_eq::*;

use super::*;
use crate::data::AVERAGE;
use crate::model::LogLikelihood;
use crate::opt::LbfgsConfig;
use crate::probs::{softmax, SliceExt};
use crate::synth::Scenario;
use crate::testing::{assert_slice_f64_absolute, delivery, repeat, wicket};

fn estimator(config: Config) -> Estimator {
    Estimator::try_from(config).unwrap()
}

/// Ten balls, one wicket, between a single batter and a single bowler.
fn one_pairing() -> Vec<Delivery> {
    let mut deliveries = repeat(delivery("A", "B", 1), 9);
    deliveries.push(wicket("A", "B", "bowled"));
    deliveries
}

fn correlation(a: &[f64], b: &[f64]) -> f64 {
    let (mean_a, mean_b) = (a.mean(), b.mean());
    let covariance: f64 = a.iter().zip(b).map(|(a, b)| (a - mean_a) * (b - mean_b)).sum();
    let variance_a: f64 = a.iter().map(|a| (a - mean_a).powi(2)).sum();
    let variance_b: f64 = b.iter().map(|b| (b - mean_b).powi(2)).sum();
    covariance / (variance_a * variance_b).sqrt()
}

fn centred(values: &[f64]) -> Vec<f64> {
    let mean = values.mean();
    values.iter().map(|value| value - mean).collect()
}

#[test]
fn prior_shrinks_towards_reference() {
    let ratings = estimator(Config::default()).fit(&one_pairing()).unwrap();
    let matchup = ratings.matchup("A", "B", 0).unwrap();
    assert_eq!(Competitor::new("A", Role::Bat), matchup.batter);
    assert_eq!(Competitor::new("B", Role::Bowl), matchup.bowler);
    assert!(
        matchup.survival > 0.9 && matchup.survival < 37.0 / 38.0,
        "survival {} outside (0.9, 37/38)",
        matchup.survival
    );
}

#[test]
fn sixes_outscore_dots() {
    let mut deliveries = repeat(delivery("Six", "X", 6), 50);
    deliveries.extend(repeat(delivery("Dot", "X", 0), 50));
    let ratings = estimator(Config::default()).fit(&deliveries).unwrap();

    let six = ratings.matchup("Six", AVERAGE, 0).unwrap();
    let dot = ratings.matchup("Dot", AVERAGE, 0).unwrap();
    assert!(six.expected_runs > dot.expected_runs, "{} ≤ {}", six.expected_runs, dot.expected_runs);
    assert_float_absolute_eq!(1.0, six.runs.iter().map(|(_, prob)| prob).sum::<f64>(), 1e-12);
    assert_eq!(
        vec![0, 1, 2, 3, 4, 6],
        six.runs.iter().map(|(runs, _)| *runs).collect::<Vec<_>>()
    );

    let names: Vec<_> = ratings.scores.batting.iter().map(|composite| composite.competitor.name.as_str()).collect();
    assert_eq!(vec!["Six", "Dot"], names);
}

#[test]
fn normalised_sides_have_zero_mean() {
    let synthetic = Scenario {
        batters: 5,
        bowlers: 4,
        balls_per_pairing: 40,
        ..Scenario::default()
    }
    .generate();
    let ratings = estimator(Config::default()).fit(&synthetic.deliveries).unwrap();
    for fit in [&ratings.wicket, &ratings.runs] {
        assert_float_absolute_eq!(0.0, fit.abilities.batting.mean(), 1e-12);
        assert_float_absolute_eq!(0.0, fit.abilities.bowling.mean(), 1e-12);
        assert_eq!(fit.raw.len(), fit.standard_errors.len());
        assert!(fit.standard_errors.iter().all(|error| error.is_finite() && *error > 0.0));
        assert_eq!("Irls", fit.diagnostics.strategy);
        assert!(fit.diagnostics.iterations > 0);
    }
    assert_eq!(5, ratings.scores.batting.len());
    assert_eq!(4, ratings.scores.bowling.len());
}

#[test]
fn matchup_reproduces_raw_predictions() {
    let synthetic = Scenario {
        batters: 4,
        bowlers: 3,
        balls_per_pairing: 60,
        ..Scenario::default()
    }
    .generate();
    let config = Config {
        stratum_scheme: StratumScheme::ten_over_phases(),
        ..Config::default()
    };
    let estimator = estimator(config);
    let prepared = estimator.prepare(&synthetic.deliveries).unwrap();
    let ratings = estimator.fit(&synthetic.deliveries).unwrap();

    for batter in prepared.layout.batters() {
        for bowler in prepared.layout.bowlers() {
            let (batter_column, bowler_column) = (prepared.layout.column(batter), prepared.layout.column(bowler));
            for stratum in 0..prepared.wicket.strata() {
                let matchup = ratings.matchup(&batter.name, &bowler.name, stratum).unwrap();
                let survival = prepared.wicket.survival(&ratings.wicket.raw, batter_column, bowler_column, stratum);
                assert_float_absolute_eq!(survival, matchup.survival, 1e-12);
            }
            let matchup = ratings.matchup(&batter.name, &bowler.name, 0).unwrap();
            let distribution = prepared.runs.distribution(&ratings.runs.raw, batter_column, bowler_column);
            let probs: Vec<_> = matchup.runs.iter().map(|(_, prob)| *prob).collect();
            assert_slice_f64_absolute(&distribution, &probs, 1e-12);
        }
    }
}

#[test]
fn average_is_zero_in_both_models() {
    let ratings = estimator(Config::default()).fit(&one_pairing()).unwrap();
    let offset = ratings.layout.len();

    // Average v Average reproduces the raw auxiliary parameters, as both sides are zero before
    // recentring
    let matchup = ratings.matchup(AVERAGE, AVERAGE, 0).unwrap();
    assert_eq!(Competitor::average(Role::Bat), matchup.batter);
    assert_float_relative_eq!(logistic(ratings.wicket.raw[offset]), matchup.survival, 1e-12);
    let mut weights = vec![0.0];
    weights.extend(&ratings.runs.raw[offset..]);
    let mut expected = vec![0.0; weights.len()];
    softmax(&weights, &mut expected);
    let probs: Vec<_> = matchup.runs.iter().map(|(_, prob)| *prob).collect();
    assert_slice_f64_absolute(&expected, &probs, 1e-12);

    // and after recentring sits at minus the mean of its side
    let average = ratings.ability(&Competitor::average(Role::Bat)).unwrap();
    assert_eq!(ratings.wicket.abilities.reference_batting, average.wicket);
    assert_eq!(ratings.runs.abilities.reference_batting, average.runs);
    let average = ratings.ability(&Competitor::average(Role::Bowl)).unwrap();
    assert_float_absolute_eq!(-ratings.wicket.raw[1], average.wicket, 1e-15);
}

#[test]
fn unknown_competitors() {
    let ratings = estimator(Config::default()).fit(&one_pairing()).unwrap();
    assert_eq!(None, ratings.ability(&Competitor::new("Nobody", Role::Bat)));
    assert_eq!(None, ratings.ability(&Competitor::new("A", Role::Bowl)));
    let matchup = ratings.matchup("Nobody", "B", 0).unwrap();
    assert_eq!(Competitor::average(Role::Bat), matchup.batter);
    assert_eq!(None, ratings.matchup("A", "B", 1));
}

#[test]
fn idempotent() {
    let synthetic = Scenario {
        batters: 4,
        bowlers: 3,
        balls_per_pairing: 50,
        ..Scenario::default()
    }
    .generate();
    let estimator = estimator(Config::default());
    let first = estimator.fit(&synthetic.deliveries).unwrap();
    let second = estimator.fit(&synthetic.deliveries).unwrap();
    assert_eq!(first.wicket.abilities, second.wicket.abilities);
    assert_eq!(first.runs.abilities, second.runs.abilities);
    assert_eq!(first.scores, second.scores);
}

#[test]
fn strategies_agree() {
    let synthetic = Scenario {
        batters: 4,
        bowlers: 3,
        balls_per_pairing: 60,
        seed: 5,
        ..Scenario::default()
    }
    .generate();
    let irls = estimator(Config::default()).fit(&synthetic.deliveries).unwrap();
    let lbfgs = estimator(Config {
        strategy: Strategy::BoundedLbfgs(LbfgsConfig::default()),
        ..Config::default()
    })
    .fit(&synthetic.deliveries)
    .unwrap();
    assert_eq!("BoundedLbfgs", lbfgs.wicket.diagnostics.strategy);
    for (irls, lbfgs) in [(&irls.wicket, &lbfgs.wicket), (&irls.runs, &lbfgs.runs)] {
        assert_slice_f64_absolute(&irls.raw, &lbfgs.raw, 1e-3);
        assert_float_relative_eq!(irls.diagnostics.log_likelihood, lbfgs.diagnostics.log_likelihood, 1e-8);
    }
}

#[test]
fn recovers_generating_abilities() {
    let synthetic = Scenario {
        batters: 10,
        bowlers: 5,
        balls_per_pairing: 200,
        wicket_spread: 0.8,
        runs_spread: 0.15,
        order_effect: 2.5,
        seed: 3,
        ..Scenario::default()
    }
    .generate();
    let ratings = estimator(Config::default()).fit(&synthetic.deliveries).unwrap();

    let estimates = |role: Role, count: usize| -> Vec<Ability> {
        (0..count)
            .map(|index| {
                let name = match role {
                    Role::Bat => format!("Batter {}", index + 1),
                    Role::Bowl => format!("Bowler {}", index + 1),
                };
                ratings.ability(&Competitor::new(name, role)).unwrap()
            })
            .collect()
    };
    let batting = estimates(Role::Bat, 10);
    let bowling = estimates(Role::Bowl, 5);

    let runs_batting: Vec<_> = batting.iter().map(|ability| ability.runs).collect();
    let runs_bowling: Vec<_> = bowling.iter().map(|ability| ability.runs).collect();
    assert_slice_f64_absolute(&centred(&synthetic.runs_batting), &runs_batting, 0.1);
    assert_slice_f64_absolute(&centred(&synthetic.runs_bowling), &runs_bowling, 0.1);

    let wicket_batting: Vec<_> = batting.iter().map(|ability| ability.wicket).collect();
    let r = correlation(&synthetic.wicket_batting, &wicket_batting);
    assert!(r > 0.6, "batting correlation {r}");
}

#[test]
fn stratified_order_effects() {
    let synthetic = Scenario {
        batters: 3,
        bowlers: 2,
        balls_per_pairing: 60,
        ..Scenario::default()
    }
    .generate();
    let ratings = estimator(Config {
        stratum_scheme: StratumScheme::ten_over_phases(),
        ..Config::default()
    })
    .fit(&synthetic.deliveries)
    .unwrap();
    assert_eq!(10, ratings.wicket.auxiliary_labels.len());
    assert_eq!("ν[inns 1 overs 1-10]", ratings.wicket.auxiliary_labels[0]);

    // second-innings strata hold only the Average v Average anchor
    let offset = ratings.layout.len();
    for stratum in 5..10 {
        assert_float_absolute_eq!((75.0f64 / 2.0).ln(), ratings.wicket.raw[offset + stratum], 1e-6);
    }
}

#[test]
fn venue_order_effects() {
    let at = |venue: &str, delivery: Delivery| Delivery {
        venue: venue.into(),
        ..delivery
    };
    let mut deliveries = repeat(at("Oval", delivery("A", "B", 1)), 16);
    deliveries.extend(repeat(at("Oval", wicket("A", "B", "bowled")), 4));
    deliveries.extend(repeat(at("Lord's", delivery("A", "B", 0)), 40));
    let estimator = estimator(Config {
        stratum_scheme: StratumScheme::Venue,
        ..Config::default()
    });
    let ratings = estimator.fit(&deliveries).unwrap();
    assert_eq!(vec!["ν[Oval]", "ν[Lord's]"], ratings.wicket.auxiliary_labels);

    // survival is harder at the venue that saw every wicket
    let oval = ratings.matchup("A", "B", 0).unwrap();
    let lords = ratings.matchup("A", "B", 1).unwrap();
    assert!(lords.survival > oval.survival);
    assert_eq!(oval.runs, lords.runs);
    assert!(ratings.matchup("A", "B", 2).is_none());

    deliveries[0].venue.clear();
    let err = estimator.fit(&deliveries).unwrap_err();
    assert!(matches!(err, FitError::DataShape(_)));
}

#[test]
fn no_deliveries() {
    let err = estimator(Config::default()).fit(&[]).unwrap_err();
    assert!(matches!(err, FitError::DataShape(_)));
}

#[test]
fn malformed_delivery() {
    let mut deliveries = one_pairing();
    deliveries[3].bowler = deliveries[3].batter.clone();
    let err = estimator(Config::default()).fit(&deliveries).unwrap_err();
    assert_eq!(
        "malformed input: batter and bowler are the same player (match 1, innings 1, ball 0.1)",
        err.to_string()
    );
}

#[test]
fn iteration_cap_surfaces_estimate() {
    let config = Config {
        strategy: Strategy::Irls(crate::opt::IrlsConfig {
            max_iterations: 1,
            ..Default::default()
        }),
        ..Config::default()
    };
    let estimator = estimator(config);
    let err = estimator.fit(&one_pairing()).unwrap_err();
    assert!(matches!(err, FitError::Convergence(_)));
    let dimension = estimator.prepare(&one_pairing()).unwrap().wicket.dimension();
    assert_eq!(dimension, err.estimate().unwrap().len());
}

#[tokio::test]
async fn concurrent_matches_sequential() {
    let synthetic = Scenario {
        batters: 4,
        bowlers: 3,
        balls_per_pairing: 50,
        ..Scenario::default()
    }
    .generate();
    let estimator = estimator(Config::default());
    let sequential = estimator.fit(&synthetic.deliveries).unwrap();
    let concurrent = fit_concurrently(&estimator, &synthetic.deliveries).await.unwrap();
    assert_eq!(sequential.wicket.abilities, concurrent.wicket.abilities);
    assert_eq!(sequential.runs.abilities, concurrent.runs.abilities);
    assert_eq!(sequential.scores, concurrent.scores);
}

#[tokio::test]
async fn concurrent_failure_carries_estimate() {
    let estimator = estimator(Config {
        strategy: Strategy::Irls(crate::opt::IrlsConfig {
            max_iterations: 1,
            ..Default::default()
        }),
        ..Config::default()
    });
    let err = fit_concurrently(&estimator, &one_pairing()).await.unwrap_err();
    assert!(matches!(err, FitError::Convergence(_)));
    assert!(err.estimate().is_some());

    let err = fit_concurrently(&estimator, &[]).await.unwrap_err();
    assert!(matches!(err, FitError::DataShape(_)));
}

#[test]
fn config_json() {
    let config: Config = serde_json::from_str(r#"{"excluded_runs": [5], "stratum_scheme": "Venue"}"#).unwrap();
    assert_eq!(vec![5], config.excluded_runs);
    assert_eq!(StratumScheme::Venue, config.stratum_scheme);
    assert_eq!(WicketPrior::stratified(), *config.effective_wicket_prior());
    assert_eq!(Strategy::default(), config.strategy);
    config.validate().unwrap();

    let config: Config =
        serde_json::from_str(r#"{"phase_prior": {"wickets": 3.0, "survivals": 90.0}}"#).unwrap();
    assert_eq!(WicketPrior { wickets: 3.0, survivals: 90.0 }, config.stratified_prior);

    let json = serde_json::to_string(&Config::default()).unwrap();
    assert_eq!(Config::default(), serde_json::from_str(&json).unwrap());
}

#[test]
fn invalid_config() {
    assert!(Estimator::try_from(Config {
        excluded_runs: vec![0],
        ..Config::default()
    })
    .is_err());
    assert!(Estimator::try_from(Config {
        wicket_prior: WicketPrior {
            wickets: 0.0,
            survivals: 37.0
        },
        ..Config::default()
    })
    .is_err());
    assert!(Estimator::try_from(Config {
        stratum_scheme: StratumScheme::Phase {
            overs_per_phase: 10_000,
            phases: 10
        },
        ..Config::default()
    })
    .is_err());
    let mut runs_prior = RunsPrior::default();
    runs_prior.counts.remove(&4);
    assert!(Estimator::try_from(Config {
        runs_prior,
        ..Config::default()
    })
    .is_err());
}
