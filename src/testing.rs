//! Testing helpers.

use assert_float_eq::*;
use chrono::NaiveDate;

use crate::data::Delivery;

pub fn assert_slice_f64_absolute(expected: &[f64], actual: &[f64], epsilon: f64) {
    assert_eq!(
        expected.len(),
        actual.len(),
        "lengths do not match: {} ≠ {}",
        expected.len(),
        actual.len()
    );
    for (index, (&expected, &actual)) in expected.iter().zip(actual).enumerate() {
        assert!(
            (expected - actual).abs() <= epsilon,
            "element {index}: expected {expected}, got {actual} (epsilon {epsilon})"
        );
    }
}

pub fn assert_slice_f64_relative(expected: &[f64], actual: &[f64], epsilon: f64) {
    assert_eq!(
        expected.len(),
        actual.len(),
        "lengths do not match: {} ≠ {}",
        expected.len(),
        actual.len()
    );
    for (&expected, &actual) in expected.iter().zip(actual) {
        if actual != expected {
            assert_float_relative_eq!(expected, actual, epsilon);
        }
    }
}

/// A clean (no extras, no wicket) delivery in the first over of the first innings.
pub fn delivery(batter: &str, bowler: &str, runs_off_bat: u8) -> Delivery {
    Delivery {
        match_id: "1".into(),
        date: NaiveDate::from_ymd_opt(2023, 10, 5).unwrap_or_default(),
        venue: "Lord's".into(),
        innings: 1,
        over: 0,
        ball: 1,
        batter: batter.into(),
        bowler: bowler.into(),
        runs_off_bat,
        extras: 0,
        wicket_type: None,
        player_dismissed: None,
    }
}

pub fn wicket(batter: &str, bowler: &str, wicket_type: &str) -> Delivery {
    Delivery {
        wicket_type: Some(wicket_type.into()),
        player_dismissed: Some(batter.into()),
        ..delivery(batter, bowler, 0)
    }
}

/// `count` copies of a delivery.
pub fn repeat(delivery: Delivery, count: usize) -> Vec<Delivery> {
    vec![delivery; count]
}
