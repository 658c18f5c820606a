//! Recentring of fitted log-abilities.
//!
//! Batting and bowling log-abilities are each shifted to zero mean. Every auxiliary parameter
//! absorbs its loading times the net shift of the contrast θ − φ, so every fitted probability is
//! unchanged. The Average competitors, fixed at zero before recentring, move with their side.

use crate::design::Layout;
use crate::probs::SliceExt;

#[derive(Debug, Clone, PartialEq)]
pub struct Abilities {
    pub batting: Vec<f64>,
    pub bowling: Vec<f64>,
    pub auxiliary: Vec<f64>,
    /// Log-ability of the Average batter after recentring.
    pub reference_batting: f64,
    /// Log-ability of the Average bowler after recentring.
    pub reference_bowling: f64,
    bowling_offset: usize,
}
impl Abilities {
    /// Reassembles the dense `[θ | φ | aux]` vector.
    pub fn to_params(&self) -> Vec<f64> {
        let mut params = Vec::with_capacity(self.batting.len() + self.bowling.len() + self.auxiliary.len());
        params.extend(&self.batting);
        params.extend(&self.bowling);
        params.extend(&self.auxiliary);
        params
    }

    /// `None` for the Average batter.
    pub fn batting_ability(&self, column: Option<usize>) -> f64 {
        column.map(|column| self.batting[column]).unwrap_or(self.reference_batting)
    }

    /// Takes the layout column, which is offset by the number of batters.
    pub fn bowling_ability(&self, column: Option<usize>) -> f64 {
        column
            .map(|column| self.bowling[column - self.bowling_offset])
            .unwrap_or(self.reference_bowling)
    }
}

/// Splits `raw` by the layout and recentres it. `loadings` holds one entry per auxiliary parameter.
pub fn normalise(raw: &[f64], layout: &Layout, loadings: &[f64]) -> Abilities {
    debug_assert_eq!(
        raw.len(),
        layout.len() + loadings.len(),
        "{} parameters for {} ability columns and {} auxiliary parameters",
        raw.len(),
        layout.len(),
        loadings.len()
    );
    let batting = &raw[layout.batting_range()];
    let bowling = &raw[layout.bowling_range()];
    let auxiliary = &raw[layout.len()..];

    let batting_mean = batting.mean();
    let bowling_mean = bowling.mean();
    let shift = batting_mean - bowling_mean;
    Abilities {
        batting: batting.iter().map(|ability| ability - batting_mean).collect(),
        bowling: bowling.iter().map(|ability| ability - bowling_mean).collect(),
        auxiliary: auxiliary
            .iter()
            .zip(loadings)
            .map(|(value, loading)| value + loading * shift)
            .collect(),
        reference_batting: -batting_mean,
        reference_bowling: -bowling_mean,
        bowling_offset: layout.batting_range().end,
    }
}
