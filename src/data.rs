//! Ball-by-ball input records, competitor identities and the thin ingestion/eligibility layer
//! that feeds the estimation core.

use std::fmt::{Display, Formatter};
use std::fs::File;
use std::path::Path;

use chrono::NaiveDate;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};

use crate::error::DataShapeError;

/// Name reserved for the reference competitor on either side.
pub const AVERAGE: &str = "Average";

/// Dismissals that are not credited to the bowler.
const UNCREDITED_DISMISSALS: [&str; 8] = [
    "run out",
    "retired hurt",
    "retired out",
    "retired not out",
    "obstructing the field",
    "timed out",
    "handled the ball",
    "hit the ball twice",
];

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter, Serialize, Deserialize,
)]
pub enum Role {
    Bat,
    Bowl,
}
/// A player in a specific role. The same person batting and bowling is two distinct competitors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Competitor {
    pub name: String,
    pub role: Role,
}
impl Competitor {
    pub fn new(name: impl Into<String>, role: Role) -> Self {
        Self {
            name: name.into(),
            role,
        }
    }

    /// The reference competitor for the given role; its log-ability is fixed at zero.
    pub fn average(role: Role) -> Self {
        Self::new(AVERAGE, role)
    }

    pub fn is_average(&self) -> bool {
        self.name == AVERAGE
    }
}

impl Display for Competitor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.name, self.role)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delivery {
    pub match_id: String,
    pub date: NaiveDate,
    pub venue: String,
    pub innings: u8,
    /// Zero-based over index.
    pub over: u16,
    pub ball: u8,
    pub batter: String,
    pub bowler: String,
    pub runs_off_bat: u8,
    pub extras: u8,
    pub wicket_type: Option<String>,
    pub player_dismissed: Option<String>,
}
impl Delivery {
    pub fn validate(&self) -> Result<(), DataShapeError> {
        if self.batter.is_empty() {
            return Err(self.malformed("missing batter"));
        }
        if self.bowler.is_empty() {
            return Err(self.malformed("missing bowler"));
        }
        if self.batter == AVERAGE || self.bowler == AVERAGE {
            return Err(self.malformed(format!("competitor name '{AVERAGE}' is reserved")));
        }
        if self.batter == self.bowler {
            return Err(self.malformed("batter and bowler are the same player"));
        }
        if self.innings == 0 {
            return Err(self.malformed("innings must be numbered from 1"));
        }
        if self.wicket_type.is_some() && self.player_dismissed.is_none() {
            return Err(self.malformed("wicket without a dismissed player"));
        }
        Ok(())
    }

    fn malformed(&self, reason: impl Display) -> DataShapeError {
        DataShapeError::new(format!(
            "{reason} (match {}, innings {}, ball {}.{})",
            self.match_id, self.innings, self.over, self.ball
        ))
    }

    pub fn batting(&self) -> Competitor {
        Competitor::new(&self.batter, Role::Bat)
    }

    pub fn bowling(&self) -> Competitor {
        Competitor::new(&self.bowler, Role::Bowl)
    }

    /// Whether the delivery dismissed the striker in a manner credited to the bowler.
    pub fn is_credited_wicket(&self) -> bool {
        match (&self.wicket_type, &self.player_dismissed) {
            (Some(wicket_type), Some(dismissed)) => {
                is_credited(wicket_type) && dismissed == &self.batter
            }
            _ => false,
        }
    }
}

fn is_credited(wicket_type: &str) -> bool {
    !UNCREDITED_DISMISSALS.contains(&wicket_type.trim().to_lowercase().as_str())
}

/// One row of a cricsheet-style ball-by-ball CSV. Unused columns are ignored.
#[derive(Debug, Deserialize)]
struct CsvRow {
    match_id: String,
    start_date: NaiveDate,
    venue: String,
    innings: u8,
    ball: String,
    striker: String,
    bowler: String,
    runs_off_bat: u8,
    extras: u8,
    wicket_type: Option<String>,
    player_dismissed: Option<String>,
}

impl TryFrom<CsvRow> for Delivery {
    type Error = DataShapeError;

    fn try_from(row: CsvRow) -> Result<Self, Self::Error> {
        let (over, ball) = parse_ball(&row.ball)?;
        let delivery = Delivery {
            match_id: row.match_id,
            date: row.start_date,
            venue: row.venue,
            innings: row.innings,
            over,
            ball,
            batter: row.striker,
            bowler: row.bowler,
            runs_off_bat: row.runs_off_bat,
            extras: row.extras,
            wicket_type: row.wicket_type.filter(|s| !s.is_empty()),
            player_dismissed: row.player_dismissed.filter(|s| !s.is_empty()),
        };
        delivery.validate()?;
        Ok(delivery)
    }
}

/// Parses an `over.ball` index such as `12.3`.
fn parse_ball(s: &str) -> Result<(u16, u8), DataShapeError> {
    let malformed = || DataShapeError::new(format!("malformed ball index '{s}'"));
    let (over, ball) = s.trim().split_once('.').ok_or_else(malformed)?;
    let over = over.parse().map_err(|_| malformed())?;
    let ball = ball.parse().map_err(|_| malformed())?;
    Ok((over, ball))
}

/// Reads every delivery from a cricsheet-style CSV file.
pub fn read_csv(path: impl AsRef<Path>) -> Result<Vec<Delivery>, anyhow::Error> {
    let file = File::open(path)?;
    let mut reader = csv::Reader::from_reader(file);
    let mut deliveries = vec![];
    for row in reader.deserialize::<CsvRow>() {
        deliveries.push(Delivery::try_from(row?)?);
    }
    Ok(deliveries)
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    NoExtras,
    BowlerCredited,
    MinBallsFaced(u64),
    MinBallsBowled(u64),
}
impl Predicate {
    fn admits(&self, delivery: &Delivery, counts: &BallCounts) -> bool {
        match self {
            Predicate::NoExtras => delivery.extras == 0,
            Predicate::BowlerCredited => delivery
                .wicket_type
                .as_ref()
                .map(|wicket_type| is_credited(wicket_type))
                .unwrap_or(true),
            Predicate::MinBallsFaced(min) => counts.faced(&delivery.batter) >= *min,
            Predicate::MinBallsBowled(min) => counts.bowled(&delivery.bowler) >= *min,
        }
    }

    fn is_threshold(&self) -> bool {
        matches!(self, Predicate::MinBallsFaced(_) | Predicate::MinBallsBowled(_))
    }
}

#[derive(Debug, Default)]
struct BallCounts {
    faced: FxHashMap<String, u64>,
    bowled: FxHashMap<String, u64>,
}
impl BallCounts {
    fn tally(deliveries: &[Delivery]) -> Self {
        let mut counts = Self::default();
        for delivery in deliveries {
            *counts.faced.entry(delivery.batter.clone()).or_default() += 1;
            *counts.bowled.entry(delivery.bowler.clone()).or_default() += 1;
        }
        counts
    }

    fn faced(&self, batter: &str) -> u64 {
        self.faced.get(batter).copied().unwrap_or_default()
    }

    fn bowled(&self, bowler: &str) -> u64 {
        self.bowled.get(bowler).copied().unwrap_or_default()
    }
}

/// Applies the per-delivery predicates first; ball-count thresholds are then evaluated over the
/// surviving stream, so a competitor's eligibility is judged on the deliveries that reach the model.
pub fn filter(deliveries: Vec<Delivery>, predicates: &[Predicate]) -> Vec<Delivery> {
    let empty = BallCounts::default();
    let deliveries: Vec<_> = deliveries
        .into_iter()
        .filter(|delivery| {
            predicates
                .iter()
                .filter(|predicate| !predicate.is_threshold())
                .all(|predicate| predicate.admits(delivery, &empty))
        })
        .collect();

    if !predicates.iter().any(Predicate::is_threshold) {
        return deliveries;
    }
    let counts = BallCounts::tally(&deliveries);
    deliveries
        .into_iter()
        .filter(|delivery| {
            predicates
                .iter()
                .filter(|predicate| predicate.is_threshold())
                .all(|predicate| predicate.admits(delivery, &counts))
        })
        .collect()
}
