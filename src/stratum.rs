//! Partitions of deliveries into strata, each carrying its own order effect ν<sub>k</sub>.

use std::fmt::{Display, Formatter};

use anyhow::bail;
use serde::{Deserialize, Serialize};

use crate::data::Delivery;
use crate::error::DataShapeError;
use crate::lookup::Lookup;

/// Innings per match under the phase scheme.
pub const PHASE_INNINGS: u8 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum StratumScheme {
    #[default]
    None,
    Phase { overs_per_phase: u16, phases: u16 },
    Venue,
}
impl StratumScheme {
    /// Ten-over phases of a fifty-over innings, for both innings.
    pub fn ten_over_phases() -> Self {
        Self::Phase {
            overs_per_phase: 10,
            phases: 5,
        }
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if let StratumScheme::Phase {
            overs_per_phase,
            phases,
        } = self
        {
            if *overs_per_phase == 0 {
                bail!("overs per phase must be positive");
            }
            if *phases == 0 {
                bail!("at least one phase must be specified");
            }
            if u32::from(*overs_per_phase) * u32::from(*phases) > u32::from(u16::MAX) {
                bail!("{phases} phases of {overs_per_phase} overs exceed {} overs", u16::MAX);
            }
        }
        Ok(())
    }

    pub fn is_stratified(&self) -> bool {
        !matches!(self, StratumScheme::None)
    }

    fn key(&self, delivery: &Delivery) -> Result<StratumKey, DataShapeError> {
        match self {
            StratumScheme::None => Ok(StratumKey::All),
            StratumScheme::Phase {
                overs_per_phase,
                phases,
            } => {
                if !(1..=PHASE_INNINGS).contains(&delivery.innings) {
                    return Err(DataShapeError::new(format!(
                        "innings {} outside 1..={PHASE_INNINGS} in match {}",
                        delivery.innings, delivery.match_id
                    )));
                }
                let phase = u16::min(delivery.over / overs_per_phase, phases - 1);
                Ok(phase_key(delivery.innings, phase, *overs_per_phase, *phases))
            }
            StratumScheme::Venue => {
                if delivery.venue.is_empty() {
                    return Err(DataShapeError::new(format!(
                        "missing venue in match {}",
                        delivery.match_id
                    )));
                }
                Ok(StratumKey::Venue(delivery.venue.clone()))
            }
        }
    }
}

fn phase_key(innings: u8, phase: u16, overs_per_phase: u16, phases: u16) -> StratumKey {
    StratumKey::Phase {
        innings,
        first_over: phase * overs_per_phase,
        last_over: if phase == phases - 1 {
            None
        } else {
            Some((phase + 1) * overs_per_phase - 1)
        },
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StratumKey {
    All,
    Phase {
        innings: u8,
        first_over: u16,
        /// `None` for the open-ended final phase.
        last_over: Option<u16>,
    },
    Venue(String),
}

impl Display for StratumKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StratumKey::All => write!(f, "all"),
            StratumKey::Phase {
                innings,
                first_over,
                last_over: Some(last_over),
            } => write!(f, "inns {innings} overs {}-{}", first_over + 1, last_over + 1),
            StratumKey::Phase {
                innings,
                first_over,
                last_over: None,
            } => write!(f, "inns {innings} overs {}+", first_over + 1),
            StratumKey::Venue(venue) => write!(f, "{venue}"),
        }
    }
}

/// The strata discovered for a dataset. Index 0 is the reference stratum.
#[derive(Debug, Clone, PartialEq)]
pub struct Strata {
    scheme: StratumScheme,
    keys: Lookup<StratumKey>,
}
impl Strata {
    /// Fixed schemes register every stratum up front so that indices do not depend on data order.
    pub fn new(scheme: StratumScheme) -> Self {
        let mut keys = Lookup::default();
        match &scheme {
            StratumScheme::None => {
                keys.intern(&StratumKey::All);
            }
            StratumScheme::Phase {
                overs_per_phase,
                phases,
            } => {
                for innings in 1..=PHASE_INNINGS {
                    for phase in 0..*phases {
                        keys.intern(&phase_key(innings, phase, *overs_per_phase, *phases));
                    }
                }
            }
            StratumScheme::Venue => {}
        }
        Self { scheme, keys }
    }

    /// Index of the stratum the delivery belongs to, registering it if the scheme is data-driven.
    pub fn resolve(&mut self, delivery: &Delivery) -> Result<usize, DataShapeError> {
        let key = self.scheme.key(delivery)?;
        Ok(self.keys.intern(&key))
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn labels(&self) -> Vec<String> {
        self.keys.items().iter().map(ToString::to_string).collect()
    }
}
