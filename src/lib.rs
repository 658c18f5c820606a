//! Bradley-Terry ability estimation for batters and bowlers from ball-by-ball cricket data.
//! Fits a binomial-logit model of the survival of each delivery and a multinomial model of the
//! runs scored from it, then combines both into a per-competitor effective average.

pub mod aggregate;
pub mod data;
pub mod design;
pub mod error;
pub mod fit;
pub mod lookup;
pub mod model;
pub mod normalise;
pub mod opt;
pub mod print;
pub mod prior;
pub mod probs;
pub mod score;
pub mod stratum;
pub mod synth;
pub mod timed;

#[cfg(test)]
pub(crate) mod testing;

#[doc = include_str!("../README.md")]
#[cfg(doc)]
fn readme() {}
