//! Reduction of delivery streams into the sufficient statistics of the two models.

use anyhow::bail;
use rustc_hash::FxHashMap;

use crate::data::{Competitor, Delivery};
use crate::error::DataShapeError;
use crate::stratum::Strata;

/// Largest run value considered when deriving the modelled categories.
pub const MAX_RUNS: u8 = 7;

/// Runs-off-the-bat values that are modelled, in category order. The first category must be
/// zero runs; it serves as the reference category of the runs model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunCategories {
    values: Vec<u8>,
}
impl RunCategories {
    pub fn excluding(excluded: &[u8]) -> Result<Self, anyhow::Error> {
        if excluded.contains(&0) {
            bail!("zero runs is the reference category and cannot be excluded");
        }
        let values: Vec<_> = (0..=MAX_RUNS)
            .filter(|runs| !excluded.contains(runs))
            .collect();
        if values.len() < 2 {
            bail!("at least one non-zero run value must remain after exclusions");
        }
        Ok(Self { values })
    }

    pub fn values(&self) -> &[u8] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn index_of(&self, runs: u8) -> Option<usize> {
        self.values.iter().position(|&value| value == runs)
    }
}

impl Default for RunCategories {
    /// 0, 1, 2, 3, 4 and 6; fives and sevens are too rare to model.
    fn default() -> Self {
        Self {
            values: vec![0, 1, 2, 3, 4, 6],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WicketCell {
    pub bowler: Competitor,
    pub batter: Competitor,
    pub stratum: usize,
    pub wickets: u64,
    pub survivals: u64,
}

/// Wicket/survival counts per (bowler, batter, stratum), in order of first appearance.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WicketTable {
    pub cells: Vec<WicketCell>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunsCell {
    pub batter: Competitor,
    pub bowler: Competitor,
    /// Frequency of each run category, aligned with [RunCategories::values].
    pub counts: Vec<u64>,
}
impl RunsCell {
    pub fn balls(&self) -> u64 {
        self.counts.iter().sum()
    }
}

/// Run-category frequencies per (batter, bowler) pairing. The position of a cell is the pairing's
/// nuisance identifier; deliveries from unlike pairings are never merged.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RunsTable {
    pub categories: RunCategories,
    pub cells: Vec<RunsCell>,
    /// Deliveries dropped for falling in an excluded run category.
    pub excluded: u64,
}

pub fn aggregate_wickets(
    deliveries: &[Delivery],
    strata: &mut Strata,
) -> Result<WicketTable, DataShapeError> {
    let mut table = WicketTable::default();
    let mut cell_indices: FxHashMap<(&str, &str, usize), usize> = FxHashMap::default();
    for delivery in deliveries {
        delivery.validate()?;
        let stratum = strata.resolve(delivery)?;
        let key = (delivery.bowler.as_str(), delivery.batter.as_str(), stratum);
        let cell_index = *cell_indices.entry(key).or_insert_with(|| {
            table.cells.push(WicketCell {
                bowler: delivery.bowling(),
                batter: delivery.batting(),
                stratum,
                wickets: 0,
                survivals: 0,
            });
            table.cells.len() - 1
        });
        let cell = &mut table.cells[cell_index];
        if delivery.is_credited_wicket() {
            cell.wickets += 1;
        } else {
            cell.survivals += 1;
        }
    }
    Ok(table)
}

pub fn aggregate_runs(
    deliveries: &[Delivery],
    categories: &RunCategories,
) -> Result<RunsTable, DataShapeError> {
    let mut table = RunsTable {
        categories: categories.clone(),
        ..RunsTable::default()
    };
    let mut cell_indices: FxHashMap<(&str, &str), usize> = FxHashMap::default();
    for delivery in deliveries {
        delivery.validate()?;
        let Some(category) = categories.index_of(delivery.runs_off_bat) else {
            table.excluded += 1;
            continue;
        };
        let key = (delivery.batter.as_str(), delivery.bowler.as_str());
        let cell_index = *cell_indices.entry(key).or_insert_with(|| {
            table.cells.push(RunsCell {
                batter: delivery.batting(),
                bowler: delivery.bowling(),
                counts: vec![0; categories.len()],
            });
            table.cells.len() - 1
        });
        table.cells[cell_index].counts[category] += 1;
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Role;
    use crate::stratum::StratumScheme;
    use crate::testing::{delivery, repeat, wicket};

    #[test]
    fn run_categories() {
        let categories = RunCategories::default();
        assert_eq!(&[0, 1, 2, 3, 4, 6], categories.values());
        assert_eq!(categories, RunCategories::excluding(&[5, 7]).unwrap());
        assert_eq!(Some(5), categories.index_of(6));
        assert_eq!(None, categories.index_of(5));
        assert!(RunCategories::excluding(&[0]).is_err());
        assert!(RunCategories::excluding(&[1, 2, 3, 4, 5, 6, 7]).is_err());
    }

    #[test]
    fn wickets_grouped_by_pair_and_stratum() {
        let mut deliveries = repeat(delivery("Root", "Starc", 1), 3);
        deliveries.push(wicket("Root", "Starc", "caught"));
        deliveries.push(wicket("Root", "Starc", "run out"));
        deliveries.push(delivery("Root", "Cummins", 0));
        let mut second_innings = delivery("Root", "Starc", 0);
        second_innings.innings = 2;
        deliveries.push(second_innings);

        let mut strata = Strata::new(StratumScheme::ten_over_phases());
        let table = aggregate_wickets(&deliveries, &mut strata).unwrap();
        assert_eq!(3, table.cells.len());

        let first = &table.cells[0];
        assert_eq!(Competitor::new("Starc", Role::Bowl), first.bowler);
        assert_eq!(Competitor::new("Root", Role::Bat), first.batter);
        assert_eq!((0, 1, 4), (first.stratum, first.wickets, first.survivals));

        assert_eq!((0, 0, 1), (table.cells[1].stratum, table.cells[1].wickets, table.cells[1].survivals));
        assert_eq!((5, 0, 1), (table.cells[2].stratum, table.cells[2].wickets, table.cells[2].survivals));
    }

    #[test]
    fn malformed_delivery_aborts() {
        let deliveries = vec![delivery("Root", "Starc", 1), delivery("Root", "", 1)];
        let mut strata = Strata::new(StratumScheme::None);
        assert!(aggregate_wickets(&deliveries, &mut strata).is_err());
        assert!(aggregate_runs(&deliveries, &RunCategories::default()).is_err());
    }

    #[test]
    fn runs_grouped_by_pair_excluding_rare_values() {
        let mut deliveries = repeat(delivery("Root", "Starc", 4), 2);
        deliveries.push(delivery("Root", "Starc", 0));
        deliveries.push(delivery("Root", "Starc", 5));
        deliveries.push(wicket("Root", "Starc", "bowled"));
        deliveries.push(delivery("Pope", "Starc", 6));

        let table = aggregate_runs(&deliveries, &RunCategories::default()).unwrap();
        assert_eq!(1, table.excluded);
        assert_eq!(2, table.cells.len());
        assert_eq!(vec![2, 0, 0, 0, 2, 0], table.cells[0].counts);
        assert_eq!(4, table.cells[0].balls());
        assert_eq!(Competitor::new("Pope", Role::Bat), table.cells[1].batter);
        assert_eq!(vec![0, 0, 0, 0, 0, 1], table.cells[1].counts);
    }
}
