//! Column layout of the parameter vector and the tagged design rows fed to the likelihood models.
//!
//! The parameter vector of either model is laid out as `[θ₀ … θ_B | φ₀ … φ_W | aux₀ … aux_K]`:
//! batting log-abilities, then bowling log-abilities, then the model's auxiliary parameters (order
//! effects per stratum, or log-weights per non-zero run category). The Average competitor on
//! either side has no column; its log-ability is the fixed zero baseline.

use std::ops::Range;
use std::sync::Arc;

use crate::aggregate::{RunCategories, RunsTable, WicketTable};
use crate::data::{Competitor, Role};
use crate::error::DataShapeError;
use crate::lookup::Lookup;
use crate::stratum::Strata;

/// Stable competitor ↔ column mapping, built once and shared by both models.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Layout {
    batters: Lookup<Competitor>,
    bowlers: Lookup<Competitor>,
}
impl Layout {
    /// Registers every competitor that carries observation mass in either table. A competitor
    /// absent from both tables never receives a column.
    pub fn from_tables(wickets: &WicketTable, runs: &RunsTable) -> Self {
        let mut layout = Self::default();
        for cell in &wickets.cells {
            if cell.wickets + cell.survivals > 0 {
                layout.batters.intern(&cell.batter);
                layout.bowlers.intern(&cell.bowler);
            }
        }
        for cell in &runs.cells {
            if cell.balls() > 0 {
                layout.batters.intern(&cell.batter);
                layout.bowlers.intern(&cell.bowler);
            }
        }
        layout
    }

    pub fn batters(&self) -> &[Competitor] {
        self.batters.items()
    }

    pub fn bowlers(&self) -> &[Competitor] {
        self.bowlers.items()
    }

    /// Number of ability columns.
    pub fn len(&self) -> usize {
        self.batters.len() + self.bowlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn batting_range(&self) -> Range<usize> {
        0..self.batters.len()
    }

    pub fn bowling_range(&self) -> Range<usize> {
        self.batters.len()..self.len()
    }

    /// Column of the competitor's log-ability; `None` for the Average competitor and for
    /// competitors that were never observed.
    pub fn column(&self, competitor: &Competitor) -> Option<usize> {
        if competitor.is_average() {
            return None;
        }
        match competitor.role {
            Role::Bat => self.batters.index_of(competitor),
            Role::Bowl => self
                .bowlers
                .index_of(competitor)
                .map(|index| self.batters.len() + index),
        }
    }

    /// The competitor owning an ability column.
    pub fn competitor(&self, column: usize) -> Option<&Competitor> {
        if column < self.batters.len() {
            self.batters.item_at(column)
        } else {
            self.bowlers.item_at(column - self.batters.len())
        }
    }

    fn resolve(&self, competitor: &Competitor) -> Result<usize, DataShapeError> {
        self.column(competitor)
            .ok_or_else(|| DataShapeError::new(format!("{competitor} has no column")))
    }
}

/// Survival/wicket counts of a binomial row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Binomial {
    pub wickets: f64,
    pub survivals: f64,
}
impl Binomial {
    pub fn trials(&self) -> f64 {
        self.wickets + self.survivals
    }
}

/// Per-category frequencies of a categorical row, aligned with [RunCategories::values].
#[derive(Debug, Clone, PartialEq)]
pub struct Categorical {
    pub counts: Vec<f64>,
}
impl Categorical {
    pub fn trials(&self) -> f64 {
        self.counts.iter().sum()
    }
}

/// One observation: which ability columns it activates, which stratum it falls in and what was
/// observed. `None` on either side stands for the Average competitor.
#[derive(Debug, Clone, PartialEq)]
pub struct DesignRow<O> {
    pub batter: Option<usize>,
    pub bowler: Option<usize>,
    pub stratum: usize,
    pub outcome: O,
    /// Whether the row was added by the prior rather than observed.
    pub synthetic: bool,
}
impl<O> DesignRow<O> {
    /// Sparse coefficients of the ability contrast θ<sub>batter</sub> − φ<sub>bowler</sub>.
    pub fn contrast(&self) -> SparseRow {
        let mut row = SparseRow::default();
        if let Some(batter) = self.batter {
            row.push(batter, 1.0);
        }
        if let Some(bowler) = self.bowler {
            row.push(bowler, -1.0);
        }
        row
    }

    /// Evaluates θ<sub>batter</sub> − φ<sub>bowler</sub> at the given parameters.
    pub fn delta(&self, params: &[f64]) -> f64 {
        self.batter.map(|column| params[column]).unwrap_or_default()
            - self.bowler.map(|column| params[column]).unwrap_or_default()
    }
}

/// At most three non-zero coefficients: the two ability columns and one auxiliary column.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SparseRow {
    entries: [(usize, f64); 3],
    len: usize,
}
impl SparseRow {
    pub fn push(&mut self, column: usize, coefficient: f64) {
        self.entries[self.len] = (column, coefficient);
        self.len += 1;
    }

    pub fn scaled(mut self, factor: f64) -> Self {
        for (_, coefficient) in &mut self.entries[..self.len] {
            *coefficient *= factor;
        }
        self
    }

    pub fn dot(&self, params: &[f64]) -> f64 {
        self.iter()
            .map(|(column, coefficient)| params[column] * coefficient)
            .sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + Clone + '_ {
        self.entries[..self.len].iter().copied()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DesignMatrix<O> {
    pub layout: Arc<Layout>,
    /// Human-readable names of the auxiliary columns, in column order.
    pub auxiliary: Vec<String>,
    pub rows: Vec<DesignRow<O>>,
}
impl<O> DesignMatrix<O> {
    /// Total number of free parameters.
    pub fn dimension(&self) -> usize {
        self.layout.len() + self.auxiliary.len()
    }

    /// Column of the first auxiliary parameter.
    pub fn auxiliary_offset(&self) -> usize {
        self.layout.len()
    }

    pub fn observed(&self) -> impl Iterator<Item = &DesignRow<O>> {
        self.rows.iter().filter(|row| !row.synthetic)
    }
}

impl DesignMatrix<Binomial> {
    /// Full sparse row of a wicket observation: the ability contrast plus the order effect ν<sub>k</sub>
    /// of its stratum.
    pub fn coefficients(&self, row: &DesignRow<Binomial>) -> SparseRow {
        let mut sparse = row.contrast();
        sparse.push(self.auxiliary_offset() + row.stratum, 1.0);
        sparse
    }
}

impl DesignMatrix<Categorical> {
    /// Sparse row of the log-rate of category `category` (run value `runs`): the ability contrast
    /// scaled by the run value, plus the category's log-weight column unless it is the zero-run
    /// reference.
    pub fn coefficients(&self, row: &DesignRow<Categorical>, category: usize, runs: u8) -> SparseRow {
        let mut sparse = row.contrast().scaled(runs as f64);
        if category > 0 {
            sparse.push(self.auxiliary_offset() + category - 1, 1.0);
        }
        sparse
    }
}

/// One row per aggregated (bowler, batter, stratum) cell, with an order-effect column per stratum.
pub fn wicket_design(
    table: &WicketTable,
    layout: Arc<Layout>,
    strata: &Strata,
) -> Result<DesignMatrix<Binomial>, DataShapeError> {
    let mut rows = Vec::with_capacity(table.cells.len());
    for cell in &table.cells {
        if cell.stratum >= strata.len() {
            return Err(DataShapeError::new(format!(
                "stratum {} outside the {} known strata",
                cell.stratum,
                strata.len()
            )));
        }
        rows.push(DesignRow {
            batter: Some(layout.resolve(&cell.batter)?),
            bowler: Some(layout.resolve(&cell.bowler)?),
            stratum: cell.stratum,
            outcome: Binomial {
                wickets: cell.wickets as f64,
                survivals: cell.survivals as f64,
            },
            synthetic: false,
        });
    }
    Ok(DesignMatrix {
        layout,
        auxiliary: strata.labels().into_iter().map(|label| format!("ν[{label}]")).collect(),
        rows,
    })
}

/// One row per (batter, bowler) pairing. Every pairing is its own nuisance stratum, so rows are
/// never merged across pairings.
pub fn runs_design(
    table: &RunsTable,
    layout: Arc<Layout>,
) -> Result<DesignMatrix<Categorical>, DataShapeError> {
    let mut rows = Vec::with_capacity(table.cells.len());
    for cell in &table.cells {
        if cell.counts.len() != table.categories.len() {
            return Err(DataShapeError::new(format!(
                "{} run categories for pairing {} v {}; expected {}",
                cell.counts.len(),
                cell.batter,
                cell.bowler,
                table.categories.len()
            )));
        }
        rows.push(DesignRow {
            batter: Some(layout.resolve(&cell.batter)?),
            bowler: Some(layout.resolve(&cell.bowler)?),
            stratum: 0,
            outcome: Categorical {
                counts: cell.counts.iter().map(|&count| count as f64).collect(),
            },
            synthetic: false,
        });
    }
    Ok(DesignMatrix {
        layout,
        auxiliary: category_labels(&table.categories),
        rows,
    })
}

fn category_labels(categories: &RunCategories) -> Vec<String> {
    categories.values()[1..]
        .iter()
        .map(|runs| format!("ν[{runs}]"))
        .collect()
}
