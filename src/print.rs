//! Console tables of ratings and fitted parameters.

use stanza::style::{HAlign, Header, MinWidth, Separator, Styles};
use stanza::table::{Col, Row, Table};

use crate::fit::{Matchup, ModelFit};
use crate::score::Composite;

/// Ranked composites, at most `limit` rows.
pub fn tabulate_composites(composites: &[Composite], limit: usize) -> Table {
    let mut table = Table::default()
        .with_cols(vec![
            Col::new(Styles::default().with(MinWidth(5)).with(HAlign::Right)),
            Col::new(Styles::default().with(MinWidth(20))),
            Col::new(Styles::default().with(MinWidth(12)).with(HAlign::Right)),
            Col::new(Styles::default().with(MinWidth(12)).with(HAlign::Right)),
            Col::new(Styles::default().with(MinWidth(12)).with(HAlign::Right)),
        ])
        .with_row(Row::new(
            Styles::default().with(Header(true)).with(Separator(true)),
            vec![
                "Rank".into(),
                "Player".into(),
                "P(dismissal)".into(),
                "E[runs]".into(),
                "Average".into(),
            ],
        ));
    for (rank, composite) in composites.iter().take(limit).enumerate() {
        table.push_row(Row::new(
            Styles::default(),
            vec![
                format!("{}", rank + 1).into(),
                composite.competitor.name.clone().into(),
                format!("{:.6}", composite.dismissal).into(),
                format!("{:.4}", composite.expected_runs).into(),
                format!("{}", composite.effective_average).into(),
            ],
        ));
    }
    table
}

/// Auxiliary parameters of a fitted model with their standard errors.
pub fn tabulate_auxiliary(fit: &ModelFit) -> Table {
    let offset = fit.raw.len() - fit.auxiliary_labels.len();
    let mut table = Table::default()
        .with_cols(vec![
            Col::new(Styles::default().with(MinWidth(24))),
            Col::new(Styles::default().with(MinWidth(12)).with(HAlign::Right)),
            Col::new(Styles::default().with(MinWidth(12)).with(HAlign::Right)),
            Col::new(Styles::default().with(MinWidth(12)).with(HAlign::Right)),
        ])
        .with_row(Row::new(
            Styles::default().with(Header(true)).with(Separator(true)),
            vec![
                "Parameter".into(),
                "Normalised".into(),
                "Raw".into(),
                "Std. error".into(),
            ],
        ));
    for (index, label) in fit.auxiliary_labels.iter().enumerate() {
        table.push_row(Row::new(
            Styles::default(),
            vec![
                label.clone().into(),
                format!("{:.6}", fit.abilities.auxiliary[index]).into(),
                format!("{:.6}", fit.raw[offset + index]).into(),
                format!("{:.6}", fit.standard_errors[offset + index]).into(),
            ],
        ));
    }
    table
}

pub fn tabulate_matchup(matchup: &Matchup) -> Table {
    let mut table = Table::default()
        .with_cols(vec![
            Col::new(Styles::default().with(MinWidth(10))),
            Col::new(Styles::default().with(MinWidth(12)).with(HAlign::Right)),
        ])
        .with_row(Row::new(
            Styles::default().with(Header(true)).with(Separator(true)),
            vec![
                format!("{} v {}", matchup.batter.name, matchup.bowler.name).into(),
                "Probability".into(),
            ],
        ))
        .with_row(Row::new(
            Styles::default(),
            vec!["survival".into(), format!("{:.6}", matchup.survival).into()],
        ));
    for (runs, prob) in &matchup.runs {
        table.push_row(Row::new(
            Styles::default(),
            vec![format!("{runs} runs").into(), format!("{prob:.6}").into()],
        ));
    }
    table.push_row(Row::new(
        Styles::default().with(Separator(true)),
        vec!["E[runs]".into(), format!("{:.4}", matchup.expected_runs).into()],
    ));
    table
}
