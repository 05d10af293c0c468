use crate::replay::types::{ChainRow, Observation};

/// Pivots per-leg observations into one row per strike, ascending. The input
/// order is irrelevant; an empty input yields an empty chain.
pub fn assemble(mut observations: Vec<Observation>) -> Vec<ChainRow> {
    observations.sort_by(|left, right| left.strike_price.total_cmp(&right.strike_price));

    let mut rows: Vec<ChainRow> = Vec::new();
    for observation in &observations {
        match rows.last_mut() {
            Some(row) if row.strike_price == observation.strike_price => {
                row.apply_leg(observation);
            }
            _ => rows.push(ChainRow::from_leg(observation)),
        }
    }
    rows
}

/// Trims an assembled chain to at most `radius` strikes on each side of the
/// ATM strike. Near the edges of the ladder the kept range is clipped, not
/// padded. `radius = 0` keeps the ATM row alone.
pub fn window_around_atm(rows: &[ChainRow], radius: usize) -> Vec<ChainRow> {
    if rows.is_empty() {
        return Vec::new();
    }

    // the spot is constant across one snapshot
    let spot = rows[0].underlying_value;
    let atm = atm_index(rows, spot);

    let from = atm.saturating_sub(radius);
    let to = (atm + radius).min(rows.len() - 1);
    rows[from..=to].to_vec()
}

/// Index of the strike nearest to spot. The strict `<` under a left-to-right
/// scan makes exact ties resolve to the lower strike, reproducibly.
fn atm_index(rows: &[ChainRow], spot: f64) -> usize {
    let mut best = 0;
    for (index, row) in rows.iter().enumerate().skip(1) {
        if (row.strike_price - spot).abs() < (rows[best].strike_price - spot).abs() {
            best = index;
        }
    }
    best
}
