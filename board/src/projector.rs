use std::collections::BTreeMap;

use entity::{Deal, Stage};

use crate::cache::DealCollection;

/// Deals grouped into one column per stage.
///
/// Always holds an entry for every stage in [`Stage::ALL`], in column order,
/// and every deal of the source collection appears in exactly one column.
#[derive(Clone, Debug, PartialEq)]
pub struct StageGrouping {
    columns: BTreeMap<Stage, Vec<Deal>>,
}

impl StageGrouping {
    pub fn deals(&self, stage: Stage) -> &[Deal] {
        self.columns.get(&stage).map(Vec::as_slice).unwrap_or_default()
    }

    /// Columns in board order.
    pub fn columns(&self) -> impl Iterator<Item = (Stage, &[Deal])> {
        self.columns.iter().map(|(stage, deals)| (*stage, deals.as_slice()))
    }

    pub fn total_len(&self) -> usize {
        self.columns.values().map(Vec::len).sum()
    }
}

/// Recompute the grouping from scratch.
pub fn project(collection: &DealCollection) -> StageGrouping {
    let mut columns: BTreeMap<Stage, Vec<Deal>> =
        Stage::ALL.into_iter().map(|stage| (stage, Vec::new())).collect();
    for deal in collection.iter() {
        columns.entry(deal.stage).or_default().push(deal.clone());
    }
    StageGrouping { columns }
}
