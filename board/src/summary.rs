use chrono::NaiveDate;
use entity::{Deal, Stage};
use serde::Serialize;

use crate::projector::StageGrouping;

/// Inclusive date range used for the won-this-period figure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SummaryPeriod {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl SummaryPeriod {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StageTotals {
    pub stage: Stage,
    pub count: usize,
    pub total_value: f64,
    pub weighted_value: f64,
}

/// Board-level figures shown above the columns.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BoardSummary {
    pub columns: Vec<StageTotals>,
    pub active_count: usize,
    /// Value of deals that are neither won nor lost.
    pub active_value: f64,
    /// Active value discounted by win probability.
    pub weighted_value: f64,
    pub won_value: f64,
}

impl BoardSummary {
    pub fn from_grouping(grouping: &StageGrouping, period: Option<&SummaryPeriod>) -> Self {
        let columns: Vec<StageTotals> = grouping
            .columns()
            .map(|(stage, deals)| StageTotals {
                stage,
                count: deals.len(),
                total_value: deals.iter().map(|d| d.value).sum(),
                weighted_value: deals.iter().map(Deal::weighted_value).sum(),
            })
            .collect();

        let active = || grouping.columns().filter(|(stage, _)| !stage.is_closed());
        let active_count = active().map(|(_, deals)| deals.len()).sum();
        let active_value = active()
            .flat_map(|(_, deals)| deals.iter())
            .map(|d| d.value)
            .sum();
        let weighted_value = active()
            .flat_map(|(_, deals)| deals.iter())
            .map(Deal::weighted_value)
            .sum();
        let won_value = grouping
            .deals(Stage::ClosedWon)
            .iter()
            .filter(|deal| match (period, deal.expected_close_date) {
                (None, _) => true,
                (Some(period), Some(date)) => period.contains(date),
                (Some(_), None) => false,
            })
            .map(|d| d.value)
            .sum();

        Self {
            columns,
            active_count,
            active_value,
            weighted_value,
            won_value,
        }
    }

    pub fn column(&self, stage: Stage) -> Option<&StageTotals> {
        self.columns.iter().find(|c| c.stage == stage)
    }
}
