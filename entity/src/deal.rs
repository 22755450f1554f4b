use std::{borrow::Borrow, fmt};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::stage::Stage;

/// Opaque deal identifier issued by the opportunity API.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DealId(String);

impl DealId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DealId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DealId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for DealId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Borrow<str> for DealId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// A sales opportunity as the board renders it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    pub id: DealId,
    pub name: String,
    pub value: f64,
    pub stage: Stage,
    pub probability: u8,
    pub expected_close_date: Option<NaiveDate>,
    pub account_name: String,
    pub contact_name: Option<String>,
    pub owner_id: String,
    pub owner_name: String,
    pub created_at: DateTime<Utc>,
}

impl Deal {
    /// Value discounted by win probability.
    pub fn weighted_value(&self) -> f64 {
        self.value * f64::from(self.probability) / 100.0
    }

    pub fn is_active(&self) -> bool {
        !self.stage.is_closed()
    }
}

/// Outbound payload for a drag-induced stage change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageUpdate {
    pub id: DealId,
    pub stage: Stage,
}

impl StageUpdate {
    pub fn new(id: DealId, stage: Stage) -> Self {
        Self { id, stage }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stage_update_sends_only_id_and_stage() {
        let update = StageUpdate::new(DealId::from("d-1"), Stage::Negotiation);
        let value = serde_json::to_value(&update).unwrap();
        assert_eq!(value, json!({"id": "d-1", "stage": "NEGOTIATION"}));
    }

    #[test]
    fn weighted_value_uses_probability_percent() {
        let deal = Deal {
            id: "d-1".into(),
            name: "Renewal".into(),
            value: 250_000.0,
            stage: Stage::Proposal,
            probability: 35,
            expected_close_date: None,
            account_name: "Acme".into(),
            contact_name: None,
            owner_id: "u-1".into(),
            owner_name: "Ana".into(),
            created_at: Utc::now(),
        };
        assert_eq!(deal.weighted_value(), 87_500.0);
        assert!(deal.is_active());
    }
}
