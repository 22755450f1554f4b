//! Opportunity records as the remote API returns them, and their mapping into
//! [`Deal`].

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    deal::{Deal, DealId},
    stage::Stage,
};

pub const UNKNOWN_ACCOUNT: &str = "Unknown Account";
pub const UNKNOWN_OWNER: &str = "Unknown";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpportunityRecord {
    pub id: String,
    pub name: String,
    pub value: f64,
    pub stage: Stage,
    #[serde(default)]
    pub probability: Option<i32>,
    #[serde(default)]
    pub expected_close_date: Option<NaiveDate>,
    #[serde(default)]
    pub account: Option<AccountRef>,
    #[serde(default)]
    pub contact: Option<ContactRef>,
    pub owner_id: String,
    #[serde(default)]
    pub owner: Option<OwnerRef>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AccountRef {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactRef {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OwnerRef {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl ContactRef {
    fn display_name(&self) -> Option<String> {
        let first = self.first_name.as_deref().unwrap_or_default();
        let last = self.last_name.as_deref().unwrap_or_default();
        let joined = format!("{first} {last}");
        let trimmed = joined.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl From<OpportunityRecord> for Deal {
    fn from(record: OpportunityRecord) -> Self {
        let value = if record.value.is_finite() && record.value > 0.0 {
            record.value
        } else {
            0.0
        };
        let probability = record.probability.unwrap_or(0).clamp(0, 100) as u8;
        Deal {
            id: DealId::from(record.id),
            name: record.name,
            value,
            stage: record.stage,
            probability,
            expected_close_date: record.expected_close_date,
            account_name: non_blank(record.account.and_then(|a| a.name))
                .unwrap_or_else(|| UNKNOWN_ACCOUNT.to_string()),
            contact_name: record.contact.as_ref().and_then(ContactRef::display_name),
            owner_id: record.owner_id,
            owner_name: non_blank(record.owner.and_then(|o| o.name))
                .unwrap_or_else(|| UNKNOWN_OWNER.to_string()),
            created_at: record.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(extra: serde_json::Value) -> OpportunityRecord {
        let mut base = json!({
            "id": "opp-1",
            "name": "Platform rollout",
            "value": 120000.0,
            "stage": "PROPOSAL",
            "probability": 60,
            "expectedCloseDate": "2025-03-31",
            "ownerId": "u-7",
            "createdAt": "2025-01-02T10:00:00Z"
        });
        if let (Some(base), Some(extra)) = (base.as_object_mut(), extra.as_object()) {
            for (k, v) in extra {
                base.insert(k.clone(), v.clone());
            }
        }
        serde_json::from_value(base).unwrap()
    }

    #[test]
    fn maps_nested_names() {
        let deal = Deal::from(record(json!({
            "account": {"name": "Acme"},
            "contact": {"firstName": "Grace", "lastName": "Hopper"},
            "owner": {"name": "Ana", "email": "ana@example.com"}
        })));
        assert_eq!(deal.id.as_str(), "opp-1");
        assert_eq!(deal.account_name, "Acme");
        assert_eq!(deal.contact_name.as_deref(), Some("Grace Hopper"));
        assert_eq!(deal.owner_name, "Ana");
        assert_eq!(deal.stage, Stage::Proposal);
        assert_eq!(deal.probability, 60);
        assert_eq!(
            deal.expected_close_date,
            NaiveDate::from_ymd_opt(2025, 3, 31)
        );
    }

    #[test]
    fn missing_relations_fall_back_to_placeholders() {
        let deal = Deal::from(record(json!({
            "account": null,
            "owner": {"name": null, "email": "x@example.com"}
        })));
        assert_eq!(deal.account_name, UNKNOWN_ACCOUNT);
        assert_eq!(deal.owner_name, UNKNOWN_OWNER);
        assert_eq!(deal.contact_name, None);
    }

    #[test]
    fn partial_contact_is_trimmed() {
        let deal = Deal::from(record(json!({
            "contact": {"firstName": "Grace", "lastName": null}
        })));
        assert_eq!(deal.contact_name.as_deref(), Some("Grace"));

        let empty = Deal::from(record(json!({
            "contact": {"firstName": "", "lastName": " "}
        })));
        assert_eq!(empty.contact_name, None);
    }

    #[test]
    fn out_of_range_numbers_are_clamped() {
        let deal = Deal::from(record(json!({"value": -5.0, "probability": 140})));
        assert_eq!(deal.value, 0.0);
        assert_eq!(deal.probability, 100);

        let deal = Deal::from(record(json!({"probability": null})));
        assert_eq!(deal.probability, 0);
    }
}
