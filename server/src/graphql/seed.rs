use chrono::{NaiveDate, TimeZone, Utc};
use entity::{AccountRef, ContactRef, OpportunityRecord, OwnerRef, Stage};

struct SeedRow {
    id: &'static str,
    name: &'static str,
    value: f64,
    stage: Stage,
    close: Option<(i32, u32, u32)>,
    account: Option<&'static str>,
    contact: Option<(&'static str, &'static str)>,
    owner: Option<(&'static str, &'static str)>,
}

const ROWS: &[SeedRow] = &[
    SeedRow {
        id: "opp-1",
        name: "Fleet telematics pilot",
        value: 100_000.0,
        stage: Stage::Proposal,
        close: Some((2025, 3, 14)),
        account: Some("Northwind Logistics"),
        contact: Some(("Maya", "Okafor")),
        owner: Some(("Ana Ruiz", "ana@example.com")),
    },
    SeedRow {
        id: "opp-2",
        name: "Data platform renewal",
        value: 250_000.0,
        stage: Stage::Negotiation,
        close: Some((2025, 2, 28)),
        account: Some("Globex"),
        contact: Some(("Tom", "Becker")),
        owner: Some(("Ana Ruiz", "ana@example.com")),
    },
    SeedRow {
        id: "opp-3",
        name: "Support retainer",
        value: 50_000.0,
        stage: Stage::Qualification,
        close: None,
        account: Some("Initech"),
        contact: None,
        owner: Some(("Lee Park", "lee@example.com")),
    },
    SeedRow {
        id: "opp-4",
        name: "Warehouse sensors",
        value: 18_500.0,
        stage: Stage::Prospecting,
        close: None,
        account: None,
        contact: Some(("Priya", "")),
        owner: None,
    },
    SeedRow {
        id: "opp-5",
        name: "Analytics seats",
        value: 32_000.0,
        stage: Stage::NeedsAnalysis,
        close: Some((2025, 4, 30)),
        account: Some("Umbrella Health"),
        contact: Some(("Jon", "Snowden")),
        owner: Some(("Lee Park", "lee@example.com")),
    },
    SeedRow {
        id: "opp-6",
        name: "Onboarding package",
        value: 12_000.0,
        stage: Stage::ClosedWon,
        close: Some((2025, 1, 20)),
        account: Some("Globex"),
        contact: None,
        owner: Some(("Ana Ruiz", "ana@example.com")),
    },
    SeedRow {
        id: "opp-7",
        name: "Legacy migration",
        value: 75_000.0,
        stage: Stage::ClosedLost,
        close: Some((2025, 1, 9)),
        account: Some("Soylent"),
        contact: None,
        owner: Some(("Lee Park", "lee@example.com")),
    },
];

/// Demo pipeline spread across every stage.
pub fn demo_opportunities() -> Vec<OpportunityRecord> {
    ROWS.iter()
        .enumerate()
        .map(|(idx, row)| OpportunityRecord {
            id: row.id.to_string(),
            name: row.name.to_string(),
            value: row.value,
            stage: row.stage,
            probability: Some(i32::from(row.stage.default_probability())),
            expected_close_date: row
                .close
                .and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d)),
            account: row.account.map(|name| AccountRef {
                name: Some(name.to_string()),
            }),
            contact: row.contact.map(|(first, last)| ContactRef {
                first_name: Some(first.to_string()),
                last_name: Some(last.to_string()),
            }),
            owner_id: format!("user-{}", idx % 2 + 1),
            owner: row.owner.map(|(name, email)| OwnerRef {
                name: Some(name.to_string()),
                email: Some(email.to_string()),
            }),
            created_at: Utc
                .with_ymd_and_hms(2024, 11, 1 + idx as u32, 9, 30, 0)
                .single()
                .unwrap_or_else(Utc::now),
        })
        .collect()
}
