//! In-memory opportunity API used for local development and end-to-end tests.

mod seed;

use std::sync::Arc;

use async_graphql::{
    Context, EmptySubscription, Enum, ErrorExtensions, InputObject, Object, Schema, SimpleObject,
    ID,
};
use chrono::{DateTime, NaiveDate, Utc};
use entity::{AccountRef, ContactRef, OpportunityRecord, OwnerRef, Stage};
use platform_api::ApiError;
use tokio::sync::RwLock;
use tracing::{info, instrument};

pub use seed::demo_opportunities;

pub type SchemaType = Schema<QueryRoot, MutationRoot, EmptySubscription>;

/// Shared opportunity rows plus the failure switch for stage updates.
#[derive(Debug, Default)]
pub struct OpportunityStore {
    records: RwLock<Vec<OpportunityRecord>>,
    reject_updates: bool,
}

impl OpportunityStore {
    pub fn new(records: Vec<OpportunityRecord>) -> Self {
        Self {
            records: RwLock::new(records),
            reject_updates: false,
        }
    }

    /// Every `updateOpportunity` call fails with an internal error.
    pub fn rejecting_updates(mut self) -> Self {
        self.reject_updates = true;
        self
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn snapshot(&self) -> Vec<OpportunityRecord> {
        self.records.read().await.clone()
    }

    async fn set_stage(&self, id: &str, stage: Stage) -> Result<OpportunityRecord, ApiError> {
        if self.reject_updates {
            return Err(ApiError::internal(anyhow::anyhow!(
                "stage updates are disabled on this server"
            )));
        }
        let mut records = self.records.write().await;
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(ApiError::NotFound)?;
        record.stage = stage;
        record.probability = Some(i32::from(stage.default_probability()));
        Ok(record.clone())
    }
}

pub fn build_schema(store: Arc<OpportunityStore>) -> SchemaType {
    Schema::build(QueryRoot, MutationRoot, EmptySubscription)
        .data(store)
        .finish()
}

fn store<'a>(ctx: &'a Context<'_>) -> async_graphql::Result<&'a Arc<OpportunityStore>> {
    ctx.data::<Arc<OpportunityStore>>()
        .map_err(|_| platform_api::internal_error(anyhow::anyhow!("opportunity store missing")))
}

#[derive(Default)]
pub struct QueryRoot;

#[derive(Default)]
pub struct MutationRoot;

#[Object]
impl QueryRoot {
    #[instrument(name = "graphql.opportunities", skip_all)]
    async fn opportunities(
        &self,
        ctx: &Context<'_>,
    ) -> async_graphql::Result<Vec<OpportunityNode>> {
        let store = store(ctx)?;
        let records = store.records.read().await;
        Ok(records.iter().map(OpportunityNode::from).collect())
    }

    #[instrument(name = "graphql.version", skip_all)]
    async fn version(&self) -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }
}

#[Object]
impl MutationRoot {
    #[instrument(name = "graphql.updateOpportunity", skip_all, fields(id = %input.id.as_str()))]
    async fn update_opportunity(
        &self,
        ctx: &Context<'_>,
        input: UpdateOpportunityInput,
    ) -> async_graphql::Result<OpportunityNode> {
        let store = store(ctx)?;
        let stage: Stage = input.stage.into();
        let record = store
            .set_stage(input.id.as_str(), stage)
            .await
            .map_err(|err| err.extend())?;
        info!(id = %record.id, %stage, "opportunity stage updated");
        Ok(OpportunityNode::from(&record))
    }
}

#[derive(Enum, Copy, Clone, Eq, PartialEq, Debug)]
pub enum OpportunityStage {
    Prospecting,
    Qualification,
    NeedsAnalysis,
    Proposal,
    Negotiation,
    ClosedWon,
    ClosedLost,
}

impl From<Stage> for OpportunityStage {
    fn from(value: Stage) -> Self {
        match value {
            Stage::Prospecting => OpportunityStage::Prospecting,
            Stage::Qualification => OpportunityStage::Qualification,
            Stage::NeedsAnalysis => OpportunityStage::NeedsAnalysis,
            Stage::Proposal => OpportunityStage::Proposal,
            Stage::Negotiation => OpportunityStage::Negotiation,
            Stage::ClosedWon => OpportunityStage::ClosedWon,
            Stage::ClosedLost => OpportunityStage::ClosedLost,
        }
    }
}

impl From<OpportunityStage> for Stage {
    fn from(value: OpportunityStage) -> Self {
        match value {
            OpportunityStage::Prospecting => Stage::Prospecting,
            OpportunityStage::Qualification => Stage::Qualification,
            OpportunityStage::NeedsAnalysis => Stage::NeedsAnalysis,
            OpportunityStage::Proposal => Stage::Proposal,
            OpportunityStage::Negotiation => Stage::Negotiation,
            OpportunityStage::ClosedWon => Stage::ClosedWon,
            OpportunityStage::ClosedLost => Stage::ClosedLost,
        }
    }
}

#[derive(Clone, Debug, InputObject)]
pub struct UpdateOpportunityInput {
    pub id: ID,
    pub stage: OpportunityStage,
}

#[derive(Clone, Debug, SimpleObject)]
#[graphql(name = "Opportunity")]
pub struct OpportunityNode {
    pub id: ID,
    pub name: String,
    pub value: f64,
    pub stage: OpportunityStage,
    pub probability: Option<i32>,
    pub expected_close_date: Option<NaiveDate>,
    pub account: Option<AccountNode>,
    pub contact: Option<ContactNode>,
    pub owner_id: ID,
    pub owner: Option<OwnerNode>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, SimpleObject)]
#[graphql(name = "Account")]
pub struct AccountNode {
    pub name: Option<String>,
}

#[derive(Clone, Debug, SimpleObject)]
#[graphql(name = "Contact")]
pub struct ContactNode {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Clone, Debug, SimpleObject)]
#[graphql(name = "Owner")]
pub struct OwnerNode {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl From<&AccountRef> for AccountNode {
    fn from(value: &AccountRef) -> Self {
        Self {
            name: value.name.clone(),
        }
    }
}

impl From<&ContactRef> for ContactNode {
    fn from(value: &ContactRef) -> Self {
        Self {
            first_name: value.first_name.clone(),
            last_name: value.last_name.clone(),
        }
    }
}

impl From<&OwnerRef> for OwnerNode {
    fn from(value: &OwnerRef) -> Self {
        Self {
            name: value.name.clone(),
            email: value.email.clone(),
        }
    }
}

impl From<&OpportunityRecord> for OpportunityNode {
    fn from(record: &OpportunityRecord) -> Self {
        Self {
            id: ID::from(record.id.clone()),
            name: record.name.clone(),
            value: record.value,
            stage: record.stage.into(),
            probability: record.probability,
            expected_close_date: record.expected_close_date,
            account: record.account.as_ref().map(AccountNode::from),
            contact: record.contact.as_ref().map(ContactNode::from),
            owner_id: ID::from(record.owner_id.clone()),
            owner: record.owner.as_ref().map(OwnerNode::from),
            created_at: record.created_at,
        }
    }
}
