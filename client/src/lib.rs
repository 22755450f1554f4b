//! Reqwest-backed [`DealGateway`] speaking the opportunity GraphQL API.

pub mod config;
pub mod graphql;

use board::{DealGateway, GatewayError};
use entity::{Deal, StageUpdate};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, instrument};

pub use config::ClientConfig;
use graphql::{
    GraphqlRequest, OPPORTUNITIES_QUERY, OpportunitiesData, UPDATE_OPPORTUNITY_MUTATION,
    UpdateOpportunityData, decode_response,
};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to build HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}

#[derive(Clone, Debug)]
pub struct GraphqlGateway {
    http: reqwest::Client,
    config: ClientConfig,
}

impl GraphqlGateway {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("pipeline-board/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, config })
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    async fn execute<V, T>(&self, query: &str, variables: V) -> Result<T, GatewayError>
    where
        V: Serialize,
        T: DeserializeOwned,
    {
        let mut request = self
            .http
            .post(&self.config.endpoint)
            .json(&GraphqlRequest { query, variables });
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .map_err(|err| GatewayError::Transport(err.to_string()))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|err| GatewayError::Transport(err.to_string()))?;
        debug!(%status, bytes = body.len(), "graphql response");
        decode_response(status, &body)
    }
}

impl DealGateway for GraphqlGateway {
    #[instrument(name = "gateway.fetch_deals", skip_all, fields(endpoint = %self.config.endpoint))]
    async fn fetch_deals(&self) -> Result<Vec<Deal>, GatewayError> {
        let data: OpportunitiesData = self.execute(OPPORTUNITIES_QUERY, json!({})).await?;
        Ok(data.opportunities.into_iter().map(Deal::from).collect())
    }

    #[instrument(
        name = "gateway.update_stage",
        skip_all,
        fields(deal_id = %update.id, stage = %update.stage)
    )]
    async fn update_stage(&self, update: StageUpdate) -> Result<(), GatewayError> {
        let data: UpdateOpportunityData = self
            .execute(UPDATE_OPPORTUNITY_MUTATION, json!({ "input": &update }))
            .await?;
        let updated = data.update_opportunity;
        if updated.id != update.id.as_str() || updated.stage != update.stage {
            return Err(GatewayError::Decode(format!(
                "update acknowledged {} as {}, expected {} as {}",
                updated.id, updated.stage, update.id, update.stage
            )));
        }
        Ok(())
    }
}
