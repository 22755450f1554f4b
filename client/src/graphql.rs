//! Documents and response decoding for the opportunity API.

use board::GatewayError;
use entity::{OpportunityRecord, Stage};
use platform_api::{ApiError, GraphqlErrorPayload};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

pub const OPPORTUNITIES_QUERY: &str = r#"
query Opportunities {
  opportunities {
    id
    name
    value
    stage
    probability
    expectedCloseDate
    account { name }
    contact { firstName lastName }
    ownerId
    owner { name email }
    createdAt
  }
}
"#;

pub const UPDATE_OPPORTUNITY_MUTATION: &str = r#"
mutation UpdateOpportunity($input: UpdateOpportunityInput!) {
  updateOpportunity(input: $input) {
    id
    stage
  }
}
"#;

#[derive(Debug, Serialize)]
pub struct GraphqlRequest<'a, V: Serialize> {
    pub query: &'a str,
    pub variables: V,
}

#[derive(Debug, Deserialize)]
pub struct GraphqlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphqlErrorPayload>,
}

#[derive(Debug, Deserialize)]
pub struct OpportunitiesData {
    pub opportunities: Vec<OpportunityRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOpportunityData {
    pub update_opportunity: UpdatedOpportunity,
}

#[derive(Debug, Deserialize)]
pub struct UpdatedOpportunity {
    pub id: String,
    pub stage: Stage,
}

/// Turn an HTTP status and body into the `data` payload or a gateway error.
///
/// GraphQL errors win over `data`; the first error's `code` extension decides
/// the [`ApiError`] variant.
pub fn decode_response<T: DeserializeOwned>(
    status: StatusCode,
    body: &[u8],
) -> Result<T, GatewayError> {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(ApiError::Unauthorized.into());
    }
    if !status.is_success() {
        return Err(GatewayError::Transport(format!("unexpected HTTP status {status}")));
    }
    let response: GraphqlResponse<T> =
        serde_json::from_slice(body).map_err(|err| GatewayError::Decode(err.to_string()))?;
    if let Some(first) = response.errors.first() {
        return Err(ApiError::from(first).into());
    }
    response
        .data
        .ok_or_else(|| GatewayError::Decode("response carried neither data nor errors".into()))
}
