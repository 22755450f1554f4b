use std::{
    collections::HashSet,
    future::Future,
    sync::{Mutex, MutexGuard},
};

use entity::{Deal, DealId, StageUpdate};
use platform_api::ApiError;
use thiserror::Error;

/// Failure reported by the remote opportunity API or the transport to it.
#[derive(Debug, Error, Clone)]
pub enum GatewayError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("malformed response: {0}")]
    Decode(String),
}

/// Remote side of the board: bulk fetch and stage updates.
pub trait DealGateway: Send + Sync + 'static {
    fn fetch_deals(&self) -> impl Future<Output = Result<Vec<Deal>, GatewayError>> + Send;

    fn update_stage(
        &self,
        update: StageUpdate,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;
}

/// In-process gateway for tests and demos.
///
/// Applies updates to its own copy of the deals, including the probability
/// the real API assigns on a stage change, and records every update it sees.
#[derive(Debug, Default)]
pub struct MemoryGateway {
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    deals: Vec<Deal>,
    updates: Vec<StageUpdate>,
    fail_fetch: bool,
    fail_all_updates: bool,
    failing_deals: HashSet<DealId>,
}

impl MemoryGateway {
    pub fn new(deals: Vec<Deal>) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                deals,
                ..MemoryState::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_fail_fetch(&self, fail: bool) {
        self.lock().fail_fetch = fail;
    }

    pub fn set_fail_updates(&self, fail: bool) {
        self.lock().fail_all_updates = fail;
    }

    /// Reject every update for `id` until [`MemoryGateway::heal`] is called.
    pub fn fail_updates_for(&self, id: impl Into<DealId>) {
        self.lock().failing_deals.insert(id.into());
    }

    pub fn heal(&self) {
        let mut state = self.lock();
        state.fail_all_updates = false;
        state.failing_deals.clear();
    }

    pub fn updates(&self) -> Vec<StageUpdate> {
        self.lock().updates.clone()
    }

    pub fn deals(&self) -> Vec<Deal> {
        self.lock().deals.clone()
    }

    /// Change the remote copy directly, as another user would.
    pub fn replace_deals(&self, deals: Vec<Deal>) {
        self.lock().deals = deals;
    }
}

impl DealGateway for MemoryGateway {
    async fn fetch_deals(&self) -> Result<Vec<Deal>, GatewayError> {
        let state = self.lock();
        if state.fail_fetch {
            return Err(GatewayError::Transport("connection refused".into()));
        }
        Ok(state.deals.clone())
    }

    async fn update_stage(&self, update: StageUpdate) -> Result<(), GatewayError> {
        let mut state = self.lock();
        state.updates.push(update.clone());
        if state.fail_all_updates || state.failing_deals.contains(&update.id) {
            return Err(ApiError::internal(anyhow::anyhow!("update rejected")).into());
        }
        let deal = state
            .deals
            .iter_mut()
            .find(|d| d.id == update.id)
            .ok_or(GatewayError::Api(ApiError::NotFound))?;
        deal.stage = update.stage;
        deal.probability = update.stage.default_probability();
        Ok(())
    }
}

