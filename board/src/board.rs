use std::sync::Arc;

use entity::{Deal, DealId};
use thiserror::Error;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::{
    cache::DealCollection,
    drag::{DragHandler, DragOutcome, DragSession, DropTarget},
    gateway::{DealGateway, GatewayError},
    projector::{StageGrouping, project},
    summary::{BoardSummary, SummaryPeriod},
    sync::{BoardNotice, SyncPolicy, SyncState, Synchronizer},
};

#[derive(Debug, Error)]
pub enum BoardError {
    #[error("failed to load deals: {0}")]
    Fetch(#[source] GatewayError),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum LoadState {
    #[default]
    Idle,
    Ready,
    /// Last fetch failed; nothing is rendered until a retry succeeds.
    Failed(String),
}

/// Pipeline board state for one view.
///
/// All mutating entry points take `&mut self`; remote commits run on the
/// Tokio runtime and are folded back in by [`Board::reconcile`] or
/// [`Board::settle`].
pub struct Board<G: DealGateway> {
    gateway: Arc<G>,
    deals: DealCollection,
    drag: DragHandler,
    sync: Synchronizer<G>,
    load_state: LoadState,
    notices: Vec<BoardNotice>,
}

impl<G: DealGateway> Board<G> {
    pub fn new(gateway: Arc<G>, policy: SyncPolicy) -> Self {
        let sync = Synchronizer::new(Arc::clone(&gateway), policy);
        Self {
            gateway,
            deals: DealCollection::default(),
            drag: DragHandler::default(),
            sync,
            load_state: LoadState::Idle,
            notices: Vec::new(),
        }
    }

    /// Fetch every deal and replace the collection.
    ///
    /// On failure the board switches to [`LoadState::Failed`] and hides its
    /// columns; calling `refresh` again is the retry.
    pub async fn refresh(&mut self) -> Result<(), BoardError> {
        let span = info_span!("board.refresh");
        let fetched = self.gateway.fetch_deals().instrument(span).await;
        match fetched {
            Ok(deals) => {
                info!(count = deals.len(), "deals loaded");
                self.load(deals);
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "deal fetch failed");
                self.load_state = LoadState::Failed(err.to_string());
                Err(BoardError::Fetch(err))
            }
        }
    }

    /// Replace the collection with deals fetched elsewhere, keeping unsettled
    /// stage changes visible.
    pub fn load(&mut self, deals: Vec<Deal>) {
        self.deals.load(deals);
        self.sync.rebase(&mut self.deals);
        self.load_state = LoadState::Ready;
    }

    pub fn on_drag_start(&mut self, active: DealId) {
        self.drag.on_drag_start(active);
    }

    /// Handle a drop. Cross-stage moves are applied immediately and persisted
    /// in the background.
    pub fn on_drag_end(&mut self, active: &DealId, over: Option<&DropTarget>) -> DragOutcome {
        let outcome = self.drag.on_drag_end(&mut self.deals, active, over);
        if let DragOutcome::Moved { id, from, to } = &outcome {
            self.sync.commit(id.clone(), *from, *to);
        } else {
            debug!(deal_id = %active, ?outcome, "drag end without commit");
        }
        outcome
    }

    pub fn cancel_drag(&mut self) {
        self.drag.cancel();
    }

    /// Apply commit outcomes that have already arrived. Returns how many
    /// notices were raised.
    pub fn reconcile(&mut self) -> usize {
        let notices = self.sync.drain(&mut self.deals);
        let raised = notices.len();
        self.notices.extend(notices);
        raised
    }

    /// Wait until no commit is in flight, then refetch if a commit asked for
    /// it.
    pub async fn settle(&mut self) -> Result<(), BoardError> {
        self.reconcile();
        while self.sync.has_pending() {
            let Some(outcome) = self.sync.next_outcome().await else {
                break;
            };
            if let Some(notice) = self.sync.apply(outcome, &mut self.deals) {
                self.notices.push(notice);
            }
        }
        if self.sync.take_refetch_request() {
            self.refresh().await?;
        }
        Ok(())
    }

    /// Columns to render, or `None` while nothing has loaded or the last
    /// fetch failed.
    pub fn grouping(&self) -> Option<StageGrouping> {
        match self.load_state {
            LoadState::Ready => Some(project(&self.deals)),
            _ => None,
        }
    }

    pub fn summary(&self, period: Option<&SummaryPeriod>) -> BoardSummary {
        BoardSummary::from_grouping(&project(&self.deals), period)
    }

    pub fn deals(&self) -> &DealCollection {
        &self.deals
    }

    pub fn load_state(&self) -> &LoadState {
        &self.load_state
    }

    pub fn drag_session(&self) -> &DragSession {
        self.drag.session()
    }

    pub fn sync_state(&self, id: &DealId) -> Option<&SyncState> {
        self.sync.state(id)
    }

    pub fn has_pending_commits(&self) -> bool {
        self.sync.has_pending()
    }

    pub fn needs_refetch(&self) -> bool {
        self.sync.refetch_requested()
    }

    pub fn take_notices(&mut self) -> Vec<BoardNotice> {
        std::mem::take(&mut self.notices)
    }
}
