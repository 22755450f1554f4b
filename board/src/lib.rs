//! Client-side state of the deals pipeline board.
//!
//! [`Board`] owns a [`DealCollection`], derives a [`StageGrouping`] from it on
//! demand, interprets drag events through [`DragHandler`] and persists stage
//! changes through a [`Synchronizer`] backed by a [`DealGateway`]. Stage
//! changes are applied locally first; the remote write runs on the Tokio
//! runtime and its outcome is folded back in by [`Board::reconcile`] or
//! [`Board::settle`].

pub mod board;
pub mod cache;
pub mod drag;
pub mod gateway;
pub mod projector;
pub mod summary;
pub mod sync;

pub use board::{Board, BoardError, LoadState};
pub use cache::DealCollection;
pub use drag::{DragHandler, DragOutcome, DragSession, DropTarget, array_move};
pub use gateway::{DealGateway, GatewayError, MemoryGateway};
pub use projector::{StageGrouping, project};
pub use summary::{BoardSummary, StageTotals, SummaryPeriod};
pub use sync::{BoardNotice, CommitOutcome, SyncPolicy, SyncState, Synchronizer};

pub use entity::{Deal, DealId, Stage, StageUpdate};
