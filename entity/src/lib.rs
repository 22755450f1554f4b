//! Pipeline records: deals, stages and the opportunity wire shape they are
//! mapped from.

pub mod deal;
pub mod opportunity;
pub mod stage;

pub use deal::{Deal, DealId, StageUpdate};
pub use opportunity::{AccountRef, ContactRef, OpportunityRecord, OwnerRef};
pub use stage::{ParseStageError, Stage};
