use entity::{DealId, Stage};
use tracing::debug;

use crate::cache::DealCollection;

const STAGE_TARGET_PREFIX: &str = "stage:";

/// What a dragged deal was released over.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DropTarget {
    /// A stage column container.
    Stage(Stage),
    /// Another deal card.
    Deal(DealId),
}

impl DropTarget {
    /// Interpret a raw droppable id from a string-based drag-and-drop layer.
    ///
    /// `stage:<KEY>` and bare stage keys name a column; anything else is a
    /// deal id.
    pub fn parse(raw: &str) -> Self {
        let candidate = raw.strip_prefix(STAGE_TARGET_PREFIX).unwrap_or(raw);
        match candidate.parse::<Stage>() {
            Ok(stage) if candidate.chars().all(|c| c.is_ascii_uppercase() || c == '_') => {
                DropTarget::Stage(stage)
            }
            _ => DropTarget::Deal(DealId::from(raw)),
        }
    }

    /// Droppable id for a stage column, the inverse of [`DropTarget::parse`].
    pub fn stage_container_id(stage: Stage) -> String {
        format!("{STAGE_TARGET_PREFIX}{}", stage.key())
    }
}

impl From<Stage> for DropTarget {
    fn from(value: Stage) -> Self {
        DropTarget::Stage(value)
    }
}

impl From<DealId> for DropTarget {
    fn from(value: DealId) -> Self {
        DropTarget::Deal(value)
    }
}

/// The deal currently being dragged, if any.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DragSession {
    active: Option<DealId>,
}

impl DragSession {
    pub fn active(&self) -> Option<&DealId> {
        self.active.as_ref()
    }

    pub fn is_dragging(&self) -> bool {
        self.active.is_some()
    }
}

/// Result of a drag-end event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DragOutcome {
    /// Released outside any target.
    Cancelled,
    /// Released over itself, or over the column it already sits in.
    Unchanged,
    /// Active or target deal is not in the collection.
    Ignored,
    /// Stage change; must be persisted remotely.
    Moved { id: DealId, from: Stage, to: Stage },
    /// Order change within one column; local only.
    Reordered { stage: Stage, order: Vec<DealId> },
}

impl DragOutcome {
    pub fn requires_commit(&self) -> bool {
        matches!(self, DragOutcome::Moved { .. })
    }
}

/// Turns drag-start/drag-end events into collection mutations.
#[derive(Debug, Default)]
pub struct DragHandler {
    session: DragSession,
}

impl DragHandler {
    pub fn on_drag_start(&mut self, active: DealId) {
        debug!(deal_id = %active, "drag start");
        self.session.active = Some(active);
    }

    /// Clear the session without touching the collection.
    pub fn cancel(&mut self) {
        self.session.active = None;
    }

    pub fn session(&self) -> &DragSession {
        &self.session
    }

    pub fn on_drag_end(
        &mut self,
        cache: &mut DealCollection,
        active: &DealId,
        over: Option<&DropTarget>,
    ) -> DragOutcome {
        self.session.active = None;

        let Some(over) = over else {
            return DragOutcome::Cancelled;
        };
        let Some(current) = cache.stage_of(active) else {
            debug!(deal_id = %active, "drag end for unknown deal");
            return DragOutcome::Ignored;
        };

        match over {
            DropTarget::Deal(target) if target == active => DragOutcome::Unchanged,
            DropTarget::Stage(stage) => move_to_stage(cache, active, current, *stage),
            DropTarget::Deal(target) => {
                let Some(target_stage) = cache.stage_of(target) else {
                    debug!(deal_id = %active, target = %target, "drop over unknown deal");
                    return DragOutcome::Ignored;
                };
                if target_stage != current {
                    return move_to_stage(cache, active, current, target_stage);
                }
                reorder(cache, active, target, current)
            }
        }
    }
}

fn move_to_stage(cache: &mut DealCollection, id: &DealId, from: Stage, to: Stage) -> DragOutcome {
    if from == to {
        return DragOutcome::Unchanged;
    }
    cache.reassign_stage(id, to);
    DragOutcome::Moved {
        id: id.clone(),
        from,
        to,
    }
}

fn reorder(
    cache: &mut DealCollection,
    active: &DealId,
    target: &DealId,
    stage: Stage,
) -> DragOutcome {
    let mut order = cache.ids_in_stage(stage);
    let (Some(from), Some(to)) = (
        order.iter().position(|id| id == active),
        order.iter().position(|id| id == target),
    ) else {
        return DragOutcome::Ignored;
    };
    array_move(&mut order, from, to);
    cache.reorder_within_stage(stage, &order);
    DragOutcome::Reordered { stage, order }
}

/// Remove the element at `from` and reinsert it at `to`.
pub fn array_move<T>(items: &mut Vec<T>, from: usize, to: usize) {
    if from >= items.len() || from == to {
        return;
    }
    let item = items.remove(from);
    let to = to.min(items.len());
    items.insert(to, item);
}
