//! Remote persistence of optimistic stage changes.
//!
//! Each deal has at most one update in flight. A stage change made while an
//! update is in flight is queued, and a newer change replaces the queued one,
//! so the remote side always ends on the last stage the user chose. A failed
//! update with nothing queued behind it rolls the deal back to the last stage
//! the remote side acknowledged and raises a [`BoardNotice`].

use std::{collections::HashMap, sync::Arc};

use entity::{DealId, Stage, StageUpdate};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::{
    cache::DealCollection,
    gateway::{DealGateway, GatewayError},
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncPolicy {
    /// Ask for a full refetch after a successful commit, to pick up
    /// server-side changes such as the adjusted probability.
    pub refetch_on_commit: bool,
}

/// Persistence status of one deal's latest stage change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SyncState {
    Pending { target: Stage },
    Committed,
    Failed { reason: String },
}

/// User-facing message produced while reconciling.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BoardNotice {
    CommitFailed {
        id: DealId,
        attempted: Stage,
        restored: Stage,
        message: String,
    },
}

/// Result of one remote update, delivered back to the board's owner.
#[derive(Debug)]
pub struct CommitOutcome {
    pub id: DealId,
    pub seq: u64,
    pub target: Stage,
    pub result: Result<(), GatewayError>,
}

#[derive(Clone, Copy, Debug)]
struct InFlight {
    seq: u64,
    target: Stage,
}

#[derive(Debug)]
struct SyncEntry {
    confirmed: Stage,
    in_flight: Option<InFlight>,
    queued: Option<Stage>,
    state: SyncState,
}

pub struct Synchronizer<G: DealGateway> {
    gateway: Arc<G>,
    policy: SyncPolicy,
    entries: HashMap<DealId, SyncEntry>,
    next_seq: u64,
    refetch_requested: bool,
    outcomes_tx: mpsc::UnboundedSender<CommitOutcome>,
    outcomes_rx: mpsc::UnboundedReceiver<CommitOutcome>,
}

impl<G: DealGateway> Synchronizer<G> {
    pub fn new(gateway: Arc<G>, policy: SyncPolicy) -> Self {
        let (outcomes_tx, outcomes_rx) = mpsc::unbounded_channel();
        Self {
            gateway,
            policy,
            entries: HashMap::new(),
            next_seq: 0,
            refetch_requested: false,
            outcomes_tx,
            outcomes_rx,
        }
    }

    /// Record an optimistic move from `previous` to `target` and persist it.
    ///
    /// Must be called from within a Tokio runtime. Never waits for the remote
    /// side.
    pub fn commit(&mut self, id: DealId, previous: Stage, target: Stage) {
        let entry = self.entries.entry(id.clone()).or_insert_with(|| SyncEntry {
            confirmed: previous,
            in_flight: None,
            queued: None,
            state: SyncState::Committed,
        });

        if entry.in_flight.is_some() {
            if let Some(replaced) = entry.queued.replace(target) {
                debug!(
                    deal_id = %id,
                    from = %replaced,
                    to = %target,
                    "replacing queued stage change"
                );
            }
            entry.state = SyncState::Pending { target };
            return;
        }
        if entry.confirmed == target {
            entry.state = SyncState::Committed;
            return;
        }
        self.dispatch(id, target);
    }

    fn dispatch(&mut self, id: DealId, target: Stage) {
        let seq = self.next_seq;
        self.next_seq += 1;
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.in_flight = Some(InFlight { seq, target });
            entry.state = SyncState::Pending { target };
        }

        let gateway = Arc::clone(&self.gateway);
        let tx = self.outcomes_tx.clone();
        let span = info_span!("board.commit", deal_id = %id, stage = %target, seq);
        tokio::spawn(
            async move {
                let update = StageUpdate::new(id.clone(), target);
                let call = tokio::spawn(
                    async move { gateway.update_stage(update).await }.in_current_span(),
                );
                // Panicking or aborted updates still report an outcome.
                let result = match call.await {
                    Ok(result) => result,
                    Err(err) => {
                        warn!(error = %err, "stage update task did not complete");
                        Err(GatewayError::Transport(format!(
                            "stage update task did not complete: {err}"
                        )))
                    }
                };
                // The receiver only goes away with the board itself.
                let _ = tx.send(CommitOutcome {
                    id,
                    seq,
                    target,
                    result,
                });
            }
            .instrument(span),
        );
    }

    /// Fold one outcome into the sync state, rolling `cache` back when a
    /// commit failed with nothing queued behind it.
    pub fn apply(
        &mut self,
        outcome: CommitOutcome,
        cache: &mut DealCollection,
    ) -> Option<BoardNotice> {
        let CommitOutcome {
            id,
            seq,
            target,
            result,
        } = outcome;
        let Some(entry) = self.entries.get_mut(&id) else {
            debug!(deal_id = %id, seq, "outcome for untracked deal");
            return None;
        };
        if entry.in_flight.map(|f| f.seq) != Some(seq) {
            debug!(deal_id = %id, seq, "stale commit outcome");
            return None;
        }
        entry.in_flight = None;

        let queued = entry.queued.take();
        match result {
            Ok(()) => {
                info!(deal_id = %id, stage = %target, "stage change committed");
                entry.confirmed = target;
                if self.policy.refetch_on_commit {
                    self.refetch_requested = true;
                }
                match queued {
                    Some(next) if next != target => self.dispatch(id, next),
                    _ => entry.state = SyncState::Committed,
                }
                None
            }
            Err(err) => {
                warn!(deal_id = %id, stage = %target, error = %err, "stage change failed");
                match queued {
                    Some(next) if next != entry.confirmed => {
                        self.dispatch(id, next);
                        None
                    }
                    Some(_) => {
                        entry.state = SyncState::Committed;
                        None
                    }
                    None => {
                        let restored = entry.confirmed;
                        entry.state = SyncState::Failed {
                            reason: err.to_string(),
                        };
                        cache.reassign_stage(&id, restored);
                        Some(BoardNotice::CommitFailed {
                            id,
                            attempted: target,
                            restored,
                            message: err.to_string(),
                        })
                    }
                }
            }
        }
    }

    /// Apply every outcome that has already arrived, without waiting.
    pub fn drain(&mut self, cache: &mut DealCollection) -> Vec<BoardNotice> {
        let mut notices = Vec::new();
        while let Ok(outcome) = self.outcomes_rx.try_recv() {
            notices.extend(self.apply(outcome, cache));
        }
        notices
    }

    /// Wait for the next outcome to arrive.
    pub async fn next_outcome(&mut self) -> Option<CommitOutcome> {
        self.outcomes_rx.recv().await
    }

    /// Re-apply unsettled stage changes on top of a freshly loaded collection.
    ///
    /// Entries for deals that vanished are dropped, idle entries are dropped
    /// because the load is the newer truth, and the loaded stage becomes the
    /// rollback target for anything still in flight.
    pub fn rebase(&mut self, cache: &mut DealCollection) {
        self.entries.retain(|id, entry| {
            let Some(loaded) = cache.stage_of(id) else {
                debug!(deal_id = %id, "dropping sync state for removed deal");
                return false;
            };
            let desired = entry.queued.or(entry.in_flight.map(|f| f.target));
            match desired {
                Some(stage) => {
                    entry.confirmed = loaded;
                    cache.reassign_stage(id, stage);
                    true
                }
                None => false,
            }
        });
    }

    pub fn state(&self, id: &DealId) -> Option<&SyncState> {
        self.entries.get(id).map(|entry| &entry.state)
    }

    pub fn has_pending(&self) -> bool {
        self.pending_count() > 0
    }

    pub fn pending_count(&self) -> usize {
        self.entries
            .values()
            .filter(|entry| entry.in_flight.is_some())
            .count()
    }

    /// Returns and clears the refetch request raised by a successful commit.
    pub fn take_refetch_request(&mut self) -> bool {
        std::mem::take(&mut self.refetch_requested)
    }

    pub fn refetch_requested(&self) -> bool {
        self.refetch_requested
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{fixtures::deal, gateway::MemoryGateway};

    type Fixture = (
        Arc<MemoryGateway>,
        Synchronizer<MemoryGateway>,
        DealCollection,
    );

    fn setup(deals: Vec<entity::Deal>) -> Fixture {
        let gateway = Arc::new(MemoryGateway::new(deals.clone()));
        let sync = Synchronizer::new(Arc::clone(&gateway), SyncPolicy::default());
        (gateway, sync, DealCollection::new(deals))
    }

    async fn settle(
        sync: &mut Synchronizer<MemoryGateway>,
        cache: &mut DealCollection,
    ) -> Vec<BoardNotice> {
        let mut notices = Vec::new();
        while sync.has_pending() {
            let outcome = sync.next_outcome().await.expect("sender alive");
            notices.extend(sync.apply(outcome, cache));
        }
        notices
    }

    #[tokio::test]
    async fn successful_commit_is_marked_committed() {
        let (gateway, mut sync, mut cache) = setup(vec![deal("a", Stage::Proposal)]);
        let id = DealId::from("a");
        cache.reassign_stage(&id, Stage::Negotiation);
        sync.commit(id.clone(), Stage::Proposal, Stage::Negotiation);
        assert_eq!(
            sync.state(&id),
            Some(&SyncState::Pending {
                target: Stage::Negotiation
            })
        );

        let notices = settle(&mut sync, &mut cache).await;
        assert!(notices.is_empty());
        assert_eq!(sync.state(&id), Some(&SyncState::Committed));
        assert_eq!(
            gateway.updates(),
            vec![StageUpdate::new(id.clone(), Stage::Negotiation)]
        );
        assert_eq!(cache.stage_of(&id), Some(Stage::Negotiation));
        assert!(!sync.refetch_requested());
    }

    #[tokio::test]
    async fn failed_commit_rolls_back_and_notifies() {
        let (gateway, mut sync, mut cache) = setup(vec![deal("a", Stage::Proposal)]);
        gateway.set_fail_updates(true);
        let id = DealId::from("a");
        cache.reassign_stage(&id, Stage::ClosedWon);
        sync.commit(id.clone(), Stage::Proposal, Stage::ClosedWon);

        let notices = settle(&mut sync, &mut cache).await;
        assert_eq!(cache.stage_of(&id), Some(Stage::Proposal));
        assert!(matches!(sync.state(&id), Some(SyncState::Failed { .. })));
        match notices.as_slice() {
            [
                BoardNotice::CommitFailed {
                    id: failed,
                    attempted,
                    restored,
                    ..
                },
            ] => {
                assert_eq!(failed, &id);
                assert_eq!(*attempted, Stage::ClosedWon);
                assert_eq!(*restored, Stage::Proposal);
            }
            other => panic!("unexpected notices {other:?}"),
        }
    }

    #[tokio::test]
    async fn rapid_moves_of_one_deal_are_coalesced() {
        let (gateway, mut sync, mut cache) = setup(vec![deal("a", Stage::Prospecting)]);
        let id = DealId::from("a");
        sync.commit(id.clone(), Stage::Prospecting, Stage::Qualification);
        sync.commit(id.clone(), Stage::Qualification, Stage::Proposal);
        sync.commit(id.clone(), Stage::Proposal, Stage::Negotiation);
        cache.reassign_stage(&id, Stage::Negotiation);
        assert_eq!(sync.pending_count(), 1);

        settle(&mut sync, &mut cache).await;
        let stages: Vec<Stage> = gateway.updates().into_iter().map(|u| u.stage).collect();
        assert_eq!(stages, vec![Stage::Qualification, Stage::Negotiation]);
        assert_eq!(sync.state(&id), Some(&SyncState::Committed));
        assert_eq!(gateway.deals()[0].stage, Stage::Negotiation);
    }

    #[tokio::test]
    async fn queued_change_supersedes_a_failed_one() {
        let (gateway, mut sync, mut cache) = setup(vec![deal("a", Stage::Prospecting)]);
        gateway.set_fail_updates(true);
        let id = DealId::from("a");
        sync.commit(id.clone(), Stage::Prospecting, Stage::Qualification);
        sync.commit(id.clone(), Stage::Qualification, Stage::Proposal);
        cache.reassign_stage(&id, Stage::Proposal);

        let first = sync.next_outcome().await.unwrap();
        gateway.heal();
        assert!(sync.apply(first, &mut cache).is_none());
        let notices = settle(&mut sync, &mut cache).await;
        assert!(notices.is_empty());
        assert_eq!(cache.stage_of(&id), Some(Stage::Proposal));
        assert_eq!(gateway.deals()[0].stage, Stage::Proposal);
    }

    #[tokio::test]
    async fn moving_back_to_confirmed_stage_sends_nothing() {
        let (gateway, mut sync, _cache) = setup(vec![deal("a", Stage::Proposal)]);
        let id = DealId::from("a");
        sync.commit(id.clone(), Stage::Negotiation, Stage::Negotiation);
        assert!(!sync.has_pending());
        assert!(gateway.updates().is_empty());
    }

    #[tokio::test]
    async fn refetch_is_requested_when_policy_asks() {
        let gateway = Arc::new(MemoryGateway::new(vec![deal("a", Stage::Proposal)]));
        let mut sync = Synchronizer::new(
            Arc::clone(&gateway),
            SyncPolicy {
                refetch_on_commit: true,
            },
        );
        let mut cache = DealCollection::new(gateway.deals());
        sync.commit("a".into(), Stage::Proposal, Stage::Negotiation);
        settle(&mut sync, &mut cache).await;
        assert!(sync.take_refetch_request());
        assert!(!sync.refetch_requested());
    }

    #[tokio::test]
    async fn rebase_reapplies_in_flight_targets() {
        let (_gateway, mut sync, mut cache) = setup(vec![
            deal("a", Stage::Proposal),
            deal("b", Stage::Proposal),
        ]);
        sync.commit("a".into(), Stage::Proposal, Stage::ClosedWon);
        cache.reassign_stage(&"a".into(), Stage::ClosedWon);

        // A reload that predates the commit and no longer has `b`.
        cache.load(vec![deal("a", Stage::Proposal)]);
        sync.rebase(&mut cache);
        assert_eq!(cache.stage_of(&"a".into()), Some(Stage::ClosedWon));
        assert_eq!(sync.pending_count(), 1);
        settle(&mut sync, &mut cache).await;
        assert_eq!(sync.state(&"a".into()), Some(&SyncState::Committed));
    }

    #[tokio::test]
    async fn rebase_reapplies_queued_targets_over_stale_loads() {
        let (gateway, mut sync, mut cache) = setup(vec![deal("a", Stage::Proposal)]);
        let id = DealId::from("a");
        sync.commit(id.clone(), Stage::Proposal, Stage::Negotiation);
        sync.commit(id.clone(), Stage::Negotiation, Stage::ClosedWon);
        cache.reassign_stage(&id, Stage::ClosedWon);

        cache.load(vec![deal("a", Stage::Qualification)]);
        sync.rebase(&mut cache);
        assert_eq!(cache.stage_of(&id), Some(Stage::ClosedWon));
        assert_eq!(sync.entries[&id].confirmed, Stage::Qualification);
        assert_eq!(
            sync.state(&id),
            Some(&SyncState::Pending {
                target: Stage::ClosedWon
            })
        );

        let notices = settle(&mut sync, &mut cache).await;
        assert!(notices.is_empty());
        let stages: Vec<Stage> = gateway.updates().into_iter().map(|u| u.stage).collect();
        assert_eq!(stages, vec![Stage::Negotiation, Stage::ClosedWon]);
        assert_eq!(gateway.deals()[0].stage, Stage::ClosedWon);
        assert_eq!(cache.stage_of(&id), Some(Stage::ClosedWon));
    }
}
