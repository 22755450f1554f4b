use entity::{Deal, DealId, Stage};
use tracing::debug;

/// Ordered, in-memory deal list the board renders from.
///
/// Mutations never fail: identifiers that are not present are ignored. Every
/// change bumps [`DealCollection::revision`] so derived views can tell they are
/// stale.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DealCollection {
    deals: Vec<Deal>,
    revision: u64,
}

impl DealCollection {
    pub fn new(deals: Vec<Deal>) -> Self {
        Self { deals, revision: 0 }
    }

    /// Replace the whole collection with a freshly fetched list.
    pub fn load(&mut self, deals: Vec<Deal>) {
        self.deals = deals;
        self.revision += 1;
    }

    /// Move one deal to `stage`, returning the stage it had before.
    ///
    /// Returns `None` when the id is unknown. Assigning the current stage
    /// leaves the collection untouched.
    pub fn reassign_stage(&mut self, id: &DealId, stage: Stage) -> Option<Stage> {
        let Some(deal) = self.deals.iter_mut().find(|d| &d.id == id) else {
            debug!(deal_id = %id, "reassign_stage: unknown deal");
            return None;
        };
        let previous = deal.stage;
        if previous != stage {
            deal.stage = stage;
            self.revision += 1;
        }
        Some(previous)
    }

    /// Reorder the deals of `stage` to follow `ordered_ids`.
    ///
    /// The slots the stage occupies in the flat list stay where they are; only
    /// the deals filling them are permuted. Ids that are unknown or belong to
    /// another stage are skipped, and stage deals missing from `ordered_ids`
    /// keep their relative order after the listed ones. Returns whether
    /// anything moved.
    pub fn reorder_within_stage(&mut self, stage: Stage, ordered_ids: &[DealId]) -> bool {
        let slots: Vec<usize> = self
            .deals
            .iter()
            .enumerate()
            .filter(|(_, deal)| deal.stage == stage)
            .map(|(idx, _)| idx)
            .collect();

        let mut used = vec![false; slots.len()];
        let mut picked = Vec::with_capacity(slots.len());
        for id in ordered_ids {
            let found = slots
                .iter()
                .position(|&slot| &self.deals[slot].id == id);
            if let Some(k) = found {
                if !used[k] {
                    used[k] = true;
                    picked.push(slots[k]);
                }
            }
        }
        picked.extend(
            slots
                .iter()
                .zip(used.iter())
                .filter(|(_, used)| !**used)
                .map(|(slot, _)| *slot),
        );

        if picked == slots {
            return false;
        }
        let reordered: Vec<Deal> = picked.iter().map(|&idx| self.deals[idx].clone()).collect();
        for (slot, deal) in slots.iter().zip(reordered) {
            self.deals[*slot] = deal;
        }
        self.revision += 1;
        true
    }

    pub fn get(&self, id: &DealId) -> Option<&Deal> {
        self.deals.iter().find(|d| &d.id == id)
    }

    pub fn stage_of(&self, id: &DealId) -> Option<Stage> {
        self.get(id).map(|d| d.stage)
    }

    pub fn contains(&self, id: &DealId) -> bool {
        self.get(id).is_some()
    }

    /// Ids of the deals in `stage`, in collection order.
    pub fn ids_in_stage(&self, stage: Stage) -> Vec<DealId> {
        self.deals
            .iter()
            .filter(|d| d.stage == stage)
            .map(|d| d.id.clone())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Deal> {
        self.deals.iter()
    }

    pub fn as_slice(&self) -> &[Deal] {
        &self.deals
    }

    pub fn len(&self) -> usize {
        self.deals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deals.is_empty()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }
}
