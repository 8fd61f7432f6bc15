//! Depletion and yield model.
//!
//! Yield degrades linearly with the remaining operation budget down to the
//! deposit's depleted floor. Depletion is probabilistic per extraction and
//! mutates the shared region record; whichever extractor ticks first wins a
//! roll, and the only guarantee is that the budget never increases.

use crate::catalog::{DepositDefinition, Material};
use crate::region::{MAX_OPERATIONS, RegionRecord, RegionStore};
use crate::rng::SimRng;
use crate::world::RegionKey;
use serde::{Deserialize, Serialize};

/// How a depletion call decides the amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DepletionRequest {
    /// Roll against the deposit's own chance and amount.
    Natural,
    /// Subtract exactly this amount, ignoring deposit stats.
    Manual(i32),
}

/// What a depletion call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepletionOutcome {
    /// Operations were removed; carries the new remaining budget.
    Depleted { remaining: i32 },
    /// The roll failed, the deposit never depletes, or the budget was
    /// already zero.
    Unchanged,
    /// No such region in the store.
    UnknownRegion,
}

/// Instantaneous yield of a region: 0 without a deposit, else
/// `max(depleted_yield, initial_yield * remaining / MAX_OPERATIONS)`.
pub fn current_yield(record: &RegionRecord) -> i32 {
    let Some(deposit) = record.deposit() else {
        return 0;
    };
    let scaled = i64::from(record.initial_yield()) * i64::from(record.operations_remaining())
        / i64::from(MAX_OPERATIONS);
    i32::try_from(scaled)
        .unwrap_or(i32::MAX)
        .max(deposit.depleted_yield)
}

/// Owns the world RNG used for depletion rolls and material picks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepletionEngine {
    rng: SimRng,
}

impl DepletionEngine {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: SimRng::new(seed),
        }
    }

    /// Apply a depletion request to the region at `key`. Marks the region
    /// dirty when its budget changes.
    pub fn deplete(
        &mut self,
        store: &mut RegionStore,
        key: &RegionKey,
        request: DepletionRequest,
    ) -> DepletionOutcome {
        let rng = &mut self.rng;
        let mut remaining = 0;
        let changed = store.modify(key, |record| {
            let changed = deplete_record(record, rng, request);
            remaining = record.operations_remaining();
            changed
        });
        match changed {
            None => DepletionOutcome::UnknownRegion,
            Some(true) => DepletionOutcome::Depleted { remaining },
            Some(false) => DepletionOutcome::Unchanged,
        }
    }

    /// Weighted pick over the deposit's materials.
    ///
    /// Falls back to the first material if the draw never lands inside a
    /// threshold (all-zero weights). `None` only for an empty list.
    pub fn next_material<'d>(&mut self, deposit: &'d DepositDefinition) -> Option<&'d Material> {
        let first = deposit.materials.first()?;
        let total: u64 = deposit.materials.iter().map(|m| u64::from(m.weight)).sum();
        let draw = self.rng.below(total);
        let mut threshold = 0u64;
        for entry in &deposit.materials {
            threshold += u64::from(entry.weight);
            if draw < threshold {
                return Some(&entry.material);
            }
        }
        Some(&first.material)
    }

    /// One-in-`odds` gate used by rigs that only sometimes deplete.
    pub fn roll_odds(&mut self, odds: u32) -> bool {
        self.rng.one_in(odds)
    }

    pub fn rng_state(&self) -> u64 {
        self.rng.state()
    }
}

fn deplete_record(record: &mut RegionRecord, rng: &mut SimRng, request: DepletionRequest) -> bool {
    match request {
        DepletionRequest::Manual(amount) => record.decrease_operations(amount),
        DepletionRequest::Natural => {
            let Some(deposit) = record.deposit() else {
                return false;
            };
            // Deposits with a zero chance never deplete.
            if deposit.depletion_chance == 0 {
                return false;
            }
            let amount = deposit.depletion_amount;
            if rng.percent(deposit.depletion_chance) {
                record.decrease_operations(amount)
            } else {
                false
            }
        }
    }
}
