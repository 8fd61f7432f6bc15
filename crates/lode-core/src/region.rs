//! Region records and the shared region repository.
//!
//! A [`RegionRecord`] is created at most once per [`RegionKey`] and then only
//! its operation budget changes. The [`RegionStore`] owns every record and
//! is handed to the allocator (which fills it) and to extractors (which drain
//! it); nothing else holds records.

use crate::catalog::{DepositCatalog, DepositDefinition};
use crate::dirty::DirtyTracker;
use crate::world::RegionKey;
use std::collections::HashMap;
use std::sync::Arc;

/// Operation budget of a fresh region.
pub const MAX_OPERATIONS: i32 = 100_000;

/// What the engine knows about one region.
#[derive(Debug, Clone)]
pub struct RegionRecord {
    deposit: Option<Arc<DepositDefinition>>,
    initial_yield: i32,
    operations_remaining: i32,
}

impl RegionRecord {
    /// The budget is clamped into `0..=MAX_OPERATIONS`.
    pub fn new(
        deposit: Option<Arc<DepositDefinition>>,
        initial_yield: i32,
        operations_remaining: i32,
    ) -> Self {
        Self {
            deposit,
            initial_yield,
            operations_remaining: operations_remaining.clamp(0, MAX_OPERATIONS),
        }
    }

    /// A region that was rolled but received no deposit.
    pub fn empty() -> Self {
        Self::new(None, 0, MAX_OPERATIONS)
    }

    pub fn deposit(&self) -> Option<&Arc<DepositDefinition>> {
        self.deposit.as_ref()
    }

    pub fn deposit_id(&self) -> Option<&str> {
        self.deposit.as_deref().map(|d| d.id.as_str())
    }

    pub fn initial_yield(&self) -> i32 {
        self.initial_yield
    }

    pub fn operations_remaining(&self) -> i32 {
        self.operations_remaining
    }

    /// The deposit's layer, if the region has a deposit.
    pub fn layer(&self) -> Option<i32> {
        self.deposit.as_deref().map(|d| d.layer)
    }

    pub fn is_exhausted(&self) -> bool {
        self.operations_remaining == 0
    }

    /// Subtract operations, flooring at zero. Returns `true` if the budget
    /// changed.
    pub(crate) fn decrease_operations(&mut self, amount: i32) -> bool {
        let before = self.operations_remaining;
        self.operations_remaining = before.saturating_sub(amount.max(0)).max(0);
        self.operations_remaining != before
    }

    /// Point the record at the catalog's current definition for the same id,
    /// or at nothing when the id is gone.
    pub(crate) fn rebind(&mut self, catalog: &DepositCatalog) {
        if self.deposit.is_some() {
            let rebound = self.deposit_id().and_then(|id| catalog.get(id).cloned());
            self.deposit = rebound;
        }
    }
}

/// Records compare by deposit id, not by definition identity, so a record
/// equals its own persisted-and-reloaded copy.
impl PartialEq for RegionRecord {
    fn eq(&self, other: &Self) -> bool {
        self.deposit_id() == other.deposit_id()
            && self.initial_yield == other.initial_yield
            && self.operations_remaining == other.operations_remaining
    }
}

impl Eq for RegionRecord {}

/// The shared region table. Resolve-or-create goes through
/// [`crate::allocator::RegionAllocator`]; this type only stores.
#[derive(Debug, Clone, Default)]
pub struct RegionStore {
    regions: HashMap<RegionKey, RegionRecord>,
    dirty: DirtyTracker,
}

impl RegionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &RegionKey) -> Option<&RegionRecord> {
        self.regions.get(key)
    }

    pub fn contains(&self, key: &RegionKey) -> bool {
        self.regions.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RegionKey, &RegionRecord)> {
        self.regions.iter()
    }

    /// Return the record for `key`, creating it with `create` if absent.
    /// A newly created record is marked dirty.
    pub fn get_or_insert_with<F>(&mut self, key: RegionKey, create: F) -> &mut RegionRecord
    where
        F: FnOnce() -> RegionRecord,
    {
        let dirty = &mut self.dirty;
        self.regions.entry(key).or_insert_with(|| {
            dirty.mark_region(key);
            create()
        })
    }

    /// Insert a record restored from persistence. Does not mark dirty.
    pub fn restore(&mut self, key: RegionKey, record: RegionRecord) {
        self.regions.insert(key, record);
    }

    /// Drop a region. It will be re-rolled on next access.
    pub fn remove(&mut self, key: &RegionKey) -> Option<RegionRecord> {
        let removed = self.regions.remove(key);
        if removed.is_some() {
            self.dirty.mark_removed(*key);
        }
        removed
    }

    /// Apply `f` to a record; marks the region dirty when `f` reports a
    /// change. Returns `None` if the region is unknown.
    pub(crate) fn modify<F>(&mut self, key: &RegionKey, f: F) -> Option<bool>
    where
        F: FnOnce(&mut RegionRecord) -> bool,
    {
        let record = self.regions.get_mut(key)?;
        let changed = f(record);
        if changed {
            self.dirty.mark_region(*key);
        }
        Some(changed)
    }

    /// Rebind every record against a reloaded catalog.
    pub(crate) fn rebind_all(&mut self, catalog: &DepositCatalog) {
        for record in self.regions.values_mut() {
            record.rebind(catalog);
        }
    }

    pub fn dirty_tracker(&self) -> &DirtyTracker {
        &self.dirty
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.is_dirty()
    }

    pub fn mark_clean(&mut self) {
        self.dirty.mark_clean();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DepositCatalogBuilder;
    use crate::id::DimensionId;

    fn key(x: i32, z: i32) -> RegionKey {
        RegionKey::new(DimensionId(0), x, z)
    }

    fn iron() -> Arc<DepositDefinition> {
        Arc::new(DepositDefinition::new("iron", 10, "iron_ore"))
    }

    #[test]
    fn decrease_floors_at_zero() {
        let mut record = RegionRecord::new(Some(iron()), 100, 5);
        assert!(record.decrease_operations(3));
        assert_eq!(record.operations_remaining(), 2);
        assert!(record.decrease_operations(10));
        assert_eq!(record.operations_remaining(), 0);
        assert!(record.is_exhausted());
        assert!(!record.decrease_operations(1));
    }

    #[test]
    fn negative_decrease_is_ignored() {
        let mut record = RegionRecord::new(Some(iron()), 100, 5);
        assert!(!record.decrease_operations(-4));
        assert_eq!(record.operations_remaining(), 5);
    }

    #[test]
    fn new_clamps_negative_budget() {
        let record = RegionRecord::new(None, 0, -3);
        assert_eq!(record.operations_remaining(), 0);
    }

    #[test]
    fn new_clamps_oversized_budget() {
        let record = RegionRecord::new(Some(iron()), 100, MAX_OPERATIONS + 500);
        assert_eq!(record.operations_remaining(), MAX_OPERATIONS);
        assert_eq!(crate::depletion::current_yield(&record), 100);
    }

    #[test]
    fn equality_uses_deposit_id() {
        let a = RegionRecord::new(Some(iron()), 100, 50);
        let b = RegionRecord::new(Some(iron()), 100, 50);
        assert_eq!(a, b);
        let c = RegionRecord::new(None, 100, 50);
        assert_ne!(a, c);
    }

    #[test]
    fn get_or_insert_creates_once() {
        let mut store = RegionStore::new();
        let mut calls = 0;
        store.get_or_insert_with(key(0, 0), || {
            calls += 1;
            RegionRecord::empty()
        });
        store.get_or_insert_with(key(0, 0), || {
            calls += 1;
            RegionRecord::empty()
        });
        assert_eq!(calls, 1);
        assert_eq!(store.len(), 1);
        assert!(store.dirty_tracker().is_region_dirty(&key(0, 0)));
    }

    #[test]
    fn restore_does_not_mark_dirty() {
        let mut store = RegionStore::new();
        store.restore(key(1, 1), RegionRecord::empty());
        assert!(!store.is_dirty());
        assert!(store.contains(&key(1, 1)));
    }

    #[test]
    fn modify_marks_dirty_only_on_change() {
        let mut store = RegionStore::new();
        store.restore(key(0, 0), RegionRecord::new(Some(iron()), 10, 10));
        assert_eq!(store.modify(&key(0, 0), |_| false), Some(false));
        assert!(!store.is_dirty());
        assert_eq!(
            store.modify(&key(0, 0), |r| r.decrease_operations(1)),
            Some(true)
        );
        assert!(store.is_dirty());
        assert_eq!(store.modify(&key(9, 9), |_| true), None);
    }

    #[test]
    fn remove_marks_removed() {
        let mut store = RegionStore::new();
        store.restore(key(2, 2), RegionRecord::empty());
        assert!(store.remove(&key(2, 2)).is_some());
        assert!(store.dirty_tracker().removed_regions().contains(&key(2, 2)));
        assert!(store.remove(&key(2, 2)).is_none());
    }

    #[test]
    fn rebind_drops_vanished_ids() {
        let mut store = RegionStore::new();
        store.restore(key(0, 0), RegionRecord::new(Some(iron()), 10, 10));
        let mut b = DepositCatalogBuilder::new();
        b.register(DepositDefinition::new("gold", 1, "gold_ore"))
            .unwrap();
        store.rebind_all(&b.build());
        let record = store.get(&key(0, 0)).unwrap();
        assert!(record.deposit().is_none());
        assert_eq!(record.initial_yield(), 10);
    }

    #[test]
    fn rebind_picks_up_new_definition() {
        let mut store = RegionStore::new();
        store.restore(key(0, 0), RegionRecord::new(Some(iron()), 10, 10));
        let mut b = DepositCatalogBuilder::new();
        let mut updated = DepositDefinition::new("iron", 10, "iron_ore");
        updated.depleted_yield = 42;
        b.register(updated).unwrap();
        store.rebind_all(&b.build());
        let record = store.get(&key(0, 0)).unwrap();
        assert_eq!(record.deposit().unwrap().depleted_yield, 42);
    }
}
