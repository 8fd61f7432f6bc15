//! Region allocation: decides, once per region, which deposit lives there
//! and how much it holds.
//!
//! Both decisions come from streams seeded by the world seed and the region
//! key, never from the world RNG, so a region rolls the same way no matter
//! when or how often it is first queried, and a reload with the same seed
//! agrees with the original roll. Selection and yield use separate salts and
//! separate generator instances.

use crate::catalog::{DepositCatalog, DepositDefinition};
use crate::region::{MAX_OPERATIONS, RegionRecord, RegionStore};
use crate::rng::SimRng;
use crate::world::{Biome, DimensionContext, RegionKey};
use std::sync::Arc;

const SELECTION_SALT: u64 = 0x5E1E_C710_0000_0001;
const YIELD_SALT: u64 = 0x71E1_D000_0000_0002;

/// Resolves regions against a catalog.
#[derive(Debug, Clone)]
pub struct RegionAllocator {
    catalog: Arc<DepositCatalog>,
    world_seed: u64,
}

impl RegionAllocator {
    pub fn new(catalog: Arc<DepositCatalog>, world_seed: u64) -> Self {
        Self {
            catalog,
            world_seed,
        }
    }

    pub fn catalog(&self) -> &Arc<DepositCatalog> {
        &self.catalog
    }

    pub fn world_seed(&self) -> u64 {
        self.world_seed
    }

    /// Swap in a reloaded catalog. The caller is responsible for rebinding
    /// stored records (see [`RegionStore`]).
    pub(crate) fn set_catalog(&mut self, catalog: Arc<DepositCatalog>) {
        self.catalog = catalog;
    }

    /// Return the record for `key`, rolling and caching it on first use.
    ///
    /// Idempotent: an existing record is returned unchanged. A region with
    /// no eligible deposit is cached as an empty record so it is never
    /// re-rolled.
    pub fn resolve<'s>(
        &self,
        store: &'s mut RegionStore,
        key: RegionKey,
        biome: &Biome,
        dimension: &DimensionContext,
    ) -> &'s RegionRecord {
        debug_assert_eq!(key.dimension, dimension.id);
        store.get_or_insert_with(key, || self.roll(key, biome, dimension))
    }

    /// Roll a fresh record without touching any store.
    pub fn roll(&self, key: RegionKey, biome: &Biome, dimension: &DimensionContext) -> RegionRecord {
        let Some(deposit) = self.select(key, biome, dimension) else {
            return RegionRecord::empty();
        };
        let initial_yield = self.roll_yield(key, &deposit);
        tracing::debug!(
            dimension = key.dimension.0,
            group_x = key.group_x,
            group_z = key.group_z,
            deposit = %deposit.id,
            initial_yield,
            "rolled region"
        );
        RegionRecord::new(Some(deposit), initial_yield, MAX_OPERATIONS)
    }

    /// Weighted single draw over the eligible definitions, walked in
    /// registration order.
    fn select(
        &self,
        key: RegionKey,
        biome: &Biome,
        dimension: &DimensionContext,
    ) -> Option<Arc<DepositDefinition>> {
        let total = self.catalog.total_weight(dimension, biome);
        if total <= 0 {
            return None;
        }

        let mut selection = self.selection_stream(key);
        let mut remaining = selection.below(total as u64) as i64;
        for (deposit, weight) in self.catalog.eligible(dimension, biome) {
            remaining -= i64::from(weight);
            if remaining < 0 {
                return Some(Arc::clone(deposit));
            }
        }
        None
    }

    /// Uniform in `[min, max)`, clamped to `max`. A degenerate range yields
    /// `max`.
    fn roll_yield(&self, key: RegionKey, deposit: &DepositDefinition) -> i32 {
        let range = deposit.yield_range;
        let span = i64::from(range.max) - i64::from(range.min);
        if span <= 0 {
            return range.max;
        }
        let mut yields = self.yield_stream(key);
        let rolled = i64::from(range.min) + yields.below(span as u64) as i64;
        rolled.min(i64::from(range.max)) as i32
    }

    fn selection_stream(&self, key: RegionKey) -> SimRng {
        SimRng::derived(
            SELECTION_SALT,
            &[
                self.world_seed as i64,
                i64::from(key.dimension.0),
                i64::from(key.group_x),
                i64::from(key.group_z),
            ],
        )
    }

    fn yield_stream(&self, key: RegionKey) -> SimRng {
        SimRng::derived(
            YIELD_SALT,
            &[
                i64::from(key.dimension.0),
                i64::from(key.group_x),
                i64::from(key.group_z),
                self.world_seed as i64,
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{DepositCatalogBuilder, DimensionFilter, YieldRange};
    use crate::id::DimensionId;

    fn overworld() -> DimensionContext {
        DimensionContext::new(0, "overworld", true)
    }

    fn plains() -> Biome {
        Biome::new(1, "plains")
    }

    fn key(x: i32, z: i32) -> RegionKey {
        RegionKey::new(DimensionId(0), x, z)
    }

    fn catalog(defs: Vec<DepositDefinition>) -> Arc<DepositCatalog> {
        let mut b = DepositCatalogBuilder::new();
        for def in defs {
            b.register(def).unwrap();
        }
        Arc::new(b.build())
    }

    fn ranged(id: &str, weight: i32, min: i32, max: i32) -> DepositDefinition {
        let mut def = DepositDefinition::new(id, weight, id);
        def.yield_range = YieldRange { min, max };
        def
    }

    #[test]
    fn resolve_is_idempotent() {
        let alloc = RegionAllocator::new(
            catalog(vec![ranged("a", 5, 10, 90), ranged("b", 5, 10, 90)]),
            1234,
        );
        let mut store = RegionStore::new();
        let first = alloc
            .resolve(&mut store, key(3, -7), &plains(), &overworld())
            .clone();
        let second = alloc
            .resolve(&mut store, key(3, -7), &plains(), &overworld())
            .clone();
        assert_eq!(first, second);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn resolve_never_rerolls_existing_record() {
        let alloc = RegionAllocator::new(catalog(vec![ranged("a", 5, 10, 90)]), 1);
        let mut store = RegionStore::new();
        store.restore(key(0, 0), RegionRecord::new(None, 7, 3));
        let record = alloc.resolve(&mut store, key(0, 0), &plains(), &overworld());
        assert!(record.deposit().is_none());
        assert_eq!(record.initial_yield(), 7);
        assert_eq!(record.operations_remaining(), 3);
    }

    #[test]
    fn separate_stores_agree() {
        let alloc = RegionAllocator::new(
            catalog(vec![
                ranged("a", 3, 0, 1000),
                ranged("b", 4, 0, 1000),
                ranged("c", 5, 0, 1000),
            ]),
            99,
        );
        let mut s1 = RegionStore::new();
        let mut s2 = RegionStore::new();
        for x in -10..10 {
            let a = alloc
                .resolve(&mut s1, key(x, x * 3), &plains(), &overworld())
                .clone();
            let b = alloc
                .resolve(&mut s2, key(x, x * 3), &plains(), &overworld())
                .clone();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn zero_total_weight_caches_empty_region() {
        let alloc = RegionAllocator::new(catalog(vec![ranged("a", 0, 10, 20)]), 5);
        let mut store = RegionStore::new();
        let record = alloc.resolve(&mut store, key(1, 1), &plains(), &overworld());
        assert!(record.deposit().is_none());
        assert_eq!(record.operations_remaining(), MAX_OPERATIONS);
        assert!(store.contains(&key(1, 1)));
    }

    #[test]
    fn empty_catalog_yields_empty_regions() {
        let alloc = RegionAllocator::new(Arc::new(DepositCatalog::default()), 5);
        let record = alloc.roll(key(0, 0), &plains(), &overworld());
        assert!(record.deposit().is_none());
    }

    #[test]
    fn degenerate_yield_range_yields_max() {
        let alloc = RegionAllocator::new(catalog(vec![ranged("a", 10, 100, 100)]), 77);
        for x in 0..20 {
            let record = alloc.roll(key(x, 0), &plains(), &overworld());
            assert_eq!(record.initial_yield(), 100);
        }
    }

    #[test]
    fn yield_stays_in_half_open_range() {
        let alloc = RegionAllocator::new(catalog(vec![ranged("a", 10, 40, 60)]), 3);
        for x in 0..200 {
            let y = alloc.roll(key(x, -x), &plains(), &overworld()).initial_yield();
            assert!((40..60).contains(&y), "yield {y} out of range");
        }
    }

    #[test]
    fn filtered_definitions_never_selected() {
        let mut nether_only = ranged("nether", 50, 1, 2);
        nether_only.dimension_filter = DimensionFilter::Names(vec!["nether".into()]);
        let alloc = RegionAllocator::new(
            catalog(vec![nether_only, ranged("surface", 1, 1, 2)]),
            11,
        );
        for x in 0..500 {
            let record = alloc.roll(key(x, 2 * x), &plains(), &overworld());
            assert_eq!(record.deposit_id(), Some("surface"));
        }
    }

    #[test]
    fn selection_tracks_weights() {
        let alloc = RegionAllocator::new(
            catalog(vec![ranged("common", 9, 1, 2), ranged("rare", 1, 1, 2)]),
            2024,
        );
        let rare = (0..5000)
            .filter(|&x| alloc.roll(key(x, 17), &plains(), &overworld()).deposit_id() == Some("rare"))
            .count();
        // Expect ~500 of 5000.
        assert!((300..=700).contains(&rare), "got {rare} rare regions");
    }

    #[test]
    fn world_seed_changes_outcomes() {
        let defs = || {
            vec![
                ranged("a", 1, 0, 10_000),
                ranged("b", 1, 0, 10_000),
                ranged("c", 1, 0, 10_000),
            ]
        };
        let a = RegionAllocator::new(catalog(defs()), 1);
        let b = RegionAllocator::new(catalog(defs()), 2);
        let differs = (0..50).any(|x| {
            a.roll(key(x, 0), &plains(), &overworld()) != b.roll(key(x, 0), &plains(), &overworld())
        });
        assert!(differs);
    }

    #[test]
    fn selection_and_yield_streams_are_distinct() {
        let alloc = RegionAllocator::new(Arc::new(DepositCatalog::default()), 42);
        let mut sel = alloc.selection_stream(key(4, 4));
        let mut yld = alloc.yield_stream(key(4, 4));
        assert_ne!(sel.next_u64(), yld.next_u64());
    }
}
