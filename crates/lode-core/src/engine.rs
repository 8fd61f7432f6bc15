//! The simulation driver: owns the region table, the allocator, the world
//! RNG and every extractor, and ticks them in a single cooperative step.
//!
//! # Architecture
//!
//! The `Simulation` owns:
//! - A [`RegionAllocator`] bound to the current [`DepositCatalog`]
//! - The [`RegionStore`] every extractor reads and drains
//! - A [`DepletionEngine`] holding the world RNG
//! - Extractors in a `SlotMap`, with their machine parts in a parallel
//!   `SecondaryMap`
//!
//! Extractors tick in slot order. Two extractors on the same region see each
//! other's depletion immediately; nothing is buffered between them.

use crate::allocator::RegionAllocator;
use crate::capability::{DrillHead, OutputBuffer, OutputSink, ResourceGate, SimpleDrillHead, Unmetered};
use crate::catalog::{DepositCatalog, Material};
use crate::depletion::{DepletionEngine, DepletionOutcome, DepletionRequest, current_yield};
use crate::extractor::{Extractor, MachineIo, TickContext, TickOutcome};
use crate::fixed::{Fixed64, Ticks, ratio};
use crate::id::ExtractorId;
use crate::region::{MAX_OPERATIONS, RegionRecord, RegionStore};
use crate::rng::derive_seed;
use crate::serialize::{self, DeserializeError, KeyValueStore, SerializeError};
use crate::world::{Biome, DimensionContext, RegionKey};
use serde::{Deserialize, Serialize};
use slotmap::{SecondaryMap, SlotMap};
use std::sync::Arc;

const DEPLETION_SALT: u64 = 0xDE91_E7E0_0000_0003;

/// World-level settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SimConfig {
    pub world_seed: u64,
}

/// Capabilities installed in one extractor.
#[derive(Debug, Clone, Default)]
pub struct MachineParts<G = Unmetered, S = OutputBuffer> {
    pub gate: G,
    pub sink: S,
    pub head: Option<SimpleDrillHead>,
}

impl<G, S> MachineParts<G, S> {
    pub fn new(gate: G, sink: S) -> Self {
        Self {
            gate,
            sink,
            head: None,
        }
    }

    pub fn with_head(mut self, head: SimpleDrillHead) -> Self {
        self.head = Some(head);
        self
    }
}

/// What one [`Simulation::step`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepReport {
    pub tick: Ticks,
    pub outcomes: Vec<(ExtractorId, TickOutcome)>,
}

impl StepReport {
    /// Total quantity delivered across all extractors this step.
    pub fn delivered(&self) -> u64 {
        self.outcomes
            .iter()
            .map(|(_, o)| match o {
                TickOutcome::Delivered { quantity, .. } => u64::from(*quantity),
                _ => 0,
            })
            .sum()
    }

    pub fn outcome(&self, id: ExtractorId) -> Option<&TickOutcome> {
        self.outcomes.iter().find(|(i, _)| *i == id).map(|(_, o)| o)
    }
}

/// One line of a prospecting report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionSurvey {
    pub key: RegionKey,
    pub deposit: Option<String>,
    pub label: Option<String>,
    pub current_yield: i32,
    pub operations_remaining: i32,
    /// Fraction of the operation budget still left.
    pub remaining: Fixed64,
}

impl RegionSurvey {
    fn of(key: RegionKey, record: &RegionRecord) -> Self {
        let ops = record.operations_remaining();
        Self {
            key,
            deposit: record.deposit_id().map(str::to_owned),
            label: record.deposit().map(|d| d.label().to_owned()),
            current_yield: current_yield(record),
            operations_remaining: ops,
            remaining: ratio(ops.max(0) as u64, MAX_OPERATIONS as u64),
        }
    }
}

/// The simulation driver.
pub struct Simulation<G = Unmetered, S = OutputBuffer> {
    allocator: RegionAllocator,
    regions: RegionStore,
    depletion: DepletionEngine,
    extractors: SlotMap<ExtractorId, Extractor>,
    parts: SecondaryMap<ExtractorId, MachineParts<G, S>>,
    tick: Ticks,
}

impl<G: ResourceGate, S: OutputSink> Simulation<G, S> {
    pub fn new(catalog: Arc<DepositCatalog>, config: SimConfig) -> Self {
        Self {
            allocator: RegionAllocator::new(catalog, config.world_seed),
            regions: RegionStore::new(),
            depletion: DepletionEngine::new(derive_seed(
                DEPLETION_SALT,
                &[config.world_seed as i64],
            )),
            extractors: SlotMap::with_key(),
            parts: SecondaryMap::new(),
            tick: 0,
        }
    }

    pub fn tick(&self) -> Ticks {
        self.tick
    }

    pub fn catalog(&self) -> &Arc<DepositCatalog> {
        self.allocator.catalog()
    }

    pub fn regions(&self) -> &RegionStore {
        &self.regions
    }

    pub fn depletion(&self) -> &DepletionEngine {
        &self.depletion
    }

    // -- Extractors --

    pub fn add_extractor(&mut self, extractor: Extractor, parts: MachineParts<G, S>) -> ExtractorId {
        let id = self.extractors.insert(extractor);
        self.parts.insert(id, parts);
        id
    }

    /// Remove an extractor. Progress toward its current cycle is lost; the
    /// parts are handed back.
    pub fn remove_extractor(&mut self, id: ExtractorId) -> Option<(Extractor, MachineParts<G, S>)> {
        let extractor = self.extractors.remove(id)?;
        let parts = self.parts.remove(id)?;
        Some((extractor, parts))
    }

    pub fn extractor(&self, id: ExtractorId) -> Option<&Extractor> {
        self.extractors.get(id)
    }

    pub fn extractor_mut(&mut self, id: ExtractorId) -> Option<&mut Extractor> {
        self.extractors.get_mut(id)
    }

    pub fn parts(&self, id: ExtractorId) -> Option<&MachineParts<G, S>> {
        self.parts.get(id)
    }

    pub fn parts_mut(&mut self, id: ExtractorId) -> Option<&mut MachineParts<G, S>> {
        self.parts.get_mut(id)
    }

    pub fn extractor_count(&self) -> usize {
        self.extractors.len()
    }

    pub fn extractor_ids(&self) -> impl Iterator<Item = ExtractorId> + '_ {
        self.extractors.keys()
    }

    // -- Stepping --

    /// Tick every extractor once, in slot order.
    pub fn step(&mut self) -> StepReport {
        self.tick += 1;
        let Self {
            allocator,
            regions,
            depletion,
            extractors,
            parts,
            tick,
        } = self;
        let mut ctx = TickContext {
            allocator,
            regions,
            depletion,
        };

        let mut outcomes = Vec::with_capacity(extractors.len());
        for (id, extractor) in extractors.iter_mut() {
            let Some(p) = parts.get_mut(id) else {
                continue;
            };
            let mut io = MachineIo {
                gate: &mut p.gate,
                sink: &mut p.sink,
                head: p.head.as_mut().map(|h| h as &mut dyn DrillHead),
            };
            outcomes.push((id, extractor.tick(&mut ctx, &mut io)));
        }
        StepReport {
            tick: *tick,
            outcomes,
        }
    }

    /// Run `n` steps and return the quantity delivered in total.
    pub fn run(&mut self, n: u64) -> u64 {
        (0..n).map(|_| self.step().delivered()).sum()
    }

    // -- Regions --

    /// Resolve (rolling on first use) the region at `key`.
    pub fn resolve_region(
        &mut self,
        key: RegionKey,
        biome: &Biome,
        dimension: &DimensionContext,
    ) -> &RegionRecord {
        self.allocator
            .resolve(&mut self.regions, key, biome, dimension)
    }

    pub fn region(&self, key: &RegionKey) -> Option<&RegionRecord> {
        self.regions.get(key)
    }

    /// Remove `amount` operations from a region regardless of its deposit's
    /// depletion stats.
    pub fn deplete_region(&mut self, key: &RegionKey, amount: i32) -> DepletionOutcome {
        self.depletion
            .deplete(&mut self.regions, key, DepletionRequest::Manual(amount))
    }

    /// Swap in a reloaded catalog and rebind every cached region to it.
    pub fn reload_catalog(&mut self, catalog: Arc<DepositCatalog>) {
        tracing::info!(
            deposits = catalog.len(),
            regions = self.regions.len(),
            "reloading deposit catalog"
        );
        self.regions.rebind_all(&catalog);
        self.allocator.set_catalog(catalog);
    }

    /// Prospect every region within `radius` groups of `center`, resolving
    /// any that were never rolled. `biome_at` supplies each region's biome.
    pub fn survey<F>(
        &mut self,
        center: RegionKey,
        radius: i32,
        dimension: &DimensionContext,
        biome_at: F,
    ) -> Vec<RegionSurvey>
    where
        F: Fn(RegionKey) -> Biome,
    {
        let radius = radius.max(0);
        let mut report = Vec::new();
        for dz in -radius..=radius {
            for dx in -radius..=radius {
                let key = center.offset(dx, dz);
                let biome = biome_at(key);
                let record = self
                    .allocator
                    .resolve(&mut self.regions, key, &biome, dimension);
                report.push(RegionSurvey::of(key, record));
            }
        }
        report
    }

    /// Hand-drill sample: the primary material of the region's deposit, or
    /// nothing if the region is empty or exhausted.
    pub fn sample(
        &mut self,
        key: RegionKey,
        biome: &Biome,
        dimension: &DimensionContext,
    ) -> Option<Material> {
        let record = self.resolve_region(key, biome, dimension);
        if record.is_exhausted() {
            return None;
        }
        record.deposit()?.primary_material().cloned()
    }

    // -- Persistence --

    /// Snapshot the region table and the depletion RNG.
    pub fn save_regions(&self) -> Result<Vec<u8>, SerializeError> {
        serialize::encode_store(&self.regions, &self.depletion, self.tick)
    }

    /// Replace the region table and depletion RNG with a snapshot. Returns
    /// how many corrupt region entries were dropped. A corrupt RNG entry
    /// keeps the current one.
    pub fn load_regions(&mut self, data: &[u8]) -> Result<usize, DeserializeError> {
        let loaded = serialize::decode_store(data, self.allocator.catalog())?;
        self.regions = loaded.store;
        if let Some(depletion) = loaded.depletion {
            self.depletion = depletion;
        }
        Ok(loaded.dropped)
    }

    /// Write changed regions and the depletion RNG to `kv`. Returns the
    /// number of regions written.
    pub fn persist(&mut self, kv: &mut dyn KeyValueStore) -> Result<usize, SerializeError> {
        let written = serialize::persist(&mut self.regions, kv)?;
        serialize::persist_depletion(&self.depletion, kv)?;
        Ok(written)
    }

    /// Replace the region table with whatever `kv` holds, and the depletion
    /// RNG when `kv` has a readable one. Returns how many corrupt region
    /// entries were dropped.
    pub fn restore(&mut self, kv: &dyn KeyValueStore) -> usize {
        let (store, dropped) = serialize::restore(kv, self.allocator.catalog());
        self.regions = store;
        if let Some(depletion) = serialize::restore_depletion(kv) {
            self.depletion = depletion;
        }
        dropped
    }
}
