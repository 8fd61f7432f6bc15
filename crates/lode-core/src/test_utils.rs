//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use crate::capability::{OutputBuffer, Unmetered};
use crate::catalog::{DepositCatalog, DepositCatalogBuilder, DepositDefinition, YieldRange};
use crate::engine::{MachineParts, SimConfig, Simulation};
use crate::extractor::{Extractor, ExtractorClass, Site};
use crate::fixed::Fixed64;
use crate::id::DimensionId;
use crate::world::{Biome, BlockPos, DimensionContext, RegionKey};
use std::sync::Arc;

pub fn fixed(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

// ===========================================================================
// World fixtures
// ===========================================================================

pub fn overworld() -> DimensionContext {
    DimensionContext::new(0, "overworld", true)
}

pub fn nether() -> DimensionContext {
    DimensionContext::new(-1, "nether", false)
}

pub fn plains() -> Biome {
    Biome::new(1, "plains")
}

pub fn mountains() -> Biome {
    Biome::new(3, "mountains").with_tags(&["mountain", "cold"])
}

pub fn key(group_x: i32, group_z: i32) -> RegionKey {
    RegionKey::new(DimensionId(0), group_x, group_z)
}

/// A site in the overworld plains at block `(x, 64, z)`.
pub fn site_at(x: i32, z: i32) -> Site {
    Site::new(overworld(), BlockPos::new(x, 64, z), plains())
}

// ===========================================================================
// Deposit fixtures
// ===========================================================================

/// A deposit with a fixed yield that always depletes.
pub fn fixed_deposit(id: &str, weight: i32, yield_: i32, amount: i32) -> DepositDefinition {
    let mut def = DepositDefinition::new(id, weight, &format!("{id}_ore"));
    def.yield_range = YieldRange {
        min: yield_,
        max: yield_,
    };
    def.depletion_chance = 100;
    def.depletion_amount = amount;
    def
}

pub fn catalog_of(defs: impl IntoIterator<Item = DepositDefinition>) -> Arc<DepositCatalog> {
    let mut builder = DepositCatalogBuilder::new();
    for def in defs {
        if let Err(e) = builder.register(def) {
            panic!("fixture deposit rejected: {e}");
        }
    }
    Arc::new(builder.build())
}

/// Catalog with a single iron deposit: yield 100, always depletes by 1000,
/// floor 5.
pub fn iron_catalog() -> Arc<DepositCatalog> {
    let mut iron = fixed_deposit("iron", 10, 100, 1000);
    iron.depleted_yield = 5;
    catalog_of([iron])
}

// ===========================================================================
// Simulation fixtures
// ===========================================================================

pub fn simulation(catalog: Arc<DepositCatalog>, world_seed: u64) -> Simulation {
    Simulation::new(catalog, SimConfig { world_seed })
}

/// Add an unmetered extractor with an output buffer of `capacity`.
pub fn add_unmetered(
    sim: &mut Simulation,
    class: ExtractorClass,
    site: Site,
    capacity: u32,
) -> crate::id::ExtractorId {
    sim.add_extractor(
        Extractor::new(class, site),
        MachineParts::new(Unmetered, OutputBuffer::new(capacity)),
    )
}

/// Same class with a shorter cycle, for tests that need deliveries quickly.
pub fn with_cycle(class: ExtractorClass, progress_max: u32) -> ExtractorClass {
    ExtractorClass {
        progress_max,
        ..class
    }
}
