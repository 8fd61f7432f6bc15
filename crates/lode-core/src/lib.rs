//! Lode Core -- finite-resource deposits for chunked worlds.
//!
//! The world is cut into fixed-size regions (4x4 chunks). The first time
//! anything asks about a region it receives a deposit picked by weighted,
//! seed-reproducible selection, or nothing. Extractors standing on the region
//! drain its operation budget over time; the output per cycle shrinks with
//! the budget down to the deposit's floor.
//!
//! # Tick Pipeline
//!
//! Each call to [`engine::Simulation::step`] ticks every extractor once, in
//! slot order. Per extractor:
//!
//! 1. **Bind** -- Resolve the region under the extractor (rolling it if new).
//! 2. **Pause** -- Disabled extractors stop here.
//! 3. **Gate** -- Check energy or fuel; roll progress back when short.
//! 4. **Probe** -- Compute quantity and material once; simulate the insert.
//! 5. **Commit** -- Draw energy or fuel and advance progress.
//! 6. **Deliver** -- On a full cycle, insert and roll depletion.
//!
//! # Key Types
//!
//! - [`catalog::DepositCatalog`] -- Frozen set of deposit definitions with
//!   memoized per-biome weight totals.
//! - [`allocator::RegionAllocator`] -- Lazy, deterministic region rolls.
//! - [`region::RegionStore`] -- The shared region table with dirty tracking.
//! - [`depletion::DepletionEngine`] -- Yield curve, depletion and material
//!   rolls.
//! - [`extractor::Extractor`] -- Per-machine state machine.
//! - [`capability`] -- `OutputSink`, `ResourceGate` and `DrillHead` seams.
//! - [`serialize`] -- bitcode region and extractor persistence.

pub mod allocator;
pub mod capability;
pub mod catalog;
pub mod depletion;
pub mod dirty;
pub mod engine;
pub mod extractor;
pub mod fixed;
pub mod id;
pub mod region;
pub mod rng;
pub mod serialize;
pub mod world;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
