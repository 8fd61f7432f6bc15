//! Persistence for regions, the depletion RNG and extractor state.
//!
//! Regions are encoded one blob per region so a single corrupt entry costs
//! only that region; it is dropped with a warning and rolled again the next
//! time anything asks for it. A store snapshot wraps those blobs and the
//! depletion engine behind a versioned header. Records store the deposit by
//! id and are rebound to the live catalog on load.

use crate::catalog::DepositCatalog;
use crate::depletion::DepletionEngine;
use crate::extractor::ExtractorState;
use crate::region::{RegionRecord, RegionStore};
use crate::world::RegionKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Magic number identifying a region store snapshot.
pub const SNAPSHOT_MAGIC: u32 = 0x10DE_0001;

/// Current format version. Increment when breaking the wire format.
pub const FORMAT_VERSION: u32 = 1;

/// Key prefix used for region entries in a [`KeyValueStore`].
pub const REGION_PREFIX: &str = "region/";

/// Key holding the depletion engine in a [`KeyValueStore`]. Sits outside
/// [`REGION_PREFIX`].
pub const DEPLETION_KEY: &str = "engine/depletion";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur during serialization.
#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    #[error("bitcode encoding failed: {0}")]
    Encode(String),
}

/// Errors that can occur during deserialization.
#[derive(Debug, thiserror::Error)]
pub enum DeserializeError {
    #[error("invalid magic number: expected 0x{:08X}, got 0x{:08X}", SNAPSHOT_MAGIC, .0)]
    InvalidMagic(u32),
    #[error("unsupported format version: expected {}, got {}", FORMAT_VERSION, .0)]
    UnsupportedVersion(u32),
    #[error("snapshot from future version {0} (this build supports up to {FORMAT_VERSION})")]
    FutureVersion(u32),
    #[error("bitcode decoding failed: {0}")]
    Decode(String),
    #[error("malformed region key {0:?}")]
    BadKey(String),
}

// ---------------------------------------------------------------------------
// Snapshot header
// ---------------------------------------------------------------------------

/// Header prepended to every store snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotHeader {
    pub magic: u32,
    pub version: u32,
    /// Simulation tick at the time of the snapshot.
    pub tick: u64,
}

impl SnapshotHeader {
    pub fn new(tick: u64) -> Self {
        Self {
            magic: SNAPSHOT_MAGIC,
            version: FORMAT_VERSION,
            tick,
        }
    }

    pub fn validate(&self) -> Result<(), DeserializeError> {
        if self.magic != SNAPSHOT_MAGIC {
            return Err(DeserializeError::InvalidMagic(self.magic));
        }
        if self.version > FORMAT_VERSION {
            return Err(DeserializeError::FutureVersion(self.version));
        }
        if self.version < FORMAT_VERSION {
            return Err(DeserializeError::UnsupportedVersion(self.version));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Region codec
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
struct RegionEntry {
    key: RegionKey,
    deposit: Option<String>,
    initial_yield: i32,
    operations_remaining: i32,
}

/// Encode one region as a self-contained blob.
pub fn encode_region(key: RegionKey, record: &RegionRecord) -> Result<Vec<u8>, SerializeError> {
    let entry = RegionEntry {
        key,
        deposit: record.deposit_id().map(str::to_owned),
        initial_yield: record.initial_yield(),
        operations_remaining: record.operations_remaining(),
    };
    bitcode::serialize(&entry).map_err(|e| SerializeError::Encode(e.to_string()))
}

/// Decode a region blob against `catalog`. A deposit id the catalog no
/// longer knows decodes as an empty region.
pub fn decode_region(
    data: &[u8],
    catalog: &DepositCatalog,
) -> Result<(RegionKey, RegionRecord), DeserializeError> {
    let entry: RegionEntry =
        bitcode::deserialize(data).map_err(|e| DeserializeError::Decode(e.to_string()))?;
    let deposit = entry.deposit.as_deref().and_then(|id| {
        let found = catalog.get(id).cloned();
        if found.is_none() {
            tracing::warn!(deposit = id, "stored deposit no longer in catalog");
        }
        found
    });
    Ok((
        entry.key,
        RegionRecord::new(deposit, entry.initial_yield, entry.operations_remaining),
    ))
}

// ---------------------------------------------------------------------------
// Store snapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
struct StoreSnapshot {
    header: SnapshotHeader,
    depletion: Vec<u8>,
    regions: Vec<Vec<u8>>,
}

/// Result of decoding a store snapshot.
#[derive(Debug)]
pub struct LoadedStore {
    pub header: SnapshotHeader,
    pub store: RegionStore,
    /// `None` when the depletion blob failed to decode.
    pub depletion: Option<DepletionEngine>,
    /// Regions whose blobs failed to decode and were left out.
    pub dropped: usize,
}

/// Serialize the depletion engine, RNG position included.
pub fn encode_depletion(engine: &DepletionEngine) -> Result<Vec<u8>, SerializeError> {
    bitcode::serialize(engine).map_err(|e| SerializeError::Encode(e.to_string()))
}

pub fn decode_depletion(data: &[u8]) -> Result<DepletionEngine, DeserializeError> {
    bitcode::deserialize(data).map_err(|e| DeserializeError::Decode(e.to_string()))
}

/// Serialize every region in `store`, in key order, plus the depletion
/// engine.
pub fn encode_store(
    store: &RegionStore,
    depletion: &DepletionEngine,
    tick: u64,
) -> Result<Vec<u8>, SerializeError> {
    let mut entries: Vec<_> = store.iter().collect();
    entries.sort_by_key(|(key, _)| **key);
    let regions = entries
        .into_iter()
        .map(|(key, record)| encode_region(*key, record))
        .collect::<Result<Vec<_>, _>>()?;
    let snapshot = StoreSnapshot {
        header: SnapshotHeader::new(tick),
        depletion: encode_depletion(depletion)?,
        regions,
    };
    bitcode::serialize(&snapshot).map_err(|e| SerializeError::Encode(e.to_string()))
}

/// Decode a store snapshot. The header must validate; individual region
/// blobs that fail are skipped. The returned store starts clean.
pub fn decode_store(data: &[u8], catalog: &DepositCatalog) -> Result<LoadedStore, DeserializeError> {
    let snapshot: StoreSnapshot =
        bitcode::deserialize(data).map_err(|e| DeserializeError::Decode(e.to_string()))?;
    snapshot.header.validate()?;

    let mut store = RegionStore::new();
    let mut dropped = 0;
    for (index, blob) in snapshot.regions.iter().enumerate() {
        match decode_region(blob, catalog) {
            Ok((key, record)) => store.restore(key, record),
            Err(e) => {
                tracing::warn!(index, error = %e, "dropping corrupt region entry");
                dropped += 1;
            }
        }
    }
    let depletion = match decode_depletion(&snapshot.depletion) {
        Ok(engine) => Some(engine),
        Err(e) => {
            tracing::warn!(error = %e, "dropping corrupt depletion state");
            None
        }
    };
    Ok(LoadedStore {
        header: snapshot.header,
        store,
        depletion,
        dropped,
    })
}

// ---------------------------------------------------------------------------
// Key-value persistence
// ---------------------------------------------------------------------------

/// Opaque save container. Hosts map this onto whatever their world save
/// format is.
pub trait KeyValueStore {
    fn put(&mut self, key: &str, value: Vec<u8>);
    fn get(&self, key: &str) -> Option<&[u8]>;
    fn delete(&mut self, key: &str);
    /// All keys starting with `prefix`, sorted.
    fn keys_with_prefix(&self, prefix: &str) -> Vec<String>;
}

/// In-memory [`KeyValueStore`].
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn put(&mut self, key: &str, value: Vec<u8>) {
        self.entries.insert(key.to_owned(), value);
    }

    fn get(&self, key: &str) -> Option<&[u8]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    fn delete(&mut self, key: &str) {
        self.entries.remove(key);
    }

    fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.entries
            .range(prefix.to_owned()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect()
    }
}

/// Storage key for a region, e.g. `region/0/-3/12`.
pub fn region_storage_key(key: &RegionKey) -> String {
    format!(
        "{REGION_PREFIX}{}/{}/{}",
        key.dimension.0, key.group_x, key.group_z
    )
}

/// Inverse of [`region_storage_key`].
pub fn parse_region_storage_key(raw: &str) -> Result<RegionKey, DeserializeError> {
    let bad = || DeserializeError::BadKey(raw.to_owned());
    let rest = raw.strip_prefix(REGION_PREFIX).ok_or_else(bad)?;
    let mut parts = rest.split('/');
    let mut next = || -> Result<i32, DeserializeError> {
        parts.next().and_then(|p| p.parse().ok()).ok_or_else(bad)
    };
    let dimension = next()?;
    let group_x = next()?;
    let group_z = next()?;
    if parts.next().is_some() {
        return Err(bad());
    }
    Ok(RegionKey::new(
        crate::id::DimensionId(dimension),
        group_x,
        group_z,
    ))
}

/// Write dirty regions and delete removed ones, then mark the store clean.
/// Returns the number of regions written.
pub fn persist(store: &mut RegionStore, kv: &mut dyn KeyValueStore) -> Result<usize, SerializeError> {
    let tracker = store.dirty_tracker();
    let mut written = 0;
    for key in tracker.dirty_regions() {
        let Some(record) = store.get(key) else {
            continue;
        };
        kv.put(&region_storage_key(key), encode_region(*key, record)?);
        written += 1;
    }
    for key in tracker.removed_regions() {
        kv.delete(&region_storage_key(key));
    }
    store.mark_clean();
    Ok(written)
}

/// Load every `region/…` entry from `kv`. Corrupt entries, and entries whose
/// payload disagrees with their storage key, are skipped; the second value
/// counts them.
pub fn restore(kv: &dyn KeyValueStore, catalog: &DepositCatalog) -> (RegionStore, usize) {
    let mut store = RegionStore::new();
    let mut dropped = 0;
    for raw in kv.keys_with_prefix(REGION_PREFIX) {
        let decoded = kv
            .get(&raw)
            .ok_or_else(|| DeserializeError::BadKey(raw.clone()))
            .and_then(|blob| decode_region(blob, catalog))
            .and_then(|(key, record)| {
                if parse_region_storage_key(&raw)? == key {
                    Ok((key, record))
                } else {
                    Err(DeserializeError::BadKey(raw.clone()))
                }
            });
        match decoded {
            Ok((key, record)) => store.restore(key, record),
            Err(e) => {
                tracing::warn!(key = %raw, error = %e, "dropping corrupt region entry");
                dropped += 1;
            }
        }
    }
    (store, dropped)
}

/// Write the depletion engine under [`DEPLETION_KEY`].
pub fn persist_depletion(
    engine: &DepletionEngine,
    kv: &mut dyn KeyValueStore,
) -> Result<(), SerializeError> {
    kv.put(DEPLETION_KEY, encode_depletion(engine)?);
    Ok(())
}

/// Read the depletion engine back. `None` when the key is missing or the
/// entry is corrupt; the latter is logged.
pub fn restore_depletion(kv: &dyn KeyValueStore) -> Option<DepletionEngine> {
    let blob = kv.get(DEPLETION_KEY)?;
    match decode_depletion(blob) {
        Ok(engine) => Some(engine),
        Err(e) => {
            tracing::warn!(error = %e, "dropping corrupt depletion state");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Extractor state
// ---------------------------------------------------------------------------

pub fn encode_extractor_state(state: &ExtractorState) -> Result<Vec<u8>, SerializeError> {
    bitcode::serialize(state).map_err(|e| SerializeError::Encode(e.to_string()))
}

pub fn decode_extractor_state(data: &[u8]) -> Result<ExtractorState, DeserializeError> {
    bitcode::deserialize(data).map_err(|e| DeserializeError::Decode(e.to_string()))
}
