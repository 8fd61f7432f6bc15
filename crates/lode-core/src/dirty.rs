use crate::world::RegionKey;
use std::collections::BTreeSet;

/// Tracks which regions have changed since the last persisted point.
///
/// Used by the region store to write only what changed. Call
/// [`mark_clean`](DirtyTracker::mark_clean) after a successful save to reset
/// all flags.
#[derive(Debug, Clone, Default)]
pub struct DirtyTracker {
    dirty_regions: BTreeSet<RegionKey>,
    removed_regions: BTreeSet<RegionKey>,
    any_dirty: bool,
}

impl DirtyTracker {
    /// Create a new tracker with nothing dirty.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a region as created or changed.
    pub fn mark_region(&mut self, key: RegionKey) {
        self.removed_regions.remove(&key);
        self.dirty_regions.insert(key);
        self.any_dirty = true;
    }

    /// Mark a region as dropped from the store.
    pub fn mark_removed(&mut self, key: RegionKey) {
        self.dirty_regions.remove(&key);
        self.removed_regions.insert(key);
        self.any_dirty = true;
    }

    /// Returns `true` if anything has been marked since the last clean.
    pub fn is_dirty(&self) -> bool {
        self.any_dirty
    }

    /// Returns `true` if the given region has been marked changed.
    pub fn is_region_dirty(&self, key: &RegionKey) -> bool {
        self.dirty_regions.contains(key)
    }

    /// Regions created or changed since the last clean, in key order.
    pub fn dirty_regions(&self) -> &BTreeSet<RegionKey> {
        &self.dirty_regions
    }

    /// Regions dropped since the last clean, in key order.
    pub fn removed_regions(&self) -> &BTreeSet<RegionKey> {
        &self.removed_regions
    }

    /// Reset all dirty flags, marking everything as clean.
    pub fn mark_clean(&mut self) {
        self.dirty_regions.clear();
        self.removed_regions.clear();
        self.any_dirty = false;
    }
}
