//! World coordinates and the context a region is resolved in.
//!
//! Blocks are grouped into 16x16 chunks, and chunks into
//! [`GROUP_SIZE`]x[`GROUP_SIZE`] regions. A [`RegionKey`] names one region
//! and is the cache key for everything the engine knows about it.

use crate::id::{BiomeId, DimensionId};
use serde::{Deserialize, Serialize};

/// Blocks per chunk edge.
pub const CHUNK_SIZE: i32 = 16;

/// Chunks per region edge. Regions are 4x4 chunk squares.
pub const GROUP_SIZE: i32 = 4;

/// A block position in a dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The chunk containing this block. Floors toward negative infinity.
    pub fn chunk(&self) -> ChunkPos {
        ChunkPos {
            x: self.x.div_euclid(CHUNK_SIZE),
            z: self.z.div_euclid(CHUNK_SIZE),
        }
    }
}

/// A chunk column position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

impl ChunkPos {
    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }
}

/// Identifies one region: a dimension plus group coordinates.
///
/// Equality, hashing and ordering are structural. The ordering is only used
/// to give persistence a stable iteration order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct RegionKey {
    pub dimension: DimensionId,
    pub group_x: i32,
    pub group_z: i32,
}

impl RegionKey {
    pub fn new(dimension: DimensionId, group_x: i32, group_z: i32) -> Self {
        Self {
            dimension,
            group_x,
            group_z,
        }
    }

    /// The region containing a chunk.
    pub fn from_chunk(dimension: DimensionId, chunk: ChunkPos) -> Self {
        Self::new(
            dimension,
            chunk.x.div_euclid(GROUP_SIZE),
            chunk.z.div_euclid(GROUP_SIZE),
        )
    }

    /// The region containing a block.
    pub fn from_block(dimension: DimensionId, pos: BlockPos) -> Self {
        Self::from_chunk(dimension, pos.chunk())
    }

    /// The region `dx`, `dz` groups away in the same dimension.
    pub fn offset(&self, dx: i32, dz: i32) -> Self {
        Self::new(
            self.dimension,
            self.group_x.wrapping_add(dx),
            self.group_z.wrapping_add(dz),
        )
    }
}

/// A biome as seen by the weight modifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Biome {
    pub id: BiomeId,
    pub name: String,
    /// Free-form classification tags (e.g. "hot", "ocean").
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Biome {
    pub fn new(id: u32, name: &str) -> Self {
        Self {
            id: BiomeId(id),
            name: name.to_string(),
            tags: Vec::new(),
        }
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// What a dimension filter can see about a dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionContext {
    pub id: DimensionId,
    pub name: String,
    /// Whether this is a surface world (has a sky and a bedrock floor).
    pub surface: bool,
}

impl DimensionContext {
    pub fn new(id: i32, name: &str, surface: bool) -> Self {
        Self {
            id: DimensionId(id),
            name: name.to_string(),
            surface,
        }
    }
}
