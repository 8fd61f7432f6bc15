//! Deposit catalog: the immutable registry of deposit definitions.
//!
//! Built through [`DepositCatalogBuilder`] and frozen by
//! [`DepositCatalogBuilder::build`]. Registration order is significant:
//! weighted selection walks definitions in that order, so earlier entries win
//! ties at weight boundaries.

use crate::id::{BiomeId, DimensionId};
use crate::world::{Biome, DimensionContext};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

// ---------------------------------------------------------------------------
// Materials
// ---------------------------------------------------------------------------

/// An extractable material, named by its registry key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Material(pub String);

impl Material {
    pub fn new(name: &str) -> Self {
        Self(name.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Material {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One entry of a deposit's composition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialEntry {
    pub material: Material,
    pub weight: u32,
}

// ---------------------------------------------------------------------------
// Biome and dimension predicates
// ---------------------------------------------------------------------------

/// Selects the biomes a weight rule applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BiomeMatcher {
    Name(String),
    Tag(String),
}

impl BiomeMatcher {
    pub fn matches(&self, biome: &Biome) -> bool {
        match self {
            BiomeMatcher::Name(name) => biome.name == *name,
            BiomeMatcher::Tag(tag) => biome.has_tag(tag),
        }
    }
}

/// A single additive weight rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BiomeWeight {
    pub matcher: BiomeMatcher,
    pub weight: i32,
}

/// Additive weight adjustment as a pure function of the biome.
///
/// The first matching rule wins; no match adds nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BiomeModifier {
    pub rules: Vec<BiomeWeight>,
}

impl BiomeModifier {
    pub fn apply(&self, biome: &Biome) -> i32 {
        self.rules
            .iter()
            .find(|rule| rule.matcher.matches(biome))
            .map(|rule| rule.weight)
            .unwrap_or(0)
    }
}

/// Which dimensions a deposit may generate in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DimensionFilter {
    Any,
    /// Surface worlds only.
    #[default]
    Surface,
    Ids(Vec<DimensionId>),
    Names(Vec<String>),
}

impl DimensionFilter {
    pub fn accepts(&self, dimension: &DimensionContext) -> bool {
        match self {
            DimensionFilter::Any => true,
            DimensionFilter::Surface => dimension.surface,
            DimensionFilter::Ids(ids) => ids.contains(&dimension.id),
            DimensionFilter::Names(names) => names.iter().any(|n| *n == dimension.name),
        }
    }
}

// ---------------------------------------------------------------------------
// Deposit definition
// ---------------------------------------------------------------------------

/// `[min, max)` bounds for a deposit's initial yield.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YieldRange {
    pub min: i32,
    pub max: i32,
}

/// A deposit definition in the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositDefinition {
    pub id: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub weight: i32,
    pub yield_range: YieldRange,
    /// Operations removed from a region per successful depletion roll.
    pub depletion_amount: i32,
    /// Percent chance in [0, 100] that an extraction depletes the region.
    pub depletion_chance: u8,
    /// Output floor once the region is exhausted.
    pub depleted_yield: i32,
    pub materials: Vec<MaterialEntry>,
    pub biome_modifier: BiomeModifier,
    pub dimension_filter: DimensionFilter,
    pub layer: i32,
}

impl DepositDefinition {
    /// A definition with one material and neutral settings. Adjust the public
    /// fields before registering.
    pub fn new(id: &str, weight: i32, material: &str) -> Self {
        Self {
            id: id.to_string(),
            display_name: None,
            description: None,
            weight,
            yield_range: YieldRange { min: 0, max: 0 },
            depletion_amount: 1,
            depletion_chance: 100,
            depleted_yield: 0,
            materials: vec![MaterialEntry {
                material: Material::new(material),
                weight: 1,
            }],
            biome_modifier: BiomeModifier::default(),
            dimension_filter: DimensionFilter::default(),
            layer: 0,
        }
    }

    /// Selection weight in a biome: base weight plus the biome modifier.
    pub fn effective_weight(&self, biome: &Biome) -> i32 {
        self.weight.saturating_add(self.biome_modifier.apply(biome))
    }

    /// Name shown in surveys; falls back to the id.
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.id)
    }

    /// The material a hand sample reveals: the first composition entry.
    pub fn primary_material(&self) -> Option<&Material> {
        self.materials.first().map(|entry| &entry.material)
    }

    fn validate(&self) -> Result<(), CatalogError> {
        if self.id.is_empty() {
            return Err(CatalogError::EmptyId);
        }
        if self.depletion_chance > 100 {
            return Err(CatalogError::InvalidDepletionChance {
                id: self.id.clone(),
                chance: self.depletion_chance,
            });
        }
        if self.yield_range.min > self.yield_range.max {
            return Err(CatalogError::InvalidYieldRange {
                id: self.id.clone(),
                min: self.yield_range.min,
                max: self.yield_range.max,
            });
        }
        if self.materials.is_empty() {
            return Err(CatalogError::NoMaterials(self.id.clone()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for constructing an immutable [`DepositCatalog`].
#[derive(Debug, Default)]
pub struct DepositCatalogBuilder {
    deposits: Vec<Arc<DepositDefinition>>,
    id_to_index: HashMap<String, usize>,
}

impl DepositCatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition. Rejects duplicate ids and definitions that
    /// break the catalog invariants.
    pub fn register(&mut self, definition: DepositDefinition) -> Result<(), CatalogError> {
        definition.validate()?;
        if self.id_to_index.contains_key(&definition.id) {
            return Err(CatalogError::Duplicate(definition.id));
        }
        self.id_to_index
            .insert(definition.id.clone(), self.deposits.len());
        self.deposits.push(Arc::new(definition));
        Ok(())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.id_to_index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.deposits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deposits.is_empty()
    }

    /// Freeze the catalog.
    pub fn build(self) -> DepositCatalog {
        DepositCatalog {
            deposits: self.deposits,
            id_to_index: self.id_to_index,
            weight_memo: Mutex::new(HashMap::new()),
        }
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Immutable deposit catalog. Thread-safe to share behind an `Arc`.
///
/// The only interior state is the total-weight memo, which is a pure
/// function of the frozen definitions and dies with the catalog.
#[derive(Debug)]
pub struct DepositCatalog {
    deposits: Vec<Arc<DepositDefinition>>,
    id_to_index: HashMap<String, usize>,
    weight_memo: Mutex<HashMap<(DimensionId, BiomeId), i32>>,
}

impl Default for DepositCatalog {
    fn default() -> Self {
        DepositCatalogBuilder::new().build()
    }
}

impl DepositCatalog {
    pub fn get(&self, id: &str) -> Option<&Arc<DepositDefinition>> {
        self.id_to_index.get(id).map(|&i| &self.deposits[i])
    }

    /// Definitions in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<DepositDefinition>> {
        self.deposits.iter()
    }

    pub fn len(&self) -> usize {
        self.deposits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deposits.is_empty()
    }

    /// Sum of `weight + biome_modifier(biome)` over every definition whose
    /// dimension filter accepts `dimension`. Memoized per (dimension, biome).
    pub fn total_weight(&self, dimension: &DimensionContext, biome: &Biome) -> i32 {
        let key = (dimension.id, biome.id);
        let mut memo = self
            .weight_memo
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(&total) = memo.get(&key) {
            return total;
        }

        let total = self
            .deposits
            .iter()
            .filter(|d| d.dimension_filter.accepts(dimension))
            .fold(0i32, |acc, d| acc.saturating_add(d.effective_weight(biome)));

        if total == 0 && !self.deposits.is_empty() {
            tracing::warn!(
                dimension = dimension.id.0,
                biome = %biome.name,
                "deposit weight is 0 in this biome; no deposit can generate here"
            );
        }

        memo.insert(key, total);
        total
    }

    /// Definitions eligible in `dimension`/`biome` with their effective
    /// weight, in registration order. Non-positive weights are skipped.
    pub fn eligible<'a>(
        &'a self,
        dimension: &'a DimensionContext,
        biome: &'a Biome,
    ) -> impl Iterator<Item = (&'a Arc<DepositDefinition>, i32)> + 'a {
        self.deposits.iter().filter_map(move |d| {
            let weight = d.effective_weight(biome);
            (weight > 0 && d.dimension_filter.accepts(dimension)).then_some((d, weight))
        })
    }

    #[cfg(test)]
    fn memo_len(&self) -> usize {
        self.weight_memo
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("duplicate deposit id: {0}")]
    Duplicate(String),
    #[error("deposit id must not be empty")]
    EmptyId,
    #[error("deposit {id}: depletion chance {chance} is outside [0, 100]")]
    InvalidDepletionChance { id: String, chance: u8 },
    #[error("deposit {id}: yield range [{min}, {max}) is inverted")]
    InvalidYieldRange { id: String, min: i32, max: i32 },
    #[error("deposit {0} has no materials")]
    NoMaterials(String),
}
