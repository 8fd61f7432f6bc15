//! On-disk shapes of deposit and engine configuration files.
//!
//! A deposit file looks like this (JSON shown; RON and TOML carry the same
//! fields):
//!
//! ```json
//! {
//!   "weight": 30,
//!   "name": "Magnetite Vein",
//!   "yield": { "min": 20, "max": 60 },
//!   "depletion": { "amount": 1, "chance": 80, "depleted_yield": 5 },
//!   "ore": "magnetite",
//!   "biome_modifier": [ { "tag": "mountain", "weight": 10 } ],
//!   "dimension_filter": { "names": ["overworld"] }
//! }
//! ```
//!
//! The deposit id is the file stem, not a field.

use lode_core::catalog::{
    BiomeMatcher, BiomeModifier, BiomeWeight, DepositDefinition, DimensionFilter, Material,
    MaterialEntry, YieldRange,
};
use lode_core::extractor::{ExtractorClass, RollbackPolicy, YieldFormula};
use lode_core::id::DimensionId;
use serde::{Deserialize, Serialize};

// ===========================================================================
// Deposits
// ===========================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YieldData {
    pub min: i32,
    pub max: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepletionData {
    pub amount: i32,
    /// Percent. Values outside `[0, 100]` are clamped on load.
    pub chance: i32,
    #[serde(default)]
    pub depleted_yield: i32,
}

/// A material given either as a bare name (weight 1) or with a weight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MaterialData {
    Name(String),
    Weighted { material: String, weight: u32 },
}

impl MaterialData {
    fn to_entry(&self) -> MaterialEntry {
        match self {
            MaterialData::Name(name) => MaterialEntry {
                material: Material::new(name),
                weight: 1,
            },
            MaterialData::Weighted { material, weight } => MaterialEntry {
                material: Material::new(material),
                weight: *weight,
            },
        }
    }
}

/// One biome weight rule. Exactly one of `biome` or `tag` must be set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BiomeRuleData {
    #[serde(default)]
    pub biome: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    pub weight: i32,
}

/// Dimension eligibility. At most one of the fields may be set; an empty
/// filter means surface worlds only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionFilterData {
    #[serde(default)]
    pub any: bool,
    #[serde(default)]
    pub ids: Vec<i32>,
    #[serde(default)]
    pub names: Vec<String>,
}

impl DimensionFilterData {
    fn to_filter(&self) -> Result<DimensionFilter, String> {
        let set = usize::from(self.any)
            + usize::from(!self.ids.is_empty())
            + usize::from(!self.names.is_empty());
        if set > 1 {
            return Err("dimension_filter sets more than one of any/ids/names".into());
        }
        Ok(if self.any {
            DimensionFilter::Any
        } else if !self.ids.is_empty() {
            DimensionFilter::Ids(self.ids.iter().copied().map(DimensionId).collect())
        } else if !self.names.is_empty() {
            DimensionFilter::Names(self.names.clone())
        } else {
            DimensionFilter::Surface
        })
    }
}

/// A deposit as written in a data file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositData {
    pub weight: i32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "yield")]
    pub yield_range: YieldData,
    pub depletion: DepletionData,
    /// Single-material shorthand.
    #[serde(default)]
    pub ore: Option<String>,
    #[serde(default)]
    pub materials: Vec<MaterialData>,
    #[serde(default)]
    pub biome_modifier: Vec<BiomeRuleData>,
    #[serde(default)]
    pub dimension_filter: Option<DimensionFilterData>,
    #[serde(default)]
    pub layer: i32,
}

impl DepositData {
    /// Build a catalog definition under `id`. Only structural problems are
    /// reported here; range checks happen when the catalog registers it.
    pub fn to_definition(&self, id: &str) -> Result<DepositDefinition, String> {
        let chance = self.depletion.chance.clamp(0, 100);
        if chance != self.depletion.chance {
            tracing::warn!(
                deposit = id,
                chance = self.depletion.chance,
                "depletion chance outside 0..=100, clamped"
            );
        }

        let mut materials: Vec<MaterialEntry> = self
            .ore
            .iter()
            .map(|name| MaterialEntry {
                material: Material::new(name),
                weight: 1,
            })
            .collect();
        materials.extend(self.materials.iter().map(MaterialData::to_entry));

        let rules = self
            .biome_modifier
            .iter()
            .map(|rule| {
                let matcher = match (&rule.biome, &rule.tag) {
                    (Some(name), None) => BiomeMatcher::Name(name.clone()),
                    (None, Some(tag)) => BiomeMatcher::Tag(tag.clone()),
                    _ => return Err("biome rule needs exactly one of biome/tag".to_string()),
                };
                Ok(BiomeWeight {
                    matcher,
                    weight: rule.weight,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let dimension_filter = match &self.dimension_filter {
            Some(data) => data.to_filter()?,
            None => DimensionFilter::Surface,
        };

        Ok(DepositDefinition {
            id: id.to_owned(),
            display_name: self.name.clone(),
            description: self.description.clone(),
            weight: self.weight,
            yield_range: YieldRange {
                min: self.yield_range.min,
                max: self.yield_range.max,
            },
            depletion_amount: self.depletion.amount,
            depletion_chance: chance as u8,
            depleted_yield: self.depletion.depleted_yield,
            materials,
            biome_modifier: BiomeModifier { rules },
            dimension_filter,
            layer: self.layer,
        })
    }
}

// ===========================================================================
// Engine configuration
// ===========================================================================

/// An extractor class as written in the engine config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassData {
    pub name: String,
    pub progress_max: u32,
    /// Left out, the config-wide low-energy policy applies.
    #[serde(default)]
    pub rollback: Option<RollbackPolicy>,
    pub yield_formula: YieldFormula,
    #[serde(default)]
    pub layer: Option<i32>,
    pub energy_per_tick: u32,
    #[serde(default = "default_odds")]
    pub depletion_odds: u32,
    #[serde(default)]
    pub head_wear: u32,
}

fn default_odds() -> u32 {
    1
}

impl ClassData {
    /// Build the runtime class, falling back to `default_rollback` when the
    /// entry names no policy of its own.
    pub fn to_class(&self, default_rollback: RollbackPolicy) -> Result<ExtractorClass, String> {
        if self.progress_max == 0 {
            return Err(format!(
                "extractor class '{}': progress_max must be at least 1",
                self.name
            ));
        }
        Ok(ExtractorClass {
            name: self.name.clone(),
            progress_max: self.progress_max,
            rollback: self.rollback.unwrap_or(default_rollback),
            yield_formula: self.yield_formula,
            layer: self.layer,
            energy_per_tick: self.energy_per_tick,
            depletion_odds: self.depletion_odds,
            head_wear: self.head_wear,
        })
    }
}

/// The engine config file (`lode.ron` / `lode.toml` / `lode.json`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigData {
    #[serde(default)]
    pub world_seed: u64,
    /// Drop progress straight to 1 when power runs out, instead of losing
    /// two ticks. Applies to the presets and to classes without their own
    /// `rollback`.
    #[serde(default)]
    pub low_energy_hard_reset: bool,
    /// Extractor classes. When empty the built-in presets are used.
    #[serde(default)]
    pub classes: Vec<ClassData>,
}
