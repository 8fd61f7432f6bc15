//! Engine configuration and whole-world loading.

use crate::catalog::{SkippedEntry, load_catalog_dir};
use crate::loader::{DataLoadError, deserialize_file, find_data_file};
use crate::schema::ConfigData;
use lode_core::catalog::DepositCatalog;
use lode_core::engine::SimConfig;
use lode_core::extractor::{ExtractorClass, RollbackPolicy};
use std::path::Path;
use std::sync::Arc;

/// Base name of the engine config file.
pub const CONFIG_FILE: &str = "lode";
/// Subdirectory holding one file per deposit.
pub const DEPOSITS_DIR: &str = "deposits";

/// Resolved engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub world_seed: u64,
    pub rollback: RollbackPolicy,
    pub classes: Vec<ExtractorClass>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let rollback = RollbackPolicy::default();
        Self {
            world_seed: 0,
            rollback,
            classes: presets(rollback),
        }
    }
}

fn presets(rollback: RollbackPolicy) -> Vec<ExtractorClass> {
    [
        ExtractorClass::basic(),
        ExtractorClass::coal_fired(),
        ExtractorClass::deep_drill(),
    ]
    .into_iter()
    .map(|c| c.with_rollback(rollback))
    .collect()
}

impl EngineConfig {
    /// Resolve a parsed config file. Missing classes fall back to the
    /// built-in presets. The low-energy policy applies to the presets and
    /// to every class that does not set `rollback` itself.
    pub fn from_data(data: ConfigData) -> Result<Self, String> {
        let rollback = if data.low_energy_hard_reset {
            RollbackPolicy::HardReset
        } else {
            RollbackPolicy::SoftRollback
        };
        let classes = if data.classes.is_empty() {
            presets(rollback)
        } else {
            let mut classes: Vec<ExtractorClass> = Vec::with_capacity(data.classes.len());
            for entry in &data.classes {
                if classes.iter().any(|c| c.name == entry.name) {
                    return Err(format!("duplicate extractor class '{}'", entry.name));
                }
                classes.push(entry.to_class(rollback)?);
            }
            classes
        };
        Ok(Self {
            world_seed: data.world_seed,
            rollback,
            classes,
        })
    }

    pub fn class(&self, name: &str) -> Option<&ExtractorClass> {
        self.classes.iter().find(|c| c.name == name)
    }

    pub fn sim_config(&self) -> SimConfig {
        SimConfig {
            world_seed: self.world_seed,
        }
    }
}

/// Read `lode.{ron,toml,json}` from `dir`. A missing file yields the
/// defaults.
pub fn load_engine_config(dir: &Path) -> Result<EngineConfig, DataLoadError> {
    match find_data_file(dir, CONFIG_FILE)? {
        Some(path) => {
            let data: ConfigData = deserialize_file(&path)?;
            EngineConfig::from_data(data).map_err(|detail| DataLoadError::Invalid {
                file: path,
                detail,
            })
        }
        None => {
            tracing::debug!(dir = %dir.display(), "no engine config, using defaults");
            Ok(EngineConfig::default())
        }
    }
}

/// Everything needed to start a simulation.
#[derive(Debug)]
pub struct WorldData {
    pub config: EngineConfig,
    pub catalog: Arc<DepositCatalog>,
    pub skipped: Vec<SkippedEntry>,
}

/// Load the engine config and the `deposits/` catalog under `dir`.
pub fn load_world(dir: &Path) -> Result<WorldData, DataLoadError> {
    let config = load_engine_config(dir)?;
    let load = load_catalog_dir(&dir.join(DEPOSITS_DIR))?;
    Ok(WorldData {
        config,
        catalog: Arc::new(load.catalog),
        skipped: load.skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::tests::{cleanup, make_test_dir};
    use crate::loader::{Format, deserialize_str};
    use lode_core::extractor::YieldFormula;
    use std::fs;

    #[test]
    fn defaults_use_presets_with_soft_rollback() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.world_seed, 0);
        assert_eq!(cfg.classes.len(), 3);
        assert!(cfg.classes.iter().all(|c| c.rollback == RollbackPolicy::SoftRollback));
        assert_eq!(cfg.class("deep_drill").unwrap().layer, Some(0));
    }

    #[test]
    fn hard_reset_applies_to_all_classes() {
        let cfg = EngineConfig::from_data(ConfigData {
            world_seed: 5,
            low_energy_hard_reset: true,
            classes: Vec::new(),
        })
        .unwrap();
        assert!(cfg.classes.iter().all(|c| c.rollback == RollbackPolicy::HardReset));
        assert_eq!(cfg.sim_config().world_seed, 5);
    }

    #[test]
    fn class_rollback_survives_config_policy() {
        let data: ConfigData = deserialize_str(
            r#"(
                classes: [
                    (name: "rig", progress_max: 20, rollback: HardReset,
                     yield_formula: Flat(1), energy_per_tick: 4),
                    (name: "pick", progress_max: 20,
                     yield_formula: Flat(1), energy_per_tick: 4),
                ],
            )"#,
            Format::Ron,
        )
        .unwrap();
        let cfg = EngineConfig::from_data(data.clone()).unwrap();
        assert_eq!(cfg.class("rig").unwrap().rollback, RollbackPolicy::HardReset);
        assert_eq!(cfg.class("pick").unwrap().rollback, RollbackPolicy::SoftRollback);

        // The config-wide switch only fills in classes that left it out.
        let mut soft_rig = data;
        soft_rig.low_energy_hard_reset = true;
        soft_rig.classes[0].rollback = Some(RollbackPolicy::SoftRollback);
        let cfg = EngineConfig::from_data(soft_rig).unwrap();
        assert_eq!(cfg.class("rig").unwrap().rollback, RollbackPolicy::SoftRollback);
        assert_eq!(cfg.class("pick").unwrap().rollback, RollbackPolicy::HardReset);
    }

    #[test]
    fn duplicate_class_names_are_invalid() {
        let dir = make_test_dir("config_dup");
        fs::write(
            dir.join("lode.ron"),
            r#"(classes: [
                (name: "rig", progress_max: 2, yield_formula: Flat(1), energy_per_tick: 1),
                (name: "rig", progress_max: 3, yield_formula: Flat(1), energy_per_tick: 1),
            ])"#,
        )
        .unwrap();
        match load_engine_config(&dir) {
            Err(DataLoadError::Invalid { file, detail }) => {
                assert!(file.ends_with("lode.ron"));
                assert!(detail.contains("rig"));
            }
            other => panic!("expected Invalid, got {other:?}"),
        }
        cleanup(&dir);
    }

    #[test]
    fn missing_config_file_gives_defaults() {
        let dir = make_test_dir("config_missing");
        assert_eq!(load_engine_config(&dir).unwrap(), EngineConfig::default());
        cleanup(&dir);
    }

    #[test]
    fn ron_config_with_custom_class() {
        let dir = make_test_dir("config_ron");
        fs::write(
            dir.join("lode.ron"),
            r#"(
                world_seed: 1234,
                classes: [
                    (
                        name: "quarry",
                        progress_max: 40,
                        yield_formula: HeadEfficiency(base: 2),
                        energy_per_tick: 16,
                        depletion_odds: 4,
                    ),
                ],
            )"#,
        )
        .unwrap();
        let cfg = load_engine_config(&dir).unwrap();
        assert_eq!(cfg.world_seed, 1234);
        assert_eq!(cfg.classes.len(), 1);
        let quarry = cfg.class("quarry").unwrap();
        assert_eq!(quarry.yield_formula, YieldFormula::HeadEfficiency { base: 2 });
        assert_eq!(quarry.layer, None);
        assert_eq!(quarry.head_wear, 0);
        assert_eq!(quarry.depletion_odds, 4);
        cleanup(&dir);
    }

    #[test]
    fn toml_config() {
        let dir = make_test_dir("config_toml");
        fs::write(
            dir.join("lode.toml"),
            "world_seed = 77\nlow_energy_hard_reset = true\n",
        )
        .unwrap();
        let cfg = load_engine_config(&dir).unwrap();
        assert_eq!(cfg.world_seed, 77);
        assert_eq!(cfg.rollback, RollbackPolicy::HardReset);
        cleanup(&dir);
    }

    #[test]
    fn load_world_reads_config_and_deposits() {
        let dir = make_test_dir("world");
        fs::create_dir_all(dir.join(DEPOSITS_DIR)).unwrap();
        fs::write(dir.join("lode.json"), r#"{"world_seed": 3}"#).unwrap();
        fs::write(
            dir.join(DEPOSITS_DIR).join("iron.json"),
            r#"{"weight": 1, "yield": {"min": 1, "max": 5},
                "depletion": {"amount": 1, "chance": 100}, "ore": "iron_ore"}"#,
        )
        .unwrap();
        let world = load_world(&dir).unwrap();
        assert_eq!(world.config.world_seed, 3);
        assert_eq!(world.catalog.len(), 1);
        assert!(world.skipped.is_empty());
        cleanup(&dir);
    }

    #[test]
    fn load_world_requires_deposits_dir() {
        let dir = make_test_dir("world_missing");
        assert!(matches!(
            load_world(&dir),
            Err(DataLoadError::MissingRequired { .. })
        ));
        cleanup(&dir);
    }
}
