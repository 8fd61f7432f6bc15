pub mod catalog;
pub mod config;
pub mod loader;
pub mod schema;

pub use catalog::{CatalogLoad, SkippedEntry, load_catalog_dir};
pub use config::{EngineConfig, WorldData, load_engine_config, load_world};
pub use loader::DataLoadError;
