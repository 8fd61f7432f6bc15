//! Loads a deposit catalog from a directory of data files.
//!
//! Each file defines one deposit; its stem is the deposit id. Files are
//! registered in path order so selection order is stable across machines.
//! A broken file is skipped with an error log and reported back; the rest of
//! the catalog still loads.

use crate::loader::{DataLoadError, deserialize_file, list_data_files};
use crate::schema::DepositData;
use lode_core::catalog::{DepositCatalog, DepositCatalogBuilder};
use std::path::{Path, PathBuf};

/// A deposit file that did not make it into the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    pub file: PathBuf,
    pub reason: String,
}

/// The loaded catalog plus every file that was skipped.
#[derive(Debug)]
pub struct CatalogLoad {
    pub catalog: DepositCatalog,
    pub skipped: Vec<SkippedEntry>,
}

/// Load every deposit file in `dir`. Only a missing or unreadable directory
/// is an error.
pub fn load_catalog_dir(dir: &Path) -> Result<CatalogLoad, DataLoadError> {
    let mut builder = DepositCatalogBuilder::new();
    let mut skipped = Vec::new();

    for file in list_data_files(dir)? {
        match load_entry(&file, &mut builder) {
            Ok(()) => {}
            Err(reason) => {
                tracing::error!(file = %file.display(), %reason, "skipping deposit");
                skipped.push(SkippedEntry { file, reason });
            }
        }
    }

    let catalog = builder.build();
    tracing::info!(
        deposits = catalog.len(),
        skipped = skipped.len(),
        dir = %dir.display(),
        "loaded deposit catalog"
    );
    Ok(CatalogLoad { catalog, skipped })
}

fn load_entry(file: &Path, builder: &mut DepositCatalogBuilder) -> Result<(), String> {
    let id = file
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| "file name is not valid UTF-8".to_string())?;
    let data: DepositData = deserialize_file(file).map_err(|e| e.to_string())?;
    let definition = data.to_definition(id)?;
    builder.register(definition).map_err(|e| e.to_string())
}
