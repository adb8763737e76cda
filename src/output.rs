use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::error::{HarvestError, Result};

/// Write `records` to `path` as header-less CSV, replacing any existing file.
///
/// Parent directories are created as needed. Returns the number of rows written.
pub fn write_records<R: Serialize>(path: &Path, records: &[R]) -> Result<usize> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(HarvestError::io(parent))?;
        }
    }

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush().map_err(HarvestError::io(path))?;

    if records.is_empty() {
        log::warn!("No rows for {}", path.display());
    }
    Ok(records.len())
}
