use super::CompileError;
use crate::config::RepoPaths;
use std::fs;

/// Migrate a pre-6.7.1.1 checkout to the current source-tree layout.
///
/// Old releases kept their sources under `sonoff/`; switching to such a
/// branch resurrects that directory. When it exists, move it to `tasmota/`,
/// replacing whatever is already there. No-op otherwise.
///
/// A failed move is fatal for the enclosing build request; no partial
/// recovery is attempted.
pub fn normalize_layout(paths: &RepoPaths) -> Result<(), CompileError> {
    let legacy = paths.legacy_source_dir();
    if !legacy.is_dir() {
        return Ok(());
    }

    let target = paths.source_dir();
    if target.exists() {
        fs::remove_dir_all(&target).map_err(CompileError::LayoutMigrationFailed)?;
    }
    fs::rename(&legacy, &target).map_err(CompileError::LayoutMigrationFailed)
}
