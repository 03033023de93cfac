//! Build orchestration core.
//!
//! Everything between a build request and a finished firmware binary lives
//! here: the source-tree layout migration, the version extractor, the
//! config-to-file translation and the `pio run` supervision with buffered
//! output streaming.

mod artifacts;
mod layout;
mod orchestrator;
mod translate;
mod version;

pub use artifacts::{Artifact, find_firmware, list_artifacts};
pub use layout::normalize_layout;
pub use orchestrator::{BuildEvent, BuildOutcome, BuildSession, FLUSH_THRESHOLD};
pub use translate::{
    render_build_env, render_defines, render_override_header, write_generated_files,
};
pub use version::{extract_version, format_version};

use std::path::PathBuf;

/// Error type for the build pipeline up to subprocess launch.
///
/// A nonzero exit of the build tool itself is not an error value; it is
/// reported through the terminal [`BuildEvent`] only.
#[derive(Debug)]
pub enum CompileError {
    /// Version declaration file does not exist
    VersionNotFound(PathBuf),
    /// Version declaration file exists but carries no version constant
    VersionPatternMissing(PathBuf),
    /// Legacy source tree could not be moved to the current layout
    LayoutMigrationFailed(std::io::Error),
    /// One of the two generated files could not be written
    WriteFailed {
        path: PathBuf,
        cause: std::io::Error,
    },
    /// The branch-switch collaborator rejected the requested version
    BranchSwitchFailed(String),
    /// Repository root is missing or not an accessible directory
    DirectoryChangeFailed { path: PathBuf, cause: String },
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompileError::VersionNotFound(path) => {
                write!(f, "{} does not exist.", path.display())
            }
            CompileError::VersionPatternMissing(path) => {
                write!(f, "Cannot find Tasmota version in {}.", path.display())
            }
            CompileError::LayoutMigrationFailed(e) => {
                write!(f, "Cannot create new Tasmota structure: {}", e)
            }
            CompileError::WriteFailed { path, cause } => {
                write!(f, "Cannot write to {}: {}", path.display(), cause)
            }
            CompileError::BranchSwitchFailed(msg) => {
                write!(f, "Cannot switch Tasmota version: {}", msg)
            }
            CompileError::DirectoryChangeFailed { path, cause } => {
                write!(f, "Cannot change into {}: {}", path.display(), cause)
            }
        }
    }
}

impl std::error::Error for CompileError {}
