use crate::config::RepoPaths;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// One downloadable build product.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
    /// Set for firmware binaries only.
    pub sha256: Option<String>,
}

/// Locate the compiled firmware binary under the build output tree.
pub fn find_firmware(paths: &RepoPaths) -> Option<PathBuf> {
    WalkDir::new(paths.build_output_dir())
        .into_iter()
        .filter_map(|entry| entry.ok())
        .find(|entry| entry.file_type().is_file() && entry.file_name() == "firmware.bin")
        .map(|entry| entry.into_path())
}

/// Everything a finished build leaves behind for download: the firmware
/// binary (plus the gzipped variant ESP8266 builds produce) and the two
/// generated input files.
pub fn list_artifacts(paths: &RepoPaths) -> Vec<Artifact> {
    let mut artifacts = Vec::new();

    if let Some(firmware) = find_firmware(paths) {
        push_artifact(&mut artifacts, &firmware, true);
        push_artifact(&mut artifacts, &firmware.with_extension("bin.gz"), true);
    }
    push_artifact(&mut artifacts, &paths.config_override(), false);
    push_artifact(&mut artifacts, &paths.platformio_override(), false);

    artifacts
}

fn push_artifact(artifacts: &mut Vec<Artifact>, path: &Path, hash: bool) {
    let Ok(meta) = fs::metadata(path) else {
        return;
    };
    if !meta.is_file() {
        return;
    }
    artifacts.push(Artifact {
        name: path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
        path: path.to_path_buf(),
        size: meta.len(),
        sha256: if hash { hash_file(path).ok() } else { None },
    });
}

/// Streaming SHA-256 of a file on disk.
fn hash_file(path: &Path) -> std::io::Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}
