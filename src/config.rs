use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the optional settings file, looked up in the working directory.
pub const SETTINGS_FILE: &str = "tasmoforge.toml";

const DEFAULT_REPO_URL: &str = "https://github.com/arendst/Tasmota";

#[derive(Deserialize, Debug)]
pub struct Settings {
    /// Local Tasmota checkout managed by tasmoforge.
    #[serde(default = "default_repo_dir")]
    pub repo_dir: PathBuf,
    /// Upstream repository to clone the checkout from.
    #[serde(default = "default_repo_url")]
    pub repo_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            repo_dir: default_repo_dir(),
            repo_url: default_repo_url(),
        }
    }
}

fn default_repo_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".tasmoforge").join("tasmota_repo"))
        .unwrap_or_else(|| PathBuf::from("tasmota_repo"))
}

fn default_repo_url() -> String {
    DEFAULT_REPO_URL.to_string()
}

// --- Helper: Load Settings (file is optional, defaults apply) ---
pub fn load_settings() -> Result<Settings> {
    if !Path::new(SETTINGS_FILE).exists() {
        return Ok(Settings::default());
    }
    let raw = fs::read_to_string(SETTINGS_FILE)
        .with_context(|| format!("Failed to read {SETTINGS_FILE} - check file permissions"))?;
    toml::from_str(&raw).with_context(|| {
        format!("Failed to parse {SETTINGS_FILE} - check for syntax errors (missing quotes, brackets)")
    })
}

/// Well-known locations inside a Tasmota checkout.
///
/// The two generated files are recreated on every build request; their paths
/// are fixed relative to the repository root.
#[derive(Debug, Clone)]
pub struct RepoPaths {
    root: PathBuf,
}

impl RepoPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Current source tree location.
    pub fn source_dir(&self) -> PathBuf {
        self.root.join("tasmota")
    }

    /// Pre-6.7.1.1 source tree location, migrated away on sight.
    pub fn legacy_source_dir(&self) -> PathBuf {
        self.root.join("sonoff")
    }

    pub fn version_file(&self) -> PathBuf {
        self.source_dir().join("tasmota_version.h")
    }

    pub fn config_override(&self) -> PathBuf {
        self.source_dir().join("user_config_override.h")
    }

    pub fn platformio_override(&self) -> PathBuf {
        self.root.join("platformio_override.ini")
    }

    /// Where PlatformIO drops compiled binaries.
    pub fn build_output_dir(&self) -> PathBuf {
        self.root.join(".pio").join("build")
    }
}

/// One firmware build request, as assembled by the configurator UI.
///
/// The four symbol maps keep their JSON insertion order so the generated
/// override file is reproducible for identical input.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct BuildRequest {
    #[serde(default)]
    pub network: Map<String, Value>,
    #[serde(default)]
    pub features: Map<String, Value>,
    #[serde(default)]
    pub version: Map<String, Value>,
    /// Pre-formatted text appended verbatim to the override header.
    #[serde(default, rename = "customParams")]
    pub custom_params: String,
}

impl BuildRequest {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read build request {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse build request {}", path.display()))
    }

    /// Board data nested in the feature map under the `board` helper key.
    pub fn board(&self) -> BoardDefinition {
        BoardDefinition::from_value(self.features.get("board"))
    }

    /// Version identifier handed to the branch-switch collaborator.
    pub fn requested_version(&self) -> Option<&str> {
        self.version.get("tasmotaVersion").and_then(Value::as_str)
    }
}

/// Board selection carried inside the feature config.
#[derive(Debug, Clone, Default)]
pub struct BoardDefinition {
    pub name: String,
    /// Board-specific symbols, emitted like any other define map.
    pub defines: Map<String, Value>,
    /// Build-tool settings contributed by the board, appended not replaced.
    pub platformio_entries: Map<String, Value>,
}

impl BoardDefinition {
    fn from_value(value: Option<&Value>) -> Self {
        let Some(board) = value.and_then(Value::as_object) else {
            return Self::default();
        };
        Self {
            name: board
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            defines: board
                .get("defines")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
            platformio_entries: board
                .get("platformio_entries")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
        }
    }

    /// 32-bit boards pull a different baseline build-flag set.
    pub fn is_esp32(&self) -> bool {
        self.name.contains("esp32")
    }
}
