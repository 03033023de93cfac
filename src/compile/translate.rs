use super::CompileError;
use crate::config::{BoardDefinition, BuildRequest, RepoPaths};
use serde_json::{Map, Value};
use std::fs;
use std::path::PathBuf;

/// Symbols whose values are emitted string-quoted in the override header.
const QUOTED_SYMBOLS: &[&str] = &[
    "STA_PASS1",
    "STA_SSID1",
    "WIFI_DNS",
    "WIFI_GATEWAY",
    "WIFI_IP_ADDRESS",
    "WIFI_SUBNETMASK",
];

/// Feature keys matching this marker contribute build-tool settings.
const FEATURE_ENTRY_MARKER: &str = "platformio_entries#";

const BASELINE_FLAGS_ESP32: &str = "${common32.build_flags}";
const BASELINE_FLAGS_ESP8266: &str = "${common.build_flags}";

/// How a tagged symbol is written into the override header.
///
/// Tagging happens once, at the map boundary; the renderer below never
/// inspects key spelling again.
enum Emission {
    /// `true`: undefine, then define with no value
    Enable,
    /// `false`: undefine only
    Disable,
    /// non-empty value: undefine, then define carrying the value
    Set { value: String, quoted: bool },
}

fn tag_entries(mapping: &Map<String, Value>) -> Vec<(&str, Emission)> {
    let mut tagged = Vec::new();
    for (key, value) in mapping {
        // Lowercase-leading keys are internal helpers (board data and the
        // like) and never reach the generated file.
        if !key.starts_with(|c: char| c.is_uppercase()) {
            continue;
        }
        let emission = match value {
            Value::Bool(true) => Emission::Enable,
            Value::Bool(false) => Emission::Disable,
            Value::String(s) if s.is_empty() => continue,
            Value::String(s) => Emission::Set {
                value: s.clone(),
                quoted: QUOTED_SYMBOLS.contains(&key.as_str()),
            },
            Value::Number(n) => Emission::Set {
                value: n.to_string(),
                quoted: false,
            },
            // null, arrays and nested objects carry no emittable value
            _ => continue,
        };
        tagged.push((key.as_str(), emission));
    }
    tagged
}

/// Translate a symbol map into a sequence of override directive blocks.
///
/// Every emitted symbol gets an undefine-then-define pair (undefine only for
/// disabled flags) so the override wins regardless of upstream defaults.
/// Emission follows the map's key order and is stable for identical input.
pub fn render_defines(mapping: &Map<String, Value>) -> String {
    let mut out = String::new();
    for (name, emission) in tag_entries(mapping) {
        match emission {
            Emission::Enable => {
                out.push_str(&format!(
                    "#ifdef {name}\n  #undef {name}\n#endif\n#define {name}\n\n"
                ));
            }
            Emission::Disable => {
                out.push_str(&format!("#ifdef {name}\n  #undef {name}\n#endif\n\n"));
            }
            Emission::Set { value, quoted } => {
                let rendered = if quoted {
                    format!("\"{value}\"")
                } else {
                    value
                };
                out.push_str(&format!(
                    "#ifdef {name}\n  #undef {name}\n#endif\n#define {name}\t{rendered}\n\n"
                ));
            }
        }
    }
    out
}

/// Build-flag fragments contributed by selected features, joined in
/// encounter order.
fn collect_feature_flags(features: &Map<String, Value>) -> String {
    let mut flags = String::new();
    for (key, value) in features {
        if !key.contains(FEATURE_ENTRY_MARKER) {
            continue;
        }
        if let Some(fragment) = value.get("build_flags").and_then(Value::as_str) {
            if !flags.is_empty() {
                flags.push(' ');
            }
            flags.push_str(fragment);
        }
    }
    flags
}

/// Render the PlatformIO override environment for a board and its selected
/// features.
///
/// Feature-contributed `build_flags` are appended to the board's own entries
/// (never replacing them), and the architecture baseline reference is
/// prepended exactly once. Idempotent with respect to the baseline token.
pub fn render_build_env(board: &BoardDefinition, features: &Map<String, Value>) -> String {
    let baseline = if board.is_esp32() {
        BASELINE_FLAGS_ESP32
    } else {
        BASELINE_FLAGS_ESP8266
    };

    let mut entries = board.platformio_entries.clone();

    let feature_flags = collect_feature_flags(features);
    if !feature_flags.is_empty() {
        let merged = match entries.get("build_flags").and_then(Value::as_str) {
            Some(existing) => format!("{existing} {feature_flags}"),
            None => feature_flags,
        };
        entries.insert("build_flags".to_string(), Value::String(merged));
    }

    let baselined = match entries.get("build_flags").and_then(Value::as_str) {
        Some(flags) if !flags.contains(baseline) => Some(format!("{baseline} {flags}")),
        Some(_) => None,
        None => Some(baseline.to_string()),
    };
    if let Some(flags) = baselined {
        entries.insert("build_flags".to_string(), Value::String(flags));
    }

    let settings = entries
        .iter()
        .map(|(key, value)| {
            let rendered = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            format!("{key} = {rendered}")
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!("[platformio]\ndefault_envs = firmware\n\n[env:firmware]\n{settings}\n")
}

/// Assemble the full `user_config_override.h` contents.
pub fn render_override_header(request: &BuildRequest, board: &BoardDefinition) -> String {
    format!(
        "#ifndef _USER_CONFIG_OVERRIDE_H_\n\
         #define _USER_CONFIG_OVERRIDE_H_\n\n\
         #warning **** user_config_override.h: Using Settings from this File ****\n\n\
         {network}{features}{board}{version}{custom}\n\
         #endif\n",
        network = render_defines(&request.network),
        features = render_defines(&request.features),
        board = render_defines(&board.defines),
        version = render_defines(&request.version),
        custom = request.custom_params,
    )
}

fn overwrite(path: PathBuf, contents: String) -> Result<(), CompileError> {
    fs::write(&path, contents).map_err(|cause| CompileError::WriteFailed { path, cause })
}

/// Render and write both generated files.
///
/// Both renders complete before either write; a failed write aborts the
/// remaining pipeline so the build tool never launches against
/// partially-written inputs.
pub fn write_generated_files(paths: &RepoPaths, request: &BuildRequest) -> Result<(), CompileError> {
    let board = request.board();
    let header = render_override_header(request, &board);
    let build_env = render_build_env(&board, &request.features);

    overwrite(paths.config_override(), header)?;
    overwrite(paths.platformio_override(), build_env)
}
