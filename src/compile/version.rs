use super::CompileError;
use regex::Regex;
use std::fs;
use std::path::Path;

/// Read the firmware version constant out of a version declaration header.
///
/// Matches the first `const uint32_t VERSION = <value>;` assignment; the
/// value is decimal or the `0x`-prefixed hex literal Tasmota actually uses.
pub fn extract_version(path: &Path) -> Result<u32, CompileError> {
    if !path.exists() {
        return Err(CompileError::VersionNotFound(path.to_path_buf()));
    }
    let text =
        fs::read_to_string(path).map_err(|_| CompileError::VersionNotFound(path.to_path_buf()))?;

    let pattern = Regex::new(r"const uint32_t VERSION = ([^;]+);").unwrap();
    pattern
        .captures(&text)
        .and_then(|caps| parse_version_literal(caps[1].trim()))
        .ok_or_else(|| CompileError::VersionPatternMissing(path.to_path_buf()))
}

fn parse_version_literal(raw: &str) -> Option<u32> {
    if let Some(hex) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).ok()
    } else {
        raw.parse().ok()
    }
}

/// Render the packed version word as a dotted string.
///
/// Tasmota encodes one version component per byte: `0x0C010400` is 12.1.4.0.
pub fn format_version(version: u32) -> String {
    format!(
        "{}.{}.{}.{}",
        version >> 24,
        (version >> 16) & 0xff,
        (version >> 8) & 0xff,
        version & 0xff
    )
}
