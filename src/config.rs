// ── Settings persistence ──────────────────────────────────────────────────────
//
// Reads and writes `%APPDATA%\HwndSubclass\settings.json` (or the file named by
// `$HWND_SUBCLASS_CONFIG`).  No `unsafe` — pure safe Rust + serde_json.

use std::{
    fs,
    path::{Path, PathBuf},
};

use log::LevelFilter;
use serde::{Deserialize, Serialize};

use crate::error::Result;

// ── On-disk type ──────────────────────────────────────────────────────────────

/// Root of the JSON settings file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub version: u32,
    /// Prefix of every window-class name a host registers.
    #[serde(default = "default_class_prefix")]
    pub class_prefix: String,
    /// Log every message a host dispatches at `trace` level.
    #[serde(default)]
    pub trace_messages: bool,
    /// `log` level name, e.g. `"debug"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Optional log file for the demo binary.
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            class_prefix: default_class_prefix(),
            trace_messages: false,
            log_level: default_log_level(),
            log_file: None,
        }
    }
}

impl Settings {
    /// The configured level, falling back to `Info` on an unknown name.
    pub fn level_filter(&self) -> LevelFilter {
        self.log_level.parse().unwrap_or(LevelFilter::Info)
    }
}

fn default_class_prefix() -> String {
    "HwndHost".to_owned()
}

fn default_log_level() -> String {
    "info".to_owned()
}

// ── Format version ────────────────────────────────────────────────────────────

const SETTINGS_VERSION: u32 = 1;

/// Environment variable that overrides the settings path.
pub const CONFIG_ENV: &str = "HWND_SUBCLASS_CONFIG";

// ── Path ──────────────────────────────────────────────────────────────────────

/// Return the settings path: `$HWND_SUBCLASS_CONFIG`, else
/// `%APPDATA%\HwndSubclass\settings.json`.
///
/// Returns `None` if neither variable is set.
pub fn settings_path() -> Option<PathBuf> {
    if let Some(explicit) = std::env::var_os(CONFIG_ENV) {
        return Some(PathBuf::from(explicit));
    }
    let appdata = std::env::var_os("APPDATA")?;
    let mut p = PathBuf::from(appdata);
    p.push("HwndSubclass");
    p.push("settings.json");
    Some(p)
}

// ── Load ──────────────────────────────────────────────────────────────────────

/// Load settings from the default path.
///
/// Never fails: a missing file, a parse failure, or an unrecognised version
/// number all yield `Settings::default()`.
pub fn load() -> Settings {
    settings_path()
        .and_then(|path| load_from(&path).ok())
        .filter(|s| s.version == SETTINGS_VERSION)
        .unwrap_or_default()
}

/// Read and parse one settings file.
pub fn load_from(path: &Path) -> Result<Settings> {
    let data = fs::read(path)?;
    Ok(serde_json::from_slice(&data)?)
}

// ── Save ──────────────────────────────────────────────────────────────────────

/// Write `settings` to `path`, creating the parent directory if needed.
pub fn save_to(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let file = fs::File::create(path)?;
    serde_json::to_writer_pretty(file, settings)?;
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
