use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::SettingsError;

/// Where freshly created nodes land on the canvas.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct LayoutSettings {
    pub column_x: f64,
    pub start_y: f64,
    pub step_y: f64,
    pub result_x: f64,
    pub result_y: f64,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            column_x: 320.0,
            start_y: 120.0,
            step_y: 120.0,
            result_x: 860.0,
            result_y: 240.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub layout: LayoutSettings,
    /// Indent the rule text buffer instead of writing it on one line.
    pub pretty_print: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            layout: LayoutSettings::default(),
            pretty_print: true,
        }
    }
}

/// Resolve the global settings directory (~/.flowlogic/).
pub fn settings_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".flowlogic")
}

fn settings_path() -> PathBuf {
    settings_dir().join("settings.json")
}

pub fn read_settings() -> Settings {
    read_settings_from(&settings_path())
}

/// Read settings from `path`, falling back to defaults when the file is
/// missing or does not parse.
pub fn read_settings_from(path: &Path) -> Settings {
    if !path.exists() {
        return Settings::default();
    }
    fs::read_to_string(path)
        .ok()
        .and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default()
}

pub fn write_settings(settings: &Settings) -> Result<(), SettingsError> {
    write_settings_to(&settings_path(), settings)
}

pub fn write_settings_to(path: &Path, settings: &Settings) -> Result<(), SettingsError> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_string_pretty(settings)?;
    fs::write(path, json)?;
    Ok(())
}
