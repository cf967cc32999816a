//! Crawler configuration.
//!
//! Handles loading, validating, and merging `classdrive.toml`. Stock defaults
//! are the base layer; the user file overrides any subset of keys.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! data_dir = "data"          # Where class-<url_name>.json files are written
//! cache_dir = "cache"        # Listing/lesson caches, page token, change log
//!
//! [drive]
//! api_base = "https://www.googleapis.com/drive/v3"
//! access_token_env = "DRIVE_ACCESS_TOKEN"
//! timeout_secs = 30
//!
//! [lessons]
//! description_file = "description.md"
//! metadata_file = "metadata.json"
//! ignore_files = ["desktop.ini", ".DS_Store", "Thumbs.db", "Icon\r", ".gitkeep"]
//!
//! [assignments]
//! file = "assignments.md"
//!
//! [[classes]]
//! id = 3
//! name = "Physics 10"
//! url_name = "physics-10"
//! folder = "https://drive.google.com/drive/folders/<id>"
//! banner_url = "images/banner3.png"
//! active = true
//! ```
//!
//! ## Partial Configuration
//!
//! Only the keys that differ from the defaults need to be present. Tables are
//! merged key by key; arrays (including `[[classes]]`) replace the default
//! wholesale.
//!
//! Unknown keys are rejected to catch typos early.

use crate::naming::folder_id_from_url;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILENAME: &str = "classdrive.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Crawler configuration loaded from `classdrive.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CrawlConfig {
    /// Output directory for class documents.
    pub data_dir: PathBuf,
    /// Root of the on-disk caches.
    pub cache_dir: PathBuf,
    pub drive: DriveConfig,
    pub lessons: LessonsConfig,
    pub assignments: AssignmentsConfig,
    pub classes: Vec<ClassConfig>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            cache_dir: PathBuf::from("cache"),
            drive: DriveConfig::default(),
            lessons: LessonsConfig::default(),
            assignments: AssignmentsConfig::default(),
            classes: Vec::new(),
        }
    }
}

impl CrawlConfig {
    /// Validate values that serde can't check on its own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.drive.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "drive.timeout_secs must be non-zero".into(),
            ));
        }
        if self.lessons.description_file.is_empty() || self.lessons.metadata_file.is_empty() {
            return Err(ConfigError::Validation(
                "lessons.description_file and lessons.metadata_file must not be empty".into(),
            ));
        }
        let mut ids = HashSet::new();
        let mut slugs = HashSet::new();
        for class in &self.classes {
            if !ids.insert(class.id) {
                return Err(ConfigError::Validation(format!(
                    "duplicate class id {}",
                    class.id
                )));
            }
            if class.url_name.is_empty() || class.url_name.contains(['/', '\\']) {
                return Err(ConfigError::Validation(format!(
                    "class {} url_name must be a non-empty path segment",
                    class.id
                )));
            }
            if !slugs.insert(class.url_name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate class url_name '{}'",
                    class.url_name
                )));
            }
            if class.folder_id().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "class {} has no folder id",
                    class.id
                )));
            }
        }
        Ok(())
    }

    /// Names ignored when building lesson content trees, lowercased. Always
    /// includes the metadata file.
    pub fn ignored_names(&self) -> HashSet<String> {
        self.lessons
            .ignore_files
            .iter()
            .chain(std::iter::once(&self.lessons.metadata_file))
            .map(|n| n.to_lowercase())
            .collect()
    }
}

/// Google Drive API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DriveConfig {
    pub api_base: String,
    /// Environment variable holding an OAuth bearer token.
    pub access_token_env: String,
    pub timeout_secs: u64,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            api_base: "https://www.googleapis.com/drive/v3".to_string(),
            access_token_env: "DRIVE_ACCESS_TOKEN".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Fixed file names inside lesson folders.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LessonsConfig {
    pub description_file: String,
    pub metadata_file: String,
    /// System and editor artifacts left out of content trees (case-insensitive).
    pub ignore_files: Vec<String>,
}

impl Default for LessonsConfig {
    fn default() -> Self {
        Self {
            description_file: "description.md".to_string(),
            metadata_file: "metadata.json".to_string(),
            ignore_files: [
                "desktop.ini",
                ".DS_Store",
                "Thumbs.db",
                "Icon\r",
                ".gitkeep",
            ]
            .map(String::from)
            .to_vec(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AssignmentsConfig {
    /// Markdown file in the class root folder.
    pub file: String,
}

impl Default for AssignmentsConfig {
    fn default() -> Self {
        Self {
            file: "assignments.md".to_string(),
        }
    }
}

/// One class to crawl.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ClassConfig {
    pub id: u32,
    pub name: String,
    pub url_name: String,
    /// Drive folder URL or bare folder id.
    pub folder: String,
    #[serde(default)]
    pub banner_url: String,
    #[serde(default)]
    pub active: bool,
}

impl ClassConfig {
    pub fn folder_id(&self) -> String {
        folder_id_from_url(&self.folder)
    }

    /// File name of this class's document inside the data directory.
    pub fn output_filename(&self) -> String {
        format!("class-{}.json", self.url_name)
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(CrawlConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<CrawlConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: CrawlConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from a file path, falling back to stock defaults when the
/// file does not exist.
pub fn load_config(path: &Path) -> Result<CrawlConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(path)?;
    if overlay.is_none() {
        log::warn!("{} not found, using stock defaults", path.display());
    }
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock config file.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# classdrive configuration
# ========================
# All settings are optional except the [[classes]] you want crawled.
# Values shown below are the defaults. Unknown keys cause an error.

# Where class-<url_name>.json documents are written.
data_dir = "data"

# Folder listings, lesson objects, the change-feed token, and the change log.
# Delete it (or run `classdrive invalidate --all`) to force a full crawl.
cache_dir = "cache"

# ---------------------------------------------------------------------------
# Google Drive
# ---------------------------------------------------------------------------
[drive]
api_base = "https://www.googleapis.com/drive/v3"

# Environment variable holding an OAuth access token with drive.readonly scope.
access_token_env = "DRIVE_ACCESS_TOKEN"

# Per-request timeout in seconds.
timeout_secs = 30

# ---------------------------------------------------------------------------
# Lesson folders
# ---------------------------------------------------------------------------
[lessons]
# Markdown rendered as the lesson description.
description_file = "description.md"

# JSON object shown next to the lesson. A "due_date" key in dd-mm-yyyy or
# dd.mm.yyyy form also gets a display string with the weekday.
metadata_file = "metadata.json"

# Files never listed in lesson content (case-insensitive). The metadata file
# is always ignored.
ignore_files = ["desktop.ini", ".DS_Store", "Thumbs.db", "Icon\r", ".gitkeep"]

# ---------------------------------------------------------------------------
# Assignments
# ---------------------------------------------------------------------------
[assignments]
# Markdown file in each class root folder. Only the first four sections
# (separated by --- lines) are kept.
file = "assignments.md"

# ---------------------------------------------------------------------------
# Classes
# ---------------------------------------------------------------------------
# [[classes]]
# id = 1
# name = "Physics 10"
# url_name = "physics-10"
# folder = "https://drive.google.com/drive/folders/<folder-id>"
# banner_url = "images/banner1.png"
# active = true
"##
}
