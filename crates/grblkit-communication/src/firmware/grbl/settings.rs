//! Captured device settings
//!
//! Accumulates the `$n=value` lines a `$$` query produces into an ordered
//! map, attaches the static setting names for display, and persists the
//! capture as JSON.

use grblkit_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use super::utils::setting_name;

/// One captured setting with its display name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrblSetting {
    /// Setting index (the `n` in `$n=`)
    pub index: u32,
    /// Value as printed by the device
    pub value: String,
    /// Human-readable name from the static table
    pub name: String,
}

/// Ordered capture of the device's `$$` settings dump
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GrblSettings {
    values: BTreeMap<u32, String>,
}

impl GrblSettings {
    /// Create an empty capture
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one setting as reported by the device
    pub fn set(&mut self, index: u32, value: impl Into<String>) {
        self.values.insert(index, value.into());
    }

    /// Look up a captured value
    pub fn get(&self, index: u32) -> Option<&str> {
        self.values.get(&index).map(String::as_str)
    }

    /// All captured settings in index order, with display names attached
    pub fn all(&self) -> Vec<GrblSetting> {
        self.values
            .iter()
            .map(|(&index, value)| GrblSetting {
                index,
                value: value.clone(),
                name: setting_name(index).to_string(),
            })
            .collect()
    }

    /// Number of captured settings
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the capture is empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Drop all captured settings
    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Save the capture to a JSON file
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_json::to_string_pretty(&self.values)
            .map_err(|e| Error::other(format!("Failed to serialize settings: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load a capture from a JSON file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let values: BTreeMap<u32, String> = serde_json::from_str(&content)
            .map_err(|e| Error::other(format!("Failed to parse settings file: {}", e)))?;
        Ok(Self { values })
    }
}
