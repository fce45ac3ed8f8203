use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Full project state as it crosses the load boundary: raw entity and asset
/// JSON plus the project identity the clipboard keys off. The reference map
/// and deleted cache are process-local and never serialized.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub legacy_scripts: bool,
    #[serde(default)]
    pub entities: Vec<Value>,
    #[serde(default)]
    pub assets: Vec<Value>,
}

impl ProjectSnapshot {
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("Reading snapshot file {}", path.display()))?;
        let snapshot = serde_json::from_slice::<ProjectSnapshot>(&bytes)
            .with_context(|| format!("Parsing snapshot file {}", path.display()))?;
        Ok(snapshot)
    }

    pub fn save_to_path(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Creating snapshot directory {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json.as_bytes())
            .with_context(|| format!("Writing snapshot file {}", path.display()))?;
        Ok(())
    }
}
