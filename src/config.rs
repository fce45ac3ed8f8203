use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct EditorConfig {
    #[serde(default = "EditorConfig::default_history_limit")]
    pub history_limit: usize,
    #[serde(default = "EditorConfig::default_deferred_queue_limit")]
    pub deferred_queue_limit: usize,
}

impl EditorConfig {
    const fn default_history_limit() -> usize {
        1000
    }

    const fn default_deferred_queue_limit() -> usize {
        4096
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        let cfg = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(cfg)
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                log::warn!("Config load error: {err:?}. Falling back to defaults.");
                Self::default()
            }
        }
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            history_limit: Self::default_history_limit(),
            deferred_queue_limit: Self::default_deferred_queue_limit(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_fills_defaults() {
        let cfg: EditorConfig = serde_json::from_str(r#"{ "history_limit": 25 }"#).expect("parse");
        assert_eq!(cfg.history_limit, 25);
        assert_eq!(cfg.deferred_queue_limit, EditorConfig::default_deferred_queue_limit());
    }
}
