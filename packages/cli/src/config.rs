use anyhow::Context;
use scribe_behaviors::BehaviorConfig;
use scribe_editor::EditorConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_CONFIG_NAME: &str = "scribe.config.json";

/// Scribe configuration file format
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub editor: EditorConfig,

    #[serde(default)]
    pub behaviors: BehaviorConfig,
}

impl Config {
    /// Load config from a directory, falling back to defaults when there is
    /// no config file
    pub fn load(cwd: &Path) -> anyhow::Result<Self> {
        let config_path = cwd.join(DEFAULT_CONFIG_NAME);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            serde_json::from_str(&content)
                .with_context(|| format!("invalid {}", config_path.display()))
        } else {
            Ok(Config::default())
        }
    }
}
