//! Editor configuration

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorConfig {
    /// Transform rounds allowed per transaction before it aborts
    #[serde(default = "default_max_transform_rounds")]
    pub max_transform_rounds: usize,

    #[serde(default)]
    pub history: HistoryConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryConfig {
    /// Oldest entries are evicted past this count
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// Text edits on the same nodes closer together than this share an entry
    #[serde(default = "default_merge_window_ms")]
    pub merge_window_ms: u64,

    #[serde(default = "default_true")]
    pub coalesce_text: bool,
}

fn default_max_transform_rounds() -> usize {
    32
}

fn default_max_entries() -> usize {
    100
}

fn default_merge_window_ms() -> u64 {
    1000
}

fn default_true() -> bool {
    true
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            max_transform_rounds: default_max_transform_rounds(),
            history: HistoryConfig::default(),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            merge_window_ms: default_merge_window_ms(),
            coalesce_text: true,
        }
    }
}
