use serde::{Deserialize, Serialize};

/// Settings for the built-in behaviors
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BehaviorConfig {
    /// Model id passed to the suggestion provider; `None` disables
    /// autocomplete
    #[serde(default)]
    pub autocomplete_model: Option<String>,

    /// Model id passed to the edit provider; `None` disables AI edits
    #[serde(default)]
    pub edit_model: Option<String>,
}
