//! User settings persisted under the low-priority `settings` key.

use serde::{Deserialize, Serialize};

/// Tunables the user can change at runtime.
///
/// Every field carries a serde default so a settings value written by any
/// release parses under any other. Settings are the first thing evicted
/// under storage pressure, so loaders must treat absence as "use defaults".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// How many ledger entries are replayed into a completion request.
    #[serde(default = "default_max_context_messages")]
    pub max_context_messages: usize,
}

fn default_model() -> String {
    "default".to_owned()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_context_messages() -> usize {
    10
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model: default_model(),
            temperature: default_temperature(),
            max_context_messages: default_max_context_messages(),
        }
    }
}
