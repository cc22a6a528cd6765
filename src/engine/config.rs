//! Engine configuration.

use serde::{Deserialize, Serialize};

/// How the engine treats blueprint violations found at construction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlueprintCheck {
    /// Skip validation entirely.
    Off,
    /// Log every violation and build anyway.
    #[default]
    Warn,
    /// Refuse to build.
    Deny,
}

/// Tunables applied when an engine is built.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    pub blueprint_check: BlueprintCheck,
    /// Attach event id, timestamp and correlation id to domain events that
    /// carry no metadata.
    pub stamp_metadata: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            blueprint_check: BlueprintCheck::Warn,
            stamp_metadata: true,
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
