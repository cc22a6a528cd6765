//! Blueprint declarations.
//!
//! A [`Blueprint`] is the static description of an application: a set of
//! clusters, each owning state groups (enumerated dimensions with an initial
//! value) and a transition table keyed by domain-event name.
//!
//! Blueprints can be loaded from JSON with [`Blueprint::from_json`] or built
//! with the fluent [`BlueprintBuilder`].
//!
//! # Example
//!
//! ```rust
//! use vds::blueprint::Blueprint;
//!
//! let blueprint = Blueprint::from_json(r#"{
//!     "version": "1.0",
//!     "appName": "Switch",
//!     "clusters": {
//!         "Light": {
//!             "stateGroups": {
//!                 "power": { "initial": "off", "states": ["off", "on"] }
//!             },
//!             "transitions": {
//!                 "on": {
//!                     "SWITCHED_ON": { "target": { "power": "on" } },
//!                     "SWITCHED_OFF": { "target": { "power": "off" } }
//!                 }
//!             }
//!         }
//!     }
//! }"#).unwrap();
//!
//! assert_eq!(blueprint.app_name, "Switch");
//! assert!(blueprint.validate().is_success());
//! ```

pub mod builder;
pub mod error;
pub mod validate;

pub use builder::{BlueprintBuilder, ClusterBuilder};
pub use error::{BlueprintError, BuildError};
pub use validate::BlueprintViolation;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;

/// Partial mapping from state-group id to the value a rule installs.
pub type TransitionTarget = BTreeMap<String, String>;

/// Static declaration of every cluster in an application.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blueprint {
    pub version: String,
    pub app_name: String,
    #[serde(default)]
    pub clusters: BTreeMap<String, ClusterDefinition>,
}

/// One orthogonal region of behavior.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub state_groups: BTreeMap<String, StateGroupDefinition>,
    #[serde(default)]
    pub transitions: TransitionDefinition,
}

/// An enumerated dimension of state with one designated initial value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateGroupDefinition {
    pub initial: String,
    #[serde(alias = "state")]
    pub states: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl StateGroupDefinition {
    pub fn new<I, V>(initial: impl Into<String>, states: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        Self {
            initial: initial.into(),
            states: states.into_iter().map(Into::into).collect(),
            description: None,
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Whether `value` is one of the declared states.
    pub fn allows(&self, value: &str) -> bool {
        self.states.iter().any(|state| state == value)
    }
}

/// Transition table of a cluster, keyed by domain-event name.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TransitionDefinition {
    #[serde(default)]
    pub on: BTreeMap<String, TransitionRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Values installed when the rule's event is projected.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TransitionRule {
    pub target: TransitionTarget,
}

impl TransitionRule {
    /// Rule writing each `(group, value)` pair.
    pub fn to<I, G, V>(assignments: I) -> Self
    where
        I: IntoIterator<Item = (G, V)>,
        G: Into<String>,
        V: Into<String>,
    {
        Self {
            target: assignments
                .into_iter()
                .map(|(group, value)| (group.into(), value.into()))
                .collect(),
        }
    }
}

impl Blueprint {
    /// Start a fluent builder for an application named `app_name`.
    pub fn builder(app_name: impl Into<String>) -> BlueprintBuilder {
        BlueprintBuilder::new(app_name)
    }

    /// Parse a blueprint from its JSON form.
    pub fn from_json(json: &str) -> Result<Self, BlueprintError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse a blueprint from a reader yielding JSON.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, BlueprintError> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Look up a cluster definition.
    pub fn cluster(&self, cluster_id: &str) -> Option<&ClusterDefinition> {
        self.clusters.get(cluster_id)
    }
}
