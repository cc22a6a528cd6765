//! Fluent builders for blueprints and clusters.

use crate::blueprint::error::BuildError;
use crate::blueprint::{
    Blueprint, ClusterDefinition, StateGroupDefinition, TransitionDefinition, TransitionRule,
};
use std::collections::BTreeMap;

const DEFAULT_VERSION: &str = "1.0";

/// Builder for constructing blueprints with a fluent API.
///
/// `build()` rejects structural faults the data model forbids: duplicate ids,
/// empty state groups and initial values outside their group. Transition
/// targets are not checked here; see [`Blueprint::validate`].
pub struct BlueprintBuilder {
    app_name: String,
    version: String,
    clusters: Vec<(String, ClusterBuilder)>,
}

impl BlueprintBuilder {
    /// Create a new builder.
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            version: DEFAULT_VERSION.to_string(),
            clusters: Vec::new(),
        }
    }

    /// Set the blueprint version (defaults to "1.0").
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Add a cluster.
    pub fn cluster(mut self, id: impl Into<String>, cluster: ClusterBuilder) -> Self {
        self.clusters.push((id.into(), cluster));
        self
    }

    /// Build the blueprint.
    pub fn build(self) -> Result<Blueprint, BuildError> {
        if self.app_name.trim().is_empty() {
            return Err(BuildError::MissingAppName);
        }

        let mut clusters = BTreeMap::new();
        for (id, builder) in self.clusters {
            if clusters.contains_key(&id) {
                return Err(BuildError::DuplicateCluster { cluster: id });
            }
            let cluster = builder.build(&id)?;
            clusters.insert(id, cluster);
        }

        Ok(Blueprint {
            version: self.version,
            app_name: self.app_name,
            clusters,
        })
    }
}

/// Builder for a single cluster.
#[derive(Default)]
pub struct ClusterBuilder {
    description: Option<String>,
    state_groups: Vec<(String, StateGroupDefinition)>,
    transitions: Vec<(String, TransitionRule)>,
}

impl ClusterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Declare a state group.
    pub fn state_group(mut self, id: impl Into<String>, group: StateGroupDefinition) -> Self {
        self.state_groups.push((id.into(), group));
        self
    }

    /// Add a transition rule triggered by `event`.
    pub fn on(mut self, event: impl Into<String>, rule: TransitionRule) -> Self {
        self.transitions.push((event.into(), rule));
        self
    }

    pub(crate) fn build(self, cluster_id: &str) -> Result<ClusterDefinition, BuildError> {
        let mut state_groups = BTreeMap::new();
        for (group_id, group) in self.state_groups {
            if state_groups.contains_key(&group_id) {
                return Err(BuildError::DuplicateStateGroup {
                    cluster: cluster_id.to_string(),
                    group: group_id,
                });
            }
            if group.states.is_empty() {
                return Err(BuildError::EmptyStateGroup {
                    cluster: cluster_id.to_string(),
                    group: group_id,
                });
            }
            if !group.allows(&group.initial) {
                return Err(BuildError::InitialNotAllowed {
                    cluster: cluster_id.to_string(),
                    initial: group.initial.clone(),
                    group: group_id,
                });
            }
            state_groups.insert(group_id, group);
        }

        let mut on = BTreeMap::new();
        for (event, rule) in self.transitions {
            if on.contains_key(&event) {
                return Err(BuildError::DuplicateTransition {
                    cluster: cluster_id.to_string(),
                    event,
                });
            }
            on.insert(event, rule);
        }

        Ok(ClusterDefinition {
            description: self.description,
            state_groups,
            transitions: TransitionDefinition {
                on,
                description: None,
            },
        })
    }
}
