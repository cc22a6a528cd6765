//! Immutable state snapshots.
//!
//! A [`CoreState`] maps cluster ids to the current value of every state
//! group in that cluster. Snapshots are never mutated in place: every change
//! produces a new snapshot that shares untouched clusters with its
//! predecessor, so readers holding an older `Arc<CoreState>` keep a valid
//! view.

use crate::blueprint::Blueprint;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Current value of every state group in one cluster, keyed by group id.
pub type ClusterState = BTreeMap<String, String>;

/// Snapshot of every cluster's state groups.
///
/// # Example
///
/// ```rust
/// use vds::blueprint::{Blueprint, ClusterBuilder, StateGroupDefinition};
/// use vds::core::CoreState;
///
/// let blueprint = Blueprint::builder("Player")
///     .cluster(
///         "Player",
///         ClusterBuilder::new()
///             .state_group("playback", StateGroupDefinition::new("stopped", ["stopped", "playing"])),
///     )
///     .build()
///     .unwrap();
///
/// let state = CoreState::initial(&blueprint);
/// assert_eq!(state.value("Player", "playback"), Some("stopped"));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreState {
    clusters: BTreeMap<String, Arc<ClusterState>>,
}

impl CoreState {
    /// Build the unique starting snapshot: one entry per declared state
    /// group, seeded with its initial value, for every cluster.
    pub fn initial(blueprint: &Blueprint) -> Self {
        let clusters = blueprint
            .clusters
            .iter()
            .map(|(cluster_id, cluster)| {
                let groups: ClusterState = cluster
                    .state_groups
                    .iter()
                    .map(|(group_id, group)| (group_id.clone(), group.initial.clone()))
                    .collect();
                (cluster_id.clone(), Arc::new(groups))
            })
            .collect();

        Self { clusters }
    }

    pub(crate) fn from_clusters(clusters: BTreeMap<String, Arc<ClusterState>>) -> Self {
        Self { clusters }
    }

    /// State of a single cluster.
    pub fn cluster(&self, cluster_id: &str) -> Option<&ClusterState> {
        self.clusters.get(cluster_id).map(Arc::as_ref)
    }

    /// Current value of `group_id` in `cluster_id`.
    pub fn value(&self, cluster_id: &str, group_id: &str) -> Option<&str> {
        self.cluster(cluster_id)
            .and_then(|cluster| cluster.get(group_id))
            .map(String::as_str)
    }

    /// Iterate clusters in id order.
    pub fn clusters(&self) -> impl Iterator<Item = (&str, &ClusterState)> {
        self.clusters
            .iter()
            .map(|(id, cluster)| (id.as_str(), cluster.as_ref()))
    }

    pub(crate) fn cluster_entries(&self) -> &BTreeMap<String, Arc<ClusterState>> {
        &self.clusters
    }
}
