//! Structural validation of blueprints.
//!
//! Validation is opt-in and accumulates every violation instead of failing
//! fast. The projector never consults it: a transition target outside its
//! group's declared states is installed as written.

use crate::blueprint::{Blueprint, ClusterDefinition};
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;
use thiserror::Error;

/// A single structural problem found in a blueprint.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BlueprintViolation {
    #[error("State group '{cluster}.{group}' declares no states")]
    EmptyStateGroup { cluster: String, group: String },

    #[error("Initial value '{initial}' of '{cluster}.{group}' is not one of its states")]
    InitialNotAllowed {
        cluster: String,
        group: String,
        initial: String,
    },

    #[error("Transition on '{event}' in cluster '{cluster}' targets unknown state group '{group}'")]
    UnknownStateGroup {
        cluster: String,
        event: String,
        group: String,
    },

    #[error("Transition on '{event}' sets '{cluster}.{group}' to '{value}', which is not one of its states")]
    TargetNotAllowed {
        cluster: String,
        event: String,
        group: String,
        value: String,
    },
}

type Check = Validation<(), NonEmptyVec<BlueprintViolation>>;

impl Blueprint {
    /// Check every state group and transition rule, accumulating ALL
    /// violations.
    pub fn validate(&self) -> Validation<(), NonEmptyVec<BlueprintViolation>> {
        let mut checks: Vec<Check> = Vec::new();

        for (cluster_id, cluster) in &self.clusters {
            check_state_groups(cluster_id, cluster, &mut checks);
            check_transitions(cluster_id, cluster, &mut checks);
        }

        Validation::all_vec(checks).map(|_| ())
    }

    /// Flattened list of violations; empty when the blueprint is valid.
    pub fn violations(&self) -> Vec<BlueprintViolation> {
        match self.validate() {
            Validation::Success(_) => Vec::new(),
            Validation::Failure(errors) => errors.iter().cloned().collect(),
        }
    }
}

fn check_state_groups(cluster_id: &str, cluster: &ClusterDefinition, checks: &mut Vec<Check>) {
    for (group_id, group) in &cluster.state_groups {
        let check = if group.states.is_empty() {
            Validation::fail(BlueprintViolation::EmptyStateGroup {
                cluster: cluster_id.to_string(),
                group: group_id.clone(),
            })
        } else if !group.allows(&group.initial) {
            Validation::fail(BlueprintViolation::InitialNotAllowed {
                cluster: cluster_id.to_string(),
                group: group_id.clone(),
                initial: group.initial.clone(),
            })
        } else {
            Validation::success(())
        };
        checks.push(check);
    }
}

fn check_transitions(cluster_id: &str, cluster: &ClusterDefinition, checks: &mut Vec<Check>) {
    for (event, rule) in &cluster.transitions.on {
        for (group_id, value) in &rule.target {
            let check = match cluster.state_groups.get(group_id) {
                None => Validation::fail(BlueprintViolation::UnknownStateGroup {
                    cluster: cluster_id.to_string(),
                    event: event.clone(),
                    group: group_id.clone(),
                }),
                Some(group) if !group.allows(value) => {
                    Validation::fail(BlueprintViolation::TargetNotAllowed {
                        cluster: cluster_id.to_string(),
                        event: event.clone(),
                        group: group_id.clone(),
                        value: value.clone(),
                    })
                }
                Some(_) => Validation::success(()),
            };
            checks.push(check);
        }
    }
}
