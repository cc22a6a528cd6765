//! Errors raised while loading or building blueprints.

use crate::blueprint::validate::BlueprintViolation;
use thiserror::Error;

/// Errors that can occur when building blueprints and engines.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Application name not specified")]
    MissingAppName,

    #[error("Cluster '{cluster}' is declared more than once")]
    DuplicateCluster { cluster: String },

    #[error("State group '{group}' is declared more than once in cluster '{cluster}'")]
    DuplicateStateGroup { cluster: String, group: String },

    #[error("State group '{cluster}.{group}' declares no states")]
    EmptyStateGroup { cluster: String, group: String },

    #[error("Initial value '{initial}' of '{cluster}.{group}' is not one of its states")]
    InitialNotAllowed {
        cluster: String,
        group: String,
        initial: String,
    },

    #[error("Cluster '{cluster}' declares more than one transition on '{event}'")]
    DuplicateTransition { cluster: String, event: String },

    #[error("Blueprint failed validation with {} violation(s)", .0.len())]
    InvalidBlueprint(Vec<BlueprintViolation>),
}

/// Errors that can occur when loading a blueprint from its serialized form.
#[derive(Debug, Error)]
pub enum BlueprintError {
    #[error("Blueprint could not be parsed: {0}")]
    Parse(#[from] serde_json::Error),
}
