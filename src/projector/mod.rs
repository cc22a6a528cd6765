//! Blueprint compilation into a pure transition function.
//!
//! [`create_projector`] scans the blueprint once and indexes every
//! transition rule by event name. Projecting an event is then a single map
//! lookup followed by copy-on-write updates of the targeted clusters.
//!
//! All logic in this module is pure: same `(state, event)` in, structurally
//! identical snapshot out, no I/O and no errors.

use crate::blueprint::{Blueprint, TransitionTarget};
use crate::core::{ClusterState, CoreState, DomainEvent};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// A boxed `(state, event) -> state` reducer.
pub type ProjectorFn =
    Arc<dyn Fn(&Arc<CoreState>, &DomainEvent) -> Arc<CoreState> + Send + Sync>;

#[derive(Clone, Debug)]
struct CompiledRule {
    cluster_id: String,
    target: TransitionTarget,
}

/// Transition table compiled from a blueprint, indexed by event name.
#[derive(Clone, Debug, Default)]
pub struct Projector {
    table: HashMap<String, Vec<CompiledRule>>,
}

/// Compile `blueprint` into a [`Projector`].
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use vds::blueprint::{Blueprint, ClusterBuilder, StateGroupDefinition, TransitionRule};
/// use vds::core::{CoreState, DomainEvent};
/// use vds::projector::create_projector;
///
/// let blueprint = Blueprint::builder("Switch")
///     .cluster(
///         "Light",
///         ClusterBuilder::new()
///             .state_group("power", StateGroupDefinition::new("off", ["off", "on"]))
///             .on("SWITCHED_ON", TransitionRule::to([("power", "on")])),
///     )
///     .build()
///     .unwrap();
///
/// let projector = create_projector(&blueprint);
/// let state = Arc::new(CoreState::initial(&blueprint));
///
/// let next = projector.project(&state, &DomainEvent::new("SWITCHED_ON"));
/// assert_eq!(next.value("Light", "power"), Some("on"));
///
/// let same = projector.project(&next, &DomainEvent::new("UNRELATED"));
/// assert!(Arc::ptr_eq(&next, &same));
/// ```
pub fn create_projector(blueprint: &Blueprint) -> Projector {
    let mut table: HashMap<String, Vec<CompiledRule>> = HashMap::new();

    for (cluster_id, cluster) in &blueprint.clusters {
        for (event_name, rule) in &cluster.transitions.on {
            table
                .entry(event_name.clone())
                .or_default()
                .push(CompiledRule {
                    cluster_id: cluster_id.clone(),
                    target: rule.target.clone(),
                });
        }
    }

    Projector { table }
}

impl Projector {
    /// Apply `event` to `state`.
    ///
    /// Returns `state` itself (same `Arc`) when the event is unknown or every
    /// targeted value already holds; otherwise a new snapshot that shares
    /// all untouched clusters with `state`.
    pub fn project(&self, state: &Arc<CoreState>, event: &DomainEvent) -> Arc<CoreState> {
        let Some(rules) = self.table.get(&event.name) else {
            return Arc::clone(state);
        };

        let mut next: Option<BTreeMap<String, Arc<ClusterState>>> = None;
        for rule in rules {
            let source = next.as_ref().unwrap_or_else(|| state.cluster_entries());
            let Some(cluster) = source.get(&rule.cluster_id) else {
                continue;
            };
            if rule
                .target
                .iter()
                .all(|(group, value)| cluster.get(group) == Some(value))
            {
                continue;
            }

            let mut updated = ClusterState::clone(cluster);
            for (group, value) in &rule.target {
                updated.insert(group.clone(), value.clone());
            }
            next.get_or_insert_with(|| state.cluster_entries().clone())
                .insert(rule.cluster_id.clone(), Arc::new(updated));
        }

        match next {
            Some(clusters) => Arc::new(CoreState::from_clusters(clusters)),
            None => Arc::clone(state),
        }
    }

    /// Whether any cluster reacts to `event_name`.
    pub fn handles(&self, event_name: &str) -> bool {
        self.table.contains_key(event_name)
    }

    /// Event names present in the compiled table.
    pub fn event_names(&self) -> impl Iterator<Item = &str> {
        self.table.keys().map(String::as_str)
    }

    /// Erase the projector into a shareable reducer closure.
    pub fn into_fn(self) -> ProjectorFn {
        Arc::new(move |state: &Arc<CoreState>, event: &DomainEvent| {
            self.project(state, event)
        })
    }
}
