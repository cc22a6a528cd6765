//! The orchestration façade.
//!
//! An [`Engine`] owns a [`StateManager`], a domain-event bus, a feedback bus
//! and the projector compiled from its blueprint. Application code talks to
//! the engine only:
//!
//! ```text
//! dispatch(command)
//!     │
//!     ▼
//! CommandHandler ──► Vec<Outcome>
//!                      │
//!        ┌─────────────┴──────────────┐
//!        ▼                            ▼
//!   Outcome::Event               Outcome::Feedback
//!        │                            │
//!   domain bus ─► projector      feedback bus ─► feedback subscribers
//!        │
//!   StateManager ─► state subscribers
//! ```
//!
//! Nothing raised inside `dispatch` escapes it: missing handlers, handler
//! errors and handler panics all become error-level feedback.

mod builder;
mod config;
mod handler;

pub use builder::EngineBuilder;
pub use config::{BlueprintCheck, EngineConfig};
pub use handler::{handler_fn, CommandHandler, CommandHandlerMap, FnHandler, HandlerResult};

use crate::blueprint::Blueprint;
use crate::bus::{
    panic_error, ErrorHandler, EventBus, Listener, ListenerFault, Unsubscribe, WILDCARD,
};
use crate::core::{Command, CoreState, DomainEvent, EventMetadata, Feedback, Outcome};
use crate::projector::{create_projector, Projector};
use crate::state::{GetState, StateChanged, StateManager};
use futures::FutureExt;
use serde_json::json;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

/// Feedback published when no handler is registered for a command.
pub const NO_HANDLER_EXCEPTION: &str = "NO_HANDLER_EXCEPTION";
/// Feedback published when a handler fails or panics.
pub const UNHANDLED_HANDLER_EXCEPTION: &str = "UNHANDLED_HANDLER_EXCEPTION";
/// Feedback published when a domain-event or state listener fails.
pub const INTERNAL_LISTENER_ERROR: &str = "INTERNAL_LISTENER_ERROR";

/// Blueprint-driven state orchestration engine.
///
/// # Example
///
/// ```rust
/// use vds::blueprint::{Blueprint, ClusterBuilder, StateGroupDefinition, TransitionRule};
/// use vds::core::{Command, Outcome};
/// use vds::engine::{CommandHandlerMap, Engine};
/// use vds::state::GetState;
///
/// # let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
/// # rt.block_on(async {
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
/// let handlers = CommandHandlerMap::new().on("TURN_ON", |_state: GetState, _cmd: Command| async move {
///     Ok(vec![Outcome::event("SWITCHED_ON")])
/// });
///
/// let engine = Engine::new(blueprint, handlers);
/// engine.dispatch(Command::new("TURN_ON")).await;
///
/// assert_eq!(engine.get_state().value("Light", "power"), Some("on"));
/// # });
/// ```
pub struct Engine {
    blueprint: Blueprint,
    config: EngineConfig,
    state: Arc<StateManager>,
    domain_bus: EventBus<DomainEvent>,
    feedback_bus: Arc<EventBus<Feedback>>,
    handlers: CommandHandlerMap,
    projector: Arc<Projector>,
    _projection: Unsubscribe,
}

impl Engine {
    /// Engine with default configuration.
    ///
    /// Blueprint violations are logged, never fatal; use
    /// [`Engine::builder`] with [`BlueprintCheck::Deny`] to reject them.
    pub fn new(blueprint: Blueprint, handlers: CommandHandlerMap) -> Self {
        builder::warn_violations(&blueprint);
        Self::assemble(EngineBuilder::new(blueprint).handlers(handlers))
    }

    pub fn builder(blueprint: Blueprint) -> EngineBuilder {
        EngineBuilder::new(blueprint)
    }

    pub(crate) fn assemble(builder: EngineBuilder) -> Self {
        let EngineBuilder {
            blueprint,
            handlers,
            config,
            listener_error_handler,
            feedback_error_handler,
        } = builder;

        let feedback_bus = Arc::new(EventBus::with_error_handler(
            feedback_error_handler.unwrap_or_else(log_feedback_fault),
        ));
        let listener_errors = listener_error_handler
            .unwrap_or_else(|| report_as_feedback(Arc::clone(&feedback_bus)));

        let state = Arc::new(StateManager::with_error_handler(
            &blueprint,
            Arc::clone(&listener_errors),
        ));
        let domain_bus = EventBus::with_error_handler(listener_errors);
        let projector = Arc::new(create_projector(&blueprint));

        let projection = domain_bus.subscribe(
            WILDCARD,
            project_into(Arc::clone(&state), Arc::clone(&projector)),
        );

        tracing::debug!(
            target: "vds::engine",
            app = %blueprint.app_name,
            version = %blueprint.version,
            clusters = blueprint.clusters.len(),
            handlers = handlers.len(),
            "Engine assembled"
        );

        Self {
            blueprint,
            config,
            state,
            domain_bus,
            feedback_bus,
            handlers,
            projector,
            _projection: projection,
        }
    }

    /// Run `command` through its handler and route the outcomes.
    ///
    /// Always resolves; failures surface as error-level feedback.
    ///
    /// Dispatches are not serialized. A handler that reads state, awaits an
    /// external effect and only then decides what to emit can race another
    /// dispatch doing the same: both may see the same pre-state as valid and
    /// both emit events, applied in completion order. Callers that need
    /// exclusion must serialize conflicting commands themselves.
    pub async fn dispatch(&self, command: Command) {
        let correlation_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "dispatch",
            command = %command.name,
            correlation_id = %correlation_id
        );
        self.run(command, correlation_id).instrument(span).await
    }

    async fn run(&self, command: Command, correlation_id: Uuid) {
        let Some(handler) = self.handlers.get(&command.name) else {
            tracing::warn!(target: "vds::engine", "No handler registered for command");
            self.feedback_bus.publish(
                &Feedback::error(
                    NO_HANDLER_EXCEPTION,
                    format!("Command handler for \"{}\" does not exist.", command.name),
                )
                .with_payload(json!({})),
            );
            return;
        };

        let command_name = command.name.clone();
        let getter = GetState::new(Arc::clone(&self.state));
        // `handle` itself may panic before returning its future.
        let invocation = async { handler.handle(getter, command).await };
        let result = match AssertUnwindSafe(invocation).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => Err(panic_error(payload)),
        };

        match result {
            Ok(outcomes) => {
                tracing::debug!(target: "vds::engine", outcomes = outcomes.len(), "Handler completed");
                self.route(outcomes, correlation_id);
            }
            Err(error) => {
                tracing::warn!(target: "vds::engine", error = %error, "Command handler failed");
                self.feedback_bus.publish(
                    &Feedback::error(
                        UNHANDLED_HANDLER_EXCEPTION,
                        format!("Command handler for \"{command_name}\" threw an unhandled exception."),
                    )
                    .with_payload(json!({ "error": format!("{error:#}") })),
                );
            }
        }
    }

    fn route(&self, outcomes: Vec<Outcome>, correlation_id: Uuid) {
        for outcome in outcomes {
            match outcome {
                Outcome::Feedback(feedback) => self.feedback_bus.publish(&feedback),
                Outcome::Event(event) => {
                    let event = self.stamp(event, correlation_id);
                    tracing::debug!(target: "vds::engine", event = %event.name, "Publishing domain event");
                    self.domain_bus.publish(&event);
                }
            }
        }
    }

    fn stamp(&self, mut event: DomainEvent, correlation_id: Uuid) -> DomainEvent {
        if self.config.stamp_metadata && event.metadata.is_none() {
            event.metadata = Some(EventMetadata::now().correlated(correlation_id.to_string()));
        }
        event
    }

    /// Current state snapshot.
    pub fn get_state(&self) -> Arc<CoreState> {
        self.state.get_state()
    }

    /// Register a state-change listener.
    pub fn subscribe_to_state<F>(&self, listener: F) -> Unsubscribe
    where
        F: Fn(&Arc<CoreState>) + Send + Sync + 'static,
    {
        self.state.subscribe(listener)
    }

    /// Register a prepared state listener, keeping its identity.
    pub fn subscribe_to_state_listener(&self, listener: Listener<StateChanged>) -> Unsubscribe {
        self.state.subscribe_listener(listener)
    }

    /// Register a feedback listener for `event_name`, or for all feedback
    /// with [`WILDCARD`].
    pub fn subscribe_to_feedback<F>(&self, event_name: &str, listener: F) -> Unsubscribe
    where
        F: Fn(&Feedback) + Send + Sync + 'static,
    {
        self.feedback_bus.subscribe(
            event_name,
            Listener::sync(move |feedback: &Feedback| {
                listener(feedback);
                Ok(())
            }),
        )
    }

    /// Register a prepared feedback listener (fallible or deferred).
    pub fn subscribe_to_feedback_listener(
        &self,
        event_name: &str,
        listener: Listener<Feedback>,
    ) -> Unsubscribe {
        self.feedback_bus.subscribe(event_name, listener)
    }

    /// Observe domain events after they are published, e.g. to persist them.
    ///
    /// Wildcard listeners run after the state projection of the same event;
    /// listeners for a specific name run before it.
    pub fn subscribe_to_domain_events(
        &self,
        event_name: &str,
        listener: Listener<DomainEvent>,
    ) -> Unsubscribe {
        self.domain_bus.subscribe(event_name, listener)
    }

    pub fn blueprint(&self) -> &Blueprint {
        &self.blueprint
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn has_handler(&self, command_name: &str) -> bool {
        self.handlers.contains(command_name)
    }

    /// The compiled transition table.
    pub fn projector(&self) -> &Projector {
        &self.projector
    }
}

/// The sole coupling between the event layer and the state layer.
fn project_into(state: Arc<StateManager>, projector: Arc<Projector>) -> Listener<DomainEvent> {
    Listener::sync(move |event: &DomainEvent| {
        state.apply(|current| projector.project(current, event));
        Ok(())
    })
}

fn report_as_feedback(feedback_bus: Arc<EventBus<Feedback>>) -> ErrorHandler {
    Arc::new(move |fault: ListenerFault| {
        tracing::debug!(
            target: "vds::engine",
            event = %fault.event_name,
            error = %fault.error,
            "Listener fault reported as feedback"
        );
        feedback_bus.publish(
            &Feedback::error(
                INTERNAL_LISTENER_ERROR,
                format!("An error occurred in a listener for event: {}.", fault.event_name),
            )
            .with_payload(json!({ "error": format!("{:#}", fault.error) })),
        );
    })
}

/// Terminal policy for the feedback bus: republishing would loop.
fn log_feedback_fault() -> ErrorHandler {
    Arc::new(|fault: ListenerFault| {
        tracing::error!(
            target: "vds::engine",
            event = %fault.event_name,
            error = %fault.error,
            "Unhandled error in feedback listener; not republished"
        );
    })
}
