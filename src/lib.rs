//! VDS: a blueprint-driven, event-sourced state engine
//!
//! Application behavior is declared up front as a [`Blueprint`] of small
//! state machines ("clusters"). At runtime every state change flows through
//! one pipeline:
//!
//! ```text
//! Command ─► CommandHandler ─► DomainEvent ─► Projector ─► CoreState
//!                          └─► Feedback (transient, never changes state)
//! ```
//!
//! The projection step is a pure function compiled from the blueprint.
//! Side effects live in handlers, and failures anywhere in the pipeline
//! surface as error-level [`Feedback`] rather than as errors returned to
//! the caller.
//!
//! # Core Concepts
//!
//! - **Blueprint**: clusters, their state groups and transition rules
//! - **Projector**: the event-indexed transition table built from a blueprint
//! - **StateManager**: owner of the current immutable snapshot
//! - **EventBus**: isolated publish/subscribe for events and feedback
//! - **Engine**: routes commands to handlers and handler outcomes to buses
//!
//! # Example
//!
//! ```rust
//! use vds::{Blueprint, Command, CommandHandlerMap, Engine, Outcome};
//! use vds::state::GetState;
//!
//! # let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! # rt.block_on(async {
//! let blueprint = Blueprint::from_json(r#"{
//!     "version": "1.0",
//!     "appName": "Door",
//!     "clusters": {
//!         "Door": {
//!             "stateGroups": {
//!                 "position": { "initial": "closed", "states": ["closed", "open"] }
//!             },
//!             "transitions": {
//!                 "on": { "DOOR_OPENED": { "target": { "position": "open" } } }
//!             }
//!         }
//!     }
//! }"#).unwrap();
//!
//! let handlers = CommandHandlerMap::new().on("OPEN", |_state: GetState, _cmd: Command| async move {
//!     Ok(vec![Outcome::event("DOOR_OPENED")])
//! });
//!
//! let engine = Engine::new(blueprint, handlers);
//! engine.dispatch(Command::new("OPEN")).await;
//!
//! assert_eq!(engine.get_state().value("Door", "position"), Some("open"));
//! # });
//! ```

pub mod blueprint;
pub mod bus;
pub mod core;
pub mod engine;
pub mod projector;
pub mod state;

// Re-export commonly used types
pub use blueprint::{Blueprint, BlueprintError, BuildError};
pub use bus::{EventBus, Listener, Unsubscribe, WILDCARD};
pub use core::{Command, CoreState, DomainEvent, Feedback, FeedbackLevel, Outcome};
pub use engine::{CommandHandler, CommandHandlerMap, Engine, EngineConfig, HandlerResult};
pub use projector::{create_projector, Projector};
pub use state::StateManager;
