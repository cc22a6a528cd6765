//! Command handlers and the handler registry.

use crate::core::{Command, Outcome};
use crate::state::GetState;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// What a handler produces: zero or more outcomes, or a failure.
pub type HandlerResult = anyhow::Result<Vec<Outcome>>;

/// Application logic turning one command into events and feedback.
///
/// Handlers receive a live [`GetState`] accessor rather than a frozen
/// snapshot and may await external effects before deciding what to emit.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, state: GetState, command: Command) -> HandlerResult;
}

/// Adapter that turns an async closure into a [`CommandHandler`].
pub struct FnHandler<F> {
    f: F,
}

/// Wrap `f` as a command handler.
///
/// # Example
///
/// ```rust
/// use vds::core::{Command, Outcome};
/// use vds::engine::{handler_fn, CommandHandlerMap};
/// use vds::state::GetState;
///
/// let handlers = CommandHandlerMap::new().with(
///     "PLAY",
///     handler_fn(|_state: GetState, _command: Command| async move {
///         Ok(vec![Outcome::event("PLAYBACK_STARTED")])
///     }),
/// );
/// assert!(handlers.contains("PLAY"));
/// ```
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(GetState, Command) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send,
{
    FnHandler { f }
}

#[async_trait]
impl<F, Fut> CommandHandler for FnHandler<F>
where
    F: Fn(GetState, Command) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send,
{
    async fn handle(&self, state: GetState, command: Command) -> HandlerResult {
        (self.f)(state, command).await
    }
}

/// Handlers keyed by command name. Owned by the application and handed to
/// the engine at construction.
#[derive(Clone, Default)]
pub struct CommandHandlerMap {
    handlers: HashMap<String, Arc<dyn CommandHandler>>,
}

impl CommandHandlerMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `command_name`, replacing any previous one.
    pub fn insert<H>(&mut self, command_name: impl Into<String>, handler: H)
    where
        H: CommandHandler + 'static,
    {
        self.handlers.insert(command_name.into(), Arc::new(handler));
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with<H>(mut self, command_name: impl Into<String>, handler: H) -> Self
    where
        H: CommandHandler + 'static,
    {
        self.insert(command_name, handler);
        self
    }

    /// Register an async closure for `command_name`.
    pub fn on<F, Fut>(self, command_name: impl Into<String>, f: F) -> Self
    where
        F: Fn(GetState, Command) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.with(command_name, handler_fn(f))
    }

    pub fn get(&self, command_name: &str) -> Option<&Arc<dyn CommandHandler>> {
        self.handlers.get(command_name)
    }

    pub fn contains(&self, command_name: &str) -> bool {
        self.handlers.contains_key(command_name)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Merge `other` into this map; handlers in `other` win on conflict.
    pub fn extend(&mut self, other: CommandHandlerMap) {
        self.handlers.extend(other.handlers);
    }
}

impl fmt::Debug for CommandHandlerMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("CommandHandlerMap")
            .field("commands", &names)
            .finish()
    }
}
