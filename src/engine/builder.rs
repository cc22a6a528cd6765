//! Builder for constructing engines.

use crate::blueprint::{Blueprint, BuildError};
use crate::bus::ErrorHandler;
use crate::core::Command;
use crate::engine::config::{BlueprintCheck, EngineConfig};
use crate::engine::handler::{CommandHandler, CommandHandlerMap, HandlerResult};
use crate::engine::Engine;
use crate::state::GetState;
use std::future::Future;

/// Builder for constructing engines with a fluent API.
pub struct EngineBuilder {
    pub(crate) blueprint: Blueprint,
    pub(crate) handlers: CommandHandlerMap,
    pub(crate) config: EngineConfig,
    pub(crate) listener_error_handler: Option<ErrorHandler>,
    pub(crate) feedback_error_handler: Option<ErrorHandler>,
}

impl EngineBuilder {
    /// Create a new builder around `blueprint`.
    pub fn new(blueprint: Blueprint) -> Self {
        Self {
            blueprint,
            handlers: CommandHandlerMap::new(),
            config: EngineConfig::default(),
            listener_error_handler: None,
            feedback_error_handler: None,
        }
    }

    /// Add every handler in `handlers`.
    pub fn handlers(mut self, handlers: CommandHandlerMap) -> Self {
        self.handlers.extend(handlers);
        self
    }

    /// Register a single handler.
    pub fn handler<H>(mut self, command_name: impl Into<String>, handler: H) -> Self
    where
        H: CommandHandler + 'static,
    {
        self.handlers.insert(command_name, handler);
        self
    }

    /// Register an async closure as a handler.
    pub fn on<F, Fut>(mut self, command_name: impl Into<String>, f: F) -> Self
    where
        F: Fn(GetState, Command) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.handlers = self.handlers.on(command_name, f);
        self
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn blueprint_check(mut self, check: BlueprintCheck) -> Self {
        self.config.blueprint_check = check;
        self
    }

    pub fn stamp_metadata(mut self, enabled: bool) -> Self {
        self.config.stamp_metadata = enabled;
        self
    }

    /// Policy for faults in domain-event and state listeners.
    ///
    /// Defaults to publishing an `INTERNAL_LISTENER_ERROR` feedback.
    pub fn on_listener_error(mut self, handler: ErrorHandler) -> Self {
        self.listener_error_handler = Some(handler);
        self
    }

    /// Policy for faults in feedback listeners.
    ///
    /// Defaults to logging. Must not publish feedback itself.
    pub fn on_feedback_error(mut self, handler: ErrorHandler) -> Self {
        self.feedback_error_handler = Some(handler);
        self
    }

    /// Build the engine.
    /// Returns an error if the blueprint is rejected by the configured check.
    pub fn build(self) -> Result<Engine, BuildError> {
        check_blueprint(&self.blueprint, self.config.blueprint_check)?;
        Ok(Engine::assemble(self))
    }
}

pub(crate) fn check_blueprint(
    blueprint: &Blueprint,
    check: BlueprintCheck,
) -> Result<(), BuildError> {
    match check {
        BlueprintCheck::Off => Ok(()),
        BlueprintCheck::Warn => {
            warn_violations(blueprint);
            Ok(())
        }
        BlueprintCheck::Deny => {
            let violations = blueprint.violations();
            if violations.is_empty() {
                Ok(())
            } else {
                Err(BuildError::InvalidBlueprint(violations))
            }
        }
    }
}

/// Log every violation in `blueprint`; never fails.
pub(crate) fn warn_violations(blueprint: &Blueprint) {
    for violation in blueprint.violations() {
        tracing::warn!(
            target: "vds::engine",
            app = %blueprint.app_name,
            violation = %violation,
            "Blueprint violation"
        );
    }
}
