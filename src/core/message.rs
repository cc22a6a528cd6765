//! Commands, domain events and feedback.
//!
//! Commands express intent, domain events record facts that may drive a
//! state transition, and feedback carries transient leveled notifications
//! that never touch state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Anything published on an [`EventBus`](crate::bus::EventBus).
pub trait BusEvent: Send + Sync + 'static {
    /// Name used to select listeners.
    fn name(&self) -> &str;
}

/// A request submitted to the engine. Ephemeral, never stored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl Command {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            payload: None,
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }
}

/// Traceability data attached to a domain event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMetadata {
    pub event_id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub causation_id: Option<String>,
}

impl EventMetadata {
    /// Fresh metadata with a random event id, stamped now.
    pub fn now() -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            correlation_id: None,
            causation_id: None,
        }
    }

    pub fn correlated(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn caused_by(mut self, causation_id: impl Into<String>) -> Self {
        self.causation_id = Some(causation_id.into());
        self
    }
}

/// A fact that may drive a state transition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<EventMetadata>,
}

impl DomainEvent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            payload: None,
            metadata: None,
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_metadata(mut self, metadata: EventMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

impl BusEvent for DomainEvent {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Severity of a feedback notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl FeedbackLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for FeedbackLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A transient, leveled, human-readable notification.
///
/// Feedback never affects [`CoreState`](crate::core::CoreState) and is lost
/// if nobody is subscribed when it is published.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub name: String,
    pub level: FeedbackLevel,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl Feedback {
    pub fn new(name: impl Into<String>, level: FeedbackLevel, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            level,
            message: message.into(),
            payload: None,
        }
    }

    pub fn info(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(name, FeedbackLevel::Info, message)
    }

    pub fn success(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(name, FeedbackLevel::Success, message)
    }

    pub fn warning(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(name, FeedbackLevel::Warning, message)
    }

    pub fn error(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(name, FeedbackLevel::Error, message)
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }
}

impl BusEvent for Feedback {
    fn name(&self) -> &str {
        &self.name
    }
}

/// One item of a command handler's result.
///
/// The variant decides routing: `Event` goes to the domain bus and may change
/// state, `Feedback` goes to the feedback bus and never does.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Event(DomainEvent),
    Feedback(Feedback),
}

impl Outcome {
    /// Shorthand for a payload-less domain event.
    pub fn event(name: impl Into<String>) -> Self {
        Self::Event(DomainEvent::new(name))
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Event(event) => &event.name,
            Self::Feedback(feedback) => &feedback.name,
        }
    }
}

impl From<DomainEvent> for Outcome {
    fn from(event: DomainEvent) -> Self {
        Self::Event(event)
    }
}

impl From<Feedback> for Outcome {
    fn from(feedback: Feedback) -> Self {
        Self::Feedback(feedback)
    }
}
