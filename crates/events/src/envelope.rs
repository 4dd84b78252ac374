use std::collections::HashMap;

use chrono::{DateTime, Utc};
use common::{EntityId, Version};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{DomainEvent, EventType};

/// Unique identifier for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random event ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A domain event together with its delivery metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique identifier for this event.
    pub event_id: EventId,

    /// Write-store version of the entity after the originating commit.
    pub version: Version,

    /// When the originating write committed.
    pub occurred_at: DateTime<Utc>,

    #[serde(flatten)]
    pub event: DomainEvent,

    /// Additional metadata, such as a correlation id.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl EventEnvelope {
    /// Wraps an event with a fresh id and the current time.
    pub fn new(event: DomainEvent, version: Version) -> Self {
        Self {
            event_id: EventId::new(),
            version,
            occurred_at: Utc::now(),
            event,
            metadata: HashMap::new(),
        }
    }

    /// Creates a new event envelope builder.
    pub fn builder() -> EventEnvelopeBuilder {
        EventEnvelopeBuilder::default()
    }

    pub fn event_type(&self) -> EventType {
        self.event.event_type()
    }

    pub fn entity_id(&self) -> &EntityId {
        self.event.entity_id()
    }
}

/// Builder for constructing event envelopes.
#[derive(Debug, Default)]
pub struct EventEnvelopeBuilder {
    event_id: Option<EventId>,
    version: Option<Version>,
    occurred_at: Option<DateTime<Utc>>,
    event: Option<DomainEvent>,
    metadata: HashMap<String, serde_json::Value>,
}

impl EventEnvelopeBuilder {
    /// Sets the event ID. If not set, a new ID will be generated.
    pub fn event_id(mut self, id: EventId) -> Self {
        self.event_id = Some(id);
        self
    }

    pub fn version(mut self, version: Version) -> Self {
        self.version = Some(version);
        self
    }

    /// Sets the commit time. If not set, the current time will be used.
    pub fn occurred_at(mut self, at: DateTime<Utc>) -> Self {
        self.occurred_at = Some(at);
        self
    }

    pub fn event(mut self, event: DomainEvent) -> Self {
        self.event = Some(event);
        self
    }

    /// Adds a metadata entry.
    pub fn metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Builds the envelope, returning `None` if no event was set.
    ///
    /// A missing version defaults to [`Version::first`].
    pub fn build(self) -> Option<EventEnvelope> {
        Some(EventEnvelope {
            event_id: self.event_id.unwrap_or_default(),
            version: self.version.unwrap_or_else(Version::first),
            occurred_at: self.occurred_at.unwrap_or_else(Utc::now),
            event: self.event?,
            metadata: self.metadata,
        })
    }
}
