use super::super::CodecError;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Globally unique identifier of an event
pub type EventId = String;

/// Schema-less mapping used for both the payload and the metadata of an event
pub type EventData = Map<String, Value>;

/// Well-known keys for cross-cutting [metadata](EventEnvelope::metadata) attributes
pub mod metadata {
    /// Identifier of the distributed trace the event has been emitted in
    pub const TRACE_ID: &str = "trace_id";
    /// Identifier of the user or system which caused the event
    pub const ACTOR: &str = "actor";
    /// Identifier shared by all events caused by the same initial request
    pub const CORRELATION_ID: &str = "correlation_id";
}

const FIRST_VERSION: u64 = 1;

fn first_version() -> u64 {
    FIRST_VERSION
}

/// Strongly typed payload which may be carried by an [`EventEnvelope`]
pub trait TypedEvent: Serialize + DeserializeOwned {
    /// Dotted, hierarchical event type used as the routing key
    const EVENT_TYPE: &'static str;

    /// Identifier of the domain entity which produced the event
    fn aggregate_id(&self) -> String;
}

/// Self-describing record of one domain event
///
/// Envelopes are value types. Once constructed, the identity fields can not be altered,
/// only enriched through the builder methods which consume and return the envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    id: EventId,
    #[serde(rename = "type")]
    event_type: String,
    aggregate_id: String,
    #[serde(default = "first_version")]
    version: u64,
    #[serde(default)]
    data: EventData,
    #[serde(default)]
    metadata: EventData,
    occurred_at: DateTime<Utc>,
}

impl EventEnvelope {
    /// Creates a new envelope with a freshly generated identifier, version 1, no metadata and the current time
    pub fn new(event_type: impl Into<String>, aggregate_id: impl Into<String>, data: EventData) -> Self {
        Self {
            id: generate_event_id(),
            event_type: event_type.into(),
            aggregate_id: aggregate_id.into(),
            version: FIRST_VERSION,
            data,
            metadata: EventData::new(),
            occurred_at: Utc::now(),
        }
    }

    /// Creates a new envelope from a strongly typed payload
    pub fn from_event<T: TypedEvent>(event: &T) -> Result<Self, CodecError> {
        let data = match serde_json::to_value(event).map_err(CodecError::Encode)? {
            Value::Object(data) => data,
            other => {
                return Err(CodecError::Malformed(format!(
                    "payload of {} is not an object but {}",
                    T::EVENT_TYPE,
                    other
                )))
            }
        };

        Ok(Self::new(T::EVENT_TYPE, event.aggregate_id(), data))
    }

    /// Adds a cross-cutting attribute, replacing any previous value for the same key
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Carries the trace over from the event which caused this one and correlates both
    ///
    /// The correlation id of the cause is kept if present, otherwise the id of the cause becomes the correlation id.
    pub fn caused_by(mut self, cause: &EventEnvelope) -> Self {
        if let Some(trace_id) = cause.metadata.get(metadata::TRACE_ID) {
            self.metadata
                .insert(metadata::TRACE_ID.to_owned(), trace_id.clone());
        }

        let correlation_id = cause
            .metadata
            .get(metadata::CORRELATION_ID)
            .cloned()
            .unwrap_or_else(|| Value::String(cause.id.clone()));

        self.metadata
            .insert(metadata::CORRELATION_ID.to_owned(), correlation_id);
        self
    }

    /// Sets the per-aggregate version for aggregates which already emitted events before
    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    /// Globally unique identifier assigned at construction
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Routing key of the event, e.g. `menu.item.availability.changed`
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Identifier of the domain entity which produced the event
    pub fn aggregate_id(&self) -> &str {
        &self.aggregate_id
    }

    /// Monotonic per-aggregate version, starting at 1
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Schema-less payload
    pub fn data(&self) -> &EventData {
        &self.data
    }

    /// Cross-cutting attributes like trace id, actor or correlation id
    pub fn metadata(&self) -> &EventData {
        &self.metadata
    }

    /// Wall-clock time in UTC at which the envelope has been constructed
    pub fn occurred_at(&self) -> &DateTime<Utc> {
        &self.occurred_at
    }

    /// Decodes the payload into a strongly typed event
    ///
    /// Fails if the envelope carries a different event type or the payload does not match the schema.
    pub fn payload<T: TypedEvent>(&self) -> Result<T, CodecError> {
        if self.event_type != T::EVENT_TYPE {
            return Err(CodecError::Malformed(format!(
                "expected event of type {} but got {}",
                T::EVENT_TYPE,
                self.event_type
            )));
        }

        serde_json::from_value(Value::Object(self.data.clone()))
            .map_err(|e| CodecError::Malformed(format!("payload of {}: {}", self.event_type, e)))
    }

    /// Serializes the envelope into its JSON wire format
    ///
    /// Envelopes which [`decode`](Self::decode) would reject are refused up front.
    pub fn encode(&self) -> Result<String, CodecError> {
        self.validate()?;
        serde_json::to_string(self).map_err(CodecError::Encode)
    }

    /// Parses an envelope from its JSON wire format
    ///
    /// Unknown fields are ignored. The `id`, `type`, `aggregate_id` and `occurred_at` fields are required
    /// and neither `id` nor `type` may be empty. A missing `version` defaults to 1 and missing
    /// `data` or `metadata` default to empty maps.
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let envelope: Self =
            serde_json::from_slice(bytes).map_err(|e| CodecError::Malformed(e.to_string()))?;

        envelope.validate()?;
        Ok(envelope)
    }

    fn validate(&self) -> Result<(), CodecError> {
        if self.event_type.is_empty() {
            return Err(CodecError::Malformed("event type is empty".into()));
        }

        if self.id.is_empty() {
            return Err(CodecError::Malformed("event id is empty".into()));
        }

        Ok(())
    }
}

/// Generates a collision resistant event identifier from a cryptographically seeded random source
fn generate_event_id() -> EventId {
    Uuid::new_v4().to_string()
}
