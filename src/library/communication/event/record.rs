use super::super::CodecError;
use super::EventEnvelope;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Name of the record field carrying the event identifier
pub const FIELD_EVENT_ID: &str = "event_id";
/// Name of the record field carrying the event type
pub const FIELD_EVENT_TYPE: &str = "event_type";
/// Name of the record field carrying the aggregate identifier
pub const FIELD_AGGREGATE_ID: &str = "aggregate_id";
/// Name of the record field carrying the full envelope as JSON
pub const FIELD_DATA: &str = "data";
/// Name of the record field carrying the occurrence time in unix seconds
pub const FIELD_OCCURRED_AT: &str = "occurred_at";

/// Identifier assigned by the log to an appended record
///
/// Identifiers consist of a millisecond timestamp and a sequence number
/// and are totally ordered within one stream, but not across streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct MessageId {
    millis: u64,
    sequence: u64,
}

impl MessageId {
    /// Identifier which precedes every record ever appended
    pub const ZERO: MessageId = MessageId {
        millis: 0,
        sequence: 0,
    };

    /// Creates a new instance from raw parts
    pub fn new(millis: u64, sequence: u64) -> Self {
        Self { millis, sequence }
    }

    /// Millisecond timestamp part
    pub fn millis(&self) -> u64 {
        self.millis
    }

    /// Sequence number within the millisecond
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.millis, self.sequence)
    }
}

impl FromStr for MessageId {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || CodecError::Malformed(format!("invalid message id '{}'", s));

        let (millis, sequence) = match s.split_once('-') {
            Some((millis, sequence)) => (millis, sequence),
            None => (s, "0"),
        };

        Ok(Self {
            millis: millis.parse().map_err(|_| malformed())?,
            sequence: sequence.parse().map_err(|_| malformed())?,
        })
    }
}

/// Raw string fields of a record as stored in the log
pub type RecordFields = BTreeMap<String, String>;

/// Record read from a stream, consisting of its identifier and raw fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRecord {
    id: MessageId,
    fields: RecordFields,
}

impl StreamRecord {
    /// Creates a new instance from raw parts
    pub fn new(id: MessageId, fields: RecordFields) -> Self {
        Self { id, fields }
    }

    /// Builds the wire fields for an envelope
    ///
    /// The full envelope is serialized exactly once into the `data` field, the remaining
    /// fields duplicate routing information so that the log can be inspected without decoding.
    pub fn fields_for(envelope: &EventEnvelope) -> Result<RecordFields, CodecError> {
        let mut fields = RecordFields::new();

        fields.insert(FIELD_EVENT_ID.into(), envelope.id().to_owned());
        fields.insert(FIELD_EVENT_TYPE.into(), envelope.event_type().to_owned());
        fields.insert(FIELD_AGGREGATE_ID.into(), envelope.aggregate_id().to_owned());
        fields.insert(FIELD_DATA.into(), envelope.encode()?);
        fields.insert(
            FIELD_OCCURRED_AT.into(),
            envelope.occurred_at().timestamp().to_string(),
        );

        Ok(fields)
    }

    /// Identifier assigned by the log
    pub fn id(&self) -> MessageId {
        self.id
    }

    /// Raw value of a field
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// All raw fields
    pub fn fields(&self) -> &RecordFields {
        &self.fields
    }

    /// Decodes the envelope carried in the `data` field
    pub fn envelope(&self) -> Result<EventEnvelope, CodecError> {
        let data = self.field(FIELD_DATA).ok_or_else(|| {
            CodecError::Malformed(format!("record {} has no {} field", self.id, FIELD_DATA))
        })?;

        EventEnvelope::decode(data.as_bytes())
    }
}
