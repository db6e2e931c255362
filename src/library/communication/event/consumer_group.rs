use super::StreamLocation;

/// Definition of a consumer group
///
/// Within a stream, a group of consumers collaborates to consume records.
/// Each record is only delivered to one consumer within the same group, identified
/// by its name. When it is created, the group starts processing records
/// from the provided [`StreamLocation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerGroupDescriptor {
    identifier: String,
    start: StreamLocation,
}

impl ConsumerGroupDescriptor {
    /// Creates a new instance from raw parts
    pub fn new(identifier: impl Into<String>, start: StreamLocation) -> Self {
        Self {
            identifier: identifier.into(),
            start,
        }
    }

    /// Unique identifier of the group
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Location from where a consumer group begins to consume records
    ///
    /// Note that it is not guaranteed that this will be honored (e.g. when the group already exists)!
    pub fn start(&self) -> StreamLocation {
        self.start
    }
}

impl From<&str> for ConsumerGroupDescriptor {
    /// Uses [`StreamLocation::Head`] so that a new group sees every retained record
    fn from(identifier: &str) -> Self {
        Self::new(identifier, StreamLocation::Head)
    }
}

/// Unique identifier of a consumer within a [`ConsumerGroup`](ConsumerGroupDescriptor)
pub type ConsumerIdentifier = String;
