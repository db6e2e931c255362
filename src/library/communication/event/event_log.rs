use super::super::LogError;
use super::{ConsumerGroupDescriptor, MessageId, RecordFields, StreamDescriptor, StreamRecord};
use async_trait::async_trait;
use std::time::Duration;

/// Position from which a group read delivers records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadCursor {
    /// Replays records which have been delivered to the reading consumer but
    /// not acknowledged yet, beginning after the given id. Never blocks.
    Pending(MessageId),
    /// Delivers records which have never been delivered to any consumer in the group
    New,
}

/// Outcome of a consumer group creation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupCreation {
    /// Group did not exist before
    Created,
    /// Group already existed and has been left untouched
    AlreadyExists,
}

/// Client of an append-only, ordered event log with consumer groups
///
/// Implementations must be safe to share between tasks. Once [`close`](EventLog::close)
/// has been called, every further operation fails with [`LogError::Closed`].
#[async_trait]
pub trait EventLog: Send + Sync {
    /// Verifies that the log is reachable
    async fn ping(&self) -> Result<(), LogError>;

    /// Appends a record to the stream, creating the stream if it does not exist
    async fn append(
        &self,
        stream: &StreamDescriptor,
        fields: &RecordFields,
    ) -> Result<MessageId, LogError>;

    /// Creates a consumer group on the stream, creating the stream if it does not exist
    async fn create_group(
        &self,
        stream: &StreamDescriptor,
        group: &ConsumerGroupDescriptor,
    ) -> Result<GroupCreation, LogError>;

    /// Reads up to `count` records for a consumer of a group
    ///
    /// When reading [`New`](ReadCursor::New) records, the call waits up to `block` for records to arrive.
    /// Every record returned for a new read becomes pending for the consumer. An empty result is not an error.
    async fn read_group(
        &self,
        stream: &StreamDescriptor,
        group: &ConsumerGroupDescriptor,
        consumer: &str,
        cursor: ReadCursor,
        count: usize,
        block: Duration,
    ) -> Result<Vec<StreamRecord>, LogError>;

    /// Removes records from the pending list of a group, returning how many were pending before
    async fn acknowledge(
        &self,
        stream: &StreamDescriptor,
        group: &ConsumerGroupDescriptor,
        ids: &[MessageId],
    ) -> Result<usize, LogError>;

    /// Number of records which have been delivered to a group but not acknowledged yet
    async fn pending(
        &self,
        stream: &StreamDescriptor,
        group: &ConsumerGroupDescriptor,
    ) -> Result<usize, LogError>;

    /// Releases the connection
    async fn close(&self);
}
