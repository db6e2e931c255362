use crate::library::BoxedError;
use thiserror::Error;

/// Errors raised while converting between envelopes and their wire representation
#[derive(Debug, Error)]
pub enum CodecError {
    /// Envelope or payload could not be serialized
    #[error("event could not be serialized")]
    Encode(#[source] serde_json::Error),
    /// Record or envelope is missing required information or is not decodable
    #[error("malformed event: {0}")]
    Malformed(String),
}

/// Errors reported by an [`EventLog`](super::event::EventLog) implementation
#[derive(Debug, Error)]
pub enum LogError {
    /// Connection to the log could not be established or broke down
    #[error("event log is unreachable")]
    Unreachable(#[source] BoxedError),
    /// Log has been reached but refused to execute the command
    #[error("event log rejected the command")]
    Rejected(#[source] BoxedError),
    /// Operation has been attempted on a client that was closed before
    #[error("event log client has been closed")]
    Closed,
}

impl LogError {
    /// Whether retrying the same operation later might succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, LogError::Unreachable(_))
    }
}

/// Errors returned by a [`Publisher`](super::event::Publisher)
///
/// The publisher never retries internally, the retry policy belongs to the caller.
#[derive(Debug, Error)]
pub enum PublishError {
    /// Envelope could not be serialized, retrying will not help
    #[error("failed to encode event")]
    Encode(#[from] CodecError),
    /// Log did not accept the append
    #[error("event log did not accept the append (retryable: {retryable})")]
    Log {
        /// Whether the caller may retry the publish
        retryable: bool,
        /// Underlying log failure
        #[source]
        source: LogError,
    },
    /// Publisher has been closed
    #[error("publisher has been closed")]
    Closed,
}

impl PublishError {
    /// Whether retrying the same publish later might succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, PublishError::Log { retryable: true, .. })
    }
}

impl From<LogError> for PublishError {
    fn from(error: LogError) -> Self {
        match error {
            LogError::Closed => PublishError::Closed,
            source => PublishError::Log {
                retryable: source.is_retryable(),
                source,
            },
        }
    }
}

/// Errors related to a [`Consumer`](super::event::Consumer) and the processing of its entries
///
/// Only [`Connect`](ConsumerError::Connect), [`GroupCreation`](ConsumerError::GroupCreation),
/// [`StartTwice`](ConsumerError::StartTwice) and [`Closed`](ConsumerError::Closed) are ever returned to the caller.
/// The remaining variants are handled by the consume loop itself, which logs them and continues.
#[derive(Debug, Error)]
pub enum ConsumerError {
    /// Event log could not be reached during construction
    #[error("unable to reach the event log")]
    Connect(#[source] LogError),
    /// Event log rejected the creation of the consumer group
    #[error("event log rejected the creation of consumer group {group}")]
    GroupCreation {
        /// Name of the group that was supposed to be created
        group: String,
        /// Underlying log failure
        #[source]
        source: LogError,
    },
    /// Consumer is already running
    #[error("consumer has already been started")]
    StartTwice,
    /// Consumer has been stopped and can not be used anymore
    #[error("consumer has been stopped")]
    Closed,
    /// Reading from the event log failed
    #[error("failed to poll the event log")]
    Poll(#[source] LogError),
    /// Entry could not be decoded into an envelope
    #[error("entry could not be decoded")]
    Malformed(#[from] CodecError),
    /// Handler returned an error
    #[error("handler for {event_type} failed")]
    Handler {
        /// Type of the event that failed to be handled
        event_type: String,
        /// Error returned by the handler
        #[source]
        source: BoxedError,
    },
}

#[cfg(test)]
mod does {
    use super::*;

    #[test]
    fn classify_retryable_publish_errors() {
        let unreachable = PublishError::from(LogError::Unreachable("connection reset".into()));
        let rejected = PublishError::from(LogError::Rejected("message too large".into()));

        assert!(unreachable.is_retryable());
        assert!(!rejected.is_retryable());
    }

    #[test]
    fn map_closed_log_to_closed_publisher() {
        assert!(matches!(
            PublishError::from(LogError::Closed),
            PublishError::Closed
        ));
    }

    #[test]
    fn never_retry_encoding_failures() {
        let error = PublishError::from(CodecError::Malformed("type is empty".into()));
        assert!(!error.is_retryable());
    }
}
