use super::super::PublishError;
use super::{EventEnvelope, EventLog, MessageId, StreamDescriptor, StreamRecord};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, instrument};

/// Entity which may publish [`EventEnvelopes`](EventEnvelope)
///
/// Allows domain code to depend on the capability instead of a concrete log implementation.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Appends an envelope to the publisher's stream and returns the id assigned by the log
    async fn publish(&self, envelope: &EventEnvelope) -> Result<MessageId, PublishError>;
}

/// Publisher bound to a single stream, exclusively owning its log client
///
/// A publisher can be shared by any number of tasks, the log client handles the multiplexing.
/// It never retries internally, the retry policy belongs to the caller who may consult
/// [`PublishError::is_retryable`].
pub struct Publisher<L: EventLog> {
    log: L,
    stream: StreamDescriptor,
    closed: AtomicBool,
}

impl<L: EventLog> Publisher<L> {
    /// Creates a new instance which publishes to the given stream
    pub fn new(log: L, stream: StreamDescriptor) -> Self {
        Self {
            log,
            stream,
            closed: AtomicBool::new(false),
        }
    }

    /// Stream into which envelopes are published
    pub fn stream(&self) -> &StreamDescriptor {
        &self.stream
    }

    /// Releases the connection, further publishes fail with [`PublishError::Closed`]
    pub async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.log.close().await;
            debug!(stream = self.stream.key(), "Publisher closed");
        }
    }
}

#[async_trait]
impl<L: EventLog> EventPublisher for Publisher<L> {
    #[instrument(skip(self, envelope), fields(stream = self.stream.key(), event_type = envelope.event_type()))]
    async fn publish(&self, envelope: &EventEnvelope) -> Result<MessageId, PublishError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(PublishError::Closed);
        }

        let fields = StreamRecord::fields_for(envelope)?;
        let id = self.log.append(&self.stream, &fields).await?;

        debug!(%id, event_id = envelope.id(), "Published event");

        Ok(id)
    }
}
