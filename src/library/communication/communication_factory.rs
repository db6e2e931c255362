use super::event::{
    Consumer, ConsumerGroupDescriptor, ConsumerOptions, EventLog, Publisher, StreamDescriptor,
};
use super::{ConsumerError, LogError};
use async_trait::async_trait;

/// Factory to provide log clients and the publishers and consumers built on top of them
///
/// Every publisher and consumer receives its own client which it owns exclusively.
#[async_trait]
pub trait CommunicationFactory: Send + Sync {
    /// [`EventLog`] implementation type
    type EventLog: EventLog + 'static;

    /// Opens a new client connection to the log
    async fn event_log(&self) -> Result<Self::EventLog, LogError>;

    /// Instantiates a new [`Publisher`] bound to the given stream after verifying that the log is reachable
    async fn publisher(
        &self,
        stream: StreamDescriptor,
    ) -> Result<Publisher<Self::EventLog>, LogError> {
        let log = self.event_log().await?;
        log.ping().await?;

        Ok(Publisher::new(log, stream))
    }

    /// Instantiates a new [`Consumer`] attached to the given group
    async fn consumer(
        &self,
        stream: StreamDescriptor,
        group: ConsumerGroupDescriptor,
        name: String,
        options: ConsumerOptions,
    ) -> Result<Consumer<Self::EventLog>, ConsumerError> {
        let log = self.event_log().await.map_err(ConsumerError::Connect)?;

        Consumer::connect(log, stream, group, name, options).await
    }
}
