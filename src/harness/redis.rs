use crate::library::communication::implementation::redis::{RedisEndpoint, RedisEventLog};
use crate::library::communication::{CommunicationFactory, LogError};
use async_trait::async_trait;

/// Communication factory opening a dedicated [`RedisEventLog`] for every publisher and consumer
#[derive(Debug, Clone)]
pub struct RedisCommunicationFactory {
    endpoint: RedisEndpoint,
}

impl RedisCommunicationFactory {
    /// Creates a new instance which connects to the given endpoint
    pub fn new(endpoint: RedisEndpoint) -> Self {
        Self { endpoint }
    }

    /// Server the factory connects to
    pub fn endpoint(&self) -> &RedisEndpoint {
        &self.endpoint
    }
}

#[async_trait]
impl CommunicationFactory for RedisCommunicationFactory {
    type EventLog = RedisEventLog;

    async fn event_log(&self) -> Result<Self::EventLog, LogError> {
        RedisEventLog::connect(&self.endpoint).await
    }
}
