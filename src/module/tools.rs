//! One-shot operator commands to inspect and feed the event log

use super::options::RedisOptions;
use crate::domain::event::is_known;
use crate::domain::stream::BoundedContext;
use crate::library::communication::event::{
    ConsumerGroupDescriptor, EventData, EventEnvelope, EventLog, EventPublisher, MessageId,
    StreamDescriptor, StreamLocation,
};
use crate::library::communication::CommunicationFactory;
use crate::library::helpers::split_into_two;
use crate::library::BoxedError;
use serde_json::Value;
use structopt::StructOpt;
use tracing::{info, warn};

/// Options for publishing a single event
#[derive(Debug, StructOpt)]
pub struct PublishOptions {
    #[allow(missing_docs)]
    #[structopt(flatten)]
    pub redis: RedisOptions,

    /// Type of the event, e.g. `order.created`
    #[structopt(long = "type", value_name = "event-type")]
    pub event_type: String,

    /// Identifier of the entity the event belongs to
    #[structopt(long = "aggregate", value_name = "id")]
    pub aggregate_id: String,

    /// Payload as a JSON object
    #[structopt(long, default_value = "{}", parse(try_from_str = parse_data), value_name = "json")]
    pub data: EventData,

    /// Metadata attribute, may be repeated
    #[structopt(long = "meta", parse(try_from_str = parse_metadata), number_of_values = 1, value_name = "key=value")]
    pub metadata: Vec<(String, String)>,

    /// Stream to publish into, defaults to the stream of the event type's bounded context
    #[structopt(long)]
    pub stream: Option<String>,
}

impl PublishOptions {
    /// Stream the event is published into
    pub fn stream(&self) -> Result<String, BoxedError> {
        if let Some(stream) = &self.stream {
            return Ok(stream.clone());
        }

        BoundedContext::of_event_type(&self.event_type)
            .map(|context| context.stream().to_owned())
            .ok_or_else(|| {
                format!(
                    "no bounded context produces '{}', use --stream to choose a stream",
                    self.event_type
                )
                .into()
            })
    }

    /// Envelope described by the options
    pub fn envelope(&self) -> EventEnvelope {
        self.metadata.iter().fold(
            EventEnvelope::new(
                self.event_type.clone(),
                self.aggregate_id.clone(),
                self.data.clone(),
            ),
            |envelope, (key, value)| envelope.with_metadata(key.clone(), value.clone()),
        )
    }
}

/// Options for inspecting the pending entries of a consumer group
#[derive(Debug, StructOpt)]
pub struct PendingOptions {
    #[allow(missing_docs)]
    #[structopt(flatten)]
    pub redis: RedisOptions,

    /// Stream the group is attached to
    #[structopt(long)]
    pub stream: String,

    /// Name of the consumer group
    #[structopt(long)]
    pub group: String,
}

fn parse_data(src: &str) -> Result<EventData, String> {
    match serde_json::from_str(src) {
        Ok(Value::Object(data)) => Ok(data),
        Ok(other) => Err(format!("payload must be a JSON object but got {}", other)),
        Err(e) => Err(format!("payload is not valid JSON: {}", e)),
    }
}

fn parse_metadata(src: &str) -> Result<(String, String), String> {
    split_into_two(src, "=")
        .filter(|(key, _)| !key.is_empty())
        .ok_or_else(|| format!("expected <key>=<value> but got '{}'", src))
}

/// Publishes the event described by the options and returns the id assigned by the log
pub async fn publish<F: CommunicationFactory>(
    factory: &F,
    options: &PublishOptions,
) -> Result<MessageId, BoxedError> {
    if !is_known(&options.event_type) {
        warn!(
            event_type = options.event_type.as_str(),
            "Event type is not part of the catalog"
        );
    }

    let stream = StreamDescriptor::new(options.stream()?);
    let envelope = options.envelope();

    let publisher = factory.publisher(stream).await?;
    let result = publisher.publish(&envelope).await;
    publisher.close().await;

    let id = result?;
    info!(%id, event_id = envelope.id(), stream = publisher.stream().key(), "Published event");

    Ok(id)
}

/// Number of entries delivered to the group which have not been acknowledged yet
///
/// These are the entries whose handler failed or whose payload could not be decoded.
pub async fn pending<F: CommunicationFactory>(
    factory: &F,
    options: &PendingOptions,
) -> Result<usize, BoxedError> {
    let log = factory.event_log().await?;
    let result = log
        .pending(
            &StreamDescriptor::new(options.stream.clone()),
            &ConsumerGroupDescriptor::new(options.group.clone(), StreamLocation::Head),
        )
        .await;
    log.close().await;

    Ok(result?)
}
