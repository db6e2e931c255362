use super::super::super::{BoxedError, EmptyResult};
use super::{EventEnvelope, MessageId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Entity which processes [`EventEnvelopes`](EventEnvelope) of one or more event types
///
/// Handlers may be invoked more than once for the same event and must thus be idempotent,
/// either keyed by the event id or by a natural business key.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Processes an envelope and returns whether it succeeded or failed
    async fn handle(&self, context: &HandlerContext, envelope: &EventEnvelope) -> EmptyResult;
}

/// [`EventHandler`] backed by a closure, created with [`handler_fn`]
pub struct HandlerFn<F> {
    f: F,
}

/// Wraps a closure returning a future into an [`EventHandler`]
///
/// The closure receives owned copies of the context and envelope.
pub fn handler_fn<F, Fut>(f: F) -> HandlerFn<F>
where
    F: Fn(HandlerContext, EventEnvelope) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = EmptyResult> + Send + 'static,
{
    HandlerFn { f }
}

#[async_trait]
impl<F, Fut> EventHandler for HandlerFn<F>
where
    F: Fn(HandlerContext, EventEnvelope) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = EmptyResult> + Send + 'static,
{
    async fn handle(&self, context: &HandlerContext, envelope: &EventEnvelope) -> EmptyResult {
        (self.f)(context.clone(), envelope.clone()).await
    }
}

/// Delivery information passed to [`EventHandlers`](EventHandler)
///
/// Carries a view of the consumer's stop signal so that long running handlers
/// may wind down early when the consumer is shutting down.
#[derive(Debug, Clone)]
pub struct HandlerContext {
    stream: String,
    group: String,
    consumer: String,
    message_id: MessageId,
    stop: watch::Receiver<bool>,
}

impl HandlerContext {
    /// Creates a new instance from raw parts
    pub fn new(
        stream: impl Into<String>,
        group: impl Into<String>,
        consumer: impl Into<String>,
        message_id: MessageId,
        stop: watch::Receiver<bool>,
    ) -> Self {
        Self {
            stream: stream.into(),
            group: group.into(),
            consumer: consumer.into(),
            message_id,
            stop,
        }
    }

    /// Stream the envelope has been read from
    pub fn stream(&self) -> &str {
        &self.stream
    }

    /// Consumer group the envelope has been delivered to
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Consumer the envelope has been delivered to
    pub fn consumer(&self) -> &str {
        &self.consumer
    }

    /// Identifier the log assigned to the record
    pub fn message_id(&self) -> MessageId {
        self.message_id
    }

    /// Whether the consumer has been asked to stop
    pub fn is_cancelled(&self) -> bool {
        *self.stop.borrow()
    }

    /// Resolves once the consumer has been asked to stop
    pub async fn cancelled(&self) {
        stopped(&mut self.stop.clone()).await
    }
}

/// Resolves once the value of the channel turns true or its sender is gone
pub(super) async fn stopped(stop: &mut watch::Receiver<bool>) {
    loop {
        if *stop.borrow() {
            return;
        }

        if stop.changed().await.is_err() {
            return;
        }
    }
}

/// Binding of a handler to a set of event types
#[derive(Clone)]
pub struct Subscription {
    event_types: Vec<String>,
    handler: Arc<dyn EventHandler>,
}

impl Subscription {
    /// Creates a new instance binding the handler to every listed type
    pub fn new<H: EventHandler + 'static>(event_types: &[&str], handler: H) -> Self {
        Self::shared(event_types, Arc::new(handler))
    }

    /// Creates a new instance from a handler that is shared with other subscriptions
    pub fn shared(event_types: &[&str], handler: Arc<dyn EventHandler>) -> Self {
        Self {
            event_types: event_types.iter().map(|t| (*t).to_owned()).collect(),
            handler,
        }
    }

    /// Event types the handler is bound to
    pub fn event_types(&self) -> &[String] {
        &self.event_types
    }
}

/// Outcome of routing an envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routing {
    /// Handler has been invoked and succeeded
    Handled,
    /// No handler is registered for the event type, the envelope has been skipped
    NoHandler,
}

/// Registry which maps event types to handlers and routes envelopes to them
///
/// Registration is intended to happen before the owning consumer is started,
/// afterwards the registry is only read.
#[derive(Clone, Default)]
pub struct Dispatcher {
    handlers: HashMap<String, Arc<dyn EventHandler>>,
}

impl Dispatcher {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the handler for each type, replacing previously registered handlers
    pub fn subscribe(&mut self, subscription: Subscription) {
        for event_type in subscription.event_types {
            self.handlers
                .insert(event_type, subscription.handler.clone());
        }
    }

    /// Sorted list of all event types with a registered handler
    pub fn event_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// Invokes the handler registered for the envelope's type
    ///
    /// Envelopes without a registered handler are skipped and reported as [`Routing::NoHandler`]
    /// so that types unknown to this service can not wedge the consumer group.
    /// Handler errors are propagated verbatim.
    pub async fn route(
        &self,
        context: &HandlerContext,
        envelope: &EventEnvelope,
    ) -> Result<Routing, BoxedError> {
        match self.handlers.get(envelope.event_type()) {
            Some(handler) => {
                handler.handle(context, envelope).await?;
                Ok(Routing::Handled)
            }
            None => {
                info!(
                    message_id = %context.message_id(),
                    event_type = envelope.event_type(),
                    "no handler for {}",
                    envelope.event_type()
                );
                Ok(Routing::NoHandler)
            }
        }
    }
}
