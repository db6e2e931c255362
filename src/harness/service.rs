use super::{Heart, HeartStone, Module};
use crate::domain::stream::ConsumerBinding;
use crate::library::communication::event::{
    Consumer, ConsumerOptions, EventPublisher, Publisher, StreamDescriptor, Subscription,
};
use crate::library::communication::CommunicationFactory;
use crate::library::{BoxedError, EmptyResult};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

/// Event driven service which publishes into the stream of its bounded context
/// and consumes the stream of another context
pub trait Service: Send + Sync + Sized + 'static {
    /// Name of the service displayed in log messages
    const NAME: &'static str;
    /// Stream into which the service publishes
    const PUBLISHES: &'static str;
    /// Stream and consumer group the service attaches to
    const BINDING: ConsumerBinding;

    /// Configuration type passed to the service
    type Config: Send + Sync;

    /// Creates a new instance publishing through the given publisher
    fn instantiate(publisher: Arc<dyn EventPublisher>, config: &Self::Config) -> Self;

    /// Handlers to register with the consumer
    fn subscriptions(service: Arc<Self>) -> Vec<Subscription>;
}

/// [`Module`] which wires a [`Service`] to the event log and runs it until the process is told to terminate
///
/// The publisher and consumer are connected during startup. On shutdown the consumer is stopped
/// first, finishing its in-flight handler, and the publisher is closed last so that events emitted
/// by that final handler still make it into the log.
pub struct ServiceModule<S: Service, F: CommunicationFactory> {
    factory: F,
    config: S::Config,
    consumer_name: String,
    options: ConsumerOptions,
    service: Option<Arc<S>>,
    publisher: Option<Arc<Publisher<F::EventLog>>>,
    consumer: Option<Consumer<F::EventLog>>,
    heart: Option<Heart>,
    heart_stone: HeartStone,
}

impl<S: Service, F: CommunicationFactory> ServiceModule<S, F> {
    /// Creates a new module using the default consumer name of the service's binding
    pub fn new(factory: F, config: S::Config) -> Self {
        let (heart, heart_stone) = Heart::new();

        Self {
            factory,
            config,
            consumer_name: S::BINDING.consumer.to_owned(),
            options: ConsumerOptions::default(),
            service: None,
            publisher: None,
            consumer: None,
            heart: Some(heart),
            heart_stone,
        }
    }

    /// Joins the consumer group under a different name, e.g. when running multiple replicas
    pub fn with_consumer_name(mut self, name: impl Into<String>) -> Self {
        self.consumer_name = name.into();
        self
    }

    /// Overrides the tunables of the consume loop
    pub fn with_options(mut self, options: ConsumerOptions) -> Self {
        self.options = options;
        self
    }

    /// Handle to terminate the module from within the process
    pub fn heart_stone(&self) -> HeartStone {
        self.heart_stone.clone()
    }

    /// Service instance, available once the module has been started
    pub fn service(&self) -> Option<Arc<S>> {
        self.service.clone()
    }
}

#[async_trait]
impl<S: Service, F: CommunicationFactory> Module for ServiceModule<S, F> {
    async fn pre_startup(&mut self) -> EmptyResult {
        let binding = S::BINDING;

        let publisher = Arc::new(
            self.factory
                .publisher(StreamDescriptor::new(S::PUBLISHES))
                .await?,
        );
        self.publisher = Some(publisher.clone());

        let service = Arc::new(S::instantiate(publisher, &self.config));

        let mut consumer = self
            .factory
            .consumer(
                binding.stream_descriptor(),
                binding.group_descriptor(),
                self.consumer_name.clone(),
                self.options,
            )
            .await?;

        for subscription in S::subscriptions(service.clone()) {
            consumer.subscribe(subscription);
        }

        debug!(
            service = S::NAME,
            event_types = ?consumer.event_types(),
            "Service subscribed"
        );

        self.consumer = Some(consumer);
        self.service = Some(service);

        Ok(())
    }

    async fn run(&mut self) -> Result<Option<Heart>, BoxedError> {
        let consumer = self
            .consumer
            .as_mut()
            .ok_or("consumer has not been connected")?;

        consumer.start()?;

        info!(
            service = S::NAME,
            stream = S::BINDING.stream,
            group = S::BINDING.group,
            consumer = consumer.name(),
            "Service started"
        );

        Ok(self.heart.take())
    }

    async fn shutdown(&mut self) {
        if let Some(consumer) = self.consumer.as_mut() {
            consumer.stop().await;
        }

        if let Some(publisher) = self.publisher.as_ref() {
            publisher.close().await;
        }
    }
}

#[cfg(test)]
mod does {
    use super::*;
    use crate::domain::stream::{BoundedContext, ORDER_EVENTS};
    use crate::harness::{DeathReason, ModuleRunner, ModuleTerminationReason};
    use crate::library::communication::event::{
        handler_fn, ConsumerState, EventData, EventEnvelope, EventLog, StreamRecord,
    };
    use crate::library::communication::implementation::memory::MemoryBackend;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use tokio::time::sleep;

    const ECHOED: &str = "kitchen-echo";

    struct Echo {
        publisher: Arc<dyn EventPublisher>,
    }

    impl Service for Echo {
        const NAME: &'static str = "Echo";
        const PUBLISHES: &'static str = ECHOED;
        const BINDING: ConsumerBinding = ConsumerBinding {
            stream: ORDER_EVENTS,
            group: "echo-group",
            consumer: "echo-1",
            consumed_by: BoundedContext::Kitchen,
        };

        type Config = ();

        fn instantiate(publisher: Arc<dyn EventPublisher>, _config: &()) -> Self {
            Self { publisher }
        }

        fn subscriptions(service: Arc<Self>) -> Vec<Subscription> {
            vec![Subscription::new(
                &["order.created"],
                handler_fn(move |_, envelope| {
                    let service = service.clone();
                    async move {
                        let echo = EventEnvelope::new(
                            "kitchen.order.created",
                            envelope.aggregate_id(),
                            EventData::new(),
                        );
                        service.publisher.publish(&echo).await?;
                        Ok::<(), BoxedError>(())
                    }
                }),
            )]
        }
    }

    fn options() -> ConsumerOptions {
        ConsumerOptions {
            batch_size: 10,
            block: Duration::from_millis(20),
        }
    }

    async fn eventually(backend: &MemoryBackend, stream: &str, count: usize) {
        for _ in 0..200 {
            if backend.records(stream).len() >= count {
                return;
            }

            sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn wire_and_run_the_service() {
        let backend = MemoryBackend::new();
        let mut module = ServiceModule::<Echo, _>::new(backend.clone(), ()).with_options(options());

        module.pre_startup().await.unwrap();
        let heart = module.run().await.unwrap();
        assert!(heart.is_some());

        let order = EventEnvelope::new("order.created", "O-1", EventData::new());
        backend
            .client()
            .append(
                &StreamDescriptor::new(ORDER_EVENTS),
                &StreamRecord::fields_for(&order).unwrap(),
            )
            .await
            .unwrap();

        eventually(&backend, ECHOED, 1).await;
        let echoed = backend.records(ECHOED);
        assert_eq!(echoed.len(), 1);
        assert_eq!(echoed[0].envelope().unwrap().aggregate_id(), "O-1");

        module.shutdown().await;
        assert_eq!(
            module.consumer.as_ref().map(|c| c.state()),
            Some(ConsumerState::Stopped)
        );
    }

    #[tokio::test]
    async fn use_the_configured_consumer_name() {
        let backend = MemoryBackend::new();
        let mut module = ServiceModule::<Echo, _>::new(backend.clone(), ())
            .with_consumer_name("echo-2")
            .with_options(options());

        module.pre_startup().await.unwrap();

        assert_eq!(module.consumer.as_ref().map(|c| c.name()), Some("echo-2"));
        module.shutdown().await;
    }

    #[tokio::test]
    async fn fail_startup_when_the_log_is_unreachable() {
        let backend = MemoryBackend::new();
        backend.set_reachable(false);

        let module = ServiceModule::<Echo, _>::new(backend, ()).with_options(options());
        let reason = ModuleRunner::new(Duration::from_secs(1)).run(module).await;

        assert!(matches!(reason, ModuleTerminationReason::StartupFailed(_)));
        assert!(reason.is_failure());
    }

    #[tokio::test]
    async fn terminate_when_the_stone_is_thrown() {
        let backend = MemoryBackend::new();
        let module = ServiceModule::<Echo, _>::new(backend.clone(), ()).with_options(options());
        let mut stone = module.heart_stone();

        let run = tokio::spawn(async move { ModuleRunner::new(Duration::from_secs(1)).run(module).await });
        sleep(Duration::from_millis(50)).await;
        stone.kill("test finished".into()).await;

        let reason = run.await.unwrap();
        assert!(matches!(
            reason,
            ModuleTerminationReason::HeartDied(DeathReason::Killed(_))
        ));
        assert!(backend.has_stream(ORDER_EVENTS));
    }
}
