use super::super::super::helpers::Backoff;
use super::super::{ConsumerError, LogError};
use super::dispatcher::stopped;
use super::{
    ConsumerGroupDescriptor, ConsumerIdentifier, Dispatcher, EventLog, GroupCreation,
    HandlerContext, MessageId, ReadCursor, StreamDescriptor, StreamRecord, Subscription,
};
use crate::constants::{DEFAULT_BATCH_SIZE, DEFAULT_BLOCK_DURATION};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, info_span, instrument, trace, warn, Instrument};

/// Tunables of the consume loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsumerOptions {
    /// Maximum number of records read per poll, bounds the work done per iteration
    pub batch_size: usize,
    /// Maximum duration a poll waits for new records, caps the latency of idle wake-ups
    pub block: Duration,
}

impl Default for ConsumerOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            block: DEFAULT_BLOCK_DURATION,
        }
    }
}

/// Lifecycle state of a [`Consumer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    /// Connected and attached to its group but not consuming yet
    Constructed,
    /// Consume loop is active
    Running,
    /// Consume loop has terminated and the connection is released, this state is terminal
    Stopped,
}

/// Member of a consumer group which routes every record it receives through a [`Dispatcher`]
///
/// Records are acknowledged only after their handler succeeded or when no handler is registered
/// for their type. Failed or malformed records stay pending and are replayed when the consumer
/// is started the next time under the same name.
pub struct Consumer<L: EventLog + 'static> {
    log: Arc<L>,
    stream: StreamDescriptor,
    group: ConsumerGroupDescriptor,
    name: ConsumerIdentifier,
    options: ConsumerOptions,
    dispatcher: Dispatcher,
    state: ConsumerState,
    stop: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl<L: EventLog + 'static> Consumer<L> {
    /// Verifies that the log is reachable and attaches to the group, creating it if necessary
    #[instrument(skip_all, fields(stream = stream.key(), group = group.identifier()))]
    pub async fn connect(
        log: L,
        stream: StreamDescriptor,
        group: ConsumerGroupDescriptor,
        name: impl Into<ConsumerIdentifier>,
        options: ConsumerOptions,
    ) -> Result<Self, ConsumerError> {
        log.ping().await.map_err(ConsumerError::Connect)?;

        match log.create_group(&stream, &group).await {
            Ok(GroupCreation::Created) => info!("Created consumer group"),
            Ok(GroupCreation::AlreadyExists) => debug!("Attached to existing consumer group"),
            Err(source) => {
                return Err(ConsumerError::GroupCreation {
                    group: group.identifier().to_owned(),
                    source,
                })
            }
        }

        let (stop, _) = watch::channel(false);

        Ok(Self {
            log: Arc::new(log),
            stream,
            group,
            name: name.into(),
            options,
            dispatcher: Dispatcher::new(),
            state: ConsumerState::Constructed,
            stop,
            task: None,
        })
    }

    /// Registers a handler, only effective before the consumer is started
    pub fn subscribe(&mut self, subscription: Subscription) {
        if self.state == ConsumerState::Constructed {
            self.dispatcher.subscribe(subscription);
        } else {
            warn!(
                consumer = self.name.as_str(),
                event_types = ?subscription.event_types(),
                "Ignoring subscription to a consumer that has already been started"
            );
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> ConsumerState {
        self.state
    }

    /// Name of the consumer within its group
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stream the consumer reads from
    pub fn stream(&self) -> &StreamDescriptor {
        &self.stream
    }

    /// Group the consumer is a member of
    pub fn group(&self) -> &ConsumerGroupDescriptor {
        &self.group
    }

    /// Event types with a registered handler
    pub fn event_types(&self) -> Vec<&str> {
        self.dispatcher.event_types()
    }

    /// Number of records delivered to the group which have not been acknowledged yet
    pub async fn pending(&self) -> Result<usize, LogError> {
        self.log.pending(&self.stream, &self.group).await
    }

    /// Spawns the consume loop onto the runtime
    pub fn start(&mut self) -> Result<(), ConsumerError> {
        match self.state {
            ConsumerState::Running => return Err(ConsumerError::StartTwice),
            ConsumerState::Stopped => return Err(ConsumerError::Closed),
            ConsumerState::Constructed => {}
        }

        let worker = Worker {
            log: self.log.clone(),
            stream: self.stream.clone(),
            group: self.group.clone(),
            name: self.name.clone(),
            options: self.options,
            dispatcher: self.dispatcher.clone(),
        };

        let span = info_span!(
            "consumer",
            stream = self.stream.key(),
            group = self.group.identifier(),
            consumer = self.name.as_str()
        );

        self.task = Some(tokio::spawn(
            worker.run(self.stop.subscribe()).instrument(span),
        ));
        self.state = ConsumerState::Running;

        Ok(())
    }

    /// Stops the consume loop and releases the connection
    ///
    /// A handler that is currently running is awaited (and its record acknowledged if it succeeds),
    /// records which have been read but not yet processed stay pending. Stopping an already stopped
    /// consumer has no effect.
    pub async fn stop(&mut self) {
        match self.state {
            ConsumerState::Stopped => return,
            ConsumerState::Constructed => {}
            ConsumerState::Running => {
                self.stop.send(true).ok();

                if let Some(task) = self.task.take() {
                    if let Err(e) = task.await {
                        error!(consumer = self.name.as_str(), error = ?e, "Consume loop terminated abnormally");
                    }
                }
            }
        }

        self.log.close().await;
        self.state = ConsumerState::Stopped;

        info!(
            stream = self.stream.key(),
            group = self.group.identifier(),
            consumer = self.name.as_str(),
            "Consumer stopped"
        );
    }
}

/// State moved into the task running the consume loop
struct Worker<L: EventLog> {
    log: Arc<L>,
    stream: StreamDescriptor,
    group: ConsumerGroupDescriptor,
    name: ConsumerIdentifier,
    options: ConsumerOptions,
    dispatcher: Dispatcher,
}

impl<L: EventLog> Worker<L> {
    /// Consumes records until the stop signal is raised
    ///
    /// Starts by replaying the records that are still pending for this consumer from a previous run
    /// and switches to new records once the replay comes back empty.
    async fn run(self, mut stop: watch::Receiver<bool>) {
        let mut cursor = ReadCursor::Pending(MessageId::ZERO);
        let mut backoff = Backoff::polling();

        info!("Consumer running");

        while !*stop.borrow() {
            let block = match cursor {
                ReadCursor::New => self.options.block,
                ReadCursor::Pending(_) => Duration::ZERO,
            };

            let result = self
                .log
                .read_group(
                    &self.stream,
                    &self.group,
                    &self.name,
                    cursor,
                    self.options.batch_size,
                    block,
                )
                .await;

            let records = match result {
                Ok(records) => {
                    backoff.reset();
                    records
                }
                Err(e) => {
                    let delay = backoff.next().unwrap_or(self.options.block);
                    let error = ConsumerError::Poll(e);
                    warn!(?error, ?delay, "Failed to poll the event log, backing off");

                    tokio::select! {
                        _ = sleep(delay) => {},
                        _ = stopped(&mut stop) => {},
                    }

                    continue;
                }
            };

            if let ReadCursor::Pending(_) = cursor {
                cursor = match records.last() {
                    Some(record) => ReadCursor::Pending(record.id()),
                    None => {
                        debug!("Replay of pending records finished");
                        ReadCursor::New
                    }
                };
            }

            for record in records {
                if *stop.borrow() {
                    break;
                }

                self.process(record, &stop).await;
            }
        }

        info!("Consume loop terminated");
    }

    async fn process(&self, record: StreamRecord, stop: &watch::Receiver<bool>) {
        let id = record.id();

        let envelope = match record.envelope() {
            Ok(envelope) => envelope,
            Err(e) => {
                let error = ConsumerError::from(e);
                warn!(message_id = %id, ?error, "Leaving malformed record pending");
                return;
            }
        };

        let context = HandlerContext::new(
            self.stream.key(),
            self.group.identifier(),
            &self.name,
            id,
            stop.clone(),
        );

        match self.dispatcher.route(&context, &envelope).await {
            Ok(routing) => {
                trace!(message_id = %id, ?routing, "Record processed");
                self.acknowledge(id).await;
            }
            Err(source) => {
                let error = ConsumerError::Handler {
                    event_type: envelope.event_type().to_owned(),
                    source,
                };

                warn!(
                    message_id = %id,
                    event_id = envelope.id(),
                    ?error,
                    "Handler failed, leaving record pending"
                );
            }
        }
    }

    async fn acknowledge(&self, id: MessageId) {
        if let Err(error) = self.log.acknowledge(&self.stream, &self.group, &[id]).await {
            warn!(message_id = %id, ?error, "Failed to acknowledge record");
        }
    }
}

#[cfg(test)]
mod does {
    use super::*;
    use crate::library::communication::event::{
        handler_fn, EventData, EventEnvelope, EventPublisher, Publisher, FIELD_EVENT_TYPE,
    };
    use crate::library::communication::implementation::memory::{MemoryBackend, MemoryEventLog};
    use crate::library::BoxedError;
    use pretty_assertions::assert_eq;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use tokio::time::timeout;

    const STREAM: &str = "order-events";
    const GROUP: &str = "kitchen-service-group";
    const CONSUMER: &str = "kitchen-service-consumer-1";

    fn options() -> ConsumerOptions {
        ConsumerOptions {
            batch_size: 10,
            block: Duration::from_millis(20),
        }
    }

    type Journal = Arc<Mutex<Vec<EventEnvelope>>>;

    fn journaling(journal: &Journal) -> Subscription {
        journaling_types(journal, &["order.created", "order.paid", "order.cancelled"])
    }

    fn journaling_types(journal: &Journal, types: &[&str]) -> Subscription {
        let journal = journal.clone();
        Subscription::new(
            types,
            handler_fn(move |_, envelope| {
                let journal = journal.clone();
                async move {
                    journal.lock().unwrap().push(envelope);
                    Ok(())
                }
            }),
        )
    }

    async fn consumer(backend: &MemoryBackend, name: &str) -> Consumer<MemoryEventLog> {
        Consumer::connect(backend.client(), STREAM.into(), GROUP.into(), name, options())
            .await
            .unwrap()
    }

    async fn publish(backend: &MemoryBackend, event_type: &str, aggregate_id: &str) -> MessageId {
        let mut data = EventData::new();
        data.insert("order_id".into(), aggregate_id.into());

        Publisher::new(backend.client(), STREAM.into())
            .publish(&EventEnvelope::new(event_type, aggregate_id, data))
            .await
            .unwrap()
    }

    async fn pending(backend: &MemoryBackend) -> usize {
        backend
            .client()
            .pending(&STREAM.into(), &GROUP.into())
            .await
            .unwrap()
    }

    async fn eventually(condition: impl Fn() -> bool) {
        timeout(Duration::from_secs(10), async {
            while !condition() {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition was not met in time");
    }

    async fn eventually_settled(backend: &MemoryBackend, expected_pending: usize) {
        timeout(Duration::from_secs(10), async {
            while pending(backend).await != expected_pending {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("pending list did not settle in time");
    }

    fn types(journal: &Journal) -> Vec<String> {
        journal
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.event_type().to_owned())
            .collect()
    }

    #[tokio::test]
    async fn deliver_published_envelopes() {
        let backend = MemoryBackend::new();
        let journal = Journal::default();
        let mut consumer = consumer(&backend, CONSUMER).await;
        consumer.subscribe(journaling(&journal));
        consumer.start().unwrap();

        let mut data = EventData::new();
        data.insert("order_id".into(), "O-1".into());
        data.insert("total_amount".into(), 42.5.into());
        let published = EventEnvelope::new("order.created", "O-1", data);
        Publisher::new(backend.client(), STREAM.into())
            .publish(&published)
            .await
            .unwrap();

        eventually(|| journal.lock().unwrap().len() == 1).await;
        consumer.stop().await;

        let received = journal.lock().unwrap()[0].clone();
        assert!(!received.id().is_empty());
        assert_eq!(received.event_type(), "order.created");
        assert_eq!(received.aggregate_id(), "O-1");
        assert_eq!(received.data()["total_amount"], 42.5);
        assert_eq!(received, published);
    }

    #[tokio::test]
    async fn route_subscribed_types_in_append_order() {
        let backend = MemoryBackend::new();
        let journal = Journal::default();
        let mut consumer = consumer(&backend, CONSUMER).await;
        consumer.subscribe(journaling(&journal));
        consumer.start().unwrap();

        publish(&backend, "order.created", "O-1").await;
        publish(&backend, "order.updated", "O-1").await;
        publish(&backend, "order.paid", "O-1").await;
        publish(&backend, "order.cancelled", "O-2").await;

        eventually(|| journal.lock().unwrap().len() == 3).await;
        eventually_settled(&backend, 0).await;
        consumer.stop().await;

        assert_eq!(
            types(&journal),
            vec!["order.created", "order.paid", "order.cancelled"]
        );
    }

    #[tokio::test]
    async fn acknowledge_and_skip_unknown_types() {
        let backend = MemoryBackend::new();
        let journal = Journal::default();
        let mut consumer = consumer(&backend, CONSUMER).await;
        consumer.subscribe(journaling(&journal));
        consumer.start().unwrap();

        publish(&backend, "order.refunded", "O-1").await;
        publish(&backend, "order.created", "O-2").await;

        eventually(|| journal.lock().unwrap().len() == 1).await;
        eventually_settled(&backend, 0).await;
        consumer.stop().await;

        assert_eq!(types(&journal), vec!["order.created"]);
        assert!(backend.pending_for(STREAM, GROUP, CONSUMER).is_empty());
    }

    #[tokio::test]
    async fn redeliver_failed_records_after_restart() {
        let backend = MemoryBackend::new();
        let attempts: Arc<Mutex<HashMap<String, usize>>> = Default::default();

        let subscription = {
            let attempts = attempts.clone();
            Subscription::new(
                &["order.created"],
                handler_fn(move |_, envelope| {
                    let attempts = attempts.clone();
                    async move {
                        let mut attempts = attempts.lock().unwrap();
                        let count = attempts
                            .entry(envelope.aggregate_id().to_owned())
                            .or_insert(0);
                        *count += 1;

                        if envelope.aggregate_id() == "O-1" && *count == 1 {
                            Err::<(), BoxedError>("printer out of paper".into())
                        } else {
                            Ok(())
                        }
                    }
                }),
            )
        };
        let attempts_of = |order: &str| attempts.lock().unwrap().get(order).copied().unwrap_or(0);

        let failing = publish(&backend, "order.created", "O-1").await;

        let mut first = consumer(&backend, CONSUMER).await;
        first.subscribe(subscription.clone());
        first.start().unwrap();
        eventually(|| attempts_of("O-1") == 1).await;
        first.stop().await;

        assert_eq!(backend.pending_for(STREAM, GROUP, CONSUMER), vec![failing]);

        let mut second = consumer(&backend, CONSUMER).await;
        second.subscribe(subscription.clone());
        second.start().unwrap();
        eventually_settled(&backend, 0).await;

        publish(&backend, "order.created", "O-2").await;
        eventually(|| attempts_of("O-2") == 1).await;
        eventually_settled(&backend, 0).await;
        second.stop().await;

        assert_eq!(attempts_of("O-1"), 2);

        let mut third = consumer(&backend, CONSUMER).await;
        third.subscribe(subscription);
        third.start().unwrap();

        publish(&backend, "order.created", "O-3").await;
        eventually(|| attempts_of("O-3") == 1).await;
        eventually_settled(&backend, 0).await;
        third.stop().await;

        assert_eq!(attempts_of("O-1"), 2);
        assert_eq!(attempts_of("O-2"), 1);
        assert!(backend.pending_for(STREAM, GROUP, CONSUMER).is_empty());
    }

    #[tokio::test]
    async fn drain_gracefully_on_stop() {
        let backend = MemoryBackend::new();
        let handled: Arc<Mutex<Vec<String>>> = Default::default();

        let subscription = {
            let handled = handled.clone();
            Subscription::new(
                &["order.created"],
                handler_fn(move |_, envelope| {
                    let handled = handled.clone();
                    async move {
                        sleep(Duration::from_millis(5)).await;
                        handled.lock().unwrap().push(envelope.id().to_owned());
                        Ok(())
                    }
                }),
            )
        };

        // Group has to exist before publishing so that every record is seen by it
        let mut first = consumer(&backend, CONSUMER).await;
        for i in 0..100 {
            publish(&backend, "order.created", &format!("O-{}", i)).await;
        }

        first.subscribe(subscription.clone());
        first.start().unwrap();
        eventually(|| handled.lock().unwrap().len() >= 5).await;

        timeout(Duration::from_secs(1), first.stop())
            .await
            .expect("consumer did not stop in time");

        let handled_before_restart = handled.lock().unwrap().len();
        let still_pending = backend.pending_for(STREAM, GROUP, CONSUMER).len();
        assert!(handled_before_restart < 100);
        assert_eq!(pending(&backend).await, still_pending);

        let mut second = consumer(&backend, CONSUMER).await;
        second.subscribe(subscription);
        second.start().unwrap();
        eventually(|| handled.lock().unwrap().len() >= 100).await;
        eventually_settled(&backend, 0).await;
        second.stop().await;

        let handled = handled.lock().unwrap();
        let unique: HashSet<&String> = handled.iter().collect();
        assert_eq!(handled.len(), 100);
        assert_eq!(unique.len(), 100);
    }

    #[tokio::test]
    async fn attach_concurrently_to_a_new_group() {
        let backend = MemoryBackend::new();
        let journal = Journal::default();

        let (mut a, mut b) = tokio::join!(
            consumer(&backend, "kitchen-service-consumer-1"),
            consumer(&backend, "kitchen-service-consumer-2")
        );

        a.subscribe(journaling(&journal));
        b.subscribe(journaling(&journal));
        a.start().unwrap();
        b.start().unwrap();

        assert_eq!(a.state(), ConsumerState::Running);
        assert_eq!(b.state(), ConsumerState::Running);

        for i in 0..20 {
            publish(&backend, "order.created", &format!("O-{}", i)).await;
        }

        eventually(|| journal.lock().unwrap().len() == 20).await;
        eventually_settled(&backend, 0).await;
        a.stop().await;
        b.stop().await;

        let ids: HashSet<String> = journal
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.id().to_owned())
            .collect();
        assert_eq!(ids.len(), 20);
    }

    #[tokio::test]
    async fn create_a_group_exactly_once() {
        let backend = MemoryBackend::new();
        let (a, b) = (backend.client(), backend.client());
        let stream: StreamDescriptor = "fresh-events".into();
        let group: ConsumerGroupDescriptor = GROUP.into();

        let (first, second) = tokio::join!(
            a.create_group(&stream, &group),
            b.create_group(&stream, &group)
        );

        let mut outcomes = vec![first.unwrap(), second.unwrap()];
        outcomes.sort_by_key(|o| *o == GroupCreation::AlreadyExists);
        assert_eq!(
            outcomes,
            vec![GroupCreation::Created, GroupCreation::AlreadyExists]
        );
    }

    #[tokio::test]
    async fn follow_its_state_machine() {
        let backend = MemoryBackend::new();

        let mut consumer = consumer(&backend, CONSUMER).await;
        assert_eq!(consumer.state(), ConsumerState::Constructed);

        consumer.start().unwrap();
        assert!(matches!(consumer.start(), Err(ConsumerError::StartTwice)));
        assert_eq!(consumer.state(), ConsumerState::Running);

        consumer.stop().await;
        assert_eq!(consumer.state(), ConsumerState::Stopped);
        assert!(matches!(consumer.start(), Err(ConsumerError::Closed)));

        consumer.stop().await;
        assert_eq!(consumer.state(), ConsumerState::Stopped);
    }

    #[tokio::test]
    async fn stop_without_being_started() {
        let backend = MemoryBackend::new();
        let mut consumer = consumer(&backend, CONSUMER).await;

        consumer.stop().await;

        assert_eq!(consumer.state(), ConsumerState::Stopped);
        assert!(matches!(consumer.pending().await, Err(LogError::Closed)));
    }

    #[tokio::test]
    async fn fail_to_connect_to_an_unreachable_log() {
        let backend = MemoryBackend::new();
        backend.set_reachable(false);

        let result = Consumer::connect(
            backend.client(),
            STREAM.into(),
            GROUP.into(),
            CONSUMER,
            options(),
        )
        .await;

        assert!(matches!(result, Err(ConsumerError::Connect(_))));
        assert!(!backend.has_stream(STREAM));
    }

    #[tokio::test]
    async fn recover_from_poll_failures() {
        let backend = MemoryBackend::new();
        let journal = Journal::default();
        let mut consumer = consumer(&backend, CONSUMER).await;
        consumer.subscribe(journaling(&journal));

        backend.fail_next_reads(2);
        consumer.start().unwrap();
        publish(&backend, "order.paid", "O-1").await;

        eventually(|| journal.lock().unwrap().len() == 1).await;
        consumer.stop().await;
    }

    #[tokio::test]
    async fn interrupt_the_backoff_when_stopped() {
        let backend = MemoryBackend::new();
        let mut consumer = consumer(&backend, CONSUMER).await;

        backend.fail_next_reads(usize::MAX);
        consumer.start().unwrap();
        sleep(Duration::from_millis(50)).await;

        timeout(Duration::from_millis(500), consumer.stop())
            .await
            .expect("backoff was not interrupted");
    }

    #[tokio::test]
    async fn leave_malformed_records_pending() {
        let backend = MemoryBackend::new();
        let journal = Journal::default();
        let mut consumer = consumer(&backend, CONSUMER).await;
        consumer.subscribe(journaling(&journal));
        consumer.start().unwrap();

        let mut fields = std::collections::BTreeMap::new();
        fields.insert(FIELD_EVENT_TYPE.to_owned(), "order.created".to_owned());
        let malformed = backend.append_raw(STREAM, fields);
        publish(&backend, "order.created", "O-1").await;

        eventually(|| journal.lock().unwrap().len() == 1).await;
        eventually_settled(&backend, 1).await;
        consumer.stop().await;

        assert_eq!(backend.pending_for(STREAM, GROUP, CONSUMER), vec![malformed]);
    }

    #[tokio::test]
    async fn let_handlers_observe_the_stop_signal() {
        let backend = MemoryBackend::new();
        let started = Arc::new(AtomicBool::new(false));
        let observed = Arc::new(AtomicBool::new(false));

        let mut consumer = consumer(&backend, CONSUMER).await;
        consumer.subscribe({
            let (started, observed) = (started.clone(), observed.clone());
            Subscription::new(
                &["order.created"],
                handler_fn(move |context, _| {
                    let (started, observed) = (started.clone(), observed.clone());
                    async move {
                        started.store(true, Ordering::SeqCst);
                        context.cancelled().await;
                        observed.store(true, Ordering::SeqCst);
                        Ok(())
                    }
                }),
            )
        });
        consumer.start().unwrap();

        publish(&backend, "order.created", "O-1").await;
        eventually(|| started.load(Ordering::SeqCst)).await;

        timeout(Duration::from_secs(1), consumer.stop())
            .await
            .expect("handler did not observe the stop signal");

        assert!(observed.load(Ordering::SeqCst));
        assert_eq!(pending(&backend).await, 0);
    }

    #[tokio::test]
    async fn ignore_subscriptions_after_start() {
        let backend = MemoryBackend::new();
        let journal = Journal::default();
        let mut consumer = consumer(&backend, CONSUMER).await;
        consumer.subscribe(journaling_types(&journal, &["order.paid"]));
        consumer.start().unwrap();

        consumer.subscribe(journaling_types(&journal, &["order.created"]));

        assert_eq!(consumer.event_types(), vec!["order.paid"]);
        consumer.stop().await;
    }
}
