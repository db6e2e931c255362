//! In-process [`EventLog`] for tests and local experiments
//!
//! The [`MemoryBackend`] holds all streams and is shared by any number of
//! [`MemoryEventLog`] clients, mirroring how multiple processes talk to one log server.
//! It follows the semantics of Redis Streams closely, including lazy stream creation,
//! per-consumer pending lists and blocking reads, and allows injecting faults.

use super::super::event::{
    ConsumerGroupDescriptor, EventLog, GroupCreation, MessageId, ReadCursor, RecordFields,
    StreamDescriptor, StreamLocation, StreamRecord,
};
use super::super::{CommunicationFactory, LogError};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Notify;
use tokio::time::{timeout_at, Instant};

#[derive(Default)]
struct MemoryGroup {
    last_delivered: MessageId,
    /// Delivered but not yet acknowledged records and the consumer that owns them
    pending: BTreeMap<MessageId, String>,
}

#[derive(Default)]
struct MemoryStream {
    records: Vec<StreamRecord>,
    last_id: MessageId,
    groups: HashMap<String, MemoryGroup>,
}

impl MemoryStream {
    fn next_id(&self) -> MessageId {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();

        if millis > self.last_id.millis() {
            MessageId::new(millis, 0)
        } else {
            MessageId::new(self.last_id.millis(), self.last_id.sequence() + 1)
        }
    }
}

struct State {
    streams: HashMap<String, MemoryStream>,
    reachable: bool,
    failing_reads: usize,
    max_record_size: Option<usize>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            streams: HashMap::new(),
            reachable: true,
            failing_reads: 0,
            max_record_size: None,
        }
    }
}

impl State {
    fn ensure_reachable(&self) -> Result<(), LogError> {
        if self.reachable {
            Ok(())
        } else {
            Err(LogError::Unreachable("connection refused".into()))
        }
    }

    fn group_mut(&mut self, stream: &str, group: &str) -> Result<&mut MemoryGroup, LogError> {
        self.streams
            .get_mut(stream)
            .and_then(|s| s.groups.get_mut(group))
            .ok_or_else(|| no_group(stream, group))
    }
}

fn no_group(stream: &str, group: &str) -> LogError {
    LogError::Rejected(
        format!(
            "NOGROUP No such key '{}' or consumer group '{}'",
            stream, group
        )
        .into(),
    )
}

#[derive(Default)]
struct Shared {
    state: Mutex<State>,
    appended: Notify,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Storage shared by all [`MemoryEventLog`] clients created from it
#[derive(Clone, Default)]
pub struct MemoryBackend {
    shared: Arc<Shared>,
}

impl MemoryBackend {
    /// Creates an empty backend without any streams
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new client connected to this backend
    pub fn client(&self) -> MemoryEventLog {
        MemoryEventLog {
            shared: self.shared.clone(),
            closed: AtomicBool::new(false),
        }
    }

    /// Simulates the log becoming unreachable (or reachable again) for every client
    pub fn set_reachable(&self, reachable: bool) {
        self.shared.lock().reachable = reachable;
    }

    /// Lets the next `count` group reads fail as if the connection dropped
    pub fn fail_next_reads(&self, count: usize) {
        self.shared.lock().failing_reads = count;
    }

    /// Rejects appends whose serialized fields exceed the given number of bytes
    pub fn set_max_record_size(&self, bytes: Option<usize>) {
        self.shared.lock().max_record_size = bytes;
    }

    /// Snapshot of all records currently retained in a stream
    pub fn records(&self, stream: &str) -> Vec<StreamRecord> {
        self.shared
            .lock()
            .streams
            .get(stream)
            .map(|s| s.records.clone())
            .unwrap_or_default()
    }

    /// Whether the stream has been created
    pub fn has_stream(&self, stream: &str) -> bool {
        self.shared.lock().streams.contains_key(stream)
    }

    /// Identifiers of records pending for a specific consumer of a group
    pub fn pending_for(&self, stream: &str, group: &str, consumer: &str) -> Vec<MessageId> {
        self.shared
            .lock()
            .streams
            .get(stream)
            .and_then(|s| s.groups.get(group))
            .map(|g| {
                g.pending
                    .iter()
                    .filter(|(_, owner)| owner.as_str() == consumer)
                    .map(|(id, _)| *id)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Appends a record with arbitrary raw fields, bypassing any envelope encoding
    pub fn append_raw(&self, stream: &str, fields: RecordFields) -> MessageId {
        let mut state = self.shared.lock();
        let id = append_record(&mut state, &StreamDescriptor::new(stream), fields);
        drop(state);

        self.shared.appended.notify_waiters();
        id
    }
}

#[async_trait]
impl CommunicationFactory for MemoryBackend {
    type EventLog = MemoryEventLog;

    async fn event_log(&self) -> Result<Self::EventLog, LogError> {
        Ok(self.client())
    }
}

fn append_record(state: &mut State, descriptor: &StreamDescriptor, fields: RecordFields) -> MessageId {
    let stream = state
        .streams
        .entry(descriptor.key().to_owned())
        .or_default();

    let id = stream.next_id();
    stream.last_id = id;
    stream.records.push(StreamRecord::new(id, fields));

    if let Some(limit) = descriptor.limit() {
        let excess = stream.records.len().saturating_sub(limit);
        stream.records.drain(..excess);
    }

    id
}

/// Client of a [`MemoryBackend`]
///
/// Each client can be closed individually without affecting the backend or other clients.
pub struct MemoryEventLog {
    shared: Arc<Shared>,
    closed: AtomicBool,
}

impl MemoryEventLog {
    fn state(&self) -> Result<MutexGuard<'_, State>, LogError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(LogError::Closed);
        }

        let state = self.shared.lock();
        state.ensure_reachable()?;

        Ok(state)
    }

    fn deliver(
        &self,
        stream: &StreamDescriptor,
        group: &ConsumerGroupDescriptor,
        consumer: &str,
        cursor: ReadCursor,
        count: usize,
    ) -> Result<Vec<StreamRecord>, LogError> {
        let mut state = self.state()?;

        if state.failing_reads > 0 {
            state.failing_reads -= 1;
            return Err(LogError::Unreachable("connection reset by peer".into()));
        }

        let memory_stream = state
            .streams
            .get_mut(stream.key())
            .ok_or_else(|| no_group(stream.key(), group.identifier()))?;

        let records = &memory_stream.records;
        let memory_group = memory_stream
            .groups
            .get_mut(group.identifier())
            .ok_or_else(|| no_group(stream.key(), group.identifier()))?;

        let count = count.max(1);

        match cursor {
            ReadCursor::Pending(after) => {
                let ids: Vec<MessageId> = memory_group
                    .pending
                    .range(after..)
                    .filter(|(id, owner)| **id > after && owner.as_str() == consumer)
                    .map(|(id, _)| *id)
                    .take(count)
                    .collect();

                // Trimmed records stay pending but come back without fields, just like in Redis
                Ok(ids
                    .into_iter()
                    .map(|id| {
                        memory_stream_record(records, &id)
                            .unwrap_or_else(|| StreamRecord::new(id, RecordFields::new()))
                    })
                    .collect())
            }
            ReadCursor::New => {
                let last_delivered = memory_group.last_delivered;
                let delivered: Vec<StreamRecord> = records
                    .iter()
                    .filter(|record| record.id() > last_delivered)
                    .take(count)
                    .cloned()
                    .collect();

                for record in &delivered {
                    memory_group.pending.insert(record.id(), consumer.to_owned());
                    memory_group.last_delivered = record.id();
                }

                Ok(delivered)
            }
        }
    }
}

fn memory_stream_record(records: &[StreamRecord], id: &MessageId) -> Option<StreamRecord> {
    records
        .binary_search_by_key(id, StreamRecord::id)
        .ok()
        .map(|index| records[index].clone())
}

#[async_trait]
impl EventLog for MemoryEventLog {
    async fn ping(&self) -> Result<(), LogError> {
        self.state().map(|_| ())
    }

    async fn append(
        &self,
        stream: &StreamDescriptor,
        fields: &RecordFields,
    ) -> Result<MessageId, LogError> {
        let mut state = self.state()?;

        if let Some(max) = state.max_record_size {
            let size: usize = fields.iter().map(|(k, v)| k.len() + v.len()).sum();
            if size > max {
                return Err(LogError::Rejected(
                    format!("record of {} bytes exceeds the limit of {} bytes", size, max).into(),
                ));
            }
        }

        let id = append_record(&mut state, stream, fields.clone());
        drop(state);

        self.shared.appended.notify_waiters();
        Ok(id)
    }

    async fn create_group(
        &self,
        stream: &StreamDescriptor,
        group: &ConsumerGroupDescriptor,
    ) -> Result<GroupCreation, LogError> {
        let mut state = self.state()?;
        let memory_stream = state.streams.entry(stream.key().to_owned()).or_default();

        if memory_stream.groups.contains_key(group.identifier()) {
            return Ok(GroupCreation::AlreadyExists);
        }

        let last_delivered = match group.start() {
            StreamLocation::Head => MessageId::ZERO,
            StreamLocation::Tail => memory_stream.last_id,
        };

        memory_stream.groups.insert(
            group.identifier().to_owned(),
            MemoryGroup {
                last_delivered,
                pending: BTreeMap::new(),
            },
        );

        Ok(GroupCreation::Created)
    }

    async fn read_group(
        &self,
        stream: &StreamDescriptor,
        group: &ConsumerGroupDescriptor,
        consumer: &str,
        cursor: ReadCursor,
        count: usize,
        block: Duration,
    ) -> Result<Vec<StreamRecord>, LogError> {
        let deadline = Instant::now() + block;

        loop {
            // Registered before looking at the stream so that no append in between is missed
            let appended = self.shared.appended.notified();

            let records = self.deliver(stream, group, consumer, cursor, count)?;

            if !records.is_empty() || cursor != ReadCursor::New || block.is_zero() {
                return Ok(records);
            }

            if timeout_at(deadline, appended).await.is_err() {
                return Ok(Vec::new());
            }
        }
    }

    async fn acknowledge(
        &self,
        stream: &StreamDescriptor,
        group: &ConsumerGroupDescriptor,
        ids: &[MessageId],
    ) -> Result<usize, LogError> {
        let mut state = self.state()?;

        let acknowledged = match state.group_mut(stream.key(), group.identifier()) {
            Ok(memory_group) => ids
                .iter()
                .filter(|id| memory_group.pending.remove(id).is_some())
                .count(),
            Err(_) => 0,
        };

        Ok(acknowledged)
    }

    async fn pending(
        &self,
        stream: &StreamDescriptor,
        group: &ConsumerGroupDescriptor,
    ) -> Result<usize, LogError> {
        let mut state = self.state()?;
        let memory_group = state.group_mut(stream.key(), group.identifier())?;

        Ok(memory_group.pending.len())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        // Wake up blocked readers of this client so they observe the closure
        self.shared.appended.notify_waiters();
    }
}

#[cfg(test)]
mod does {
    use super::*;
    use pretty_assertions::assert_eq;

    const BLOCK: Duration = Duration::from_millis(50);

    fn fields(value: &str) -> RecordFields {
        let mut fields = RecordFields::new();
        fields.insert("data".into(), value.into());
        fields
    }

    fn descriptors() -> (StreamDescriptor, ConsumerGroupDescriptor) {
        ("order-events".into(), "kitchen".into())
    }

    #[tokio::test]
    async fn create_streams_lazily() {
        let backend = MemoryBackend::new();
        let log = backend.client();
        let (stream, group) = descriptors();

        assert!(!backend.has_stream("order-events"));
        assert_eq!(log.create_group(&stream, &group).await.unwrap(), GroupCreation::Created);
        assert!(backend.has_stream("order-events"));
        assert_eq!(
            log.create_group(&stream, &group).await.unwrap(),
            GroupCreation::AlreadyExists
        );
    }

    #[tokio::test]
    async fn deliver_each_record_to_one_consumer() {
        let backend = MemoryBackend::new();
        let log = backend.client();
        let (stream, group) = descriptors();
        log.create_group(&stream, &group).await.unwrap();

        for i in 0..4 {
            log.append(&stream, &fields(&i.to_string())).await.unwrap();
        }

        let a = log
            .read_group(&stream, &group, "a", ReadCursor::New, 3, BLOCK)
            .await
            .unwrap();
        let b = log
            .read_group(&stream, &group, "b", ReadCursor::New, 3, BLOCK)
            .await
            .unwrap();

        assert_eq!(a.len(), 3);
        assert_eq!(b.len(), 1);
        assert!(a.iter().all(|r| r.id() < b[0].id()));
        assert_eq!(log.pending(&stream, &group).await.unwrap(), 4);
        assert_eq!(backend.pending_for("order-events", "kitchen", "b"), vec![b[0].id()]);
    }

    #[tokio::test]
    async fn replay_pending_records_of_the_reader_only() {
        let backend = MemoryBackend::new();
        let log = backend.client();
        let (stream, group) = descriptors();
        log.create_group(&stream, &group).await.unwrap();

        log.append(&stream, &fields("1")).await.unwrap();
        log.append(&stream, &fields("2")).await.unwrap();

        let delivered = log
            .read_group(&stream, &group, "a", ReadCursor::New, 10, BLOCK)
            .await
            .unwrap();
        log.acknowledge(&stream, &group, &[delivered[0].id()])
            .await
            .unwrap();

        let replay = log
            .read_group(&stream, &group, "a", ReadCursor::Pending(MessageId::ZERO), 10, BLOCK)
            .await
            .unwrap();
        let foreign = log
            .read_group(&stream, &group, "b", ReadCursor::Pending(MessageId::ZERO), 10, BLOCK)
            .await
            .unwrap();
        let after = log
            .read_group(&stream, &group, "a", ReadCursor::Pending(delivered[1].id()), 10, BLOCK)
            .await
            .unwrap();

        assert_eq!(replay, vec![delivered[1].clone()]);
        assert!(foreign.is_empty());
        assert!(after.is_empty());
    }

    #[tokio::test]
    async fn wake_blocked_readers_on_append() {
        let backend = MemoryBackend::new();
        let reader = backend.client();
        let writer = backend.client();
        let (stream, group) = descriptors();
        reader.create_group(&stream, &group).await.unwrap();

        let read = tokio::spawn(async move {
            let (stream, group) = descriptors();
            reader
                .read_group(&stream, &group, "a", ReadCursor::New, 10, Duration::from_secs(10))
                .await
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        writer.append(&stream, &fields("late")).await.unwrap();

        let records = read.await.unwrap().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].field("data"), Some("late"));
    }

    #[tokio::test]
    async fn time_out_empty_blocking_reads() {
        let backend = MemoryBackend::new();
        let log = backend.client();
        let (stream, group) = descriptors();
        log.create_group(&stream, &group).await.unwrap();

        let records = log
            .read_group(&stream, &group, "a", ReadCursor::New, 10, BLOCK)
            .await
            .unwrap();

        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn start_groups_at_the_tail() {
        let backend = MemoryBackend::new();
        let log = backend.client();
        let stream: StreamDescriptor = "order-events".into();
        let group = ConsumerGroupDescriptor::new("late", StreamLocation::Tail);

        log.append(&stream, &fields("old")).await.unwrap();
        log.create_group(&stream, &group).await.unwrap();
        log.append(&stream, &fields("new")).await.unwrap();

        let records = log
            .read_group(&stream, &group, "a", ReadCursor::New, 10, BLOCK)
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].field("data"), Some("new"));
    }

    #[tokio::test]
    async fn reject_reads_from_unknown_groups() {
        let backend = MemoryBackend::new();
        let log = backend.client();
        let (stream, group) = descriptors();

        let result = log
            .read_group(&stream, &group, "a", ReadCursor::New, 10, BLOCK)
            .await;

        assert!(matches!(result, Err(LogError::Rejected(_))));
    }

    #[tokio::test]
    async fn cap_streams_at_their_limit() {
        let backend = MemoryBackend::new();
        let log = backend.client();
        let stream = StreamDescriptor::new("order-events").with_limit(2);

        for i in 0..5 {
            log.append(&stream, &fields(&i.to_string())).await.unwrap();
        }

        let data: Vec<String> = backend
            .records("order-events")
            .iter()
            .filter_map(|r| r.field("data").map(str::to_owned))
            .collect();

        assert_eq!(data, vec!["3", "4"]);
    }

    #[tokio::test]
    async fn inject_faults() {
        let backend = MemoryBackend::new();
        let log = backend.client();
        let (stream, group) = descriptors();
        log.create_group(&stream, &group).await.unwrap();

        backend.fail_next_reads(1);
        let failed = log
            .read_group(&stream, &group, "a", ReadCursor::New, 10, BLOCK)
            .await;
        let recovered = log
            .read_group(&stream, &group, "a", ReadCursor::New, 10, BLOCK)
            .await;

        assert!(matches!(failed, Err(LogError::Unreachable(_))));
        assert!(recovered.is_ok());

        backend.set_reachable(false);
        assert!(matches!(log.ping().await, Err(LogError::Unreachable(_))));
    }

    #[tokio::test]
    async fn close_clients_individually() {
        let backend = MemoryBackend::new();
        let closed = backend.client();
        let open = backend.client();

        closed.close().await;

        assert!(matches!(closed.ping().await, Err(LogError::Closed)));
        assert!(open.ping().await.is_ok());
    }
}
