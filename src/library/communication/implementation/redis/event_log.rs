use super::super::super::event::{
    ConsumerGroupDescriptor, EventLog, GroupCreation, MessageId, ReadCursor, RecordFields,
    StreamDescriptor, StreamLocation, StreamRecord,
};
use super::super::super::LogError;
use super::{
    classify, RedisEndpoint, BUSY_GROUP, STREAM_ID_ADDITIONS, STREAM_ID_HEAD, STREAM_ID_NEW,
    STREAM_ID_TAIL,
};
use async_trait::async_trait;
use redis::aio::{ConnectionManager, MultiplexedConnection};
use redis::streams::{StreamId, StreamMaxlen, StreamPendingReply, StreamReadOptions, StreamReadReply};
use redis::{AsyncCommands, AsyncConnectionConfig, Client, RedisResult};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, instrument, trace, warn};

/// Longest duration a single group read may block on the server
const MAX_BLOCK: Duration = Duration::from_secs(60);
/// Grace period on top of the block duration before a read is considered lost
const RESPONSE_GRACE: Duration = Duration::from_secs(10);
const CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);

/// Event log backed by Redis Streams
///
/// Blocking group reads are executed on a dedicated connection so that they do not stall
/// other commands, which share an automatically reconnecting [`ConnectionManager`].
/// The read connection is reopened on the next read after it has been dropped.
pub struct RedisEventLog {
    client: Client,
    manager: Mutex<Option<ConnectionManager>>,
    reader: tokio::sync::Mutex<LazyConnection<MultiplexedConnection>>,
    closed: AtomicBool,
}

impl RedisEventLog {
    /// Opens the connections to the given server
    #[instrument]
    pub async fn connect(endpoint: &RedisEndpoint) -> Result<Self, LogError> {
        let client = Client::open(endpoint.connection_info()).map_err(classify)?;

        let manager = ConnectionManager::new(client.clone())
            .await
            .map_err(classify)?;

        let reader = open_reader(&client).await?;

        debug!("Connected to redis");

        Ok(Self {
            client,
            manager: Mutex::new(Some(manager)),
            reader: tokio::sync::Mutex::new(LazyConnection::new(Some(reader))),
            closed: AtomicBool::new(false),
        })
    }

    fn manager(&self) -> Result<ConnectionManager, LogError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(LogError::Closed);
        }

        self.manager
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(LogError::Closed)
    }
}

/// Opens a connection whose responses may take as long as the longest blocking read
async fn open_reader(client: &Client) -> Result<MultiplexedConnection, LogError> {
    let config = AsyncConnectionConfig::new()
        .set_response_timeout(MAX_BLOCK + RESPONSE_GRACE)
        .set_connection_timeout(CONNECTION_TIMEOUT);

    client
        .get_multiplexed_async_connection_with_config(&config)
        .await
        .map_err(classify)
}

/// Connection which is opened on demand and discarded after transport failures
///
/// Multiplexed connections never recover from a dropped socket on their own.
struct LazyConnection<C> {
    connection: Option<C>,
}

impl<C> LazyConnection<C> {
    fn new(connection: Option<C>) -> Self {
        Self { connection }
    }

    async fn get_or_open<F, Fut>(&mut self, open: F) -> Result<&mut C, LogError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<C, LogError>>,
    {
        if self.connection.is_none() {
            self.connection = Some(open().await?);
            debug!("Reopened redis read connection");
        }

        self.connection.as_mut().ok_or(LogError::Closed)
    }

    /// Drops the connection if the error indicates that it is no longer usable
    fn discard_if_unreachable(&mut self, error: &LogError) -> bool {
        if error.is_retryable() && self.connection.take().is_some() {
            warn!(%error, "Dropped redis read connection");
            true
        } else {
            false
        }
    }

    fn take(&mut self) -> Option<C> {
        self.connection.take()
    }
}

fn parse_id(id: &str) -> Result<MessageId, LogError> {
    id.parse()
        .map_err(|e| LogError::Rejected(Box::new(e)))
}

/// Converts an entry, dropping field values which are not valid UTF-8 strings
///
/// Entries whose record has been trimmed while pending come back without fields
/// and will subsequently be treated as malformed.
fn into_record(entry: StreamId) -> Result<StreamRecord, LogError> {
    let id = parse_id(&entry.id)?;

    let fields: RecordFields = entry
        .map
        .iter()
        .filter_map(|(key, value)| {
            redis::from_redis_value::<String>(value)
                .ok()
                .map(|value| (key.clone(), value))
        })
        .collect();

    Ok(StreamRecord::new(id, fields))
}

#[async_trait]
impl EventLog for RedisEventLog {
    async fn ping(&self) -> Result<(), LogError> {
        let mut con = self.manager()?;
        let _pong: String = redis::cmd("PING")
            .query_async(&mut con)
            .await
            .map_err(classify)?;

        Ok(())
    }

    async fn append(
        &self,
        stream: &StreamDescriptor,
        fields: &RecordFields,
    ) -> Result<MessageId, LogError> {
        let mut con = self.manager()?;
        let items: Vec<(&str, &str)> = fields
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
            .collect();

        let result: RedisResult<String> = match stream.limit() {
            Some(limit) => {
                con.xadd_maxlen(
                    stream.key(),
                    StreamMaxlen::Approx(limit),
                    STREAM_ID_NEW,
                    items.as_slice(),
                )
                .await
            }
            None => con.xadd(stream.key(), STREAM_ID_NEW, items.as_slice()).await,
        };

        parse_id(&result.map_err(classify)?)
    }

    async fn create_group(
        &self,
        stream: &StreamDescriptor,
        group: &ConsumerGroupDescriptor,
    ) -> Result<GroupCreation, LogError> {
        let mut con = self.manager()?;
        let start_id = match group.start() {
            StreamLocation::Head => STREAM_ID_HEAD,
            StreamLocation::Tail => STREAM_ID_TAIL,
        };

        let result: RedisResult<()> = con
            .xgroup_create_mkstream(stream.key(), group.identifier(), start_id)
            .await;

        match result {
            Ok(()) => Ok(GroupCreation::Created),
            Err(e) if e.code() == Some(BUSY_GROUP) => Ok(GroupCreation::AlreadyExists),
            Err(e) => Err(classify(e)),
        }
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
        if self.closed.load(Ordering::SeqCst) {
            return Err(LogError::Closed);
        }

        let mut options = StreamReadOptions::default()
            .group(group.identifier(), consumer)
            .count(count.max(1));

        let id = match cursor {
            ReadCursor::New => {
                // Redis interprets a zero block duration as "wait forever"
                if !block.is_zero() {
                    let millis = usize::try_from(block.min(MAX_BLOCK).as_millis()).unwrap_or(1);
                    options = options.block(millis.max(1));
                }

                STREAM_ID_ADDITIONS.to_owned()
            }
            ReadCursor::Pending(after) => after.to_string(),
        };

        let mut reader = self.reader.lock().await;

        // Checked again as the log may have been closed while waiting for the lock
        if self.closed.load(Ordering::SeqCst) {
            return Err(LogError::Closed);
        }

        let con = reader.get_or_open(|| open_reader(&self.client)).await?;

        let reply: RedisResult<Option<StreamReadReply>> = con
            .xread_options(&[stream.key()], &[id.as_str()], &options)
            .await;

        let reply = match reply.map_err(classify) {
            Ok(reply) => reply,
            Err(error) => {
                reader.discard_if_unreachable(&error);
                return Err(error);
            }
        };

        let records = reply
            .map(|reply| reply.keys)
            .unwrap_or_default()
            .into_iter()
            .flat_map(|key| key.ids)
            .map(into_record)
            .collect::<Result<Vec<_>, _>>()?;

        trace!(count = records.len(), %id, "Read from stream");

        Ok(records)
    }

    async fn acknowledge(
        &self,
        stream: &StreamDescriptor,
        group: &ConsumerGroupDescriptor,
        ids: &[MessageId],
    ) -> Result<usize, LogError> {
        let mut con = self.manager()?;
        let ids: Vec<String> = ids.iter().map(MessageId::to_string).collect();

        let result: RedisResult<usize> = con
            .xack(stream.key(), group.identifier(), ids.as_slice())
            .await;

        result.map_err(classify)
    }

    async fn pending(
        &self,
        stream: &StreamDescriptor,
        group: &ConsumerGroupDescriptor,
    ) -> Result<usize, LogError> {
        let mut con = self.manager()?;
        let result: RedisResult<StreamPendingReply> =
            con.xpending(stream.key(), group.identifier()).await;

        Ok(result.map_err(classify)?.count())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.manager
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.reader.lock().await.take();

        debug!("Closed redis connections");
    }
}
