//! [`EventLog`](super::super::event::EventLog) implementation using [Redis Streams](https://redis.io/topics/streams-intro)

const STREAM_ID_NEW: &str = "*";
const STREAM_ID_HEAD: &str = "0";
const STREAM_ID_TAIL: &str = "$";
const STREAM_ID_ADDITIONS: &str = ">";

/// Error code returned by `XGROUP CREATE` when the group exists already
const BUSY_GROUP: &str = "BUSYGROUP";

mod endpoint;
mod event_log;

pub use endpoint::*;
pub use event_log::*;

use super::super::LogError;
use redis::RedisError;

/// Sorts a redis error into transient transport failures and rejected commands
fn classify(error: RedisError) -> LogError {
    if error.is_connection_dropped()
        || error.is_io_error()
        || error.is_connection_refusal()
        || error.is_timeout()
    {
        LogError::Unreachable(Box::new(error))
    } else {
        LogError::Rejected(Box::new(error))
    }
}
