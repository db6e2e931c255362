//! Various options usable by modules
//!
//! The structs in this module allow other modules to flatten them into
//! their own options struct. This allows for a unified yet non-cluttered
//! option set.

use crate::harness::RedisCommunicationFactory;
use crate::library::communication::event::ConsumerOptions;
use crate::library::communication::implementation::redis::RedisEndpoint;
use crate::library::helpers::parse_millis;
use std::time::Duration;
use structopt::StructOpt;

/// Options for connecting to the Redis server
#[derive(Debug, StructOpt)]
pub struct RedisOptions {
    /// Hostname of the Redis server
    #[structopt(long = "redis-host", env = "REDIS_HOST", default_value = "localhost", value_name = "host")]
    pub host: String,

    /// Port of the Redis server
    #[structopt(long = "redis-port", env = "REDIS_PORT", default_value = "6379", value_name = "port")]
    pub port: u16,

    /// Password used to authenticate with the Redis server
    #[structopt(long = "redis-password", env = "REDIS_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Logical database to select
    #[structopt(long = "redis-db", env = "REDIS_DB", default_value = "0", value_name = "index")]
    pub db: i64,
}

impl RedisOptions {
    /// Server described by the options
    pub fn endpoint(&self) -> RedisEndpoint {
        RedisEndpoint::new(self.host.clone(), self.port)
            .with_password(self.password.clone())
            .with_db(self.db)
    }

    /// Factory connecting to the server described by the options
    pub fn factory(&self) -> RedisCommunicationFactory {
        RedisCommunicationFactory::new(self.endpoint())
    }
}

/// Options relevant for consuming a stream as part of a consumer group
#[derive(Debug, StructOpt)]
pub struct ConsumingOptions {
    /// Unique and stable name of this instance within its consumer group.
    /// Entries left pending by a previous run are only replayed when the
    /// name does not change across executions!
    #[structopt(long = "consumer", env = "CONSUMER_NAME", value_name = "name")]
    pub consumer: Option<String>,

    /// Maximum number of entries read per poll
    #[structopt(long, env = "CONSUMER_BATCH_SIZE", default_value = "10", value_name = "count")]
    pub batch_size: usize,

    /// Maximum duration in milliseconds a poll waits for new entries
    #[structopt(long = "block-millis", env = "CONSUMER_BLOCK_MILLIS", default_value = "1000", parse(try_from_str = parse_millis), value_name = "ms")]
    pub block: Duration,
}

impl ConsumingOptions {
    /// Tunables of the consume loop
    pub fn consumer_options(&self) -> ConsumerOptions {
        ConsumerOptions {
            batch_size: self.batch_size.max(1),
            block: self.block,
        }
    }
}
