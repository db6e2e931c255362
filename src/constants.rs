//! Default values shared between the library, the harness and the command line

use std::time::Duration;

/// Hostname of the redis server if nothing else is configured
pub const DEFAULT_REDIS_HOST: &str = "localhost";
/// Port of the redis server if nothing else is configured
pub const DEFAULT_REDIS_PORT: u16 = 6379;

/// Maximum number of entries a consumer reads per poll
pub const DEFAULT_BATCH_SIZE: usize = 10;
/// Maximum duration a consumer blocks while waiting for new entries
pub const DEFAULT_BLOCK_DURATION: Duration = Duration::from_secs(1);

/// Time a module may take to wire up its publisher and consumers
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(60);
/// Time a module may take to drain its consumers before the process exits forcefully
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);
