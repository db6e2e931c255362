use redis::{ConnectionAddr, ConnectionInfo, RedisConnectionInfo};
use std::fmt;

/// Location and credentials of a redis server
#[derive(Clone, PartialEq, Eq)]
pub struct RedisEndpoint {
    host: String,
    port: u16,
    password: Option<String>,
    db: i64,
}

impl RedisEndpoint {
    /// Creates a new instance targeting the default database without authentication
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            password: None,
            db: 0,
        }
    }

    /// Authenticates with the given password, if any
    pub fn with_password(mut self, password: Option<String>) -> Self {
        self.password = password.filter(|p| !p.is_empty());
        self
    }

    /// Selects the logical database
    pub fn with_db(mut self, db: i64) -> Self {
        self.db = db;
        self
    }

    /// Connection parameters understood by the [`redis`] crate
    pub fn connection_info(&self) -> ConnectionInfo {
        ConnectionInfo {
            addr: ConnectionAddr::Tcp(self.host.clone(), self.port),
            redis: RedisConnectionInfo {
                db: self.db,
                password: self.password.clone(),
                ..Default::default()
            },
        }
    }
}

impl fmt::Debug for RedisEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisEndpoint")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("db", &self.db)
            .finish()
    }
}

impl fmt::Display for RedisEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "redis://{}:{}/{}", self.host, self.port, self.db)
    }
}
