/// Describes an event stream and its retention
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDescriptor {
    key: String,
    limit: Option<usize>,
}

impl StreamDescriptor {
    /// Creates a new instance without a retention limit
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            limit: None,
        }
    }

    /// Caps the stream at approximately the given number of records
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Value which is used by log implementations to identify the stream
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Maximum number of records to be retained in the stream, if any
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }
}

impl From<&str> for StreamDescriptor {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

/// Location within a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamLocation {
    /// Start of the stream (not necessarily the first record as a stream may be limited in length)
    Head,
    /// End of the stream (exclusive of the last record)
    Tail,
}
