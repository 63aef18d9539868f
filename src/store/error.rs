use thiserror::Error;

/// Failures surfaced by the cache and metrics layers.
///
/// Invalid domain input (unknown status, empty label) never produces an error;
/// those calls are no-ops.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Raised only by explicit health checks when no store is configured.
    #[error("key-value store is not enabled")]
    NotEnabled,
    /// The store could not be reached or rejected a command.
    #[error("key-value transport error: {0}")]
    Transport(String),
    /// A stored payload or counter could not be decoded.
    #[error("malformed data in `{key}` field `{field}`: {reason}")]
    MalformedData {
        key: String,
        field: String,
        reason: String,
    },
}

impl StoreError {
    pub fn from_transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }

    pub fn malformed(
        key: impl Into<String>,
        field: impl Into<String>,
        reason: impl std::fmt::Display,
    ) -> Self {
        Self::MalformedData {
            key: key.into(),
            field: field.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<::redis::RedisError> for StoreError {
    fn from(err: ::redis::RedisError) -> Self {
        Self::from_transport(err)
    }
}
