//! Error taxonomy for the judging core.

use thiserror::Error;

/// Result type alias using the judging core's `Error` type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type, banded by the component that raised it.
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Sandbox driver / pool errors
    // =========================================================================
    #[error("sandbox engine unreachable: {0}")]
    EngineUnreachable(String),

    #[error("container operation failed: {0}")]
    Container(String),

    #[error("no idle container available")]
    PoolExhausted,

    // =========================================================================
    // Submission runner errors
    // =========================================================================
    #[error("unparseable limit string: {0}")]
    LimitParse(String),

    #[error("unsupported source extension: {0}")]
    UnknownExtension(String),

    // =========================================================================
    // Store errors
    // =========================================================================
    #[error("problem not found: {0}")]
    ProblemNotFound(i64),

    #[error("storage error: {0}")]
    Storage(String),

    // =========================================================================
    // Broker errors
    // =========================================================================
    #[error("broker error: {0}")]
    Broker(String),

    #[error("malformed task body: {0}")]
    MalformedTask(String),

    // =========================================================================
    // Registry / config / generic
    // =========================================================================
    #[error("service registry error: {0}")]
    Registry(String),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn container(msg: impl Into<String>) -> Self {
        Self::Container(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn broker(msg: impl Into<String>) -> Self {
        Self::Broker(msg.into())
    }

    pub fn registry(msg: impl Into<String>) -> Self {
        Self::Registry(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
