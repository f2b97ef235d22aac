//! Core error types for the Glimmer engine.

/// A specialized Result type for Glimmer operations.
pub type GlimmerResult<T> = Result<T, GlimmerError>;

/// Top-level error type encompassing all Glimmer subsystems.
///
/// `Internal` errors mean the engine's bookkeeping no longer matches its own
/// invariants. They are never recovered from; callers should treat the scene
/// that produced one as unusable.
#[derive(Debug, thiserror::Error)]
pub enum GlimmerError {
    #[error("internal error: {0}")]
    Internal(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("sprite callback failed: {0}")]
    Callback(String),

    #[error("scene busy: {0}")]
    Busy(String),

    #[error("GPU error: {0}")]
    Gpu(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl GlimmerError {
    /// Create an internal (invariant violation) error.
    pub fn internal(message: impl Into<String>) -> Self {
        GlimmerError::Internal(message.into())
    }

    /// Create an input validation error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        GlimmerError::InvalidArgument(message.into())
    }

    /// Wrap a failure reported by user code inside a sprite callback.
    pub fn callback(message: impl Into<String>) -> Self {
        GlimmerError::Callback(message.into())
    }

    pub fn busy(message: impl Into<String>) -> Self {
        GlimmerError::Busy(message.into())
    }

    /// Wrap a failure reported by a GPU backend.
    pub fn gpu(message: impl Into<String>) -> Self {
        GlimmerError::Gpu(message.into())
    }

    /// True for errors that indicate corrupted engine state.
    pub fn is_fatal(&self) -> bool {
        matches!(self, GlimmerError::Internal(_))
    }
}
