/// Convenience result type used across the crate.
pub type StagecastResult<T> = Result<T, StagecastError>;

/// Top-level error taxonomy.
///
/// `Playback` errors (a clip blocked from starting, a missing audio resource)
/// are swallowed by the sequencer and only surface through diagnostics;
/// `Validation` and `Capture` errors are returned to the caller and must be
/// shown to the user.
#[derive(thiserror::Error, Debug)]
pub enum StagecastError {
    /// Invalid user-provided or content-table data, or a violated operation
    /// precondition (e.g. export with no model loaded).
    #[error("validation error: {0}")]
    Validation(String),

    /// An audio clip could not be started or probed.
    #[error("playback error: {0}")]
    Playback(String),

    /// The capture pipeline cannot run (unsupported recorder/format, encoder
    /// failure, surface failure mid-capture).
    #[error("capture error: {0}")]
    Capture(String),

    /// Errors when serializing or deserializing data structures.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StagecastError {
    /// Build a [`StagecastError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`StagecastError::Playback`] value.
    pub fn playback(msg: impl Into<String>) -> Self {
        Self::Playback(msg.into())
    }

    /// Build a [`StagecastError::Capture`] value.
    pub fn capture(msg: impl Into<String>) -> Self {
        Self::Capture(msg.into())
    }

    /// Build a [`StagecastError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}
