//! Error types for the pipeline system.
//!
//! Two families live here. [`Error`] is structural: it aborts a run and is
//! returned from [`Pipeline::run`](crate::pipeline::Pipeline::run).
//! [`Rejection`] and [`StageError`] are item-level: they travel on error
//! channels as ordinary values and never stop the pipeline.

use thiserror::Error;

/// The main error type for the pipeline system.
///
/// Every variant is fatal for the run that produced it.
#[derive(Debug, Error)]
pub enum Error {
    /// The pipeline was assembled with an unusable setting
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),

    /// A component found its downstream reader gone while the run was not cancelled
    #[error("stage `{stage}` lost its downstream channel")]
    ChannelClosed { stage: String },

    /// A component panicked outside of a transform
    #[error("stage `{stage}` panicked: {message}")]
    Panicked { stage: String, message: String },

    /// A spawned task could not be joined
    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// A custom error with a message
    #[error("{0}")]
    Custom(String),
}

// Convenience constructors
impl Error {
    /// Create a configuration error
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Error::InvalidConfig(message.into())
    }

    /// Create a custom error with a message
    pub fn custom<S: Into<String>>(message: S) -> Self {
        Error::Custom(message.into())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Custom(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Custom(s.to_string())
    }
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, Error>;

/// An item-level failure returned by a stage function or a source.
///
/// The component that receives it stamps its own name on it and forwards it
/// as a [`StageError`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct Rejection {
    message: String,
    item: Option<String>,
}

impl Rejection {
    /// Create a rejection with a message
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            message: message.into(),
            item: None,
        }
    }

    /// Attach a description of the offending item
    pub fn with_item<S: Into<String>>(mut self, item: S) -> Self {
        self.item = Some(item.into());
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn item(&self) -> Option<&str> {
        self.item.as_deref()
    }

    /// Turn this rejection into an error record owned by `stage`
    pub fn into_stage_error(self, stage: &str) -> StageError {
        StageError {
            stage: stage.to_string(),
            message: self.message,
            item: self.item,
        }
    }
}

impl From<std::io::Error> for Rejection {
    fn from(err: std::io::Error) -> Self {
        Rejection::new(err.to_string())
    }
}

impl From<String> for Rejection {
    fn from(message: String) -> Self {
        Rejection::new(message)
    }
}

impl From<&str> for Rejection {
    fn from(message: &str) -> Self {
        Rejection::new(message)
    }
}

/// An error record collected on a stage's error channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[error("{stage}: {message}")]
pub struct StageError {
    /// Name of the component that rejected the item
    pub stage: String,
    /// Human readable reason
    pub message: String,
    /// Description of the offending item, when the stage supplied one
    pub item: Option<String>,
}

impl StageError {
    pub fn new<S: Into<String>, M: Into<String>>(stage: S, message: M) -> Self {
        Self {
            stage: stage.into(),
            message: message.into(),
            item: None,
        }
    }
}
