// ABOUTME: Error types for the typed state store and its backends
// ABOUTME: Distinguishes recoverable misses from type errors and storage failures

use thiserror::Error;

use crate::pipeline::Argument;

#[derive(Error, Debug)]
pub enum StateError {
    #[error("State is empty")]
    EmptyState,

    #[error("Argument '{key}' not found in state")]
    KeyNotFound { key: String },

    #[error("Argument '{key}' already exists")]
    KeyExists { key: String },

    #[error("Argument '{argument}' does not match expected type {expected}")]
    TypeMismatch { argument: Argument, expected: String },

    #[error("Invalid value for argument '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Unsupported state URI scheme '{scheme}'")]
    UnsupportedScheme { scheme: String },

    #[error("Invalid state URI: {0}")]
    InvalidUri(#[from] url::ParseError),

    #[error("{operation} is not supported by this state handler")]
    Unsupported { operation: &'static str },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Object storage error: {0}")]
    Object(String),
}

impl StateError {
    pub fn not_found(key: impl Into<String>) -> Self {
        StateError::KeyNotFound { key: key.into() }
    }

    /// True for misses that a fallback reader may be able to satisfy.
    pub fn is_missing(&self) -> bool {
        matches!(self, StateError::EmptyState | StateError::KeyNotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, StateError>;
