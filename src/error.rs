//! Error types for navigation operations.

use crate::component::ComponentId;
use thiserror::Error;

/// Errors produced by navigation operations.
///
/// A failed operation never poisons the navigation queue; later operations
/// run normally.
#[derive(Debug, Clone, Error)]
pub enum NavError {
    /// A required field was absent from a request or spec.
    #[error("missing field `{0}`")]
    MissingField(String),

    /// A field was present but held an unusable value.
    #[error("invalid value for field `{name}`: {message}")]
    InvalidFieldValue { name: String, message: String },

    /// No live component is registered under the given id.
    #[error("component `{0}` not found")]
    ComponentNotFound(ComponentId),

    /// A push or pop could not resolve a target stack.
    #[error("no stack found to target")]
    NoSuchStack,

    /// The referenced component exists but is not a presented root.
    #[error("component `{0}` is not presented")]
    NotPresented(ComponentId),

    /// A spec supplied an explicit id that is already live.
    #[error("component `{0}` already exists")]
    AlreadyExists(ComponentId),

    /// The operation was abandoned before completing, typically because a
    /// `reset` tore down the engine while a creation was waiting on content.
    #[error("operation on `{0}` was cancelled")]
    Cancelled(ComponentId),

    /// The operation is not valid in the current engine state.
    #[error("illegal state: {0}")]
    IllegalState(String),

    /// The native platform layer reported a failure.
    #[error("backend error: {0}")]
    Backend(String),
}

impl NavError {
    pub(crate) fn invalid(name: &str, message: impl Into<String>) -> NavError {
        NavError::InvalidFieldValue {
            name: name.into(),
            message: message.into(),
        }
    }

    pub(crate) fn missing(name: &str) -> NavError {
        NavError::MissingField(name.into())
    }
}

pub type Result<T, E = NavError> = std::result::Result<T, E>;
