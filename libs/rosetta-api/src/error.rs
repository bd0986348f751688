use std::fmt;

use crate::record::{RecordId, RecordStatus};

/// Failure kind for the transform stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformErrorKind {
    /// Input is not a well-formed XML document.
    Parse,
    /// A field required by the output format is absent after overrides.
    MissingField,
    /// The document root is not one the output format accepts.
    UnexpectedRoot,
    /// Template lookup or substitution failed.
    TemplateRender,
}

/// Transform error: returned by every output format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformError {
    pub kind: TransformErrorKind,
    pub message: String,
}

impl TransformError {
    pub fn parse(msg: impl Into<String>) -> Self {
        Self { kind: TransformErrorKind::Parse, message: msg.into() }
    }

    pub fn missing_field(msg: impl Into<String>) -> Self {
        Self { kind: TransformErrorKind::MissingField, message: msg.into() }
    }

    pub fn unexpected_root(msg: impl Into<String>) -> Self {
        Self { kind: TransformErrorKind::UnexpectedRoot, message: msg.into() }
    }

    pub fn template(msg: impl Into<String>) -> Self {
        Self { kind: TransformErrorKind::TemplateRender, message: msg.into() }
    }

    /// Add context to the error, preserving the original kind.
    ///
    /// Produces: `"context: original message"`.
    pub fn with_context(self, ctx: impl fmt::Display) -> Self {
        Self {
            kind: self.kind,
            message: format!("{ctx}: {}", self.message),
        }
    }
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for TransformError {}

/// Rejected status transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusError {
    pub from: RecordStatus,
    pub to: RecordStatus,
}

impl fmt::Display for StatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "illegal status transition {} -> {}", self.from, self.to)
    }
}

impl std::error::Error for StatusError {}

/// Error from a [`RecordStore`](crate::storage::RecordStore) implementation.
#[derive(Debug)]
pub enum StoreError {
    NotFound(RecordId),
    InvalidTransition { id: RecordId, source: StatusError },
    Io(String),
    Format(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NotFound(id) => write!(f, "record {id} not found"),
            StoreError::InvalidTransition { id, source } => write!(f, "record {id}: {source}"),
            StoreError::Io(msg) => write!(f, "io: {msg}"),
            StoreError::Format(msg) => write!(f, "format: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::InvalidTransition { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}
