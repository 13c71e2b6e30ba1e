use std::fmt::{self, Display, Formatter};

use thiserror::Error;

use crate::core::transition::{InterleaveId, StateId};

/// The ways a document can fail validation. All are fatal for the document.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// No element production from the current state accepts this name.
    #[error("unexpected start tag")]
    UnexpectedStartTag,
    /// The current state is not final and no end rewrite is viable.
    #[error("unexpected end tag")]
    UnexpectedEndTag,
    /// Non-whitespace text with no matching text production.
    #[error("unexpected text")]
    UnexpectedText,
}

/// Validation failure annotated with the open-element path at the offending
/// event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Slash-joined path of open elements, innermost last.
    pub path: String,
    /// Detailed categorization of the error.
    pub kind: ValidationErrorKind,
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.kind, self.path)
    }
}

impl std::error::Error for ValidationError {}

impl ValidationError {
    /// Creates a new [`ValidationError`].
    #[must_use]
    pub fn new(kind: ValidationErrorKind, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// Rejection of a schema at sealing time.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("initial state {id} does not exist")]
    DanglingInitialState { id: StateId },
    #[error("{role} references missing state {id}")]
    DanglingState { id: StateId, role: &'static str },
    #[error("interleave alphabet entry {id} does not exist")]
    DanglingInterleave { id: InterleaveId },
}
