//! Error types shared by every planning operation.

use serde::{Deserialize, Serialize};

/// Machine-checkable failure category, reported alongside `success = false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    NotFound,
    AmbiguousIdentifier,
    Validation,
    Infeasible,
    StateConflict,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not-found",
            ErrorKind::AmbiguousIdentifier => "ambiguous-identifier",
            ErrorKind::Validation => "validation",
            ErrorKind::Infeasible => "infeasible",
            ErrorKind::StateConflict => "state-conflict",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur while planning or committing stowage operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StowageError {
    /// A referenced item does not exist.
    #[error("item {0} not found")]
    ItemNotFound(String),

    /// A referenced container does not exist.
    #[error("container {0} not found")]
    ContainerNotFound(String),

    /// Both an id and a name were given, neither was, or a name matched
    /// more than one item.
    #[error("ambiguous item identifier: {0}")]
    AmbiguousIdentifier(String),

    /// The request is malformed and was rejected before any mutation.
    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// No container or orientation can satisfy the request.
    #[error("infeasible: {0}")]
    Infeasible(String),

    /// The item or container is in the wrong lifecycle state.
    #[error("state conflict: {0}")]
    StateConflict(String),
}

impl StowageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StowageError::ItemNotFound(_) | StowageError::ContainerNotFound(_) => {
                ErrorKind::NotFound
            }
            StowageError::AmbiguousIdentifier(_) => ErrorKind::AmbiguousIdentifier,
            StowageError::Validation(_) => ErrorKind::Validation,
            StowageError::Infeasible(_) => ErrorKind::Infeasible,
            StowageError::StateConflict(_) => ErrorKind::StateConflict,
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        StowageError::Validation(vec![message.into()])
    }
}

pub type Result<T> = std::result::Result<T, StowageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            StowageError::ItemNotFound("7".into()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            StowageError::ContainerNotFound("contA".into()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            StowageError::validation("bad").kind(),
            ErrorKind::Validation
        );
    }

    #[test]
    fn test_kind_serializes_kebab_case() {
        let json = serde_json::to_string(&ErrorKind::AmbiguousIdentifier).unwrap();
        assert_eq!(json, "\"ambiguous-identifier\"");
        assert_eq!(ErrorKind::StateConflict.to_string(), "state-conflict");
    }

    #[test]
    fn test_validation_message_joins_issues() {
        let err = StowageError::Validation(vec!["a".into(), "b".into()]);
        assert_eq!(err.to_string(), "validation failed: a; b");
    }
}
