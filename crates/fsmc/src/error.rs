//! Diagnostics reported by the compiler stages.

use std::{
    fmt,
    path::{Path, PathBuf},
};

/// A fatal diagnostic, rendered as `<path>:<line>: <message>`.
#[derive(Debug, Clone, PartialEq)]
pub struct Error {
    path: Option<PathBuf>,
    line: usize,
    kind: ErrorKind,
}

impl Error {
    pub fn new(line: usize, kind: impl Into<ErrorKind>) -> Self {
        Self {
            path: None,
            line,
            kind: kind.into(),
        }
    }

    /// Attach the path of the input file this diagnostic refers to.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{}:{}: {}", path.display(), self.line, self.kind),
            None => write!(f, "<input>:{}: {}", self.line, self.kind),
        }
    }
}

impl std::error::Error for Error {}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ErrorKind {
    #[error(transparent)]
    Lex(#[from] LexErrorKind),

    #[error("syntax error: expected {expected}, found {found}")]
    Parse { expected: String, found: String },

    #[error("duplicate {decl} `{id}'")]
    Duplicate { decl: Decl, id: String },

    #[error("unknown state `{id}'")]
    UnknownState { id: String },

    #[error("unknown transition `{id}' in state `{state}'")]
    UnknownTransition { id: String, state: String },

    #[error("sequence transition `{id}' recursively calls itself from state `{state}'")]
    RecursiveSequence { id: String, state: String },

    #[error("conflicting signature for transition `{id}': {detail}")]
    ConflictingSignature { id: String, detail: String },
}

impl ErrorKind {
    /// Whether this is a duplicate block, state or transition declaration.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate { .. })
    }

    /// Whether this is a state or transition reference that cannot be resolved.
    pub fn is_unknown_reference(&self) -> bool {
        matches!(
            self,
            Self::UnknownState { .. }
                | Self::UnknownTransition { .. }
                | Self::RecursiveSequence { .. }
        )
    }
}

/// Malformed character streams.
#[derive(Debug, Default, Clone, PartialEq, thiserror::Error)]
pub enum LexErrorKind {
    #[default]
    #[error("unrecognized input")]
    Unrecognized,

    #[error("unrecognized character `{0}'")]
    InvalidCharacter(char),

    #[error("unbalanced `{{' in freeform block")]
    UnterminatedFreeform,

    #[error("unterminated block comment")]
    UnterminatedComment,

    #[error("unterminated string or character literal")]
    UnterminatedLiteral,
}

/// The kind of declaration that must be unique in its scope.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Decl {
    Block,
    State,
    Transition,
}

impl fmt::Display for Decl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Block => f.write_str("block"),
            Self::State => f.write_str("state"),
            Self::Transition => f.write_str("transition"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_with_and_without_path() {
        let err = Error::new(
            7,
            ErrorKind::Duplicate {
                decl: Decl::State,
                id: "Idle".into(),
            },
        );
        assert_eq!(err.to_string(), "<input>:7: duplicate state `Idle'");

        let err = err.with_path("/tmp/door.fsm");
        assert_eq!(err.to_string(), "/tmp/door.fsm:7: duplicate state `Idle'");
    }

    #[test]
    fn lex_errors_convert_into_kinds() {
        let err = Error::new(1, LexErrorKind::InvalidCharacter('$'));
        assert_eq!(err.to_string(), "<input>:1: unrecognized character `$'");
        assert!(!err.kind().is_duplicate());
    }
}
