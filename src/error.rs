//! Error types for the editor engine.

use std::fmt;

use crate::doc::DocId;
use crate::editor::EditorId;
use crate::pos::Pos;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for engine operations.
///
/// Only contract violations and unknown handles are errors. Stale positions
/// are clamped and edits against read-only documents are dropped silently.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// A line number outside `[first, first + size)`.
    LineOutOfRange { line: usize, first: usize, size: usize },
    /// A tokenizer returned ten times in a row without consuming input.
    TokenizerStalled {
        mode: String,
        line: usize,
        column: usize,
    },
    /// A collapsed marker would overlap an existing collapsed marker.
    OverlappingCollapsedRange { from: Pos, to: Pos },
    /// A range marker that clears when empty was given an empty range.
    EmptyMarkerRange { at: Pos },
    /// The document id does not refer to a live document.
    UnknownDocument(DocId),
    /// The editor id does not refer to a live editor.
    UnknownEditor(EditorId),
    /// The document is already displayed by another editor.
    DocumentAlreadyAttached(DocId),
    /// Linking would connect a document to itself.
    LinkCycle(DocId),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LineOutOfRange { line, first, size } => {
                write!(
                    f,
                    "line {line} out of range for document lines {first}..{}",
                    first + size
                )
            }
            Self::TokenizerStalled { mode, line, column } => {
                write!(
                    f,
                    "mode {mode} failed to advance stream at line {line}, column {column}"
                )
            }
            Self::OverlappingCollapsedRange { from, to } => {
                write!(
                    f,
                    "collapsed marker {from}..{to} overlaps an existing collapsed marker"
                )
            }
            Self::EmptyMarkerRange { at } => write!(f, "empty marker range at {at}"),
            Self::UnknownDocument(id) => write!(f, "unknown document {id:?}"),
            Self::UnknownEditor(id) => write!(f, "unknown editor {id:?}"),
            Self::DocumentAlreadyAttached(id) => {
                write!(f, "document {id:?} is already attached to an editor")
            }
            Self::LinkCycle(id) => write!(f, "document {id:?} cannot be linked to itself"),
        }
    }
}

impl std::error::Error for Error {}

impl Error {
    /// Whether the call broke a caller contract. Such calls are rejected
    /// before anything is mutated.
    #[must_use]
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Self::TokenizerStalled { .. } | Self::OverlappingCollapsedRange { .. }
        )
    }
}
