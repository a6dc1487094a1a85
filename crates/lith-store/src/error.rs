use lith_proto::Pointer;
use thiserror::Error;

use crate::store::EntityKind;

/// Reasons a pointer could not be turned into an entity.
///
/// These never escape the update path; the store logs them and moves on to
/// the next row.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// A participant row arrived before the conversation it belongs to.
    #[error("Unresolved parent conversation {parent} for {pointer}")]
    UnresolvedParent { pointer: Pointer, parent: Pointer },

    #[error("Null pointer")]
    NullPointer,

    #[error("No entity for pointer {0}")]
    NotFound(Pointer),

    /// The pointer names an entity of another kind than the caller expected.
    #[error("Expected {expected:?}, found {found:?}")]
    TypeMismatch {
        expected: EntityKind,
        found: EntityKind,
    },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ResolveError>;
