use retrace_codec::{DecodeError, EncodeError};
use thiserror::Error;

use crate::id::SyntheticId;

/// A tree operation would break the rooted-tree invariants. The tree is left
/// untouched when this is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeIntegrityError {
    #[error("node {0} not found")]
    MissingNode(SyntheticId),
    #[error("parent {parent} of node {id} not found")]
    MissingParent { id: SyntheticId, parent: SyntheticId },
    #[error("node {0} has no parent and is not the root")]
    Detached(SyntheticId),
    #[error("node {0} cannot hold children")]
    NotAContainer(SyntheticId),
    #[error("root {0} missing from node map")]
    MissingRoot(SyntheticId),
    #[error("child {child} of {parent} missing from node map")]
    DanglingChild {
        parent: SyntheticId,
        child: SyntheticId,
    },
    #[error("node {0} reached twice (cycle or shared child)")]
    Cycle(SyntheticId),
    #[error("node {id} lists parent {found:?}, expected {expected:?}")]
    ParentMismatch {
        id: SyntheticId,
        expected: Option<SyntheticId>,
        found: Option<SyntheticId>,
    },
    #[error("node {0} unreachable from root")]
    Unreachable(SyntheticId),
}

/// Errors crossing the model/codec boundary.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("tree integrity: {0}")]
    Tree(#[from] TreeIntegrityError),
    #[error("decode: {0}")]
    Decode(#[from] DecodeError),
    #[error("encode: {0}")]
    Encode(#[from] EncodeError),
}
