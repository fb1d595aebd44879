//! Crate-wide error taxonomy.
//!
//! Each component keeps its own `thiserror`-derived error enum
//! (`StoreError`, `UpdaterError`, `ViewError`, `QueryError`, ...);
//! `DkgError` exists only for call sites (the `dkg` binary, cross-component
//! integration code, integration tests) that need a single type to
//! propagate with `?`.

use crate::ids::NodeId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("duplicate id: {0}")]
    DuplicateId(String),

    #[error("dangling endpoint: {0}")]
    DanglingEndpoint(String),

    #[error("no such entity: {0}")]
    NoSuchEntity(String),

    #[error("hierarchy parent missing for {child}: expected ancestor {missing_parent}")]
    DanglingHierarchyParent { child: String, missing_parent: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum UpdaterError {
    #[error("no such entity: {0}")]
    NoSuchEntity(String),

    #[error("type mismatch on {entity}.{field}: expected {expected}, got {got}")]
    TypeMismatch {
        entity: String,
        field: String,
        expected: &'static str,
        got: &'static str,
    },
}

#[derive(Error, Debug)]
pub enum ViewError {
    #[error("view build interrupted")]
    Interrupted,
}

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("query interrupted")]
    Interrupted,

    #[error("no such node: {0}")]
    NoSuchNode(String),
}

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("malformed persisted snapshot: {0}")]
    Malformed(String),
}

/// Top-level aggregation of the component error types, for call sites that
/// want one error type end to end.
#[derive(Error, Debug)]
pub enum DkgError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Updater(#[from] UpdaterError),

    #[error(transparent)]
    View(#[from] ViewError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error("missing hierarchy ancestor for {0}")]
    MissingAncestor(NodeId),
}
