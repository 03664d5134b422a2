//! Vellum storage abstractions.
//!
//! This crate defines the persistence contract for the lifecycle engine:
//! - documents, workflows, and append-only transition records
//! - dependency edges between documents
//! - a transactional outbox for post-commit side effects
//!
//! Design stance:
//! - Every mutation rides `DocumentStore::apply`: one guarded, all-or-nothing
//!   commit of document, workflow, transition, and outbox rows.
//! - Guards re-assert what the caller observed (workflow revision, document
//!   status, number/version uniqueness) inside the commit, so check-then-act
//!   is atomic and racing operations lose with a conflict, never by
//!   overwriting each other.
//! - The in-memory adapter is the deterministic reference implementation;
//!   a transactional backend maps guards to predicates in one transaction.

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

mod commit;
pub mod memory;
mod traits;

pub use commit::{CommitGuard, CommitRequest, CommitWrite, OutboxEntry};
pub use traits::{DocumentStore, QueryWindow};

use thiserror::Error;

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Storage-layer errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for vellum_types::LifecycleError {
    fn from(err: StoreError) -> Self {
        match err {
            // A commit losing its guards means the observed precondition no
            // longer holds; callers see that as an invalid transition, not an
            // infrastructure fault.
            StoreError::Conflict(message) => {
                vellum_types::LifecycleError::InvalidTransition(message)
            }
            StoreError::NotFound(message) => {
                vellum_types::LifecycleError::Storage(format!("record not found: {}", message))
            }
            other => vellum_types::LifecycleError::Storage(other.to_string()),
        }
    }
}
