//! Vellum Domain Types
//!
//! This crate defines the data model for the Vellum document control core:
//! controlled documents, their lifecycle workflows, and the append-only
//! transition records that make every state change auditable.
//!
//! # Key Concepts
//!
//! - **Document**: the versioned, controlled artifact. Its `status` mirrors
//!   the current state of the workflow driving it.
//! - **Workflow**: the stateful process attached to one lifecycle episode of
//!   a document (review, up-version, obsolescence, termination), tracking
//!   current state and assignee.
//! - **Transition**: an immutable record of one state change, with actor,
//!   timestamp, and a typed payload. The transition log is the sole source
//!   of truth for rejection history.
//! - **Sensitivity**: a tiered confidentiality label inherited across
//!   versions and re-affirmed or changed at approval time.
//! - **Segregation of duties**: no actor may author and also review or
//!   approve the same document, absent an admin override.
//!
//! # Architecture
//!
//! This is a pure types crate with no runtime dependencies. All types
//! implement `Clone`, `Debug`, `Serialize`, `Deserialize`. IDs use the
//! newtype pattern and implement `Display`, `generate()`, and `new()`.

#![deny(unsafe_code)]

mod actor;
mod dependency;
mod document;
mod errors;
mod events;
mod sensitivity;
mod state;
mod transition;
mod workflow;

pub use actor::*;
pub use dependency::*;
pub use document::*;
pub use errors::*;
pub use events::*;
pub use sensitivity::*;
pub use state::*;
pub use transition::*;
pub use workflow::*;
