//! Vellum Lifecycle Orchestrator
//!
//! The engine moves controlled documents through a fixed eleven-state
//! lifecycle, from draft to effective and on to supersession, obsolescence,
//! or termination. Every transition is guarded by authorization, segregation
//! of duties, and business validation, applied inside one atomic commit, and
//! recorded as an immutable transition plus explicit audit events.
//!
//! # Key Principle
//!
//! **The orchestrator validates and records, it never hides side effects.**
//!
//! Notifications and assignee tasks are written to the store's outbox in the
//! same commit as the transition and drained afterwards; audit events are
//! returned in each operation's outcome. Nothing fires from persistence
//! hooks.
//!
//! # Architecture
//!
//! The [`LifecycleOrchestrator`] composes specialized components:
//!
//! - [`StateRegistry`]: the fixed state catalog and its legal edges
//! - [`AuthorityChecker`]: role-holder, access-level, and segregation checks
//! - [`VersionAllocator`]: next version and collision-free document numbers
//! - [`ObsolescenceChecker`]: dependency and family eligibility for retirement
//! - [`SensitivityResolver`]: label inheritance and approval-time resolution
//! - [`RejectionHistory`]: rejection timeline and reassignment advice
//! - [`OutboxWorker`]: at-least-once drain of post-commit side effects

#![deny(unsafe_code)]

pub mod authority;
pub mod dependency;
pub mod numbering;
pub mod orchestrator;
pub mod outbox;
pub mod ports;
pub mod registry;
pub mod rejection;
pub mod sensitivity;

// Re-export main types
pub use authority::AuthorityChecker;
pub use dependency::ObsolescenceChecker;
pub use numbering::{AllocatedVersion, VersionAllocator};
pub use orchestrator::{
    ApprovalDecision, LifecycleOrchestrator, ObsolescenceRequest, OrchestratorConfig,
    ReviewVerdict, SweepReport, TransitionOutcome, UpVersionRequest,
};
pub use outbox::{DrainOutcome, OutboxWorker};
pub use ports::{
    ActorDirectory, AuditSink, NotificationDispatcher, RecordingAuditSink,
    RecordingNotificationDispatcher, RecordingTaskBoard, StaticActorDirectory, TaskBoard,
};
pub use registry::{StateInfo, StateRegistry};
pub use rejection::{ReassignmentAdvice, RejectionEvent, RejectionHistory};
pub use sensitivity::SensitivityResolver;
