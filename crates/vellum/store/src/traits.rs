use crate::{CommitRequest, OutboxEntry, StoreResult};
use async_trait::async_trait;
use chrono::NaiveDate;
use vellum_types::{
    Document, DocumentDependency, DocumentId, FamilyId, Transition, Workflow, WorkflowId,
};

/// Generic query window for paged reads.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryWindow {
    pub limit: usize,
    pub offset: usize,
}

/// Transactional store for the lifecycle engine.
///
/// Reads are plain typed queries; every mutation goes through
/// [`DocumentStore::apply`] so guards, writes, and outbox enqueueing land
/// atomically.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    // ── Documents ────────────────────────────────────────────────────────

    /// Get one document by id.
    async fn get_document(&self, id: &DocumentId) -> StoreResult<Option<Document>>;

    /// List documents newest-first.
    async fn list_documents(&self, window: QueryWindow) -> StoreResult<Vec<Document>>;

    /// Every version in a family, ordered by version ascending.
    async fn list_family(&self, family_id: &FamilyId) -> StoreResult<Vec<Document>>;

    /// Whether any document carries this number.
    async fn document_number_exists(&self, number: &str) -> StoreResult<bool>;

    async fn document_exists(&self, id: &DocumentId) -> StoreResult<bool> {
        Ok(self.get_document(id).await?.is_some())
    }

    // ── Workflows ────────────────────────────────────────────────────────

    /// Get one workflow by id.
    async fn get_workflow(&self, id: &WorkflowId) -> StoreResult<Option<Workflow>>;

    /// The open workflow driving a document, if any. At most one exists.
    async fn find_open_workflow(&self, document_id: &DocumentId) -> StoreResult<Option<Workflow>>;

    /// Every workflow ever attached to a document, oldest first.
    async fn list_workflows_for_document(
        &self,
        document_id: &DocumentId,
    ) -> StoreResult<Vec<Workflow>>;

    // ── Transitions ──────────────────────────────────────────────────────

    /// Transition log of one workflow, oldest first.
    async fn list_transitions(&self, workflow_id: &WorkflowId) -> StoreResult<Vec<Transition>>;

    /// Transition log across every workflow of a document, oldest first.
    async fn list_transitions_for_document(
        &self,
        document_id: &DocumentId,
    ) -> StoreResult<Vec<Transition>>;

    // ── Dependencies ─────────────────────────────────────────────────────

    /// Declare or replace a dependency edge.
    async fn upsert_dependency(&self, dependency: DocumentDependency) -> StoreResult<()>;

    /// Every edge pointing at this document, active or not.
    async fn find_dependents(
        &self,
        document_id: &DocumentId,
    ) -> StoreResult<Vec<DocumentDependency>>;

    // ── Due-date scans ───────────────────────────────────────────────────

    /// Approved documents whose effective date has arrived.
    async fn list_due_for_activation(&self, today: NaiveDate) -> StoreResult<Vec<Document>>;

    /// Scheduled documents whose obsolescence date has arrived.
    async fn list_due_for_obsolescence(&self, today: NaiveDate) -> StoreResult<Vec<Document>>;

    // ── Commit ───────────────────────────────────────────────────────────

    /// Apply one guarded, all-or-nothing commit.
    async fn apply(&self, request: CommitRequest) -> StoreResult<()>;

    // ── Outbox ───────────────────────────────────────────────────────────

    /// Claim up to `limit` pending side effects, oldest first, bumping their
    /// attempt counters. Claimed entries stay pending until completed.
    async fn claim_outbox(&self, limit: usize) -> StoreResult<Vec<OutboxEntry>>;

    /// Mark one side effect delivered. Completing an already-completed entry
    /// is a no-op.
    async fn complete_outbox(&self, entry_id: &str) -> StoreResult<()>;

    /// Pending outbox depth, for operational visibility.
    async fn outbox_len(&self) -> StoreResult<usize>;
}
