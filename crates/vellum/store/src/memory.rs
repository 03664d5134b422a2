//! In-memory reference implementation of the store contract.
//!
//! Deterministic and test-friendly. All tables live behind one lock so a
//! commit's guards and writes observe and mutate a single consistent
//! snapshot; production deployments should use a transactional backend that
//! maps guards to predicates inside one database transaction.

use crate::traits::{DocumentStore, QueryWindow};
use crate::{CommitGuard, CommitRequest, CommitWrite, OutboxEntry, StoreError, StoreResult};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::RwLock;
use vellum_types::{
    Document, DocumentDependency, DocumentId, DocumentState, FamilyId, Transition, Workflow,
    WorkflowId,
};

#[derive(Default, Clone)]
struct Tables {
    documents: HashMap<DocumentId, Document>,
    workflows: HashMap<WorkflowId, Workflow>,
    transitions: Vec<Transition>,
    dependencies: Vec<DocumentDependency>,
    outbox: Vec<OutboxEntry>,
}

impl Tables {
    fn family_documents(&self, family_id: &FamilyId) -> Vec<&Document> {
        self.documents
            .values()
            .filter(|d| &d.family_id == family_id)
            .collect()
    }

    fn open_workflow_for(&self, document_id: &DocumentId) -> Option<&Workflow> {
        self.workflows
            .values()
            .find(|w| &w.document_id == document_id && w.is_open())
    }

    fn check_guard(&self, guard: &CommitGuard) -> StoreResult<()> {
        match guard {
            CommitGuard::WorkflowRevision {
                workflow_id,
                expected,
            } => {
                let workflow = self.workflows.get(workflow_id).ok_or_else(|| {
                    StoreError::NotFound(format!("workflow {} not found", workflow_id))
                })?;
                if workflow.revision != *expected {
                    return Err(StoreError::Conflict(format!(
                        "workflow {} revision changed: expected {}, found {}",
                        workflow_id, expected, workflow.revision
                    )));
                }
            }
            CommitGuard::DocumentStatus {
                document_id,
                expected,
            } => {
                let document = self.documents.get(document_id).ok_or_else(|| {
                    StoreError::NotFound(format!("document {} not found", document_id))
                })?;
                if document.status != *expected {
                    return Err(StoreError::Conflict(format!(
                        "document {} status changed: expected {}, found {}",
                        document_id, expected, document.status
                    )));
                }
            }
            CommitGuard::NumberFree { number } => {
                if self.documents.values().any(|d| &d.number == number) {
                    return Err(StoreError::Conflict(format!(
                        "document number {} already taken",
                        number
                    )));
                }
            }
            CommitGuard::VersionFree { family_id, version } => {
                if self
                    .family_documents(family_id)
                    .iter()
                    .any(|d| d.version == *version)
                {
                    return Err(StoreError::Conflict(format!(
                        "version {} already taken in family {}",
                        version, family_id
                    )));
                }
            }
            CommitGuard::NoOpenWorkflowInFamily { family_id } => {
                for document in self.family_documents(family_id) {
                    if let Some(workflow) = self.open_workflow_for(&document.id) {
                        return Err(StoreError::Conflict(format!(
                            "family {} has an open {} workflow on {}",
                            family_id, workflow.kind, document.number
                        )));
                    }
                }
            }
            CommitGuard::NoActiveDependents { document_id } => {
                for edge in self
                    .dependencies
                    .iter()
                    .filter(|e| e.active && &e.depends_on == document_id)
                {
                    if let Some(dependent) = self.documents.get(&edge.document_id) {
                        if !dependent.status.is_terminal() {
                            return Err(StoreError::Conflict(format!(
                                "document {} still depends on {}",
                                dependent.number, document_id
                            )));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn apply_write(&mut self, write: CommitWrite) -> StoreResult<()> {
        match write {
            CommitWrite::InsertDocument(document) => {
                if self.documents.contains_key(&document.id) {
                    return Err(StoreError::Conflict(format!(
                        "document {} already exists",
                        document.id
                    )));
                }
                self.documents.insert(document.id.clone(), document);
            }
            CommitWrite::UpdateDocument(document) => {
                if !self.documents.contains_key(&document.id) {
                    return Err(StoreError::NotFound(format!(
                        "document {} not found",
                        document.id
                    )));
                }
                self.documents.insert(document.id.clone(), document);
            }
            CommitWrite::InsertWorkflow(workflow) => {
                if self.workflows.contains_key(&workflow.id) {
                    return Err(StoreError::Conflict(format!(
                        "workflow {} already exists",
                        workflow.id
                    )));
                }
                self.workflows.insert(workflow.id.clone(), workflow);
            }
            CommitWrite::UpdateWorkflow(mut workflow) => {
                let existing = self.workflows.get(&workflow.id).ok_or_else(|| {
                    StoreError::NotFound(format!("workflow {} not found", workflow.id))
                })?;
                workflow.revision = existing.revision + 1;
                self.workflows.insert(workflow.id.clone(), workflow);
            }
            CommitWrite::AppendTransition(transition) => {
                if !self.workflows.contains_key(&transition.workflow_id) {
                    return Err(StoreError::InvalidInput(format!(
                        "transition references unknown workflow {}",
                        transition.workflow_id
                    )));
                }
                self.transitions.push(transition);
            }
        }
        Ok(())
    }
}

/// In-memory store adapter.
#[derive(Default)]
pub struct InMemoryDocumentStore {
    tables: RwLock<Tables>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a document directly, bypassing commit guards. Test setup only.
    pub fn seed_document(&self, document: Document) -> StoreResult<()> {
        let mut tables = self.write()?;
        tables.documents.insert(document.id.clone(), document);
        Ok(())
    }

    fn read(&self) -> StoreResult<std::sync::RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| StoreError::Backend("store lock poisoned".to_string()))
    }

    fn write(&self) -> StoreResult<std::sync::RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| StoreError::Backend("store lock poisoned".to_string()))
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get_document(&self, id: &DocumentId) -> StoreResult<Option<Document>> {
        Ok(self.read()?.documents.get(id).cloned())
    }

    async fn list_documents(&self, window: QueryWindow) -> StoreResult<Vec<Document>> {
        let tables = self.read()?;
        let mut values = tables.documents.values().cloned().collect::<Vec<_>>();
        values.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(apply_window(values, window))
    }

    async fn list_family(&self, family_id: &FamilyId) -> StoreResult<Vec<Document>> {
        let tables = self.read()?;
        let mut values = tables
            .family_documents(family_id)
            .into_iter()
            .cloned()
            .collect::<Vec<_>>();
        values.sort_by_key(|d| d.version);
        Ok(values)
    }

    async fn document_number_exists(&self, number: &str) -> StoreResult<bool> {
        Ok(self.read()?.documents.values().any(|d| d.number == number))
    }

    async fn get_workflow(&self, id: &WorkflowId) -> StoreResult<Option<Workflow>> {
        Ok(self.read()?.workflows.get(id).cloned())
    }

    async fn find_open_workflow(&self, document_id: &DocumentId) -> StoreResult<Option<Workflow>> {
        Ok(self.read()?.open_workflow_for(document_id).cloned())
    }

    async fn list_workflows_for_document(
        &self,
        document_id: &DocumentId,
    ) -> StoreResult<Vec<Workflow>> {
        let tables = self.read()?;
        let mut values = tables
            .workflows
            .values()
            .filter(|w| &w.document_id == document_id)
            .cloned()
            .collect::<Vec<_>>();
        values.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(values)
    }

    async fn list_transitions(&self, workflow_id: &WorkflowId) -> StoreResult<Vec<Transition>> {
        let tables = self.read()?;
        Ok(tables
            .transitions
            .iter()
            .filter(|t| &t.workflow_id == workflow_id)
            .cloned()
            .collect())
    }

    async fn list_transitions_for_document(
        &self,
        document_id: &DocumentId,
    ) -> StoreResult<Vec<Transition>> {
        let tables = self.read()?;
        let workflow_ids = tables
            .workflows
            .values()
            .filter(|w| &w.document_id == document_id)
            .map(|w| w.id.clone())
            .collect::<Vec<_>>();
        let mut values = tables
            .transitions
            .iter()
            .filter(|t| workflow_ids.contains(&t.workflow_id))
            .cloned()
            .collect::<Vec<_>>();
        values.sort_by(|a, b| a.occurred_at.cmp(&b.occurred_at));
        Ok(values)
    }

    async fn upsert_dependency(&self, dependency: DocumentDependency) -> StoreResult<()> {
        let mut tables = self.write()?;
        if let Some(existing) = tables.dependencies.iter_mut().find(|e| e.id == dependency.id) {
            *existing = dependency;
        } else {
            tables.dependencies.push(dependency);
        }
        Ok(())
    }

    async fn find_dependents(
        &self,
        document_id: &DocumentId,
    ) -> StoreResult<Vec<DocumentDependency>> {
        let tables = self.read()?;
        Ok(tables
            .dependencies
            .iter()
            .filter(|e| &e.depends_on == document_id)
            .cloned()
            .collect())
    }

    async fn list_due_for_activation(&self, today: NaiveDate) -> StoreResult<Vec<Document>> {
        let tables = self.read()?;
        let mut values = tables
            .documents
            .values()
            .filter(|d| {
                d.status == DocumentState::ApprovedPendingEffective
                    && d.effective_date.map(|date| date <= today).unwrap_or(false)
            })
            .cloned()
            .collect::<Vec<_>>();
        values.sort_by(|a, b| a.effective_date.cmp(&b.effective_date));
        Ok(values)
    }

    async fn list_due_for_obsolescence(&self, today: NaiveDate) -> StoreResult<Vec<Document>> {
        let tables = self.read()?;
        let mut values = tables
            .documents
            .values()
            .filter(|d| {
                d.status == DocumentState::ScheduledForObsolescence
                    && d.obsolete_date.map(|date| date <= today).unwrap_or(false)
            })
            .cloned()
            .collect::<Vec<_>>();
        values.sort_by(|a, b| a.obsolete_date.cmp(&b.obsolete_date));
        Ok(values)
    }

    async fn apply(&self, request: CommitRequest) -> StoreResult<()> {
        let mut tables = self.write()?;

        for guard in &request.guards {
            tables.check_guard(guard)?;
        }

        // Stage writes on a copy so a failure partway leaves nothing behind.
        let mut staged = tables.clone();
        for write in request.writes {
            staged.apply_write(write)?;
        }

        let enqueued_at = Utc::now();
        for effect in request.side_effects {
            staged.outbox.push(OutboxEntry::new(effect, enqueued_at));
        }

        *tables = staged;
        Ok(())
    }

    async fn claim_outbox(&self, limit: usize) -> StoreResult<Vec<OutboxEntry>> {
        let mut tables = self.write()?;
        let take = if limit == 0 {
            tables.outbox.len()
        } else {
            limit.min(tables.outbox.len())
        };
        let mut claimed = Vec::with_capacity(take);
        for entry in tables.outbox.iter_mut().take(take) {
            entry.attempts += 1;
            claimed.push(entry.clone());
        }
        Ok(claimed)
    }

    async fn complete_outbox(&self, entry_id: &str) -> StoreResult<()> {
        let mut tables = self.write()?;
        tables.outbox.retain(|entry| entry.id != entry_id);
        Ok(())
    }

    async fn outbox_len(&self) -> StoreResult<usize> {
        Ok(self.read()?.outbox.len())
    }
}

fn apply_window<T>(items: Vec<T>, window: QueryWindow) -> Vec<T> {
    let iter = items.into_iter().skip(window.offset);
    if window.limit == 0 {
        iter.collect()
    } else {
        iter.take(window.limit).collect()
    }
}
