//! Obsolescence eligibility
//!
//! Retiring a document must never orphan anything that still relies on it.
//! Three conjunctive checks gate the operation: no live dependent documents,
//! no newer family sibling still in development, and no open workflow
//! anywhere in the family. Failures carry the complete blocker list so the
//! caller can resolve them without guesswork.
//!
//! This check reads a snapshot; the commit that schedules the obsolescence
//! re-asserts the dependent and workflow conditions through guards.

use std::sync::Arc;
use vellum_store::DocumentStore;
use vellum_types::{
    BlockerRef, Document, LifecycleError, LifecycleResult, ObsolescenceBlockers,
    WorkflowBlockerRef,
};

pub struct ObsolescenceChecker {
    store: Arc<dyn DocumentStore>,
}

impl ObsolescenceChecker {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Collects every condition currently blocking retirement of `document`.
    ///
    /// Family relation is the shared `FamilyId`; two families that happen to
    /// share a number prefix never see each other here.
    pub async fn blockers(&self, document: &Document) -> LifecycleResult<ObsolescenceBlockers> {
        let mut blockers = ObsolescenceBlockers::default();

        let edges = self.store.find_dependents(&document.id).await?;
        let mut dependents = Vec::new();
        for edge in edges.iter().filter(|edge| edge.active) {
            if let Some(dependent) = self.store.get_document(&edge.document_id).await? {
                if !dependent.status.is_terminal() {
                    dependents.push((
                        edge.is_critical,
                        BlockerRef {
                            document_id: dependent.id,
                            number: dependent.number,
                            status: dependent.status,
                        },
                    ));
                }
            }
        }
        // Critical edges first.
        dependents.sort_by_key(|(is_critical, _)| !*is_critical);
        blockers.dependents = dependents.into_iter().map(|(_, blocker)| blocker).collect();

        let family = self.store.list_family(&document.family_id).await?;
        for sibling in &family {
            if sibling.id != document.id
                && sibling.is_newer_than(document)
                && sibling.status.is_in_development()
            {
                blockers.in_development.push(BlockerRef {
                    document_id: sibling.id.clone(),
                    number: sibling.number.clone(),
                    status: sibling.status,
                });
            }
        }

        for sibling in &family {
            if let Some(workflow) = self.store.find_open_workflow(&sibling.id).await? {
                blockers.open_workflows.push(WorkflowBlockerRef {
                    document_id: sibling.id.clone(),
                    number: sibling.number.clone(),
                    kind: workflow.kind,
                    state: workflow.state,
                });
            }
        }

        Ok(blockers)
    }

    /// Errors with the full blocker list when retirement is not allowed.
    pub async fn check(&self, document: &Document) -> LifecycleResult<()> {
        let blockers = self.blockers(document).await?;
        if blockers.is_empty() {
            Ok(())
        } else {
            tracing::info!(
                document_id = %document.id.short(),
                number = %document.number,
                blockers = blockers.total(),
                "Obsolescence blocked"
            );
            Err(LifecycleError::DependencyBlocked { blockers })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vellum_store::memory::InMemoryDocumentStore;
    use vellum_store::{CommitRequest, CommitWrite};
    use vellum_types::{
        ActorId, DocumentDependency, DocumentState, FamilyId, VersionNumber, Workflow,
        WorkflowKind,
    };

    fn make_effective(base: &str) -> Document {
        let mut doc = Document::new(
            FamilyId::generate(),
            base,
            "Some Procedure",
            ActorId::new("alice"),
        );
        doc.status = DocumentState::Effective;
        doc
    }

    fn make_sibling(source: &Document, minor: u32, status: DocumentState) -> Document {
        let mut doc = source.clone();
        doc.id = vellum_types::DocumentId::generate();
        doc.version = VersionNumber::new(source.version.major, minor);
        doc.number = format!("{}-{}", source.base_number, doc.version.tag());
        doc.status = status;
        doc
    }

    async fn open_workflow_on(store: &InMemoryDocumentStore, doc: &Document) {
        let workflow = Workflow::new(
            doc.id.clone(),
            WorkflowKind::UpVersion,
            DocumentState::Draft,
            ActorId::new("alice"),
        );
        store
            .apply(CommitRequest::new().with_write(CommitWrite::InsertWorkflow(workflow)))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn unblocked_document_passes() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let doc = make_effective("SOP-030");
        store.seed_document(doc.clone()).unwrap();

        let checker = ObsolescenceChecker::new(store);
        assert!(checker.blockers(&doc).await.unwrap().is_empty());
        assert!(checker.check(&doc).await.is_ok());
    }

    #[tokio::test]
    async fn live_dependents_block_and_are_named() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let target = make_effective("SOP-030");
        let dependent = make_effective("SOP-031");
        let retired = {
            let mut doc = make_effective("SOP-032");
            doc.status = DocumentState::Obsolete;
            doc
        };
        store.seed_document(target.clone()).unwrap();
        store.seed_document(dependent.clone()).unwrap();
        store.seed_document(retired.clone()).unwrap();

        store
            .upsert_dependency(DocumentDependency::new(
                dependent.id.clone(),
                target.id.clone(),
            ))
            .await
            .unwrap();
        // Edges from retired documents and inactive edges do not count.
        store
            .upsert_dependency(DocumentDependency::new(retired.id.clone(), target.id.clone()))
            .await
            .unwrap();
        let mut inactive = DocumentDependency::new(retired.id.clone(), target.id.clone());
        inactive.deactivate();
        store.upsert_dependency(inactive).await.unwrap();

        let checker = ObsolescenceChecker::new(store);
        let err = checker.check(&target).await.unwrap_err();
        match err {
            LifecycleError::DependencyBlocked { blockers } => {
                assert_eq!(blockers.dependents.len(), 1);
                assert_eq!(blockers.dependents[0].number, dependent.number);
            }
            other => panic!("expected DependencyBlocked, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn newer_sibling_in_development_blocks() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let target = make_effective("SOP-030");
        let newer = make_sibling(&target, 1, DocumentState::UnderReview);
        let superseded_older = {
            let mut doc = make_sibling(&target, 0, DocumentState::Superseded);
            doc.version = VersionNumber::new(0, 9);
            doc
        };
        store.seed_document(target.clone()).unwrap();
        store.seed_document(newer.clone()).unwrap();
        store.seed_document(superseded_older).unwrap();

        let checker = ObsolescenceChecker::new(store);
        let blockers = checker.blockers(&target).await.unwrap();
        assert_eq!(blockers.in_development.len(), 1);
        assert_eq!(blockers.in_development[0].document_id, newer.id);
        assert!(blockers.dependents.is_empty());
    }

    #[tokio::test]
    async fn open_workflow_anywhere_in_family_blocks() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let target = make_effective("SOP-030");
        // Effective sibling is not "in development" but its open workflow blocks.
        let sibling = make_sibling(&target, 1, DocumentState::Effective);
        store.seed_document(target.clone()).unwrap();
        store.seed_document(sibling.clone()).unwrap();
        open_workflow_on(&store, &sibling).await;

        let checker = ObsolescenceChecker::new(store);
        let blockers = checker.blockers(&target).await.unwrap();
        assert!(blockers.in_development.is_empty());
        assert_eq!(blockers.open_workflows.len(), 1);
        assert_eq!(blockers.open_workflows[0].kind, WorkflowKind::UpVersion);
        assert_eq!(blockers.open_workflows[0].document_id, sibling.id);
    }
}
