//! Lifecycle orchestrator
//!
//! Every state-changing operation follows the same shape: load the document
//! and its open workflow, authorize the actor, assert the registry edge,
//! validate the payload, then submit one guarded commit carrying the
//! document update, the workflow update, the transition record, and the
//! outbox side effects. The store applies it all-or-nothing; audit events
//! are forwarded to the sink only after the commit landed.

use crate::authority::AuthorityChecker;
use crate::dependency::ObsolescenceChecker;
use crate::numbering::VersionAllocator;
use crate::outbox::OutboxWorker;
use crate::ports::{ActorDirectory, AuditSink, NotificationDispatcher, TaskBoard};
use crate::registry::{StateInfo, StateRegistry};
use crate::rejection::{ReassignmentAdvice, RejectionHistory};
use crate::sensitivity::SensitivityResolver;
use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use vellum_store::{CommitGuard, CommitRequest, CommitWrite, DocumentStore};
use vellum_types::{
    AccessLevel, ActorId, AuditAction, AuditEvent, Document, DocumentId, DocumentState,
    LifecycleError, LifecycleResult, Notification, NotificationCategory, ObsolescenceBlockers,
    RejectionKind, SensitivityLabel, SensitivityResolution, SideEffect, TaskDirective, TaskKind,
    Transition, TransitionData, Workflow, WorkflowId, WorkflowKind,
};

/// Tunables supplied at construction.
#[derive(Clone, Debug)]
pub struct OrchestratorConfig {
    /// Default review due date offset when none is given at submission.
    pub review_due_in_days: i64,
    /// Default approval due date offset when none is given at routing.
    pub approval_due_in_days: i64,
    /// Batch size handed to outbox workers built through the orchestrator.
    pub outbox_batch_size: usize,
    /// Acting identity recorded on sweep transitions.
    pub system_actor: ActorId,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            review_due_in_days: 14,
            approval_due_in_days: 7,
            outbox_batch_size: 32,
            system_actor: ActorId::new("system"),
        }
    }
}

/// What one operation did: the refreshed rows, the written transition, and
/// the audit events it emitted.
#[derive(Clone, Debug)]
pub struct TransitionOutcome {
    pub document: Document,
    pub workflow: Workflow,
    pub transition: Option<Transition>,
    pub audit_events: Vec<AuditEvent>,
}

/// The reviewer's verdict. Both arms require a comment.
#[derive(Clone, Debug)]
pub enum ReviewVerdict {
    Approved { comment: String },
    Rejected { comment: String },
}

impl ReviewVerdict {
    fn comment(&self) -> &str {
        match self {
            ReviewVerdict::Approved { comment } => comment,
            ReviewVerdict::Rejected { comment } => comment,
        }
    }

    fn approved(&self) -> bool {
        matches!(self, ReviewVerdict::Approved { .. })
    }
}

/// Approval payload. Fields are optional so a caller can express an
/// incomplete decision; validation rejects it without touching state.
#[derive(Clone, Debug, Default)]
pub struct ApprovalDecision {
    pub effective_date: Option<NaiveDate>,
    pub sensitivity: Option<SensitivityLabel>,
    /// Required when `sensitivity` differs from the document's current label.
    pub change_reason: Option<String>,
    pub comment: Option<String>,
}

/// Parameters for starting a new version of an effective document.
#[derive(Clone, Debug, Default)]
pub struct UpVersionRequest {
    pub major_increment: bool,
    /// Title override; the source's title is kept when absent.
    pub title: Option<String>,
    pub reviewer: Option<ActorId>,
    pub due_date: Option<NaiveDate>,
}

/// Parameters for scheduling retirement of an effective document.
#[derive(Clone, Debug)]
pub struct ObsolescenceRequest {
    pub obsolete_date: NaiveDate,
    pub reason: String,
}

/// What one sweep pass did.
#[derive(Clone, Debug, Default)]
pub struct SweepReport {
    pub transitioned: Vec<DocumentId>,
    pub failures: Vec<(DocumentId, String)>,
}

/// The top-level facade over the lifecycle engine.
pub struct LifecycleOrchestrator {
    store: Arc<dyn DocumentStore>,
    authority: AuthorityChecker,
    audit: Arc<dyn AuditSink>,
    registry: StateRegistry,
    allocator: VersionAllocator,
    obsolescence: ObsolescenceChecker,
    sensitivity: SensitivityResolver,
    config: OrchestratorConfig,
}

impl LifecycleOrchestrator {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        directory: Arc<dyn ActorDirectory>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self::with_config(store, directory, audit, OrchestratorConfig::default())
    }

    pub fn with_config(
        store: Arc<dyn DocumentStore>,
        directory: Arc<dyn ActorDirectory>,
        audit: Arc<dyn AuditSink>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            authority: AuthorityChecker::new(directory),
            registry: StateRegistry::new(),
            allocator: VersionAllocator::new(store.clone()),
            obsolescence: ObsolescenceChecker::new(store.clone()),
            sensitivity: SensitivityResolver::new(),
            audit,
            config,
            store,
        }
    }

    /// Builds a drain worker wired to this orchestrator's store and batch
    /// size. The worker runs independently of operations.
    pub fn outbox_worker(
        &self,
        notifications: Arc<dyn NotificationDispatcher>,
        tasks: Arc<dyn TaskBoard>,
    ) -> OutboxWorker {
        OutboxWorker::new(self.store.clone(), notifications, tasks)
            .with_batch_size(self.config.outbox_batch_size)
    }

    // ── Document creation ───────────────────────────────────────────────────

    /// Registers a brand-new controlled document as a draft at version 1.0.
    /// The review workflow is created lazily on first submission.
    pub async fn create_document(
        &self,
        actor_id: &ActorId,
        base_number: &str,
        title: &str,
        reviewer: Option<ActorId>,
    ) -> LifecycleResult<Document> {
        let actor = self
            .authority
            .require_level(actor_id, AccessLevel::Contributor)
            .await?;
        let base_number = base_number.trim();
        if base_number.is_empty() {
            return Err(LifecycleError::ValidationFailed(
                "a document number is required".to_string(),
            ));
        }
        if title.trim().is_empty() {
            return Err(LifecycleError::ValidationFailed(
                "a document title is required".to_string(),
            ));
        }

        let mut document = Document::new(
            vellum_types::FamilyId::generate(),
            base_number,
            title.trim(),
            actor.id.clone(),
        );
        if let Some(reviewer) = reviewer {
            document = document.with_reviewer(reviewer);
        }
        if self.store.document_number_exists(&document.number).await? {
            return Err(LifecycleError::ValidationFailed(format!(
                "a document numbered {} already exists",
                document.number
            )));
        }

        let request = CommitRequest::new()
            .with_guard(CommitGuard::NumberFree {
                number: document.number.clone(),
            })
            .with_write(CommitWrite::InsertDocument(document.clone()));
        self.store.apply(request).await?;

        let event = AuditEvent::new(
            AuditAction::DocumentCreated,
            actor.id.clone(),
            document.id.clone(),
        )
        .with_metadata(serde_json::json!({
            "number": document.number,
            "version": document.version.to_string(),
        }));
        self.forward_audit(std::slice::from_ref(&event)).await;

        tracing::info!(
            document_id = %document.id.short(),
            number = %document.number,
            author = %actor.id,
            "Created document"
        );
        Ok(document)
    }

    // ── Review cycle ────────────────────────────────────────────────────────

    /// Author hands the draft to its reviewer. Creates the review workflow
    /// lazily on the first submission of a document.
    pub async fn submit_for_review(
        &self,
        document_id: &DocumentId,
        actor_id: &ActorId,
        reviewer: Option<ActorId>,
        due_date: Option<NaiveDate>,
    ) -> LifecycleResult<TransitionOutcome> {
        let document = self.load_document(document_id).await?;
        let actor = self
            .authority
            .require_level(actor_id, AccessLevel::Contributor)
            .await?;
        self.authority
            .require_assignee(&actor, Some(&document.author), "author")?;
        let from = document.status;
        self.registry.assert_edge(from, DocumentState::PendingReview)?;

        let reviewer = reviewer.or_else(|| document.reviewer.clone()).ok_or_else(|| {
            LifecycleError::ValidationFailed(
                "a reviewer must be assigned before submission".to_string(),
            )
        })?;

        let now = Utc::now();
        let today = now.date_naive();
        let due = due_date.unwrap_or(today + chrono::Duration::days(self.config.review_due_in_days));

        let mut updated = document.clone();
        updated.status = DocumentState::PendingReview;
        updated.reviewer = Some(reviewer.clone());
        updated.updated_at = now;

        let existing = self.store.find_open_workflow(&document.id).await?;
        let mut request = CommitRequest::new().with_guard(CommitGuard::DocumentStatus {
            document_id: document.id.clone(),
            expected: from,
        });

        let workflow = match existing {
            Some(mut workflow) => {
                request = request.with_guard(CommitGuard::WorkflowRevision {
                    workflow_id: workflow.id.clone(),
                    expected: workflow.revision,
                });
                workflow.state = DocumentState::PendingReview;
                workflow.assignee = Some(reviewer.clone());
                workflow.due_date = Some(due);
                workflow.updated_at = now;
                request = request.with_write(CommitWrite::UpdateWorkflow(workflow.clone()));
                workflow
            }
            None => {
                let workflow = Workflow::new(
                    document.id.clone(),
                    WorkflowKind::Review,
                    DocumentState::PendingReview,
                    actor.id.clone(),
                )
                .with_assignee(reviewer.clone())
                .with_due_date(due);
                request = request.with_write(CommitWrite::InsertWorkflow(workflow.clone()));
                workflow
            }
        };

        let transition = Transition::new(
            workflow.id.clone(),
            from,
            DocumentState::PendingReview,
            actor.id.clone(),
        );
        request = request
            .with_write(CommitWrite::UpdateDocument(updated.clone()))
            .with_write(CommitWrite::AppendTransition(transition.clone()))
            .with_side_effect(notify(
                vec![reviewer.clone()],
                format!("Review requested: {}", updated.number),
                format!(
                    "{} ({}) is ready for review, due {}",
                    updated.title, updated.number, due
                ),
                NotificationCategory::ReviewRequested,
            ))
            .with_side_effect(SideEffect::Task(TaskDirective::open(
                TaskKind::Review,
                document.id.clone(),
                &workflow.id,
                reviewer.clone(),
            )));

        self.store.apply(request).await?;
        tracing::info!(
            document_id = %document.id.short(),
            number = %document.number,
            reviewer = %reviewer,
            "Submitted for review"
        );

        let events = vec![state_change_event(
            &actor.id,
            &document,
            &workflow.id,
            from,
            DocumentState::PendingReview,
            serde_json::json!({ "reviewer": reviewer.to_string(), "due": due.to_string() }),
        )];
        self.finish(&document.id, &workflow.id, Some(transition), events)
            .await
    }

    /// Assigned reviewer takes the document under review.
    pub async fn start_review(
        &self,
        document_id: &DocumentId,
        actor_id: &ActorId,
    ) -> LifecycleResult<TransitionOutcome> {
        let document = self.load_document(document_id).await?;
        let actor = self
            .authority
            .require_level(actor_id, AccessLevel::Contributor)
            .await?;
        self.authority
            .require_assignee(&actor, document.reviewer.as_ref(), "reviewer")?;
        self.authority
            .forbid_self_action(&actor, &document.author, "reviewer")?;
        let from = document.status;
        self.registry.assert_edge(from, DocumentState::UnderReview)?;
        let workflow = self.open_workflow_required(&document).await?;

        let now = Utc::now();
        let mut updated = document.clone();
        updated.status = DocumentState::UnderReview;
        updated.updated_at = now;
        let mut updated_workflow = workflow.clone();
        updated_workflow.state = DocumentState::UnderReview;
        updated_workflow.updated_at = now;

        let transition = Transition::new(
            workflow.id.clone(),
            from,
            DocumentState::UnderReview,
            actor.id.clone(),
        );
        let request = CommitRequest::new()
            .with_guard(CommitGuard::DocumentStatus {
                document_id: document.id.clone(),
                expected: from,
            })
            .with_guard(CommitGuard::WorkflowRevision {
                workflow_id: workflow.id.clone(),
                expected: workflow.revision,
            })
            .with_write(CommitWrite::UpdateDocument(updated))
            .with_write(CommitWrite::UpdateWorkflow(updated_workflow))
            .with_write(CommitWrite::AppendTransition(transition.clone()));

        self.store.apply(request).await?;
        tracing::info!(
            document_id = %document.id.short(),
            number = %document.number,
            reviewer = %actor.id,
            "Review started"
        );

        let events = vec![state_change_event(
            &actor.id,
            &document,
            &workflow.id,
            from,
            DocumentState::UnderReview,
            serde_json::json!({}),
        )];
        self.finish(&document.id, &workflow.id, Some(transition), events)
            .await
    }

    /// Reviewer finishes: forward to the approval leg, or send the draft
    /// back to its author with the review comment.
    pub async fn complete_review(
        &self,
        document_id: &DocumentId,
        actor_id: &ActorId,
        verdict: ReviewVerdict,
    ) -> LifecycleResult<TransitionOutcome> {
        let document = self.load_document(document_id).await?;
        let actor = self
            .authority
            .require_level(actor_id, AccessLevel::Contributor)
            .await?;
        self.authority
            .require_assignee(&actor, document.reviewer.as_ref(), "reviewer")?;
        self.authority
            .forbid_self_action(&actor, &document.author, "reviewer")?;
        let from = document.status;
        if from != DocumentState::UnderReview {
            return Err(LifecycleError::InvalidTransition(format!(
                "completing review requires a document under review; {} is {}",
                document.number, from
            )));
        }
        let to = if verdict.approved() {
            DocumentState::ReviewCompleted
        } else {
            DocumentState::Draft
        };
        self.registry.assert_edge(from, to)?;
        if verdict.comment().trim().is_empty() {
            return Err(LifecycleError::ValidationFailed(
                "a review comment is required".to_string(),
            ));
        }
        let workflow = self.open_workflow_required(&document).await?;

        let now = Utc::now();
        let mut updated = document.clone();
        updated.status = to;
        updated.updated_at = now;
        let mut updated_workflow = workflow.clone();
        updated_workflow.state = to;
        updated_workflow.assignee = Some(document.author.clone());
        updated_workflow.updated_at = now;

        let mut transition =
            Transition::new(workflow.id.clone(), from, to, actor.id.clone())
                .with_comment(verdict.comment().trim());

        let mut effects: Vec<SideEffect> = vec![SideEffect::Task(TaskDirective::close(
            TaskKind::Review,
            &workflow.id,
        ))];
        if verdict.approved() {
            effects.push(notify(
                vec![document.author.clone()],
                format!("Review completed: {}", document.number),
                format!("{} passed review and can be routed for approval", document.number),
                NotificationCategory::ReviewCompleted,
            ));
        } else {
            let previous_assignees: Vec<ActorId> = document.reviewer.iter().cloned().collect();
            updated.reviewer = None;
            updated_workflow.record_rejection(
                RejectionKind::Review,
                actor.id.clone(),
                verdict.comment().trim(),
                previous_assignees.clone(),
            );
            transition = transition.with_data(TransitionData::Rejection {
                kind: RejectionKind::Review,
                previous_assignees,
            });
            effects.push(notify(
                vec![document.author.clone()],
                format!("Document rejected at review: {}", document.number),
                format!("{} was sent back to draft: {}", document.number, verdict.comment().trim()),
                NotificationCategory::DocumentRejected,
            ));
        }

        let mut request = CommitRequest::new()
            .with_guard(CommitGuard::DocumentStatus {
                document_id: document.id.clone(),
                expected: from,
            })
            .with_guard(CommitGuard::WorkflowRevision {
                workflow_id: workflow.id.clone(),
                expected: workflow.revision,
            })
            .with_write(CommitWrite::UpdateDocument(updated))
            .with_write(CommitWrite::UpdateWorkflow(updated_workflow))
            .with_write(CommitWrite::AppendTransition(transition.clone()));
        for effect in effects {
            request = request.with_side_effect(effect);
        }

        self.store.apply(request).await?;
        tracing::info!(
            document_id = %document.id.short(),
            number = %document.number,
            approved = verdict.approved(),
            "Review completed"
        );

        let events = vec![state_change_event(
            &actor.id,
            &document,
            &workflow.id,
            from,
            to,
            serde_json::json!({ "approved": verdict.approved() }),
        )];
        self.finish(&document.id, &workflow.id, Some(transition), events)
            .await
    }

    /// Author routes a reviewed document to its approver.
    pub async fn route_for_approval(
        &self,
        document_id: &DocumentId,
        actor_id: &ActorId,
        approver: Option<ActorId>,
        due_date: Option<NaiveDate>,
    ) -> LifecycleResult<TransitionOutcome> {
        let document = self.load_document(document_id).await?;
        let actor = self
            .authority
            .require_level(actor_id, AccessLevel::Contributor)
            .await?;
        self.authority
            .require_assignee(&actor, Some(&document.author), "author")?;
        let from = document.status;
        self.registry.assert_edge(from, DocumentState::PendingApproval)?;

        let approver = approver.or_else(|| document.approver.clone()).ok_or_else(|| {
            LifecycleError::ValidationFailed(
                "an approver must be assigned before routing for approval".to_string(),
            )
        })?;
        let workflow = self.open_workflow_required(&document).await?;

        let now = Utc::now();
        let today = now.date_naive();
        let due =
            due_date.unwrap_or(today + chrono::Duration::days(self.config.approval_due_in_days));

        let mut updated = document.clone();
        updated.status = DocumentState::PendingApproval;
        updated.approver = Some(approver.clone());
        updated.updated_at = now;
        let mut updated_workflow = workflow.clone();
        updated_workflow.state = DocumentState::PendingApproval;
        updated_workflow.assignee = Some(approver.clone());
        updated_workflow.due_date = Some(due);
        updated_workflow.updated_at = now;

        let transition = Transition::new(
            workflow.id.clone(),
            from,
            DocumentState::PendingApproval,
            actor.id.clone(),
        );
        let request = CommitRequest::new()
            .with_guard(CommitGuard::DocumentStatus {
                document_id: document.id.clone(),
                expected: from,
            })
            .with_guard(CommitGuard::WorkflowRevision {
                workflow_id: workflow.id.clone(),
                expected: workflow.revision,
            })
            .with_write(CommitWrite::UpdateDocument(updated.clone()))
            .with_write(CommitWrite::UpdateWorkflow(updated_workflow))
            .with_write(CommitWrite::AppendTransition(transition.clone()))
            .with_side_effect(notify(
                vec![approver.clone()],
                format!("Approval requested: {}", updated.number),
                format!(
                    "{} ({}) passed review and awaits approval, due {}",
                    updated.title, updated.number, due
                ),
                NotificationCategory::ApprovalRequested,
            ))
            .with_side_effect(SideEffect::Task(TaskDirective::open(
                TaskKind::Approval,
                document.id.clone(),
                &workflow.id,
                approver.clone(),
            )));

        self.store.apply(request).await?;
        tracing::info!(
            document_id = %document.id.short(),
            number = %document.number,
            approver = %approver,
            "Routed for approval"
        );

        let events = vec![state_change_event(
            &actor.id,
            &document,
            &workflow.id,
            from,
            DocumentState::PendingApproval,
            serde_json::json!({ "approver": approver.to_string(), "due": due.to_string() }),
        )];
        self.finish(&document.id, &workflow.id, Some(transition), events)
            .await
    }

    // ── Approval ────────────────────────────────────────────────────────────

    /// Approver grants approval. With an effective date of today or earlier
    /// the document takes effect immediately (superseding its source if it
    /// is an up-version); a future date parks it until the activation sweep.
    pub async fn approve_document(
        &self,
        document_id: &DocumentId,
        actor_id: &ActorId,
        decision: ApprovalDecision,
    ) -> LifecycleResult<TransitionOutcome> {
        let document = self.load_document(document_id).await?;
        let actor = self
            .authority
            .require_level(actor_id, AccessLevel::Approver)
            .await?;
        self.authority
            .require_assignee(&actor, document.approver.as_ref(), "approver")?;
        self.authority
            .forbid_self_action(&actor, &document.author, "approver")?;
        let from = document.status;
        if from != DocumentState::PendingApproval {
            return Err(LifecycleError::InvalidTransition(format!(
                "approval requires a document pending approval; {} is {}",
                document.number, from
            )));
        }

        let effective_date = decision.effective_date.ok_or_else(|| {
            LifecycleError::ValidationFailed(
                "an effective date is required for approval".to_string(),
            )
        })?;
        let resolution = self.sensitivity.resolve_at_approval(
            &document,
            decision.sensitivity,
            decision.change_reason.as_deref(),
        )?;

        let now = Utc::now();
        let today = now.date_naive();
        let immediate = effective_date <= today;
        let to = if immediate {
            DocumentState::Effective
        } else {
            DocumentState::ApprovedPendingEffective
        };
        self.registry.assert_edge(from, to)?;
        let workflow = self.open_workflow_required(&document).await?;

        let mut updated = document.clone();
        updated.status = to;
        updated.effective_date = Some(effective_date);
        updated.updated_at = now;
        self.sensitivity.stamp(&mut updated, &resolution, &actor.id, now);

        let mut updated_workflow = workflow.clone();
        updated_workflow.state = to;
        updated_workflow.assignee = None;
        updated_workflow.updated_at = now;

        let mut transition = Transition::new(workflow.id.clone(), from, to, actor.id.clone())
            .with_data(TransitionData::Approval {
                effective_date,
                sensitivity: resolution.label(),
            });
        if let Some(comment) = decision.comment.as_deref().map(str::trim).filter(|c| !c.is_empty())
        {
            transition = transition.with_comment(comment);
        }

        let mut request = CommitRequest::new()
            .with_guard(CommitGuard::DocumentStatus {
                document_id: document.id.clone(),
                expected: from,
            })
            .with_guard(CommitGuard::WorkflowRevision {
                workflow_id: workflow.id.clone(),
                expected: workflow.revision,
            })
            .with_write(CommitWrite::UpdateDocument(updated.clone()))
            .with_write(CommitWrite::UpdateWorkflow(updated_workflow))
            .with_write(CommitWrite::AppendTransition(transition.clone()))
            .with_side_effect(SideEffect::Task(TaskDirective::close(
                TaskKind::Approval,
                &workflow.id,
            )));

        let mut events = vec![state_change_event(
            &actor.id,
            &document,
            &workflow.id,
            from,
            to,
            serde_json::json!({ "effective_date": effective_date.to_string() }),
        )];
        events.push(sensitivity_event(&actor.id, &document, &resolution, now));

        if immediate {
            request = request.with_side_effect(notify(
                participants(&updated),
                format!("Document effective: {}", updated.number),
                format!("{} ({}) is now effective", updated.title, updated.number),
                NotificationCategory::DocumentEffective,
            ));
            let addon = self.supersession_addon(&updated, &actor.id, today).await?;
            request = merge_addon(request, addon.0, addon.1, addon.2);
            events.extend(addon.3);
        } else {
            request = request.with_side_effect(notify(
                vec![updated.author.clone()],
                format!("Document approved: {}", updated.number),
                format!(
                    "{} was approved and takes effect on {}",
                    updated.number, effective_date
                ),
                NotificationCategory::DocumentApproved,
            ));
        }

        self.store.apply(request).await?;
        tracing::info!(
            document_id = %document.id.short(),
            number = %document.number,
            effective_date = %effective_date,
            immediate,
            "Document approved"
        );

        self.finish(&document.id, &workflow.id, Some(transition), events)
            .await
    }

    /// Approver sends the document back to draft. Both the reviewer and the
    /// approver assignments are cleared.
    pub async fn reject_document(
        &self,
        document_id: &DocumentId,
        actor_id: &ActorId,
        comment: &str,
    ) -> LifecycleResult<TransitionOutcome> {
        let document = self.load_document(document_id).await?;
        let actor = self
            .authority
            .require_level(actor_id, AccessLevel::Approver)
            .await?;
        self.authority
            .require_assignee(&actor, document.approver.as_ref(), "approver")?;
        self.authority
            .forbid_self_action(&actor, &document.author, "approver")?;
        let from = document.status;
        if from != DocumentState::PendingApproval {
            return Err(LifecycleError::InvalidTransition(format!(
                "approval rejection requires a document pending approval; {} is {}",
                document.number, from
            )));
        }
        self.registry.assert_edge(from, DocumentState::Draft)?;
        if comment.trim().is_empty() {
            return Err(LifecycleError::ValidationFailed(
                "a rejection comment is required".to_string(),
            ));
        }
        let workflow = self.open_workflow_required(&document).await?;

        let now = Utc::now();
        let previous_assignees: Vec<ActorId> = document
            .reviewer
            .iter()
            .chain(document.approver.iter())
            .cloned()
            .collect();

        let mut updated = document.clone();
        updated.status = DocumentState::Draft;
        updated.reviewer = None;
        updated.approver = None;
        updated.updated_at = now;

        let mut updated_workflow = workflow.clone();
        updated_workflow.state = DocumentState::Draft;
        updated_workflow.assignee = Some(document.author.clone());
        updated_workflow.updated_at = now;
        updated_workflow.record_rejection(
            RejectionKind::Approval,
            actor.id.clone(),
            comment.trim(),
            previous_assignees.clone(),
        );

        let transition =
            Transition::new(workflow.id.clone(), from, DocumentState::Draft, actor.id.clone())
                .with_comment(comment.trim())
                .with_data(TransitionData::Rejection {
                    kind: RejectionKind::Approval,
                    previous_assignees,
                });

        let request = CommitRequest::new()
            .with_guard(CommitGuard::DocumentStatus {
                document_id: document.id.clone(),
                expected: from,
            })
            .with_guard(CommitGuard::WorkflowRevision {
                workflow_id: workflow.id.clone(),
                expected: workflow.revision,
            })
            .with_write(CommitWrite::UpdateDocument(updated))
            .with_write(CommitWrite::UpdateWorkflow(updated_workflow))
            .with_write(CommitWrite::AppendTransition(transition.clone()))
            .with_side_effect(SideEffect::Task(TaskDirective::close(
                TaskKind::Approval,
                &workflow.id,
            )))
            .with_side_effect(notify(
                vec![document.author.clone()],
                format!("Document rejected at approval: {}", document.number),
                format!("{} was sent back to draft: {}", document.number, comment.trim()),
                NotificationCategory::DocumentRejected,
            ));

        self.store.apply(request).await?;
        tracing::info!(
            document_id = %document.id.short(),
            number = %document.number,
            approver = %actor.id,
            "Document rejected at approval"
        );

        let events = vec![state_change_event(
            &actor.id,
            &document,
            &workflow.id,
            from,
            DocumentState::Draft,
            serde_json::json!({ "kind": "approval_rejection" }),
        )];
        self.finish(&document.id, &workflow.id, Some(transition), events)
            .await
    }

    // ── Termination ─────────────────────────────────────────────────────────

    /// Abandons the document's current workflow. The document reverts to
    /// `Effective` if it ever took effect, otherwise to `Draft`; the workflow
    /// itself closes as `Terminated`.
    pub async fn terminate_workflow(
        &self,
        document_id: &DocumentId,
        actor_id: &ActorId,
        reason: &str,
    ) -> LifecycleResult<TransitionOutcome> {
        let document = self.load_document(document_id).await?;
        let actor = self
            .authority
            .require_level(actor_id, AccessLevel::Contributor)
            .await?;
        self.authority.require_termination_rights(&actor, &document)?;
        let from = document.status;
        self.registry.assert_edge(from, DocumentState::Terminated)?;
        if reason.trim().is_empty() {
            return Err(LifecycleError::ValidationFailed(
                "a termination reason is required".to_string(),
            ));
        }

        let now = Utc::now();
        // Only a recorded activation counts; a lapsed effective date on an
        // approval the activation sweep never processed does not.
        let history = self.store.list_transitions_for_document(&document.id).await?;
        let reverted_to = if history
            .iter()
            .any(|t| t.to_state == DocumentState::Effective)
        {
            DocumentState::Effective
        } else {
            DocumentState::Draft
        };

        let mut updated = document.clone();
        updated.status = reverted_to;
        updated.updated_at = now;
        if reverted_to == DocumentState::Draft {
            // An approval that never activated does not survive termination.
            updated.effective_date = None;
        }
        if from == DocumentState::ScheduledForObsolescence {
            updated.obsolete_date = None;
            updated.obsolescence_reason = None;
        }

        let existing = self.store.find_open_workflow(&document.id).await?;
        let mut request = CommitRequest::new().with_guard(CommitGuard::DocumentStatus {
            document_id: document.id.clone(),
            expected: from,
        });
        let workflow = match existing {
            Some(mut workflow) => {
                request = request.with_guard(CommitGuard::WorkflowRevision {
                    workflow_id: workflow.id.clone(),
                    expected: workflow.revision,
                });
                workflow.state = DocumentState::Terminated;
                workflow.assignee = None;
                workflow.updated_at = now;
                request = request.with_write(CommitWrite::UpdateWorkflow(workflow.clone()));
                workflow
            }
            None => {
                // A draft that was never submitted has no workflow yet; the
                // termination itself becomes its only episode.
                let workflow = Workflow::new(
                    document.id.clone(),
                    WorkflowKind::Termination,
                    DocumentState::Terminated,
                    actor.id.clone(),
                );
                request = request.with_write(CommitWrite::InsertWorkflow(workflow.clone()));
                workflow
            }
        };

        let transition = Transition::new(
            workflow.id.clone(),
            from,
            DocumentState::Terminated,
            actor.id.clone(),
        )
        .with_comment(reason.trim())
        .with_data(TransitionData::Termination {
            reason: reason.trim().to_string(),
            reverted_to,
        });

        request = request
            .with_write(CommitWrite::UpdateDocument(updated.clone()))
            .with_write(CommitWrite::AppendTransition(transition.clone()))
            .with_side_effect(SideEffect::Task(TaskDirective::close(
                TaskKind::Review,
                &workflow.id,
            )))
            .with_side_effect(SideEffect::Task(TaskDirective::close(
                TaskKind::Approval,
                &workflow.id,
            )))
            .with_side_effect(notify(
                participants(&document),
                format!("Workflow terminated: {}", document.number),
                format!(
                    "The {} workflow on {} was terminated: {}",
                    workflow.kind,
                    document.number,
                    reason.trim()
                ),
                NotificationCategory::WorkflowTerminated,
            ));

        self.store.apply(request).await?;
        tracing::info!(
            document_id = %document.id.short(),
            number = %document.number,
            reverted_to = %reverted_to,
            "Workflow terminated"
        );

        let events = vec![state_change_event(
            &actor.id,
            &document,
            &workflow.id,
            from,
            DocumentState::Terminated,
            serde_json::json!({
                "reason": reason.trim(),
                "document_reverted_to": reverted_to.code(),
            }),
        )];
        self.finish(&document.id, &workflow.id, Some(transition), events)
            .await
    }

    // ── Up-versioning ───────────────────────────────────────────────────────

    /// Creates the next version of an effective document as a new draft with
    /// its own workflow. The source stays effective until the new version
    /// takes effect and supersedes it.
    pub async fn start_version_workflow(
        &self,
        document_id: &DocumentId,
        actor_id: &ActorId,
        request: UpVersionRequest,
    ) -> LifecycleResult<TransitionOutcome> {
        let source = self.load_document(document_id).await?;
        let actor = self
            .authority
            .require_level(actor_id, AccessLevel::Contributor)
            .await?;
        if source.status != DocumentState::Effective {
            return Err(LifecycleError::InvalidTransition(format!(
                "only an effective document can be up-versioned; {} is {}",
                source.number, source.status
            )));
        }

        // One lifecycle episode per family at a time.
        let family = self.store.list_family(&source.family_id).await?;
        for sibling in &family {
            if let Some(open) = self.store.find_open_workflow(&sibling.id).await? {
                return Err(LifecycleError::ValidationFailed(format!(
                    "family {} already has an open {} workflow on {}",
                    source.base_number, open.kind, sibling.number
                )));
            }
        }

        let allocated = self.allocator.allocate(&source, request.major_increment).await?;

        let mut successor = Document::new(
            source.family_id.clone(),
            source.base_number.clone(),
            request.title.clone().unwrap_or_else(|| source.title.clone()),
            actor.id.clone(),
        );
        successor.version = allocated.version;
        successor.number = allocated.number.clone();
        successor.supersedes = Some(source.id.clone());
        self.sensitivity.inherit(&mut successor, &source);
        if let Some(reviewer) = request.reviewer.clone() {
            successor = successor.with_reviewer(reviewer);
        }

        let mut workflow = Workflow::new(
            successor.id.clone(),
            WorkflowKind::UpVersion,
            DocumentState::Draft,
            actor.id.clone(),
        )
        .with_assignee(actor.id.clone());
        if let Some(due) = request.due_date {
            workflow = workflow.with_due_date(due);
        }

        let commit = CommitRequest::new()
            .with_guard(CommitGuard::DocumentStatus {
                document_id: source.id.clone(),
                expected: DocumentState::Effective,
            })
            .with_guard(CommitGuard::NumberFree {
                number: allocated.number.clone(),
            })
            .with_guard(CommitGuard::VersionFree {
                family_id: source.family_id.clone(),
                version: allocated.version,
            })
            .with_guard(CommitGuard::NoOpenWorkflowInFamily {
                family_id: source.family_id.clone(),
            })
            .with_write(CommitWrite::InsertDocument(successor.clone()))
            .with_write(CommitWrite::InsertWorkflow(workflow.clone()));

        self.store.apply(commit).await?;
        tracing::info!(
            source = %source.number,
            successor = %successor.number,
            version = %successor.version,
            "Started up-version workflow"
        );

        let events = vec![AuditEvent::new(
            AuditAction::DocumentCreated,
            actor.id.clone(),
            successor.id.clone(),
        )
        .with_workflow(workflow.id.clone())
        .with_metadata(serde_json::json!({
            "number": successor.number,
            "version": successor.version.to_string(),
            "supersedes": source.number,
        }))];
        self.finish(&successor.id, &workflow.id, None, events).await
    }

    // ── Obsolescence ────────────────────────────────────────────────────────

    /// Schedules retirement of an effective document for a future date,
    /// subject to the dependency and family checks.
    pub async fn obsolete_document_directly(
        &self,
        document_id: &DocumentId,
        actor_id: &ActorId,
        request: ObsolescenceRequest,
    ) -> LifecycleResult<TransitionOutcome> {
        let document = self.load_document(document_id).await?;
        let actor = self
            .authority
            .require_level(actor_id, AccessLevel::Approver)
            .await?;
        let from = document.status;
        self.registry
            .assert_edge(from, DocumentState::ScheduledForObsolescence)?;
        if request.reason.trim().is_empty() {
            return Err(LifecycleError::ValidationFailed(
                "an obsolescence reason is required".to_string(),
            ));
        }

        let now = Utc::now();
        let today = now.date_naive();
        if request.obsolete_date <= today {
            return Err(LifecycleError::ValidationFailed(format!(
                "the obsolescence date must be in the future (got {})",
                request.obsolete_date
            )));
        }
        self.obsolescence.check(&document).await?;

        let mut updated = document.clone();
        updated.status = DocumentState::ScheduledForObsolescence;
        updated.obsolete_date = Some(request.obsolete_date);
        updated.obsolescence_reason = Some(request.reason.trim().to_string());
        updated.updated_at = now;

        let workflow = Workflow::new(
            document.id.clone(),
            WorkflowKind::Obsolete,
            DocumentState::ScheduledForObsolescence,
            actor.id.clone(),
        )
        .with_due_date(request.obsolete_date);

        let transition = Transition::new(
            workflow.id.clone(),
            from,
            DocumentState::ScheduledForObsolescence,
            actor.id.clone(),
        )
        .with_comment(request.reason.trim())
        .with_data(TransitionData::ObsolescenceSchedule {
            due: request.obsolete_date,
            reason: request.reason.trim().to_string(),
        });

        let commit = CommitRequest::new()
            .with_guard(CommitGuard::DocumentStatus {
                document_id: document.id.clone(),
                expected: from,
            })
            .with_guard(CommitGuard::NoActiveDependents {
                document_id: document.id.clone(),
            })
            .with_guard(CommitGuard::NoOpenWorkflowInFamily {
                family_id: document.family_id.clone(),
            })
            .with_write(CommitWrite::UpdateDocument(updated.clone()))
            .with_write(CommitWrite::InsertWorkflow(workflow.clone()))
            .with_write(CommitWrite::AppendTransition(transition.clone()))
            .with_side_effect(notify(
                participants(&document),
                format!("Obsolescence scheduled: {}", document.number),
                format!(
                    "{} will be obsoleted on {}: {}",
                    document.number,
                    request.obsolete_date,
                    request.reason.trim()
                ),
                NotificationCategory::ObsolescenceScheduled,
            ));

        self.store.apply(commit).await?;
        tracing::info!(
            document_id = %document.id.short(),
            number = %document.number,
            due = %request.obsolete_date,
            "Obsolescence scheduled"
        );

        let events = vec![state_change_event(
            &actor.id,
            &document,
            &workflow.id,
            from,
            DocumentState::ScheduledForObsolescence,
            serde_json::json!({
                "due": request.obsolete_date.to_string(),
                "reason": request.reason.trim(),
            }),
        )];
        self.finish(&document.id, &workflow.id, Some(transition), events)
            .await
    }

    // ── Periodic sweeps ─────────────────────────────────────────────────────

    /// Activates every approved document whose effective date has arrived.
    /// Invoked by an external periodic trigger.
    pub async fn run_activation_sweep(&self, today: NaiveDate) -> LifecycleResult<SweepReport> {
        let due = self.store.list_due_for_activation(today).await?;
        let mut report = SweepReport::default();
        for document in due {
            match self.activate_due(&document, today).await {
                Ok(()) => report.transitioned.push(document.id.clone()),
                Err(err) => {
                    tracing::warn!(
                        document_id = %document.id.short(),
                        number = %document.number,
                        error = %err,
                        "Activation sweep skipped document"
                    );
                    report.failures.push((document.id.clone(), err.to_string()));
                }
            }
        }
        if !report.transitioned.is_empty() || !report.failures.is_empty() {
            tracing::info!(
                activated = report.transitioned.len(),
                failed = report.failures.len(),
                "Activation sweep finished"
            );
        }
        Ok(report)
    }

    async fn activate_due(&self, document: &Document, today: NaiveDate) -> LifecycleResult<()> {
        let workflow = self.open_workflow_required(document).await?;
        let from = document.status;
        self.registry.assert_edge(from, DocumentState::Effective)?;
        let actor = self.config.system_actor.clone();

        let now = Utc::now();
        let mut updated = document.clone();
        updated.status = DocumentState::Effective;
        updated.updated_at = now;
        let mut updated_workflow = workflow.clone();
        updated_workflow.state = DocumentState::Effective;
        updated_workflow.assignee = None;
        updated_workflow.updated_at = now;

        let transition =
            Transition::new(workflow.id.clone(), from, DocumentState::Effective, actor.clone());

        let mut request = CommitRequest::new()
            .with_guard(CommitGuard::DocumentStatus {
                document_id: document.id.clone(),
                expected: from,
            })
            .with_guard(CommitGuard::WorkflowRevision {
                workflow_id: workflow.id.clone(),
                expected: workflow.revision,
            })
            .with_write(CommitWrite::UpdateDocument(updated.clone()))
            .with_write(CommitWrite::UpdateWorkflow(updated_workflow))
            .with_write(CommitWrite::AppendTransition(transition))
            .with_side_effect(notify(
                participants(&updated),
                format!("Document effective: {}", updated.number),
                format!("{} ({}) is now effective", updated.title, updated.number),
                NotificationCategory::DocumentEffective,
            ));

        let mut events = vec![state_change_event(
            &actor,
            document,
            &workflow.id,
            from,
            DocumentState::Effective,
            serde_json::json!({ "trigger": "activation_sweep" }),
        )];
        let addon = self.supersession_addon(&updated, &actor, today).await?;
        request = merge_addon(request, addon.0, addon.1, addon.2);
        events.extend(addon.3);

        self.store.apply(request).await?;
        self.forward_audit(&events).await;
        Ok(())
    }

    /// Retires every scheduled document whose obsolescence date has arrived.
    pub async fn run_obsolescence_sweep(&self, today: NaiveDate) -> LifecycleResult<SweepReport> {
        let due = self.store.list_due_for_obsolescence(today).await?;
        let mut report = SweepReport::default();
        for document in due {
            match self.obsolete_due(&document).await {
                Ok(()) => report.transitioned.push(document.id.clone()),
                Err(err) => {
                    tracing::warn!(
                        document_id = %document.id.short(),
                        number = %document.number,
                        error = %err,
                        "Obsolescence sweep skipped document"
                    );
                    report.failures.push((document.id.clone(), err.to_string()));
                }
            }
        }
        if !report.transitioned.is_empty() || !report.failures.is_empty() {
            tracing::info!(
                obsoleted = report.transitioned.len(),
                failed = report.failures.len(),
                "Obsolescence sweep finished"
            );
        }
        Ok(report)
    }

    async fn obsolete_due(&self, document: &Document) -> LifecycleResult<()> {
        let workflow = self.open_workflow_required(document).await?;
        let from = document.status;
        self.registry.assert_edge(from, DocumentState::Obsolete)?;
        let actor = self.config.system_actor.clone();

        let now = Utc::now();
        let mut updated = document.clone();
        updated.status = DocumentState::Obsolete;
        updated.updated_at = now;
        let mut updated_workflow = workflow.clone();
        updated_workflow.state = DocumentState::Obsolete;
        updated_workflow.assignee = None;
        updated_workflow.updated_at = now;

        let transition =
            Transition::new(workflow.id.clone(), from, DocumentState::Obsolete, actor.clone());

        let request = CommitRequest::new()
            .with_guard(CommitGuard::DocumentStatus {
                document_id: document.id.clone(),
                expected: from,
            })
            .with_guard(CommitGuard::WorkflowRevision {
                workflow_id: workflow.id.clone(),
                expected: workflow.revision,
            })
            .with_write(CommitWrite::UpdateDocument(updated.clone()))
            .with_write(CommitWrite::UpdateWorkflow(updated_workflow))
            .with_write(CommitWrite::AppendTransition(transition))
            .with_side_effect(notify(
                participants(&updated),
                format!("Document obsoleted: {}", updated.number),
                format!("{} ({}) has been retired", updated.title, updated.number),
                NotificationCategory::DocumentObsoleted,
            ));

        let events = vec![state_change_event(
            &actor,
            document,
            &workflow.id,
            from,
            DocumentState::Obsolete,
            serde_json::json!({ "trigger": "obsolescence_sweep" }),
        )];

        self.store.apply(request).await?;
        self.forward_audit(&events).await;
        Ok(())
    }

    // ── Read API ────────────────────────────────────────────────────────────

    pub async fn document(&self, id: &DocumentId) -> LifecycleResult<Document> {
        self.load_document(id).await
    }

    pub async fn open_workflow(&self, document_id: &DocumentId) -> LifecycleResult<Option<Workflow>> {
        Ok(self.store.find_open_workflow(document_id).await?)
    }

    /// Transition log across every workflow of a document, oldest first.
    pub async fn transition_log(&self, document_id: &DocumentId) -> LifecycleResult<Vec<Transition>> {
        Ok(self.store.list_transitions_for_document(document_id).await?)
    }

    /// Rejection timeline reconstructed from the transition log.
    pub async fn rejection_history(
        &self,
        document_id: &DocumentId,
    ) -> LifecycleResult<RejectionHistory> {
        let transitions = self.store.list_transitions_for_document(document_id).await?;
        Ok(RejectionHistory::from_transitions(&transitions))
    }

    /// Continuity-first reviewer/approver suggestion for the next round.
    pub async fn reassignment_advice(
        &self,
        document_id: &DocumentId,
    ) -> LifecycleResult<ReassignmentAdvice> {
        let document = self.load_document(document_id).await?;
        let history = self.rejection_history(document_id).await?;
        Ok(history.advise(&document))
    }

    /// Everything currently blocking retirement of a document.
    pub async fn obsolescence_blockers(
        &self,
        document_id: &DocumentId,
    ) -> LifecycleResult<ObsolescenceBlockers> {
        let document = self.load_document(document_id).await?;
        self.obsolescence.blockers(&document).await
    }

    /// The fixed state catalog with per-state metadata.
    pub fn state_catalog(&self) -> Vec<StateInfo> {
        self.registry.catalog()
    }

    /// Pending outbox depth, for operational visibility.
    pub async fn pending_outbox(&self) -> LifecycleResult<usize> {
        Ok(self.store.outbox_len().await?)
    }

    // ── Internals ───────────────────────────────────────────────────────────

    async fn load_document(&self, id: &DocumentId) -> LifecycleResult<Document> {
        self.store
            .get_document(id)
            .await?
            .ok_or_else(|| LifecycleError::DocumentNotFound(id.clone()))
    }

    async fn open_workflow_required(&self, document: &Document) -> LifecycleResult<Workflow> {
        self.store
            .find_open_workflow(&document.id)
            .await?
            .ok_or_else(|| LifecycleError::NoActiveWorkflow(document.id.clone()))
    }

    /// Extra commit parts that supersede the source of an up-version when
    /// the successor takes effect. Empty when there is nothing to supersede
    /// or the source already left `Effective` (never duplicated).
    async fn supersession_addon(
        &self,
        successor: &Document,
        acting: &ActorId,
        today: NaiveDate,
    ) -> LifecycleResult<(
        Vec<CommitGuard>,
        Vec<CommitWrite>,
        Vec<SideEffect>,
        Vec<AuditEvent>,
    )> {
        let Some(source_id) = successor.supersedes.as_ref() else {
            return Ok((vec![], vec![], vec![], vec![]));
        };
        let Some(source) = self.store.get_document(source_id).await? else {
            tracing::warn!(
                source_id = %source_id,
                successor = %successor.number,
                "Supersedes pointer targets a missing document"
            );
            return Ok((vec![], vec![], vec![], vec![]));
        };
        if source.status != DocumentState::Effective {
            tracing::debug!(
                source = %source.number,
                status = %source.status,
                "Source already left effective; skipping supersession"
            );
            return Ok((vec![], vec![], vec![], vec![]));
        }
        self.registry
            .assert_edge(DocumentState::Effective, DocumentState::Superseded)?;

        let now = Utc::now();
        let mut superseded = source.clone();
        superseded.status = DocumentState::Superseded;
        superseded.obsolete_date = Some(today);
        superseded.updated_at = now;

        let mut guards = vec![CommitGuard::DocumentStatus {
            document_id: source.id.clone(),
            expected: DocumentState::Effective,
        }];
        let mut writes = vec![CommitWrite::UpdateDocument(superseded)];

        // The supersession is recorded on the source's most recent (closed)
        // workflow so its log tells the whole story of that version.
        let mut source_workflows = self.store.list_workflows_for_document(&source.id).await?;
        match source_workflows.pop() {
            Some(mut closed) => {
                guards.push(CommitGuard::WorkflowRevision {
                    workflow_id: closed.id.clone(),
                    expected: closed.revision,
                });
                closed.state = DocumentState::Superseded;
                closed.updated_at = now;
                let transition = Transition::new(
                    closed.id.clone(),
                    DocumentState::Effective,
                    DocumentState::Superseded,
                    acting.clone(),
                )
                .with_data(TransitionData::Supersession {
                    superseded_by: successor.id.clone(),
                });
                writes.push(CommitWrite::UpdateWorkflow(closed));
                writes.push(CommitWrite::AppendTransition(transition));
            }
            None => {
                tracing::warn!(
                    source = %source.number,
                    "Superseding a document that never had a workflow"
                );
            }
        }

        let effects = vec![notify(
            vec![source.author.clone()],
            format!("Document superseded: {}", source.number),
            format!("{} was superseded by {}", source.number, successor.number),
            NotificationCategory::DocumentSuperseded,
        )];
        let events = vec![AuditEvent::new(
            AuditAction::DocumentSuperseded,
            acting.clone(),
            source.id.clone(),
        )
        .with_change(
            DocumentState::Effective.code(),
            DocumentState::Superseded.code(),
        )
        .with_metadata(serde_json::json!({ "superseded_by": successor.number }))];

        Ok((guards, writes, effects, events))
    }

    async fn forward_audit(&self, events: &[AuditEvent]) {
        for event in events {
            if let Err(err) = self.audit.record(event.clone()).await {
                tracing::warn!(
                    event_id = %event.event_id,
                    error = %err,
                    "Audit sink rejected event"
                );
            }
        }
    }

    /// Re-reads the committed rows and forwards audit events; the outcome
    /// always reflects post-commit state.
    async fn finish(
        &self,
        document_id: &DocumentId,
        workflow_id: &WorkflowId,
        transition: Option<Transition>,
        events: Vec<AuditEvent>,
    ) -> LifecycleResult<TransitionOutcome> {
        let document = self.load_document(document_id).await?;
        let workflow = self
            .store
            .get_workflow(workflow_id)
            .await?
            .ok_or_else(|| LifecycleError::WorkflowNotFound(workflow_id.clone()))?;
        self.forward_audit(&events).await;
        Ok(TransitionOutcome {
            document,
            workflow,
            transition,
            audit_events: events,
        })
    }
}

fn notify(
    recipients: Vec<ActorId>,
    subject: String,
    body: String,
    category: NotificationCategory,
) -> SideEffect {
    SideEffect::Notify(Notification::new(recipients, subject, body, category))
}

/// Author, reviewer, and approver, deduplicated, order preserved.
fn participants(document: &Document) -> Vec<ActorId> {
    let mut recipients = vec![document.author.clone()];
    for actor in document.reviewer.iter().chain(document.approver.iter()) {
        if !recipients.contains(actor) {
            recipients.push(actor.clone());
        }
    }
    recipients
}

fn state_change_event(
    actor: &ActorId,
    document: &Document,
    workflow_id: &WorkflowId,
    from: DocumentState,
    to: DocumentState,
    metadata: serde_json::Value,
) -> AuditEvent {
    AuditEvent::new(AuditAction::StateChanged, actor.clone(), document.id.clone())
        .with_workflow(workflow_id.clone())
        .with_change(from.code(), to.code())
        .with_metadata(metadata)
}

fn sensitivity_event(
    actor: &ActorId,
    document: &Document,
    resolution: &SensitivityResolution,
    at: chrono::DateTime<Utc>,
) -> AuditEvent {
    let mut event = match resolution {
        SensitivityResolution::Changed { previous, next, reason } => AuditEvent::new(
            AuditAction::SensitivityChanged,
            actor.clone(),
            document.id.clone(),
        )
        .with_change(previous.code(), next.code())
        .with_metadata(serde_json::json!({ "reason": reason })),
        SensitivityResolution::Initial { label } => AuditEvent::new(
            AuditAction::SensitivityConfirmed,
            actor.clone(),
            document.id.clone(),
        )
        .with_metadata(serde_json::json!({ "label": label.code(), "resolution": "initial" })),
        SensitivityResolution::Confirmed { label } => AuditEvent::new(
            AuditAction::SensitivityConfirmed,
            actor.clone(),
            document.id.clone(),
        )
        .with_metadata(serde_json::json!({ "label": label.code(), "resolution": "confirmed" })),
    };
    event.occurred_at = at;
    event
}

fn merge_addon(
    mut request: CommitRequest,
    guards: Vec<CommitGuard>,
    writes: Vec<CommitWrite>,
    effects: Vec<SideEffect>,
) -> CommitRequest {
    for guard in guards {
        request = request.with_guard(guard);
    }
    for write in writes {
        request = request.with_write(write);
    }
    for effect in effects {
        request = request.with_side_effect(effect);
    }
    request
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{
        RecordingAuditSink, RecordingNotificationDispatcher, RecordingTaskBoard,
        StaticActorDirectory,
    };
    use proptest::prelude::*;
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
    use vellum_store::memory::InMemoryDocumentStore;
    use vellum_types::{Actor, DocumentDependency};

    fn alice() -> ActorId {
        ActorId::new("alice")
    }

    fn bob() -> ActorId {
        ActorId::new("bob")
    }

    fn carol() -> ActorId {
        ActorId::new("carol")
    }

    fn root() -> ActorId {
        ActorId::new("root")
    }

    fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    struct Harness {
        store: Arc<InMemoryDocumentStore>,
        audit: Arc<RecordingAuditSink>,
        orchestrator: LifecycleOrchestrator,
    }

    /// First caller wins; later harnesses reuse the installed subscriber.
    /// `RUST_LOG=vellum_engine=debug cargo test -- --nocapture` shows the
    /// engine's tracing while a test runs.
    fn init_test_logging() {
        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "info".into()),
            )
            .with(tracing_subscriber::fmt::layer().without_time())
            .try_init();
    }

    fn make_harness() -> Harness {
        init_test_logging();
        let store = Arc::new(InMemoryDocumentStore::new());
        let directory = Arc::new(StaticActorDirectory::new());
        directory.register(Actor::new(alice(), "Alice", AccessLevel::Contributor));
        directory.register(Actor::new(bob(), "Bob", AccessLevel::Approver));
        directory.register(Actor::new(carol(), "Carol", AccessLevel::Approver));
        directory.register(Actor::new(root(), "Root", AccessLevel::Admin));
        let audit = Arc::new(RecordingAuditSink::new());
        let orchestrator = LifecycleOrchestrator::new(store.clone(), directory, audit.clone());
        Harness {
            store,
            audit,
            orchestrator,
        }
    }

    impl Harness {
        async fn create_draft(&self) -> Document {
            self.orchestrator
                .create_document(&alice(), "SOP-100", "Calibration Procedure", Some(bob()))
                .await
                .unwrap()
        }

        async fn drive_to_pending_approval(&self, id: &DocumentId) {
            self.orchestrator
                .submit_for_review(id, &alice(), None, None)
                .await
                .unwrap();
            self.orchestrator.start_review(id, &bob()).await.unwrap();
            self.orchestrator
                .complete_review(
                    id,
                    &bob(),
                    ReviewVerdict::Approved {
                        comment: "looks good".to_string(),
                    },
                )
                .await
                .unwrap();
            self.orchestrator
                .route_for_approval(id, &alice(), Some(carol()), None)
                .await
                .unwrap();
        }

        async fn drive_to_effective(
            &self,
            id: &DocumentId,
            label: SensitivityLabel,
        ) -> Document {
            self.drive_to_pending_approval(id).await;
            self.orchestrator
                .approve_document(
                    id,
                    &carol(),
                    ApprovalDecision {
                        effective_date: Some(today()),
                        sensitivity: Some(label),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
            self.orchestrator.document(id).await.unwrap()
        }
    }

    #[tokio::test]
    async fn create_document_registers_initial_draft() {
        let h = make_harness();
        let document = h.create_draft().await;
        assert_eq!(document.status, DocumentState::Draft);
        assert_eq!(document.number, "SOP-100-v01.00");
        assert_eq!(document.version.to_string(), "1.0");
        assert!(h
            .audit
            .events()
            .iter()
            .any(|e| e.action == AuditAction::DocumentCreated));

        let err = h
            .orchestrator
            .create_document(&alice(), "SOP-100", "Duplicate", None)
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::ValidationFailed(_)));
    }

    #[tokio::test]
    async fn submission_enforces_author_and_reviewer() {
        let h = make_harness();
        let document = h
            .orchestrator
            .create_document(&alice(), "SOP-101", "Cleaning Procedure", None)
            .await
            .unwrap();

        let err = h
            .orchestrator
            .submit_for_review(&document.id, &alice(), None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::ValidationFailed(_)));

        let err = h
            .orchestrator
            .submit_for_review(&document.id, &bob(), Some(bob()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::Unauthorized(_)));

        let outcome = h
            .orchestrator
            .submit_for_review(&document.id, &alice(), Some(bob()), None)
            .await
            .unwrap();
        assert_eq!(outcome.document.status, DocumentState::PendingReview);
        assert_eq!(outcome.workflow.kind, WorkflowKind::Review);
        assert_eq!(outcome.workflow.assignee, Some(bob()));
        assert!(outcome.workflow.due_date.is_some());
        assert_eq!(outcome.workflow.state, outcome.document.status);
    }

    #[tokio::test]
    async fn review_rejection_returns_to_draft_on_the_same_workflow() {
        let h = make_harness();
        let document = h.create_draft().await;
        h.orchestrator
            .submit_for_review(&document.id, &alice(), None, None)
            .await
            .unwrap();
        h.orchestrator.start_review(&document.id, &bob()).await.unwrap();

        let outcome = h
            .orchestrator
            .complete_review(
                &document.id,
                &bob(),
                ReviewVerdict::Rejected {
                    comment: "fix section 3".to_string(),
                },
            )
            .await
            .unwrap();

        assert_eq!(outcome.document.status, DocumentState::Draft);
        assert_eq!(outcome.document.reviewer, None);
        assert!(outcome.workflow.is_open());
        assert_eq!(outcome.workflow.state, DocumentState::Draft);
        let rejection = outcome.workflow.last_rejection.clone().unwrap();
        assert_eq!(rejection.kind, RejectionKind::Review);
        assert_eq!(rejection.previous_assignees, vec![bob()]);

        // Resubmission continues the same workflow instead of opening another.
        let resubmitted = h
            .orchestrator
            .submit_for_review(&document.id, &alice(), Some(bob()), None)
            .await
            .unwrap();
        assert_eq!(resubmitted.workflow.id, outcome.workflow.id);
    }

    #[tokio::test]
    async fn author_cannot_review_their_own_document() {
        let h = make_harness();
        let document = h
            .orchestrator
            .create_document(&alice(), "SOP-102", "Validation Protocol", Some(alice()))
            .await
            .unwrap();
        h.orchestrator
            .submit_for_review(&document.id, &alice(), None, None)
            .await
            .unwrap();

        let err = h
            .orchestrator
            .start_review(&document.id, &alice())
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::Unauthorized(_)));

        // An admin may step into the reviewer role regardless of assignment.
        let outcome = h.orchestrator.start_review(&document.id, &root()).await.unwrap();
        assert_eq!(outcome.document.status, DocumentState::UnderReview);
    }

    #[tokio::test]
    async fn approver_cannot_approve_their_own_authorship() {
        let h = make_harness();
        let document = h
            .orchestrator
            .create_document(&carol(), "SOP-103", "Deviation Handling", Some(bob()))
            .await
            .unwrap();
        h.orchestrator
            .submit_for_review(&document.id, &carol(), None, None)
            .await
            .unwrap();
        h.orchestrator.start_review(&document.id, &bob()).await.unwrap();
        h.orchestrator
            .complete_review(
                &document.id,
                &bob(),
                ReviewVerdict::Approved {
                    comment: "ok".to_string(),
                },
            )
            .await
            .unwrap();
        h.orchestrator
            .route_for_approval(&document.id, &carol(), Some(carol()), None)
            .await
            .unwrap();

        let err = h
            .orchestrator
            .approve_document(
                &document.id,
                &carol(),
                ApprovalDecision {
                    effective_date: Some(today()),
                    sensitivity: Some(SensitivityLabel::Public),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn future_effective_date_parks_until_activation_sweep() {
        let h = make_harness();
        let document = h.create_draft().await;
        h.drive_to_pending_approval(&document.id).await;

        let effective = today() + chrono::Duration::days(5);
        let outcome = h
            .orchestrator
            .approve_document(
                &document.id,
                &carol(),
                ApprovalDecision {
                    effective_date: Some(effective),
                    sensitivity: Some(SensitivityLabel::Internal),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome.document.status, DocumentState::ApprovedPendingEffective);
        assert_eq!(outcome.document.sensitivity, Some(SensitivityLabel::Internal));
        assert_eq!(outcome.document.sensitivity_set_by, Some(carol()));
        assert!(outcome.workflow.is_open());

        let early = h.orchestrator.run_activation_sweep(today()).await.unwrap();
        assert!(early.transitioned.is_empty());
        assert_eq!(
            h.orchestrator.document(&document.id).await.unwrap().status,
            DocumentState::ApprovedPendingEffective
        );

        let report = h.orchestrator.run_activation_sweep(effective).await.unwrap();
        assert_eq!(report.transitioned, vec![document.id.clone()]);
        assert!(report.failures.is_empty());

        let activated = h.orchestrator.document(&document.id).await.unwrap();
        assert_eq!(activated.status, DocumentState::Effective);
        assert!(h
            .orchestrator
            .open_workflow(&document.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn failed_approval_writes_nothing() {
        let h = make_harness();
        let document = h.create_draft().await;
        h.drive_to_pending_approval(&document.id).await;
        let log_before = h.orchestrator.transition_log(&document.id).await.unwrap().len();
        let outbox_before = h.orchestrator.pending_outbox().await.unwrap();

        let err = h
            .orchestrator
            .approve_document(
                &document.id,
                &carol(),
                ApprovalDecision {
                    effective_date: Some(today()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::ValidationFailed(_)));

        let unchanged = h.orchestrator.document(&document.id).await.unwrap();
        assert_eq!(unchanged.status, DocumentState::PendingApproval);
        assert_eq!(unchanged.sensitivity, None);
        assert_eq!(
            h.orchestrator.transition_log(&document.id).await.unwrap().len(),
            log_before
        );
        assert_eq!(h.orchestrator.pending_outbox().await.unwrap(), outbox_before);
    }

    #[tokio::test]
    async fn approval_rejection_clears_both_roles() {
        let h = make_harness();
        let document = h.create_draft().await;
        h.drive_to_pending_approval(&document.id).await;

        let outcome = h
            .orchestrator
            .reject_document(&document.id, &carol(), "needs a risk assessment")
            .await
            .unwrap();
        assert_eq!(outcome.document.status, DocumentState::Draft);
        assert_eq!(outcome.document.reviewer, None);
        assert_eq!(outcome.document.approver, None);
        let rejection = outcome.workflow.last_rejection.clone().unwrap();
        assert_eq!(rejection.kind, RejectionKind::Approval);
        assert_eq!(rejection.previous_assignees, vec![bob(), carol()]);

        let advice = h
            .orchestrator
            .reassignment_advice(&document.id)
            .await
            .unwrap();
        assert_eq!(advice.suggested_approver, Some(carol()));
        assert_eq!(advice.prior_approval_rejections, 1);
    }

    #[tokio::test]
    async fn up_version_supersedes_source_exactly_once() {
        let h = make_harness();
        let v1 = h.create_draft().await;
        let v1 = h.drive_to_effective(&v1.id, SensitivityLabel::Confidential).await;
        assert_eq!(v1.status, DocumentState::Effective);

        let started = h
            .orchestrator
            .start_version_workflow(&v1.id, &alice(), UpVersionRequest::default())
            .await
            .unwrap();
        let v2 = started.document.clone();
        assert_eq!(v2.version.to_string(), "1.1");
        assert_eq!(v2.number, "SOP-100-v01.01");
        assert_eq!(v2.supersedes, Some(v1.id.clone()));
        assert_eq!(v2.sensitivity, Some(SensitivityLabel::Confidential));
        assert_eq!(v2.sensitivity_inherited_from, Some(v1.id.clone()));
        assert_eq!(started.workflow.kind, WorkflowKind::UpVersion);
        assert_eq!(started.workflow.state, DocumentState::Draft);

        // The source keeps serving until the successor takes effect.
        assert_eq!(
            h.orchestrator.document(&v1.id).await.unwrap().status,
            DocumentState::Effective
        );

        h.orchestrator
            .submit_for_review(&v2.id, &alice(), Some(bob()), None)
            .await
            .unwrap();
        h.orchestrator.start_review(&v2.id, &bob()).await.unwrap();
        h.orchestrator
            .complete_review(
                &v2.id,
                &bob(),
                ReviewVerdict::Approved {
                    comment: "ok".to_string(),
                },
            )
            .await
            .unwrap();
        h.orchestrator
            .route_for_approval(&v2.id, &alice(), Some(carol()), None)
            .await
            .unwrap();
        h.orchestrator
            .approve_document(
                &v2.id,
                &carol(),
                ApprovalDecision {
                    effective_date: Some(today()),
                    sensitivity: Some(SensitivityLabel::Confidential),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let superseded = h.orchestrator.document(&v1.id).await.unwrap();
        assert_eq!(superseded.status, DocumentState::Superseded);
        assert!(superseded.obsolete_date.is_some());
        assert_eq!(
            h.orchestrator.document(&v2.id).await.unwrap().status,
            DocumentState::Effective
        );

        let log = h.orchestrator.transition_log(&v1.id).await.unwrap();
        let supersessions = log
            .iter()
            .filter(|t| matches!(t.data, TransitionData::Supersession { .. }))
            .count();
        assert_eq!(supersessions, 1);
        let audit_count = h
            .audit
            .events()
            .iter()
            .filter(|e| e.action == AuditAction::DocumentSuperseded)
            .count();
        assert_eq!(audit_count, 1);
    }

    #[tokio::test]
    async fn sensitivity_change_at_approval_needs_reason_and_audits() {
        let h = make_harness();
        let v1 = h.create_draft().await;
        let v1 = h.drive_to_effective(&v1.id, SensitivityLabel::Internal).await;

        let started = h
            .orchestrator
            .start_version_workflow(&v1.id, &alice(), UpVersionRequest::default())
            .await
            .unwrap();
        let v2 = started.document.clone();
        assert_eq!(v2.sensitivity, Some(SensitivityLabel::Internal));
        h.orchestrator
            .submit_for_review(&v2.id, &alice(), Some(bob()), None)
            .await
            .unwrap();
        h.orchestrator.start_review(&v2.id, &bob()).await.unwrap();
        h.orchestrator
            .complete_review(
                &v2.id,
                &bob(),
                ReviewVerdict::Approved {
                    comment: "ok".to_string(),
                },
            )
            .await
            .unwrap();
        h.orchestrator
            .route_for_approval(&v2.id, &alice(), Some(carol()), None)
            .await
            .unwrap();

        // Raising the inherited tier without a reason is rejected.
        let err = h
            .orchestrator
            .approve_document(
                &v2.id,
                &carol(),
                ApprovalDecision {
                    effective_date: Some(today()),
                    sensitivity: Some(SensitivityLabel::Confidential),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::ValidationFailed(_)));
        assert_eq!(
            h.orchestrator.document(&v2.id).await.unwrap().status,
            DocumentState::PendingApproval
        );

        let outcome = h
            .orchestrator
            .approve_document(
                &v2.id,
                &carol(),
                ApprovalDecision {
                    effective_date: Some(today()),
                    sensitivity: Some(SensitivityLabel::Confidential),
                    change_reason: Some("now cites supplier pricing".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(
            outcome.document.sensitivity,
            Some(SensitivityLabel::Confidential)
        );
        assert_eq!(outcome.document.sensitivity_set_by, Some(carol()));
        assert!(outcome.document.sensitivity_set_at.is_some());
        assert!(outcome
            .audit_events
            .iter()
            .any(|e| e.action == AuditAction::SensitivityChanged));

        let changed = h
            .audit
            .events()
            .into_iter()
            .find(|e| e.action == AuditAction::SensitivityChanged)
            .unwrap();
        assert_eq!(
            changed.before.as_deref(),
            Some(SensitivityLabel::Internal.code())
        );
        assert_eq!(
            changed.after.as_deref(),
            Some(SensitivityLabel::Confidential.code())
        );
    }

    #[tokio::test]
    async fn one_open_workflow_per_family() {
        let h = make_harness();
        let v1 = h.create_draft().await;
        h.drive_to_effective(&v1.id, SensitivityLabel::Internal).await;
        h.orchestrator
            .start_version_workflow(&v1.id, &alice(), UpVersionRequest::default())
            .await
            .unwrap();

        let err = h
            .orchestrator
            .start_version_workflow(&v1.id, &alice(), UpVersionRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::ValidationFailed(_)));
    }

    #[tokio::test]
    async fn obsolescence_blocked_by_active_dependent() {
        let h = make_harness();
        let target = h.create_draft().await;
        let target = h.drive_to_effective(&target.id, SensitivityLabel::Internal).await;

        let dependent = h
            .orchestrator
            .create_document(&alice(), "FRM-200", "Calibration Record Form", Some(bob()))
            .await
            .unwrap();
        let dependent = h
            .drive_to_effective(&dependent.id, SensitivityLabel::Internal)
            .await;
        h.store
            .upsert_dependency(DocumentDependency::new(
                dependent.id.clone(),
                target.id.clone(),
            ))
            .await
            .unwrap();

        let err = h
            .orchestrator
            .obsolete_document_directly(
                &target.id,
                &carol(),
                ObsolescenceRequest {
                    obsolete_date: today() + chrono::Duration::days(30),
                    reason: "superseded by electronic system".to_string(),
                },
            )
            .await
            .unwrap_err();
        match err {
            LifecycleError::DependencyBlocked { blockers } => {
                assert_eq!(blockers.dependents.len(), 1);
                assert_eq!(blockers.dependents[0].number, dependent.number);
            }
            other => panic!("expected dependency block, got {other}"),
        }
        assert_eq!(
            h.orchestrator.document(&target.id).await.unwrap().status,
            DocumentState::Effective
        );
    }

    #[tokio::test]
    async fn scheduled_obsolescence_retires_on_due_date() {
        let h = make_harness();
        let document = h.create_draft().await;
        let document = h
            .drive_to_effective(&document.id, SensitivityLabel::Public)
            .await;

        let err = h
            .orchestrator
            .obsolete_document_directly(
                &document.id,
                &carol(),
                ObsolescenceRequest {
                    obsolete_date: today(),
                    reason: "process retired".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::ValidationFailed(_)));

        let due = today() + chrono::Duration::days(10);
        let outcome = h
            .orchestrator
            .obsolete_document_directly(
                &document.id,
                &carol(),
                ObsolescenceRequest {
                    obsolete_date: due,
                    reason: "process retired".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome.document.status, DocumentState::ScheduledForObsolescence);
        assert_eq!(outcome.workflow.kind, WorkflowKind::Obsolete);

        let early = h.orchestrator.run_obsolescence_sweep(today()).await.unwrap();
        assert!(early.transitioned.is_empty());

        let report = h.orchestrator.run_obsolescence_sweep(due).await.unwrap();
        assert_eq!(report.transitioned, vec![document.id.clone()]);
        let retired = h.orchestrator.document(&document.id).await.unwrap();
        assert_eq!(retired.status, DocumentState::Obsolete);
        assert!(h
            .orchestrator
            .open_workflow(&document.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn termination_reverts_by_effective_history() {
        let h = make_harness();

        // Never effective: back to draft, workflow closed.
        let document = h.create_draft().await;
        h.orchestrator
            .submit_for_review(&document.id, &alice(), None, None)
            .await
            .unwrap();
        h.orchestrator.start_review(&document.id, &bob()).await.unwrap();
        let outcome = h
            .orchestrator
            .terminate_workflow(&document.id, &alice(), "withdrawn by author")
            .await
            .unwrap();
        assert_eq!(outcome.document.status, DocumentState::Draft);
        assert_eq!(outcome.workflow.state, DocumentState::Terminated);
        assert!(!outcome.workflow.is_open());
        match &outcome.transition.as_ref().unwrap().data {
            TransitionData::Termination { reverted_to, .. } => {
                assert_eq!(*reverted_to, DocumentState::Draft);
            }
            other => panic!("expected termination payload, got {other:?}"),
        }

        // Cancelling a scheduled obsolescence restores the effective document
        // and clears the schedule.
        let keeper = h
            .orchestrator
            .create_document(&alice(), "SOP-104", "Retained Procedure", Some(bob()))
            .await
            .unwrap();
        let keeper = h.drive_to_effective(&keeper.id, SensitivityLabel::Internal).await;
        h.orchestrator
            .obsolete_document_directly(
                &keeper.id,
                &carol(),
                ObsolescenceRequest {
                    obsolete_date: today() + chrono::Duration::days(30),
                    reason: "tentative retirement".to_string(),
                },
            )
            .await
            .unwrap();
        let outcome = h
            .orchestrator
            .terminate_workflow(&keeper.id, &carol(), "retirement cancelled")
            .await
            .unwrap();
        assert_eq!(outcome.document.status, DocumentState::Effective);
        assert_eq!(outcome.document.obsolete_date, None);
        assert_eq!(outcome.document.obsolescence_reason, None);
    }

    #[tokio::test]
    async fn terminating_unsubmitted_draft_creates_closed_workflow() {
        let h = make_harness();
        let document = h.create_draft().await;
        let outcome = h
            .orchestrator
            .terminate_workflow(&document.id, &alice(), "duplicate entry")
            .await
            .unwrap();
        assert_eq!(outcome.workflow.kind, WorkflowKind::Termination);
        assert_eq!(outcome.workflow.state, DocumentState::Terminated);
        assert_eq!(outcome.document.status, DocumentState::Draft);
        let log = h.orchestrator.transition_log(&document.id).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].from_state, DocumentState::Draft);
        assert_eq!(log[0].to_state, DocumentState::Terminated);
    }

    #[tokio::test]
    async fn terminating_unactivated_approval_reverts_to_draft() {
        let h = make_harness();
        let v1 = h.create_draft().await;
        let v1 = h.drive_to_effective(&v1.id, SensitivityLabel::Internal).await;

        let started = h
            .orchestrator
            .start_version_workflow(&v1.id, &alice(), UpVersionRequest::default())
            .await
            .unwrap();
        let v2 = started.document.clone();
        h.orchestrator
            .submit_for_review(&v2.id, &alice(), Some(bob()), None)
            .await
            .unwrap();
        h.orchestrator.start_review(&v2.id, &bob()).await.unwrap();
        h.orchestrator
            .complete_review(
                &v2.id,
                &bob(),
                ReviewVerdict::Approved {
                    comment: "ok".to_string(),
                },
            )
            .await
            .unwrap();
        h.orchestrator
            .route_for_approval(&v2.id, &alice(), Some(carol()), None)
            .await
            .unwrap();
        h.orchestrator
            .approve_document(
                &v2.id,
                &carol(),
                ApprovalDecision {
                    effective_date: Some(today() + chrono::Duration::days(2)),
                    sensitivity: Some(SensitivityLabel::Internal),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        // The effective date lapses while the activation sweep is down.
        let mut parked = h.orchestrator.document(&v2.id).await.unwrap();
        assert_eq!(parked.status, DocumentState::ApprovedPendingEffective);
        parked.effective_date = Some(today() - chrono::Duration::days(1));
        h.store.seed_document(parked).unwrap();

        let outcome = h
            .orchestrator
            .terminate_workflow(&v2.id, &alice(), "approval withdrawn")
            .await
            .unwrap();
        assert_eq!(outcome.document.status, DocumentState::Draft);
        assert_eq!(outcome.document.effective_date, None);
        match &outcome.transition.as_ref().unwrap().data {
            TransitionData::Termination { reverted_to, .. } => {
                assert_eq!(*reverted_to, DocumentState::Draft);
            }
            other => panic!("expected termination payload, got {other:?}"),
        }

        // The source never stopped serving and was never superseded.
        let source = h.orchestrator.document(&v1.id).await.unwrap();
        assert_eq!(source.status, DocumentState::Effective);
        let log = h.orchestrator.transition_log(&v1.id).await.unwrap();
        assert!(log
            .iter()
            .all(|t| !matches!(t.data, TransitionData::Supersession { .. })));
    }

    #[tokio::test]
    async fn illegal_edges_are_rejected_without_writes() {
        let h = make_harness();
        let document = h.create_draft().await;

        let err = h
            .orchestrator
            .start_review(&document.id, &bob())
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidTransition(_)));
        assert!(h
            .orchestrator
            .transition_log(&document.id)
            .await
            .unwrap()
            .is_empty());

        // An effective document has no workflow left to terminate.
        let effective = h
            .orchestrator
            .create_document(&alice(), "SOP-105", "Sampling Plan", Some(bob()))
            .await
            .unwrap();
        h.drive_to_effective(&effective.id, SensitivityLabel::Internal).await;
        let err = h
            .orchestrator
            .terminate_workflow(&effective.id, &alice(), "mistake")
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn replayed_operation_conflicts() {
        let h = make_harness();
        let document = h.create_draft().await;
        h.orchestrator
            .submit_for_review(&document.id, &alice(), None, None)
            .await
            .unwrap();
        h.orchestrator.start_review(&document.id, &bob()).await.unwrap();
        h.orchestrator
            .complete_review(
                &document.id,
                &bob(),
                ReviewVerdict::Approved {
                    comment: "ok".to_string(),
                },
            )
            .await
            .unwrap();

        let err = h
            .orchestrator
            .complete_review(
                &document.id,
                &bob(),
                ReviewVerdict::Approved {
                    comment: "ok again".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn outbox_drives_tasks_and_notifications() {
        let h = make_harness();
        let notifications = Arc::new(RecordingNotificationDispatcher::new());
        let tasks = Arc::new(RecordingTaskBoard::new());
        let worker = h.orchestrator.outbox_worker(notifications.clone(), tasks.clone());

        let document = h.create_draft().await;
        let submitted = h
            .orchestrator
            .submit_for_review(&document.id, &alice(), None, None)
            .await
            .unwrap();
        worker.drain().await.unwrap();
        let key = TaskDirective::key(TaskKind::Review, &submitted.workflow.id);
        assert_eq!(tasks.open_tasks(), vec![key]);
        assert!(notifications.sent().iter().any(|n| {
            n.category == NotificationCategory::ReviewRequested && n.recipients == vec![bob()]
        }));

        h.orchestrator.start_review(&document.id, &bob()).await.unwrap();
        h.orchestrator
            .complete_review(
                &document.id,
                &bob(),
                ReviewVerdict::Approved {
                    comment: "ok".to_string(),
                },
            )
            .await
            .unwrap();
        worker.drain().await.unwrap();
        assert!(tasks.open_tasks().is_empty());
        assert_eq!(h.orchestrator.pending_outbox().await.unwrap(), 0);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        // Whatever order operations are attempted in, an open workflow always
        // mirrors its document's status, and every recorded transition uses a
        // legal edge.
        #[test]
        fn random_operation_walks_preserve_invariants(ops in proptest::collection::vec(0u8..8, 1..24)) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async move {
                let h = make_harness();
                let document = h.create_draft().await;
                let registry = StateRegistry::new();
                for op in ops {
                    let result = match op {
                        0 => h.orchestrator
                            .submit_for_review(&document.id, &alice(), Some(bob()), None)
                            .await
                            .map(|_| ()),
                        1 => h.orchestrator
                            .start_review(&document.id, &bob())
                            .await
                            .map(|_| ()),
                        2 => h.orchestrator
                            .complete_review(
                                &document.id,
                                &bob(),
                                ReviewVerdict::Approved { comment: "ok".to_string() },
                            )
                            .await
                            .map(|_| ()),
                        3 => h.orchestrator
                            .complete_review(
                                &document.id,
                                &bob(),
                                ReviewVerdict::Rejected { comment: "redo".to_string() },
                            )
                            .await
                            .map(|_| ()),
                        4 => h.orchestrator
                            .route_for_approval(&document.id, &alice(), Some(carol()), None)
                            .await
                            .map(|_| ()),
                        5 => h.orchestrator
                            .approve_document(
                                &document.id,
                                &carol(),
                                ApprovalDecision {
                                    effective_date: Some(today()),
                                    sensitivity: Some(SensitivityLabel::Internal),
                                    ..Default::default()
                                },
                            )
                            .await
                            .map(|_| ()),
                        6 => h.orchestrator
                            .reject_document(&document.id, &carol(), "not yet")
                            .await
                            .map(|_| ()),
                        _ => h.orchestrator
                            .terminate_workflow(&document.id, &alice(), "reset")
                            .await
                            .map(|_| ()),
                    };
                    let _ = result;

                    let current = h.orchestrator.document(&document.id).await.unwrap();
                    if let Some(open) = h.orchestrator.open_workflow(&document.id).await.unwrap() {
                        assert_eq!(open.state, current.status);
                    }
                    for transition in h.orchestrator.transition_log(&document.id).await.unwrap() {
                        assert!(registry.can_transition(transition.from_state, transition.to_state));
                    }
                }
            });
        }
    }
}
