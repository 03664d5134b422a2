//! Authorization checks
//!
//! Every operation resolves its acting user through the directory and then
//! applies two kinds of checks: a minimum access level, and identity rules
//! (assigned role holder, segregation of duties). Admin level overrides the
//! identity rules but never the state preconditions.

use crate::ports::ActorDirectory;
use std::sync::Arc;
use vellum_types::{AccessLevel, Actor, ActorId, Document, LifecycleError, LifecycleResult};

pub struct AuthorityChecker {
    directory: Arc<dyn ActorDirectory>,
}

impl AuthorityChecker {
    pub fn new(directory: Arc<dyn ActorDirectory>) -> Self {
        Self { directory }
    }

    /// Resolves an actor id to a known actor, or denies the operation.
    pub async fn resolve(&self, id: &ActorId) -> LifecycleResult<Actor> {
        match self.directory.actor(id).await? {
            Some(actor) => Ok(actor),
            None => {
                tracing::warn!(actor = %id, "Authorization failed: unknown actor");
                Err(LifecycleError::Unauthorized(format!("unknown actor: {}", id)))
            }
        }
    }

    /// Resolves and requires at least the given access level.
    pub async fn require_level(
        &self,
        id: &ActorId,
        required: AccessLevel,
    ) -> LifecycleResult<Actor> {
        let actor = self.resolve(id).await?;
        if !actor.level.permits(required) {
            return Err(LifecycleError::Unauthorized(format!(
                "actor {} holds {} but {} is required",
                actor.id, actor.level, required
            )));
        }
        Ok(actor)
    }

    /// Requires the actor to be the assigned holder of a role. Admins may act
    /// in place of any role holder.
    pub fn require_assignee(
        &self,
        actor: &Actor,
        assignee: Option<&ActorId>,
        role: &str,
    ) -> LifecycleResult<()> {
        if actor.is_admin() {
            return Ok(());
        }
        match assignee {
            Some(holder) if *holder == actor.id => Ok(()),
            Some(_) => Err(LifecycleError::Unauthorized(format!(
                "actor {} is not the assigned {}",
                actor.id, role
            ))),
            None => Err(LifecycleError::Unauthorized(format!(
                "no {} assigned",
                role
            ))),
        }
    }

    /// Segregation of duties: the author of a document may not act as its
    /// reviewer or approver. Admin level overrides this rule.
    pub fn forbid_self_action(
        &self,
        actor: &Actor,
        author: &ActorId,
        role: &str,
    ) -> LifecycleResult<()> {
        if actor.id == *author && !actor.is_admin() {
            return Err(LifecycleError::Unauthorized(format!(
                "author {} cannot act as {} on their own document",
                actor.id, role
            )));
        }
        Ok(())
    }

    /// Termination is restricted to the document author, the assigned
    /// approver, or an admin.
    pub fn require_termination_rights(
        &self,
        actor: &Actor,
        document: &Document,
    ) -> LifecycleResult<()> {
        let is_author = actor.id == document.author;
        let is_approver = document.approver.as_ref() == Some(&actor.id);
        if is_author || is_approver || actor.is_admin() {
            Ok(())
        } else {
            Err(LifecycleError::Unauthorized(format!(
                "actor {} may not terminate workflows on document {}",
                actor.id, document.id
            )))
        }
    }
}
