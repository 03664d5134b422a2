//! Sensitivity label resolution
//!
//! Two moments touch the label: up-versioning, where the new draft inherits
//! the parent's tier, and approval, where the approver must either confirm
//! the current tier or change it with a recorded reason. Label changes are
//! audited as their own event, separate from the state transition.

use chrono::{DateTime, Utc};
use vellum_types::{
    ActorId, Document, LifecycleError, LifecycleResult, SensitivityLabel, SensitivityResolution,
};

#[derive(Default)]
pub struct SensitivityResolver;

impl SensitivityResolver {
    pub fn new() -> Self {
        Self
    }

    /// Copies the parent's label onto a new version and records where it came
    /// from. Set-by and set-at stay empty until the next approval fills them.
    pub fn inherit(&self, child: &mut Document, parent: &Document) {
        child.sensitivity = parent.sensitivity;
        child.sensitivity_inherited_from = Some(parent.id.clone());
        child.sensitivity_set_by = None;
        child.sensitivity_set_at = None;
    }

    /// Resolves the label supplied at approval against the document's current
    /// label. A label is always required; a change additionally requires a
    /// non-empty reason.
    pub fn resolve_at_approval(
        &self,
        document: &Document,
        supplied: Option<SensitivityLabel>,
        change_reason: Option<&str>,
    ) -> LifecycleResult<SensitivityResolution> {
        let next = supplied.ok_or_else(|| {
            LifecycleError::ValidationFailed(
                "a sensitivity label must be confirmed or assigned at approval".to_string(),
            )
        })?;

        match document.sensitivity {
            None => Ok(SensitivityResolution::Initial { label: next }),
            Some(current) if current == next => {
                Ok(SensitivityResolution::Confirmed { label: next })
            }
            Some(current) => {
                let reason = change_reason.map(str::trim).filter(|r| !r.is_empty());
                match reason {
                    Some(reason) => Ok(SensitivityResolution::Changed {
                        previous: current,
                        next,
                        reason: reason.to_string(),
                    }),
                    None => Err(LifecycleError::ValidationFailed(format!(
                        "changing sensitivity from {} to {} requires a reason",
                        current, next
                    ))),
                }
            }
        }
    }

    /// Stamps the resolved label onto the document. The inheritance pointer
    /// is kept for provenance.
    pub fn stamp(
        &self,
        document: &mut Document,
        resolution: &SensitivityResolution,
        actor: &ActorId,
        at: DateTime<Utc>,
    ) {
        document.sensitivity = Some(resolution.label());
        document.sensitivity_set_by = Some(actor.clone());
        document.sensitivity_set_at = Some(at);
    }
}
