//! Compensating actions for partially provisioned workspaces.
//!
//! Orchestrator resources cannot be created transactionally. Each successful
//! create step pushes an undo descriptor; on failure the descriptors are
//! executed newest first.

use crate::naming::ResourceName;
use crate::orchestrator::{Orchestrator, ResourceKind};
use crate::resource::delete_resource;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum UndoOutcome {
    Deleted,
    /// The resource was already gone when the delete was issued.
    AlreadyGone,
    Failed(String),
    /// Not attempted because the caller cancelled.
    Skipped,
}

impl UndoOutcome {
    /// Whether the resource may still exist after this step.
    pub fn is_orphan(&self) -> bool {
        matches!(self, UndoOutcome::Failed(_) | UndoOutcome::Skipped)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UndoStep {
    pub kind: ResourceKind,
    pub name: ResourceName,
    pub outcome: UndoOutcome,
}

/// Result of running a compensation list, in execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RollbackReport {
    pub steps: Vec<UndoStep>,
}

impl RollbackReport {
    pub fn is_clean(&self) -> bool {
        self.steps.iter().all(|s| !s.outcome.is_orphan())
    }

    /// Resources that may have been left behind.
    pub fn orphans(&self) -> Vec<(ResourceKind, ResourceName)> {
        self.steps
            .iter()
            .filter(|s| s.outcome.is_orphan())
            .map(|s| (s.kind, s.name.clone()))
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct Compensation {
    undo: Vec<(ResourceKind, ResourceName)>,
}

impl Compensation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a resource that must be deleted if a later step fails.
    pub fn push(&mut self, kind: ResourceKind, name: ResourceName) {
        self.undo.push((kind, name));
    }

    pub fn len(&self) -> usize {
        self.undo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.undo.is_empty()
    }

    /// Run every recorded undo step in reverse order.
    ///
    /// Each delete is attempted once and independently of the others.
    /// Once `cancel` fires the remaining steps are recorded as skipped.
    pub async fn rollback(
        self,
        orchestrator: &dyn Orchestrator,
        cancel: &CancellationToken,
    ) -> RollbackReport {
        let mut report = RollbackReport::default();

        for (kind, name) in self.undo.into_iter().rev() {
            let outcome = if cancel.is_cancelled() {
                warn!(%kind, resource = %name, "Cancelled, skipping compensation");
                UndoOutcome::Skipped
            } else {
                match delete_resource(orchestrator, kind, &name, cancel).await {
                    Ok(()) => {
                        debug!(%kind, resource = %name, "Compensated");
                        UndoOutcome::Deleted
                    }
                    Err(e) if e.is_not_found() => UndoOutcome::AlreadyGone,
                    Err(e) => {
                        warn!(%kind, resource = %name, error = %e, "Compensation failed");
                        UndoOutcome::Failed(e.to_string())
                    }
                }
            };

            report.steps.push(UndoStep {
                kind,
                name,
                outcome,
            });
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OrchestratorError;
    use crate::memory::{InMemoryOrchestrator, Op};
    use crate::naming::{ResourceNamer, UserId};

    fn name() -> ResourceName {
        ResourceNamer::default().name(&UserId::from(9))
    }

    #[tokio::test]
    async fn test_rollback_of_missing_resources_is_clean() {
        let orchestrator = InMemoryOrchestrator::new();
        let mut compensation = Compensation::new();
        compensation.push(ResourceKind::ComputeUnit, name());
        compensation.push(ResourceKind::Route, name());

        let report = compensation
            .rollback(&orchestrator, &CancellationToken::new())
            .await;

        assert!(report.is_clean());
        assert_eq!(report.steps[0].kind, ResourceKind::Route);
        assert_eq!(report.steps[1].outcome, UndoOutcome::AlreadyGone);
    }

    #[tokio::test]
    async fn test_failed_undo_does_not_stop_the_rest() {
        let orchestrator = InMemoryOrchestrator::new();
        orchestrator.fail_on(
            Op::DeleteRoute,
            OrchestratorError::Unavailable("timeout".to_string()),
        );
        let mut compensation = Compensation::new();
        compensation.push(ResourceKind::NetworkService, name());
        compensation.push(ResourceKind::Route, name());

        let report = compensation
            .rollback(&orchestrator, &CancellationToken::new())
            .await;

        assert!(matches!(report.steps[0].outcome, UndoOutcome::Failed(_)));
        assert_eq!(report.steps[1].outcome, UndoOutcome::AlreadyGone);
        assert_eq!(report.orphans(), vec![(ResourceKind::Route, name())]);
        assert_eq!(orchestrator.call_count(Op::DeleteNetworkService), 1);
    }

    #[tokio::test]
    async fn test_cancelled_rollback_skips_everything() {
        let orchestrator = InMemoryOrchestrator::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut compensation = Compensation::new();
        compensation.push(ResourceKind::ComputeUnit, name());

        let report = compensation.rollback(&orchestrator, &cancel).await;

        assert_eq!(report.steps[0].outcome, UndoOutcome::Skipped);
        assert!(!report.is_clean());
        assert!(orchestrator.calls().is_empty());
    }
}
