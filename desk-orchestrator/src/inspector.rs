use crate::naming::{ResourceName, ResourceNamer, UserId};
use crate::orchestrator::{Orchestrator, OrchestratorResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

/// Where a running workspace can be reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkspaceStatus {
    Absent,
    Stopped,
    Running(Endpoint),
}

impl WorkspaceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkspaceStatus::Absent => "absent",
            WorkspaceStatus::Stopped => "stopped",
            WorkspaceStatus::Running(_) => "running",
        }
    }
}

/// Status plus the id of the compute unit that is serving it, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inspection {
    pub status: WorkspaceStatus,
    pub unit_id: Option<String>,
}

impl Inspection {
    fn without_unit(status: WorkspaceStatus) -> Self {
        Self {
            status,
            unit_id: None,
        }
    }
}

/// Looks up a user's workspace purely by its derived resource name.
#[derive(Clone)]
pub struct StatusInspector {
    orchestrator: Arc<dyn Orchestrator>,
    namer: ResourceNamer,
    route_host: String,
}

impl StatusInspector {
    pub fn new(
        orchestrator: Arc<dyn Orchestrator>,
        namer: ResourceNamer,
        route_host: impl Into<String>,
    ) -> Self {
        Self {
            orchestrator,
            namer,
            route_host: route_host.into(),
        }
    }

    pub fn resource_name(&self, user: &UserId) -> ResourceName {
        self.namer.name(user)
    }

    /// Report whether the workspace is absent, stopped, or running.
    pub async fn inspect(
        &self,
        cancel: &CancellationToken,
        user: &UserId,
    ) -> OrchestratorResult<WorkspaceStatus> {
        Ok(self.inspect_unit(cancel, user).await?.status)
    }

    /// Like [`inspect`](Self::inspect), also naming the active compute unit.
    ///
    /// A compute unit that is up but has no externally exposed service port
    /// is reported as stopped since nothing can connect to it.
    #[instrument(skip(self, cancel), fields(user_id = %user))]
    pub async fn inspect_unit(
        &self,
        cancel: &CancellationToken,
        user: &UserId,
    ) -> OrchestratorResult<Inspection> {
        let name = self.namer.name(user);
        let units = self.orchestrator.list_by_name(&name, cancel).await?;

        if units.is_empty() {
            debug!(resource = %name, "No compute unit");
            return Ok(Inspection::without_unit(WorkspaceStatus::Absent));
        }

        let Some(active) = units.iter().find(|unit| unit.state.is_active()) else {
            debug!(resource = %name, state = ?units[0].state, "Compute unit not active");
            return Ok(Inspection::without_unit(WorkspaceStatus::Stopped));
        };

        let service = self
            .orchestrator
            .describe_network_service(&name, cancel)
            .await?;

        let status = match service.and_then(|s| s.external_port) {
            Some(port) => WorkspaceStatus::Running(Endpoint {
                host: self.route_host.clone(),
                port,
                path: name.route_path(),
            }),
            None => {
                debug!(resource = %name, "Compute unit active but not exposed");
                WorkspaceStatus::Stopped
            }
        };

        Ok(Inspection {
            status,
            unit_id: Some(active.id.clone()),
        })
    }
}
