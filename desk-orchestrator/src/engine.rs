//! Workspace provisioning: turns a user identity into a running,
//! reachable, credentialed compute instance.

use crate::credential::{Credential, CredentialGenerator, DEFAULT_CREDENTIAL_LENGTH};
use crate::error::{OrchestratorError, ProvisionError, Result};
use crate::inspector::{Endpoint, StatusInspector, WorkspaceStatus};
use crate::naming::{ResourceName, ResourceNamer, UserId, DEFAULT_PREFIX};
use crate::orchestrator::{Orchestrator, ResourceKind, ServicePort};
use crate::resource::{
    ComputeUnitSpec, Created, EnvVar, NetworkServiceSpec, RouteSpec, WorkspaceResource,
};
use crate::saga::{Compensation, RollbackReport};
use crate::store::{CredentialStore, StoredCredential};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub image: String,
    /// Port the workspace image listens on inside the compute unit.
    pub internal_port: u16,
    /// Fixed external port, or `None` for an orchestrator-assigned one.
    pub external_port: Option<u16>,
    /// Environment variable the credential is handed to the image in.
    pub credential_env: String,
    pub credential_length: usize,
    pub route_host: String,
    pub name_prefix: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            image: "tit-dashboard:latest".to_string(),
            internal_port: 5900,
            external_port: None,
            credential_env: "WORKSPACE_PASSWORD".to_string(),
            credential_length: DEFAULT_CREDENTIAL_LENGTH,
            route_host: "workspaces.local".to_string(),
            name_prefix: DEFAULT_PREFIX.to_string(),
        }
    }
}

/// Connection data for a running workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provisioned {
    pub endpoint: Endpoint,
    pub credential: Credential,
    /// False when an already running workspace was returned.
    pub created: bool,
}

/// Status of a workspace and, when running, the credential it accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceReport {
    pub status: WorkspaceStatus,
    pub credential: Option<Credential>,
}

#[derive(Clone)]
pub struct ProvisioningEngine {
    orchestrator: Arc<dyn Orchestrator>,
    store: Arc<dyn CredentialStore>,
    inspector: StatusInspector,
    namer: ResourceNamer,
    generator: CredentialGenerator,
    settings: EngineSettings,
}

impl ProvisioningEngine {
    pub fn new(
        orchestrator: Arc<dyn Orchestrator>,
        store: Arc<dyn CredentialStore>,
        settings: EngineSettings,
    ) -> Self {
        let namer = ResourceNamer::new(settings.name_prefix.clone());
        let inspector =
            StatusInspector::new(orchestrator.clone(), namer.clone(), settings.route_host.clone());

        Self {
            orchestrator,
            store,
            inspector,
            namer,
            generator: CredentialGenerator::new(settings.credential_length),
            settings,
        }
    }

    pub fn resource_name(&self, user: &UserId) -> ResourceName {
        self.namer.name(user)
    }

    pub async fn status(
        &self,
        cancel: &CancellationToken,
        user: &UserId,
    ) -> std::result::Result<WorkspaceStatus, OrchestratorError> {
        self.inspector.inspect(cancel, user).await
    }

    /// Status together with the credential of the running compute unit.
    ///
    /// A stored credential issued to an earlier instance is not returned.
    pub async fn describe(
        &self,
        cancel: &CancellationToken,
        user: &UserId,
    ) -> Result<WorkspaceReport> {
        let inspection = self.inspector.inspect_unit(cancel, user).await?;

        let credential = match (&inspection.status, inspection.unit_id.as_deref()) {
            (WorkspaceStatus::Running(_), Some(unit_id)) => {
                self.current_credential(user, unit_id).await?
            }
            _ => None,
        };

        Ok(WorkspaceReport {
            status: inspection.status,
            credential,
        })
    }

    /// Return the user's running workspace, creating it if needed.
    #[instrument(skip(self, cancel), fields(user_id = %user))]
    pub async fn ensure_running(
        &self,
        cancel: &CancellationToken,
        user: &UserId,
    ) -> Result<Provisioned> {
        let name = self.namer.name(user);

        let inspection = self.inspector.inspect_unit(cancel, user).await?;
        match inspection.status {
            WorkspaceStatus::Running(endpoint) => {
                return self
                    .existing(user, &name, endpoint, inspection.unit_id.as_deref())
                    .await;
            }
            WorkspaceStatus::Stopped => {
                info!(resource = %name, "Workspace stopped, attempting fresh creation");
            }
            WorkspaceStatus::Absent => {}
        }

        self.provision(cancel, user, name).await
    }

    /// Delete every resource of the user's workspace, route first.
    ///
    /// Absent resources are skipped silently; failed deletes are reported.
    /// The stored credential is forgotten once the compute unit is gone.
    #[instrument(skip(self, cancel), fields(user_id = %user))]
    pub async fn teardown(
        &self,
        cancel: &CancellationToken,
        user: &UserId,
    ) -> Result<RollbackReport> {
        let name = self.namer.name(user);

        let mut compensation = Compensation::new();
        compensation.push(ResourceKind::ComputeUnit, name.clone());
        compensation.push(ResourceKind::NetworkService, name.clone());
        compensation.push(ResourceKind::Route, name.clone());

        let report = compensation
            .rollback(self.orchestrator.as_ref(), cancel)
            .await;

        let unit_gone = report
            .steps
            .iter()
            .any(|s| s.kind == ResourceKind::ComputeUnit && !s.outcome.is_orphan());
        if unit_gone {
            if let Err(e) = self.store.delete(user).await {
                warn!(resource = %name, error = %e, "Failed to forget stored credential");
            }
        }

        if cancel.is_cancelled() {
            return Err(ProvisionError::Cancelled { rollback: report });
        }

        if report.is_clean() {
            info!(resource = %name, "Workspace torn down");
        } else {
            warn!(resource = %name, orphans = ?report.orphans(), "Workspace teardown incomplete");
        }

        Ok(report)
    }

    async fn existing(
        &self,
        user: &UserId,
        name: &ResourceName,
        endpoint: Endpoint,
        unit_id: Option<&str>,
    ) -> Result<Provisioned> {
        let credential = match unit_id {
            Some(unit_id) => self.current_credential(user, unit_id).await?,
            None => None,
        };

        credential
            .map(|credential| Provisioned {
                endpoint,
                credential,
                created: false,
            })
            .ok_or_else(|| ProvisionError::CredentialMissing(name.clone()))
    }

    /// Stored credential, only if it was issued to the given compute unit.
    async fn current_credential(
        &self,
        user: &UserId,
        unit_id: &str,
    ) -> Result<Option<Credential>> {
        let Some(stored) = self.store.get(user).await? else {
            return Ok(None);
        };

        if stored.unit_id != unit_id {
            warn!(
                user_id = %user,
                %unit_id,
                stored_unit = %stored.unit_id,
                "Stored credential belongs to another compute unit"
            );
            return Ok(None);
        }

        Ok(Some(stored.credential))
    }

    async fn provision(
        &self,
        cancel: &CancellationToken,
        user: &UserId,
        name: ResourceName,
    ) -> Result<Provisioned> {
        let credential = self.generator.generate();

        let unit = ComputeUnitSpec {
            name: name.clone(),
            image: self.settings.image.clone(),
            env: vec![EnvVar::secret(
                self.settings.credential_env.clone(),
                credential.expose(),
            )],
            port: self.settings.internal_port,
        };
        let service = NetworkServiceSpec {
            name: name.clone(),
            selector: name.clone(),
            port: ServicePort {
                internal: self.settings.internal_port,
                external: self.settings.external_port,
            },
        };
        let route = RouteSpec {
            name: name.clone(),
            host: self.settings.route_host.clone(),
            path: name.route_path(),
            service: name.clone(),
            port: self.settings.internal_port,
        };

        let steps: [&dyn WorkspaceResource; 3] = [&unit, &service, &route];
        let mut compensation = Compensation::new();
        let mut unit_id = None;
        let mut external_port = None;

        for step in steps {
            match step.create(self.orchestrator.as_ref(), cancel).await {
                Ok(created) => {
                    match created {
                        Created::ComputeUnit { id } => unit_id = Some(id),
                        Created::NetworkService(info) => external_port = info.external_port,
                        Created::Route => {}
                    }
                    info!(kind = %step.kind(), resource = %name, "Created");
                    compensation.push(step.kind(), step.name().clone());
                }
                // Nothing was created yet, so a concurrent or stale instance owns the name.
                Err(e) if e.is_already_exists() && compensation.is_empty() => {
                    return self.resolve_conflict(cancel, user, name).await;
                }
                Err(e) => {
                    // An abandoned create may still have been accepted by the backend.
                    if matches!(e, OrchestratorError::Cancelled) {
                        compensation.push(step.kind(), step.name().clone());
                    }
                    return Err(self.abort(step.kind(), e, compensation, cancel).await);
                }
            }
        }

        let Some(unit_id) = unit_id else {
            let missing = OrchestratorError::Malformed(format!("no id returned for {}", name));
            return Err(self
                .abort(ResourceKind::ComputeUnit, missing, compensation, cancel)
                .await);
        };

        let port = match external_port {
            Some(port) => port,
            None => match self.assigned_port(&name, cancel).await {
                Ok(port) => port,
                Err(e) => {
                    return Err(self
                        .abort(ResourceKind::NetworkService, e, compensation, cancel)
                        .await)
                }
            },
        };

        let stored = StoredCredential::new(credential, unit_id);
        if let Err(source) = self.store.put(user, &stored).await {
            error!(resource = %name, error = %source, "Failed to persist credential");
            let rollback = compensation
                .rollback(self.orchestrator.as_ref(), cancel)
                .await;
            return Err(ProvisionError::CredentialPersistence { source, rollback });
        }

        info!(resource = %name, port, "Workspace provisioned");

        Ok(Provisioned {
            endpoint: Endpoint {
                host: self.settings.route_host.clone(),
                port,
                path: name.route_path(),
            },
            credential: stored.credential,
            created: true,
        })
    }

    async fn assigned_port(
        &self,
        name: &ResourceName,
        cancel: &CancellationToken,
    ) -> std::result::Result<u16, OrchestratorError> {
        self.orchestrator
            .describe_network_service(name, cancel)
            .await?
            .and_then(|info| info.external_port)
            .ok_or_else(|| {
                OrchestratorError::Malformed(format!("no external port assigned to {}", name))
            })
    }

    /// Re-inspect after the compute unit name turned out to be taken.
    async fn resolve_conflict(
        &self,
        cancel: &CancellationToken,
        user: &UserId,
        name: ResourceName,
    ) -> Result<Provisioned> {
        info!(resource = %name, "Compute unit already exists, re-inspecting");

        let inspection = self.inspector.inspect_unit(cancel, user).await?;
        if let WorkspaceStatus::Running(endpoint) = inspection.status {
            return self
                .existing(user, &name, endpoint, inspection.unit_id.as_deref())
                .await;
        }

        Err(ProvisionError::NameConflict {
            kind: ResourceKind::ComputeUnit,
            name,
            rollback: RollbackReport::default(),
        })
    }

    async fn abort(
        &self,
        step: ResourceKind,
        source: OrchestratorError,
        compensation: Compensation,
        cancel: &CancellationToken,
    ) -> ProvisionError {
        error!(%step, error = %source, undo = compensation.len(), "Provisioning step failed");

        let rollback = compensation
            .rollback(self.orchestrator.as_ref(), cancel)
            .await;

        match source {
            OrchestratorError::Cancelled => ProvisionError::Cancelled { rollback },
            OrchestratorError::AlreadyExists { kind, name } => ProvisionError::NameConflict {
                kind,
                name,
                rollback,
            },
            source => ProvisionError::PartialProvisioning {
                step,
                source,
                rollback,
            },
        }
    }
}
