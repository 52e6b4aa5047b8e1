//! The three resource kinds making up a workspace.
//!
//! Creation goes through [`WorkspaceResource`]; deletion needs only the kind
//! and name, see [`delete_resource`].

use crate::naming::ResourceName;
use crate::orchestrator::{
    NetworkServiceInfo, Orchestrator, OrchestratorResult, ResourceKind, ServicePort,
};
use std::fmt;
use tokio_util::sync::CancellationToken;

/// Environment variable passed to a compute unit.
#[derive(Clone, PartialEq, Eq)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
    /// Secret values are redacted from `Debug` output.
    pub secret: bool,
}

impl EnvVar {
    pub fn plain(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            secret: false,
        }
    }

    pub fn secret(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            secret: true,
        }
    }
}

impl fmt::Debug for EnvVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = if self.secret {
            "<redacted>"
        } else {
            self.value.as_str()
        };
        f.debug_struct("EnvVar")
            .field("name", &self.name)
            .field("value", &value)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputeUnitSpec {
    pub name: ResourceName,
    pub image: String,
    pub env: Vec<EnvVar>,
    /// Fixed internal port the workspace listens on.
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkServiceSpec {
    pub name: ResourceName,
    /// Compute units carrying this name are selected as backends.
    pub selector: ResourceName,
    pub port: ServicePort,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteSpec {
    pub name: ResourceName,
    pub host: String,
    pub path: String,
    pub service: ResourceName,
    pub port: u16,
}

/// What a successful create step produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Created {
    ComputeUnit { id: String },
    NetworkService(NetworkServiceInfo),
    Route,
}

#[async_trait::async_trait]
pub trait WorkspaceResource: Send + Sync {
    fn kind(&self) -> ResourceKind;

    fn name(&self) -> &ResourceName;

    async fn create(
        &self,
        orchestrator: &dyn Orchestrator,
        cancel: &CancellationToken,
    ) -> OrchestratorResult<Created>;
}

/// Delete a resource knowing only its kind and name.
pub async fn delete_resource(
    orchestrator: &dyn Orchestrator,
    kind: ResourceKind,
    name: &ResourceName,
    cancel: &CancellationToken,
) -> OrchestratorResult<()> {
    match kind {
        ResourceKind::ComputeUnit => orchestrator.delete_compute_unit(name, cancel).await,
        ResourceKind::NetworkService => orchestrator.delete_network_service(name, cancel).await,
        ResourceKind::Route => orchestrator.delete_route(name, cancel).await,
    }
}

#[async_trait::async_trait]
impl WorkspaceResource for ComputeUnitSpec {
    fn kind(&self) -> ResourceKind {
        ResourceKind::ComputeUnit
    }

    fn name(&self) -> &ResourceName {
        &self.name
    }

    async fn create(
        &self,
        orchestrator: &dyn Orchestrator,
        cancel: &CancellationToken,
    ) -> OrchestratorResult<Created> {
        let id = orchestrator.create_compute_unit(self, cancel).await?;
        Ok(Created::ComputeUnit { id })
    }
}

#[async_trait::async_trait]
impl WorkspaceResource for NetworkServiceSpec {
    fn kind(&self) -> ResourceKind {
        ResourceKind::NetworkService
    }

    fn name(&self) -> &ResourceName {
        &self.name
    }

    async fn create(
        &self,
        orchestrator: &dyn Orchestrator,
        cancel: &CancellationToken,
    ) -> OrchestratorResult<Created> {
        let info = orchestrator.create_network_service(self, cancel).await?;
        Ok(Created::NetworkService(info))
    }
}

#[async_trait::async_trait]
impl WorkspaceResource for RouteSpec {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Route
    }

    fn name(&self) -> &ResourceName {
        &self.name
    }

    async fn create(
        &self,
        orchestrator: &dyn Orchestrator,
        cancel: &CancellationToken,
    ) -> OrchestratorResult<Created> {
        orchestrator.create_route(self, cancel).await?;
        Ok(Created::Route)
    }
}
