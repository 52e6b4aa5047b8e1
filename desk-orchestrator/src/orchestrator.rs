//! The orchestrator client contract consumed by the engine and inspector.

use crate::error::OrchestratorError;
use crate::naming::ResourceName;
use crate::resource::{ComputeUnitSpec, NetworkServiceSpec, RouteSpec};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio_util::sync::CancellationToken;

pub type OrchestratorResult<T> = std::result::Result<T, OrchestratorError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    ComputeUnit,
    NetworkService,
    Route,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResourceKind::ComputeUnit => "compute unit",
            ResourceKind::NetworkService => "network service",
            ResourceKind::Route => "route",
        })
    }
}

/// Lifecycle state of a compute unit as reported by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComputeUnitState {
    Active,
    Pending,
    Terminated,
    Unknown(String),
}

impl ComputeUnitState {
    pub fn is_active(&self) -> bool {
        matches!(self, ComputeUnitState::Active)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputeUnitInfo {
    pub id: String,
    pub name: ResourceName,
    pub state: ComputeUnitState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkServiceInfo {
    pub name: ResourceName,
    pub internal_port: u16,
    /// Externally reachable port, once the orchestrator has assigned one.
    pub external_port: Option<u16>,
}

/// Port exposure of a network service. `external: None` asks the
/// orchestrator for a dynamically assigned external port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicePort {
    pub internal: u16,
    pub external: Option<u16>,
}

/// Create/inspect/delete calls for the three resource kinds of a workspace.
///
/// Every call takes the caller's cancellation token and must return
/// [`OrchestratorError::Cancelled`] promptly once it fires.
#[async_trait::async_trait]
pub trait Orchestrator: Send + Sync {
    /// Create a compute unit, returning its orchestrator-assigned id.
    async fn create_compute_unit(
        &self,
        spec: &ComputeUnitSpec,
        cancel: &CancellationToken,
    ) -> OrchestratorResult<String>;

    async fn delete_compute_unit(
        &self,
        name: &ResourceName,
        cancel: &CancellationToken,
    ) -> OrchestratorResult<()>;

    /// List compute units carrying the given resource name.
    async fn list_by_name(
        &self,
        name: &ResourceName,
        cancel: &CancellationToken,
    ) -> OrchestratorResult<Vec<ComputeUnitInfo>>;

    async fn create_network_service(
        &self,
        spec: &NetworkServiceSpec,
        cancel: &CancellationToken,
    ) -> OrchestratorResult<NetworkServiceInfo>;

    async fn describe_network_service(
        &self,
        name: &ResourceName,
        cancel: &CancellationToken,
    ) -> OrchestratorResult<Option<NetworkServiceInfo>>;

    async fn delete_network_service(
        &self,
        name: &ResourceName,
        cancel: &CancellationToken,
    ) -> OrchestratorResult<()>;

    async fn create_route(
        &self,
        spec: &RouteSpec,
        cancel: &CancellationToken,
    ) -> OrchestratorResult<()>;

    async fn delete_route(
        &self,
        name: &ResourceName,
        cancel: &CancellationToken,
    ) -> OrchestratorResult<()>;
}
