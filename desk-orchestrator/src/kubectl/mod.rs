//! Kubernetes backend driven through the `kubectl` binary.
//!
//! A compute unit is a Pod, a network service is a `NodePort` Service and a
//! route is an Ingress. All three carry the workspace resource name as both
//! object name and `app` label.

mod command;
pub mod manifest;

pub use command::{KubectlCommand, KubectlOutput};

use crate::naming::ResourceName;
use crate::orchestrator::{
    ComputeUnitInfo, NetworkServiceInfo, Orchestrator, OrchestratorResult, ResourceKind,
};
use crate::resource::{ComputeUnitSpec, NetworkServiceSpec, RouteSpec};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

#[derive(Debug, Clone)]
pub struct KubectlSettings {
    pub program: String,
    pub namespace: String,
    pub context: Option<String>,
}

impl Default for KubectlSettings {
    fn default() -> Self {
        Self {
            program: "kubectl".to_string(),
            namespace: "default".to_string(),
            context: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct KubectlOrchestrator {
    settings: KubectlSettings,
}

fn object_type(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::ComputeUnit => "pod",
        ResourceKind::NetworkService => "service",
        ResourceKind::Route => "ingress",
    }
}

impl KubectlOrchestrator {
    pub fn new(settings: KubectlSettings) -> Self {
        Self { settings }
    }

    fn command(&self) -> KubectlCommand {
        KubectlCommand::new(&self.settings.program)
            .context(self.settings.context.as_deref())
            .namespace(&self.settings.namespace)
    }

    /// Create an object from a manifest, returning kubectl's JSON echo of it.
    async fn create(
        &self,
        kind: ResourceKind,
        name: &ResourceName,
        manifest: &Value,
        cancel: &CancellationToken,
    ) -> OrchestratorResult<String> {
        let output = self
            .command()
            .args(["create", "-f", "-", "-o", "json"])
            .stdin(manifest.to_string())
            .output(cancel)
            .await?;

        if output.success {
            debug!(%kind, resource = %name, "kubectl create succeeded");
            Ok(output.stdout)
        } else {
            Err(manifest::classify(kind, name, &output.stderr))
        }
    }

    async fn delete(
        &self,
        kind: ResourceKind,
        name: &ResourceName,
        cancel: &CancellationToken,
    ) -> OrchestratorResult<()> {
        let output = self
            .command()
            .args(["delete", object_type(kind), name.as_str(), "--wait=false"])
            .output(cancel)
            .await?;

        if output.success {
            Ok(())
        } else {
            Err(manifest::classify(kind, name, &output.stderr))
        }
    }
}

#[async_trait::async_trait]
impl Orchestrator for KubectlOrchestrator {
    #[instrument(skip(self, spec, cancel), fields(resource = %spec.name))]
    async fn create_compute_unit(
        &self,
        spec: &ComputeUnitSpec,
        cancel: &CancellationToken,
    ) -> OrchestratorResult<String> {
        let raw = self
            .create(ResourceKind::ComputeUnit, &spec.name, &manifest::pod(spec), cancel)
            .await?;
        manifest::parse_created_pod(&raw, &spec.name)
    }

    #[instrument(skip(self, cancel))]
    async fn delete_compute_unit(
        &self,
        name: &ResourceName,
        cancel: &CancellationToken,
    ) -> OrchestratorResult<()> {
        self.delete(ResourceKind::ComputeUnit, name, cancel).await
    }

    #[instrument(skip(self, cancel))]
    async fn list_by_name(
        &self,
        name: &ResourceName,
        cancel: &CancellationToken,
    ) -> OrchestratorResult<Vec<ComputeUnitInfo>> {
        let selector = format!("{}={}", manifest::NAME_LABEL, name);
        let output = self
            .command()
            .args(["get", "pods", "-l", selector.as_str(), "-o", "json"])
            .output(cancel)
            .await?;

        if !output.success {
            return Err(manifest::classify(
                ResourceKind::ComputeUnit,
                name,
                &output.stderr,
            ));
        }

        manifest::parse_pod_list(&output.stdout, name)
    }

    #[instrument(skip(self, spec, cancel), fields(resource = %spec.name))]
    async fn create_network_service(
        &self,
        spec: &NetworkServiceSpec,
        cancel: &CancellationToken,
    ) -> OrchestratorResult<NetworkServiceInfo> {
        let raw = self
            .create(
                ResourceKind::NetworkService,
                &spec.name,
                &manifest::service(spec),
                cancel,
            )
            .await?;
        manifest::parse_service(&raw, &spec.name)
    }

    #[instrument(skip(self, cancel))]
    async fn describe_network_service(
        &self,
        name: &ResourceName,
        cancel: &CancellationToken,
    ) -> OrchestratorResult<Option<NetworkServiceInfo>> {
        let output = self
            .command()
            .args(["get", "service", name.as_str(), "-o", "json"])
            .output(cancel)
            .await?;

        if output.success {
            return manifest::parse_service(&output.stdout, name).map(Some);
        }

        match manifest::classify(ResourceKind::NetworkService, name, &output.stderr) {
            e if e.is_not_found() => Ok(None),
            e => Err(e),
        }
    }

    #[instrument(skip(self, cancel))]
    async fn delete_network_service(
        &self,
        name: &ResourceName,
        cancel: &CancellationToken,
    ) -> OrchestratorResult<()> {
        self.delete(ResourceKind::NetworkService, name, cancel).await
    }

    #[instrument(skip(self, spec, cancel), fields(resource = %spec.name))]
    async fn create_route(
        &self,
        spec: &RouteSpec,
        cancel: &CancellationToken,
    ) -> OrchestratorResult<()> {
        self.create(ResourceKind::Route, &spec.name, &manifest::ingress(spec), cancel)
            .await
            .map(|_| ())
    }

    #[instrument(skip(self, cancel))]
    async fn delete_route(
        &self,
        name: &ResourceName,
        cancel: &CancellationToken,
    ) -> OrchestratorResult<()> {
        self.delete(ResourceKind::Route, name, cancel).await
    }
}
