//! Kubernetes manifests for workspace resources and parsing of the
//! `kubectl ... -o json` responses the backend reads.

use crate::error::OrchestratorError;
use crate::naming::ResourceName;
use crate::orchestrator::{
    ComputeUnitInfo, ComputeUnitState, NetworkServiceInfo, OrchestratorResult, ResourceKind,
};
use crate::resource::{ComputeUnitSpec, NetworkServiceSpec, RouteSpec};
use serde::Deserialize;
use serde_json::{json, Value};

/// Label carrying the workspace resource name on every object.
pub const NAME_LABEL: &str = "app";
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
pub const MANAGED_BY: &str = "desk";
const CONTAINER_NAME: &str = "workspace";

fn labels(name: &ResourceName) -> Value {
    json!({
        NAME_LABEL: name.as_str(),
        MANAGED_BY_LABEL: MANAGED_BY,
    })
}

pub fn pod(spec: &ComputeUnitSpec) -> Value {
    let env: Vec<Value> = spec
        .env
        .iter()
        .map(|var| json!({ "name": var.name, "value": var.value }))
        .collect();

    json!({
        "apiVersion": "v1",
        "kind": "Pod",
        "metadata": {
            "name": spec.name.as_str(),
            "labels": labels(&spec.name),
        },
        "spec": {
            "restartPolicy": "Never",
            "containers": [{
                "name": CONTAINER_NAME,
                "image": spec.image,
                "env": env,
                "ports": [{ "containerPort": spec.port }],
            }],
        },
    })
}

pub fn service(spec: &NetworkServiceSpec) -> Value {
    let mut port = json!({
        "port": spec.port.internal,
        "targetPort": spec.port.internal,
    });
    if let Some(external) = spec.port.external {
        port["nodePort"] = json!(external);
    }

    json!({
        "apiVersion": "v1",
        "kind": "Service",
        "metadata": {
            "name": spec.name.as_str(),
            "labels": labels(&spec.name),
        },
        "spec": {
            "type": "NodePort",
            "selector": { NAME_LABEL: spec.selector.as_str() },
            "ports": [port],
        },
    })
}

pub fn ingress(spec: &RouteSpec) -> Value {
    json!({
        "apiVersion": "networking.k8s.io/v1",
        "kind": "Ingress",
        "metadata": {
            "name": spec.name.as_str(),
            "labels": labels(&spec.name),
        },
        "spec": {
            "rules": [{
                "host": spec.host,
                "http": {
                    "paths": [{
                        "path": spec.path,
                        "pathType": "Prefix",
                        "backend": {
                            "service": {
                                "name": spec.service.as_str(),
                                "port": { "number": spec.port },
                            },
                        },
                    }],
                },
            }],
        },
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectMeta {
    name: String,
    #[serde(default)]
    uid: Option<String>,
    #[serde(default)]
    deletion_timestamp: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PodStatus {
    #[serde(default)]
    phase: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Pod {
    metadata: ObjectMeta,
    #[serde(default)]
    status: Option<PodStatus>,
}

#[derive(Debug, Deserialize)]
struct PodList {
    #[serde(default)]
    items: Vec<Pod>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServicePortStatus {
    port: u16,
    #[serde(default)]
    node_port: Option<u16>,
}

#[derive(Debug, Deserialize)]
struct ServiceSpecStatus {
    #[serde(default)]
    ports: Vec<ServicePortStatus>,
}

#[derive(Debug, Deserialize)]
struct Service {
    metadata: ObjectMeta,
    spec: ServiceSpecStatus,
}

fn malformed(what: &str, err: serde_json::Error) -> OrchestratorError {
    OrchestratorError::Malformed(format!("{}: {}", what, err))
}

fn pod_state(pod: &Pod) -> ComputeUnitState {
    if pod.metadata.deletion_timestamp.is_some() {
        return ComputeUnitState::Terminated;
    }

    match pod.status.as_ref().and_then(|s| s.phase.as_deref()) {
        Some("Running") => ComputeUnitState::Active,
        Some("Pending") => ComputeUnitState::Pending,
        Some("Succeeded") | Some("Failed") => ComputeUnitState::Terminated,
        Some(other) => ComputeUnitState::Unknown(other.to_string()),
        None => ComputeUnitState::Pending,
    }
}

fn pod_info(pod: Pod, name: &ResourceName) -> ComputeUnitInfo {
    let state = pod_state(&pod);
    ComputeUnitInfo {
        id: pod.metadata.uid.unwrap_or(pod.metadata.name),
        name: name.clone(),
        state,
    }
}

/// Id of a freshly created pod.
pub fn parse_created_pod(raw: &str, name: &ResourceName) -> OrchestratorResult<String> {
    let pod: Pod = serde_json::from_str(raw).map_err(|e| malformed("pod", e))?;
    Ok(pod_info(pod, name).id)
}

pub fn parse_pod_list(raw: &str, name: &ResourceName) -> OrchestratorResult<Vec<ComputeUnitInfo>> {
    let list: PodList = serde_json::from_str(raw).map_err(|e| malformed("pod list", e))?;
    Ok(list
        .items
        .into_iter()
        .filter(|pod| pod.metadata.name == name.as_str())
        .map(|pod| pod_info(pod, name))
        .collect())
}

pub fn parse_service(raw: &str, name: &ResourceName) -> OrchestratorResult<NetworkServiceInfo> {
    let service: Service = serde_json::from_str(raw).map_err(|e| malformed("service", e))?;
    if service.metadata.name != name.as_str() {
        return Err(OrchestratorError::Malformed(format!(
            "expected service {}, got {}",
            name, service.metadata.name
        )));
    }

    let port = service.spec.ports.first().ok_or_else(|| {
        OrchestratorError::Malformed(format!("service {} exposes no ports", name))
    })?;

    Ok(NetworkServiceInfo {
        name: name.clone(),
        internal_port: port.port,
        external_port: port.node_port,
    })
}

/// Resource type prefix kubectl prints in `Error from server (NotFound): ...`.
fn not_found_resource(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::ComputeUnit => "pods ",
        ResourceKind::NetworkService => "services ",
        ResourceKind::Route => "ingresses",
    }
}

/// True only when the missing object is the one addressed, not its namespace.
fn is_object_not_found(kind: ResourceKind, name: &ResourceName, stderr: &str) -> bool {
    let quoted = format!("\"{}\"", name);
    stderr.split("(NotFound): ").skip(1).any(|rest| {
        rest.starts_with(not_found_resource(kind)) && rest.contains(&quoted)
    })
}

/// Map kubectl's stderr for a failed call onto the error taxonomy.
pub fn classify(kind: ResourceKind, name: &ResourceName, stderr: &str) -> OrchestratorError {
    let stderr = stderr.trim();

    if stderr.contains("(AlreadyExists)") || stderr.contains("already exists") {
        OrchestratorError::AlreadyExists {
            kind,
            name: name.clone(),
        }
    } else if is_object_not_found(kind, name, stderr) {
        OrchestratorError::NotFound {
            kind,
            name: name.clone(),
        }
    } else if [
        "Unable to connect to the server",
        "connection refused",
        "i/o timeout",
        "(ServiceUnavailable)",
        "(InternalError)",
        "(Timeout)",
        "TLS handshake timeout",
    ]
    .iter()
    .any(|needle| stderr.contains(needle))
    {
        OrchestratorError::Unavailable(stderr.to_string())
    } else {
        OrchestratorError::Rejected(stderr.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::{ResourceNamer, UserId};
    use crate::orchestrator::ServicePort;
    use crate::resource::EnvVar;

    fn name() -> ResourceName {
        ResourceNamer::default().name(&UserId::from(42))
    }

    #[test]
    fn test_pod_manifest_carries_label_env_and_port() {
        let manifest = pod(&ComputeUnitSpec {
            name: name(),
            image: "tit-dashboard:latest".to_string(),
            env: vec![EnvVar::secret("WORKSPACE_PASSWORD", "pw")],
            port: 5900,
        });

        assert_eq!(manifest["metadata"]["name"], "workspace-42");
        assert_eq!(manifest["metadata"]["labels"]["app"], "workspace-42");
        let container = &manifest["spec"]["containers"][0];
        assert_eq!(container["env"][0]["name"], "WORKSPACE_PASSWORD");
        assert_eq!(container["env"][0]["value"], "pw");
        assert_eq!(container["ports"][0]["containerPort"], 5900);
    }

    #[test]
    fn test_service_manifest_dynamic_port_omits_node_port() {
        let manifest = service(&NetworkServiceSpec {
            name: name(),
            selector: name(),
            port: ServicePort {
                internal: 5900,
                external: None,
            },
        });

        assert_eq!(manifest["spec"]["selector"]["app"], "workspace-42");
        assert!(manifest["spec"]["ports"][0].get("nodePort").is_none());
    }

    #[test]
    fn test_service_manifest_fixed_port() {
        let manifest = service(&NetworkServiceSpec {
            name: name(),
            selector: name(),
            port: ServicePort {
                internal: 5900,
                external: Some(30590),
            },
        });

        assert_eq!(manifest["spec"]["ports"][0]["nodePort"], 30590);
    }

    #[test]
    fn test_ingress_manifest_routes_path_to_service() {
        let manifest = ingress(&RouteSpec {
            name: name(),
            host: "desk.example.com".to_string(),
            path: name().route_path(),
            service: name(),
            port: 5900,
        });

        let rule = &manifest["spec"]["rules"][0];
        assert_eq!(rule["host"], "desk.example.com");
        let path = &rule["http"]["paths"][0];
        assert_eq!(path["path"], "/workspace-42/");
        assert_eq!(path["backend"]["service"]["name"], "workspace-42");
        assert_eq!(path["backend"]["service"]["port"]["number"], 5900);
    }

    #[test]
    fn test_parse_pod_list_maps_phases() {
        let raw = r#"{"items":[
            {"metadata":{"name":"workspace-42","uid":"abc"},"status":{"phase":"Running"}},
            {"metadata":{"name":"workspace-420","uid":"other"},"status":{"phase":"Running"}}
        ]}"#;

        let units = parse_pod_list(raw, &name()).unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].id, "abc");
        assert_eq!(units[0].state, ComputeUnitState::Active);
    }

    #[test]
    fn test_terminating_pod_is_not_active() {
        let raw = r#"{"items":[{"metadata":{"name":"workspace-42","deletionTimestamp":"2026-01-01T00:00:00Z"},"status":{"phase":"Running"}}]}"#;
        let units = parse_pod_list(raw, &name()).unwrap();
        assert_eq!(units[0].state, ComputeUnitState::Terminated);
    }

    #[test]
    fn test_parse_failed_pod() {
        let raw = r#"{"items":[{"metadata":{"name":"workspace-42"},"status":{"phase":"Failed"}}]}"#;
        let units = parse_pod_list(raw, &name()).unwrap();
        assert!(!units[0].state.is_active());
    }

    #[test]
    fn test_parse_service_reads_node_port() {
        let raw = r#"{"metadata":{"name":"workspace-42"},"spec":{"ports":[{"port":5900,"nodePort":31234}]}}"#;
        let info = parse_service(raw, &name()).unwrap();
        assert_eq!(info.internal_port, 5900);
        assert_eq!(info.external_port, Some(31234));
    }

    #[test]
    fn test_parse_garbage_is_malformed() {
        assert!(matches!(
            parse_pod_list("not json", &name()),
            Err(OrchestratorError::Malformed(_))
        ));
    }

    #[test]
    fn test_classify_kubectl_errors() {
        let n = name();
        assert!(classify(
            ResourceKind::ComputeUnit,
            &n,
            r#"Error from server (AlreadyExists): pods "workspace-42" already exists"#
        )
        .is_already_exists());
        assert!(classify(
            ResourceKind::Route,
            &n,
            r#"Error from server (NotFound): ingresses.networking.k8s.io "workspace-42" not found"#
        )
        .is_not_found());
        assert!(matches!(
            classify(
                ResourceKind::ComputeUnit,
                &n,
                "Unable to connect to the server: dial tcp 10.0.0.1:6443: i/o timeout"
            ),
            OrchestratorError::Unavailable(_)
        ));
        assert!(matches!(
            classify(ResourceKind::NetworkService, &n, "The Service is invalid: nodePort"),
            OrchestratorError::Rejected(_)
        ));
    }

    #[test]
    fn test_missing_namespace_is_not_a_missing_object() {
        let n = name();
        let err = classify(
            ResourceKind::ComputeUnit,
            &n,
            r#"Error from server (NotFound): namespaces "desks" not found"#,
        );
        assert!(matches!(err, OrchestratorError::Rejected(_)));

        let err = classify(
            ResourceKind::NetworkService,
            &n,
            r#"Error from server (NotFound): namespaces "workspace-42" not found"#,
        );
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_not_found_must_name_the_addressed_object() {
        let n = name();
        assert!(classify(
            ResourceKind::ComputeUnit,
            &n,
            r#"Error from server (NotFound): pods "workspace-42" not found"#
        )
        .is_not_found());
        assert!(classify(
            ResourceKind::NetworkService,
            &n,
            r#"Error from server (NotFound): services "workspace-42" not found"#
        )
        .is_not_found());
        assert!(!classify(
            ResourceKind::ComputeUnit,
            &n,
            r#"Error from server (NotFound): pods "workspace-7" not found"#
        )
        .is_not_found());
    }
}
