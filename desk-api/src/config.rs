use desk_orchestrator::credential::DEFAULT_CREDENTIAL_LENGTH;
use desk_orchestrator::naming::DEFAULT_PREFIX;
use desk_orchestrator::{EngineSettings, KubectlSettings};
use serde::Deserialize;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::warn;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default = "default_name_prefix")]
    pub name_prefix: String,

    #[serde(default = "default_image")]
    pub image: String,

    #[serde(default = "default_internal_port")]
    pub internal_port: u16,

    /// Unset means the orchestrator assigns the external port.
    #[serde(default = "default_external_port")]
    pub external_port: Option<u16>,

    #[serde(default = "default_credential_env")]
    pub credential_env: String,

    #[serde(default = "default_credential_length")]
    pub credential_length: usize,

    #[serde(default = "default_route_host")]
    pub route_host: String,

    #[serde(default = "default_namespace")]
    pub namespace: String,

    #[serde(default = "default_kubectl")]
    pub kubectl: String,

    #[serde(default = "default_kube_context")]
    pub kube_context: Option<String>,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key)
        .ok()
        .and_then(|raw| parse_value(key, &raw))
}

/// Parse a set variable, logging and discarding values that do not parse.
fn parse_value<T: FromStr>(key: &str, raw: &str) -> Option<T> {
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring invalid {}={:?}, using the default", key, raw);
            None
        }
    }
}

fn default_bind_addr() -> String {
    env_or("DESK_API_BIND", "0.0.0.0:3121")
}

fn default_db_path() -> PathBuf {
    if let Ok(path) = std::env::var("DESK_API_DB_PATH") {
        return PathBuf::from(path);
    }

    if cfg!(windows) {
        let appdata = std::env::var("APPDATA").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(appdata).join("desk").join("api").join("desk.db")
    } else {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(".desk").join("api").join("desk.db")
    }
}

fn default_name_prefix() -> String {
    env_or("DESK_NAME_PREFIX", DEFAULT_PREFIX)
}

fn default_image() -> String {
    env_or("DESK_IMAGE", "tit-dashboard:latest")
}

fn default_internal_port() -> u16 {
    env_parse("DESK_INTERNAL_PORT").unwrap_or(5900)
}

fn default_external_port() -> Option<u16> {
    env_parse("DESK_EXTERNAL_PORT")
}

fn default_credential_env() -> String {
    env_or("DESK_CREDENTIAL_ENV", "WORKSPACE_PASSWORD")
}

fn default_credential_length() -> usize {
    env_parse("DESK_CREDENTIAL_LENGTH").unwrap_or(DEFAULT_CREDENTIAL_LENGTH)
}

fn default_route_host() -> String {
    env_or("DESK_ROUTE_HOST", "workspaces.local")
}

fn default_namespace() -> String {
    env_or("DESK_K8S_NAMESPACE", "default")
}

fn default_kubectl() -> String {
    env_or("DESK_KUBECTL", "kubectl")
}

fn default_kube_context() -> Option<String> {
    std::env::var("DESK_KUBE_CONTEXT").ok()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            db_path: default_db_path(),
            name_prefix: default_name_prefix(),
            image: default_image(),
            internal_port: default_internal_port(),
            external_port: default_external_port(),
            credential_env: default_credential_env(),
            credential_length: default_credential_length(),
            route_host: default_route_host(),
            namespace: default_namespace(),
            kubectl: default_kubectl(),
            kube_context: default_kube_context(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default()
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            image: self.image.clone(),
            internal_port: self.internal_port,
            external_port: self.external_port,
            credential_env: self.credential_env.clone(),
            credential_length: self.credential_length,
            route_host: self.route_host.clone(),
            name_prefix: self.name_prefix.clone(),
        }
    }

    pub fn kubectl_settings(&self) -> KubectlSettings {
        KubectlSettings {
            program: self.kubectl.clone(),
            namespace: self.namespace.clone(),
            context: self.kube_context.clone(),
        }
    }
}
