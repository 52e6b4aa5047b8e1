use crate::naming::ResourceName;
use crate::orchestrator::ResourceKind;
use crate::saga::RollbackReport;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProvisionError>;

/// Failures reported by an orchestrator backend.
#[derive(Error, Debug, Clone)]
pub enum OrchestratorError {
    #[error("{kind} {name} already exists")]
    AlreadyExists {
        kind: ResourceKind,
        name: ResourceName,
    },

    #[error("{kind} {name} not found")]
    NotFound {
        kind: ResourceKind,
        name: ResourceName,
    },

    #[error("Orchestrator unavailable: {0}")]
    Unavailable(String),

    #[error("Orchestrator rejected request: {0}")]
    Rejected(String),

    #[error("Malformed orchestrator response: {0}")]
    Malformed(String),

    #[error("Orchestrator call cancelled")]
    Cancelled,
}

impl OrchestratorError {
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Failures reported by a credential store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Credential store unavailable: {0}")]
    Unavailable(String),
}

/// Failures surfaced by the provisioning engine.
///
/// For every variant produced mid-sequence the `source` is the error that
/// stopped provisioning. Failed compensation steps are only recorded in
/// the attached [`RollbackReport`].
#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("{kind} {name} already exists")]
    NameConflict {
        kind: ResourceKind,
        name: ResourceName,
        rollback: RollbackReport,
    },

    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),

    #[error("Failed to create {step}: {source}")]
    PartialProvisioning {
        step: ResourceKind,
        #[source]
        source: OrchestratorError,
        rollback: RollbackReport,
    },

    #[error("Failed to persist workspace credential: {source}")]
    CredentialPersistence {
        #[source]
        source: StoreError,
        rollback: RollbackReport,
    },

    #[error("Provisioning cancelled")]
    Cancelled { rollback: RollbackReport },

    #[error("Workspace {0} is running but has no stored credential")]
    CredentialMissing(ResourceName),

    #[error("Credential store error: {0}")]
    Store(#[from] StoreError),
}

impl ProvisionError {
    /// Compensation outcome attached to mid-sequence failures.
    pub fn rollback(&self) -> Option<&RollbackReport> {
        match self {
            Self::NameConflict { rollback, .. }
            | Self::PartialProvisioning { rollback, .. }
            | Self::CredentialPersistence { rollback, .. }
            | Self::Cancelled { rollback } => Some(rollback),
            _ => None,
        }
    }
}
