//! Workspace provisioning engine
//!
//! Turns a user identity into a running, network-reachable, credentialed
//! workspace made of three orchestrator resources (compute unit, network
//! service, route), with idempotent re-entry and compensating rollback.
//! It is consumed by the desk-api HTTP service but does not depend on it.

pub mod credential;
pub mod db;
pub mod engine;
pub mod error;
pub mod inspector;
pub mod kubectl;
pub mod naming;
pub mod orchestrator;
pub mod resource;
pub mod saga;
pub mod store;

#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use credential::{Credential, CredentialGenerator};
pub use engine::{EngineSettings, Provisioned, ProvisioningEngine, WorkspaceReport};
pub use error::{OrchestratorError, ProvisionError, Result, StoreError};
pub use inspector::{Endpoint, Inspection, StatusInspector, WorkspaceStatus};
pub use kubectl::{KubectlOrchestrator, KubectlSettings};
pub use naming::{ResourceName, ResourceNamer, UserId};
pub use orchestrator::{ComputeUnitInfo, ComputeUnitState, Orchestrator, ResourceKind};
pub use saga::{RollbackReport, UndoOutcome};
pub use store::{CredentialStore, SqliteCredentialStore, StoredCredential};
