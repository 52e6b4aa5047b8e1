//! In-memory orchestrator and credential store with failure injection.

use crate::error::{OrchestratorError, StoreError};
use crate::naming::{ResourceName, UserId};
use crate::orchestrator::{
    ComputeUnitInfo, ComputeUnitState, NetworkServiceInfo, Orchestrator, OrchestratorResult,
    ResourceKind,
};
use crate::resource::{ComputeUnitSpec, NetworkServiceSpec, RouteSpec};
use crate::store::{CredentialStore, StoredCredential};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

/// First port handed out for dynamically exposed services.
pub const FIRST_DYNAMIC_PORT: u16 = 30000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    CreateComputeUnit,
    DeleteComputeUnit,
    ListByName,
    CreateNetworkService,
    DescribeNetworkService,
    DeleteNetworkService,
    CreateRoute,
    DeleteRoute,
}

enum Fault {
    Fail(OrchestratorError),
    /// Fire the token and report the call as cancelled.
    Cancel(CancellationToken),
}

struct Unit {
    id: String,
    spec: ComputeUnitSpec,
    state: ComputeUnitState,
}

#[derive(Default)]
struct State {
    units: HashMap<ResourceName, Unit>,
    services: HashMap<ResourceName, NetworkServiceInfo>,
    routes: HashMap<ResourceName, RouteSpec>,
    calls: Vec<(Op, ResourceName)>,
    faults: HashMap<Op, Fault>,
    next_id: u64,
    next_port: u16,
}

#[derive(Default)]
pub struct InMemoryOrchestrator {
    state: Mutex<State>,
}

impl InMemoryOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make every subsequent call of `op` fail with `err`.
    pub fn fail_on(&self, op: Op, err: OrchestratorError) {
        self.lock().faults.insert(op, Fault::Fail(err));
    }

    /// Cancel `token` when `op` is next called, as if it fired mid-flight.
    pub fn cancel_on(&self, op: Op, token: CancellationToken) {
        self.lock().faults.insert(op, Fault::Cancel(token));
    }

    pub fn clear_faults(&self) {
        self.lock().faults.clear();
    }

    /// Simulate the orchestrator reporting a new state for a compute unit.
    pub fn set_state(&self, name: &ResourceName, state: ComputeUnitState) {
        if let Some(unit) = self.lock().units.get_mut(name) {
            unit.state = state;
        }
    }

    pub fn exists(&self, kind: ResourceKind, name: &ResourceName) -> bool {
        let state = self.lock();
        match kind {
            ResourceKind::ComputeUnit => state.units.contains_key(name),
            ResourceKind::NetworkService => state.services.contains_key(name),
            ResourceKind::Route => state.routes.contains_key(name),
        }
    }

    /// Number of resources of any kind currently held.
    pub fn resource_count(&self) -> usize {
        let state = self.lock();
        state.units.len() + state.services.len() + state.routes.len()
    }

    pub fn compute_unit_spec(&self, name: &ResourceName) -> Option<ComputeUnitSpec> {
        self.lock().units.get(name).map(|u| u.spec.clone())
    }

    pub fn compute_unit_id(&self, name: &ResourceName) -> Option<String> {
        self.lock().units.get(name).map(|unit| unit.id.clone())
    }

    pub fn route(&self, name: &ResourceName) -> Option<RouteSpec> {
        self.lock().routes.get(name).cloned()
    }

    pub fn calls(&self) -> Vec<(Op, ResourceName)> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self, op: Op) -> usize {
        self.lock().calls.iter().filter(|(o, _)| *o == op).count()
    }

    fn enter(
        &self,
        op: Op,
        name: &ResourceName,
        cancel: &CancellationToken,
    ) -> OrchestratorResult<MutexGuard<'_, State>> {
        let mut state = self.lock();
        state.calls.push((op, name.clone()));

        if cancel.is_cancelled() {
            return Err(OrchestratorError::Cancelled);
        }

        let fault = match state.faults.get(&op) {
            Some(Fault::Fail(err)) => Some(err.clone()),
            Some(Fault::Cancel(token)) => {
                token.cancel();
                Some(OrchestratorError::Cancelled)
            }
            None => None,
        };

        match fault {
            Some(err) => Err(err),
            None => Ok(state),
        }
    }
}

fn not_found(kind: ResourceKind, name: &ResourceName) -> OrchestratorError {
    OrchestratorError::NotFound {
        kind,
        name: name.clone(),
    }
}

fn already_exists(kind: ResourceKind, name: &ResourceName) -> OrchestratorError {
    OrchestratorError::AlreadyExists {
        kind,
        name: name.clone(),
    }
}

#[async_trait::async_trait]
impl Orchestrator for InMemoryOrchestrator {
    async fn create_compute_unit(
        &self,
        spec: &ComputeUnitSpec,
        cancel: &CancellationToken,
    ) -> OrchestratorResult<String> {
        let mut state = self.enter(Op::CreateComputeUnit, &spec.name, cancel)?;

        if state.units.contains_key(&spec.name) {
            return Err(already_exists(ResourceKind::ComputeUnit, &spec.name));
        }

        state.next_id += 1;
        let id = format!("unit-{}", state.next_id);
        state.units.insert(
            spec.name.clone(),
            Unit {
                id: id.clone(),
                spec: spec.clone(),
                state: ComputeUnitState::Active,
            },
        );

        Ok(id)
    }

    async fn delete_compute_unit(
        &self,
        name: &ResourceName,
        cancel: &CancellationToken,
    ) -> OrchestratorResult<()> {
        let mut state = self.enter(Op::DeleteComputeUnit, name, cancel)?;
        state
            .units
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| not_found(ResourceKind::ComputeUnit, name))
    }

    async fn list_by_name(
        &self,
        name: &ResourceName,
        cancel: &CancellationToken,
    ) -> OrchestratorResult<Vec<ComputeUnitInfo>> {
        let state = self.enter(Op::ListByName, name, cancel)?;
        Ok(state
            .units
            .get(name)
            .map(|unit| ComputeUnitInfo {
                id: unit.id.clone(),
                name: name.clone(),
                state: unit.state.clone(),
            })
            .into_iter()
            .collect())
    }

    async fn create_network_service(
        &self,
        spec: &NetworkServiceSpec,
        cancel: &CancellationToken,
    ) -> OrchestratorResult<NetworkServiceInfo> {
        let mut state = self.enter(Op::CreateNetworkService, &spec.name, cancel)?;

        if state.services.contains_key(&spec.name) {
            return Err(already_exists(ResourceKind::NetworkService, &spec.name));
        }

        let external_port = match spec.port.external {
            Some(port) => port,
            None => {
                let port = FIRST_DYNAMIC_PORT + state.next_port;
                state.next_port += 1;
                port
            }
        };

        let info = NetworkServiceInfo {
            name: spec.name.clone(),
            internal_port: spec.port.internal,
            external_port: Some(external_port),
        };
        state.services.insert(spec.name.clone(), info.clone());

        Ok(info)
    }

    async fn describe_network_service(
        &self,
        name: &ResourceName,
        cancel: &CancellationToken,
    ) -> OrchestratorResult<Option<NetworkServiceInfo>> {
        let state = self.enter(Op::DescribeNetworkService, name, cancel)?;
        Ok(state.services.get(name).cloned())
    }

    async fn delete_network_service(
        &self,
        name: &ResourceName,
        cancel: &CancellationToken,
    ) -> OrchestratorResult<()> {
        let mut state = self.enter(Op::DeleteNetworkService, name, cancel)?;
        state
            .services
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| not_found(ResourceKind::NetworkService, name))
    }

    async fn create_route(
        &self,
        spec: &RouteSpec,
        cancel: &CancellationToken,
    ) -> OrchestratorResult<()> {
        let mut state = self.enter(Op::CreateRoute, &spec.name, cancel)?;

        if state.routes.contains_key(&spec.name) {
            return Err(already_exists(ResourceKind::Route, &spec.name));
        }

        state.routes.insert(spec.name.clone(), spec.clone());
        Ok(())
    }

    async fn delete_route(
        &self,
        name: &ResourceName,
        cancel: &CancellationToken,
    ) -> OrchestratorResult<()> {
        let mut state = self.enter(Op::DeleteRoute, name, cancel)?;
        state
            .routes
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| not_found(ResourceKind::Route, name))
    }
}

#[derive(Default)]
pub struct InMemoryCredentialStore {
    credentials: Mutex<HashMap<UserId, StoredCredential>>,
    fail_puts: AtomicBool,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<UserId, StoredCredential>> {
        self.credentials.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait::async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn put(&self, user: &UserId, stored: &StoredCredential) -> Result<(), StoreError> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected put failure".to_string()));
        }
        self.lock().insert(user.clone(), stored.clone());
        Ok(())
    }

    async fn get(&self, user: &UserId) -> Result<Option<StoredCredential>, StoreError> {
        Ok(self.lock().get(user).cloned())
    }

    async fn delete(&self, user: &UserId) -> Result<(), StoreError> {
        self.lock().remove(user);
        Ok(())
    }
}
