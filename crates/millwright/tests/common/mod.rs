//! Test doubles for the container runtime and the diagnostics probe

#![allow(dead_code)]

use async_trait::async_trait;
use millwright::{
    Component, ComponentGraph, ComponentSpec, HealthProbe, InstanceId, NetworkId, ProbeError,
    RunSpec, RuntimeClient, RuntimeError,
};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

pub fn spec(name: &str, deps: &[&str]) -> ComponentSpec {
    ComponentSpec {
        name: name.to_string(),
        run_spec: RunSpec {
            build_context: PathBuf::from(format!("/pipeline/{}", name)),
            build_file: PathBuf::from("Dockerfile"),
            env: vec![],
        },
        dependencies: deps.iter().map(|d| d.to_string()).collect(),
        ignore_health: false,
    }
}

pub fn ignored(name: &str, deps: &[&str]) -> ComponentSpec {
    ComponentSpec {
        ignore_health: true,
        ..spec(name, deps)
    }
}

pub fn graph(specs: Vec<ComponentSpec>) -> ComponentGraph {
    ComponentGraph::build(specs).expect("valid graph")
}

#[derive(Default)]
struct RuntimeState {
    next_id: u16,
    launches: Vec<String>,
    removals: Vec<InstanceId>,
    networks: Vec<String>,
    port_lookups: Vec<InstanceId>,
    existing: HashMap<String, InstanceId>,
    ports: HashMap<InstanceId, u16>,
    failing_launches: HashSet<String>,
    failing_port_lookups: HashSet<String>,
    launch_delays: HashMap<String, Duration>,
}

/// In-memory runtime recording every call
#[derive(Default)]
pub struct FakeRuntime {
    state: Mutex<RuntimeState>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend a unit for `name` is already running
    pub fn add_existing(&self, name: &str, port: u16) -> InstanceId {
        let mut state = self.state.lock().unwrap();
        let id = InstanceId(format!("{}-existing", name));
        state.existing.insert(name.to_string(), id.clone());
        state.ports.insert(id.clone(), port);
        id
    }

    pub fn fail_launch(&self, name: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_launches
            .insert(name.to_string());
    }

    pub fn fail_port_lookup(&self, name: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_port_lookups
            .insert(name.to_string());
    }

    pub fn delay_launch(&self, name: &str, delay: Duration) {
        self.state
            .lock()
            .unwrap()
            .launch_delays
            .insert(name.to_string(), delay);
    }

    pub fn launches(&self) -> Vec<String> {
        self.state.lock().unwrap().launches.clone()
    }

    pub fn launch_count(&self, name: &str) -> usize {
        self.launches().iter().filter(|n| *n == name).count()
    }

    pub fn removals(&self) -> Vec<InstanceId> {
        self.state.lock().unwrap().removals.clone()
    }

    pub fn networks(&self) -> Vec<String> {
        self.state.lock().unwrap().networks.clone()
    }

    pub fn port_lookups(&self) -> Vec<InstanceId> {
        self.state.lock().unwrap().port_lookups.clone()
    }
}

#[async_trait]
impl RuntimeClient for FakeRuntime {
    async fn get_or_create_network(&self, name: &str) -> Result<NetworkId, RuntimeError> {
        let mut state = self.state.lock().unwrap();
        if !state.networks.iter().any(|n| n == name) {
            state.networks.push(name.to_string());
        }
        Ok(NetworkId(format!("net-{}", name)))
    }

    async fn find_existing_unit(&self, name: &str) -> Result<Option<InstanceId>, RuntimeError> {
        Ok(self.state.lock().unwrap().existing.get(name).cloned())
    }

    async fn launch(&self, component: &Component) -> Result<InstanceId, RuntimeError> {
        let delay = {
            let mut state = self.state.lock().unwrap();
            state.launches.push(component.name().to_string());
            state.launch_delays.get(component.name()).copied()
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().unwrap();
        if state.failing_launches.contains(component.name()) {
            return Err(RuntimeError::Other(format!(
                "build of {} failed",
                component.name()
            )));
        }
        state.next_id += 1;
        let id = InstanceId(format!("{}-{}", component.name(), state.next_id));
        let port = 30000 + state.next_id;
        state.ports.insert(id.clone(), port);
        Ok(id)
    }

    async fn remove(&self, instance: &InstanceId) -> Result<(), RuntimeError> {
        let mut state = self.state.lock().unwrap();
        state.removals.push(instance.clone());
        state.ports.remove(instance);
        Ok(())
    }

    async fn resolve_diagnostics_port(&self, instance: &InstanceId) -> Result<u16, RuntimeError> {
        let mut state = self.state.lock().unwrap();
        state.port_lookups.push(instance.clone());
        let failing = state
            .failing_port_lookups
            .iter()
            .any(|name| instance.0.starts_with(name.as_str()));
        match state.ports.get(instance) {
            Some(port) if !failing => Ok(*port),
            _ => Err(RuntimeError::PortNotPublished {
                instance: instance.clone(),
                port: 8089,
            }),
        }
    }
}

#[derive(Default)]
struct ProbeState {
    calls: HashMap<String, usize>,
    failing_ports: HashSet<u16>,
    failing_names: HashSet<String>,
}

/// Probe whose answers are scripted per port or per component
#[derive(Default)]
pub struct ScriptedProbe {
    state: Mutex<ProbeState>,
}

impl ScriptedProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Probes against this port fail; a relaunched unit gets a new port
    pub fn fail_port(&self, port: u16) {
        self.state.lock().unwrap().failing_ports.insert(port);
    }

    /// Every probe of this component fails
    pub fn fail_component(&self, name: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_names
            .insert(name.to_string());
    }

    pub fn calls(&self, name: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .get(name)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl HealthProbe for ScriptedProbe {
    async fn probe(&self, name: &str, port: u16) -> Result<(), ProbeError> {
        let mut state = self.state.lock().unwrap();
        *state.calls.entry(name.to_string()).or_insert(0) += 1;
        if state.failing_ports.contains(&port) || state.failing_names.contains(name) {
            return Err(ProbeError::Status(503));
        }
        Ok(())
    }
}

/// Poll `check` every millisecond until it holds or `timeout` elapses
pub async fn eventually<F: Fn() -> bool>(timeout: Duration, check: F) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    check()
}
