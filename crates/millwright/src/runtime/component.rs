//! Component definition and runtime state

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Component status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    /// Not launched yet by this process
    Unstarted = 0,
    /// Launched (or adopted) and eligible for health probes
    Running = 1,
    /// Missed probes for too long; a recovery is in flight
    Failed = 2,
}

impl Status {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Status::Running,
            2 => Status::Failed,
            _ => Status::Unstarted,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Unstarted => write!(f, "unstarted"),
            Status::Running => write!(f, "running"),
            Status::Failed => write!(f, "failed"),
        }
    }
}

/// Opaque handle to a running execution unit
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceId(pub String);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How to build and run a component
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSpec {
    /// Build context directory
    pub build_context: PathBuf,
    /// Build file, relative to the build context
    pub build_file: PathBuf,
    /// Environment variables in KEY=VALUE form
    pub env: Vec<String>,
}

/// Static definition of a component, before it enters the graph
#[derive(Debug, Clone)]
pub struct ComponentSpec {
    pub name: String,
    pub run_spec: RunSpec,
    pub dependencies: Vec<String>,
    pub ignore_health: bool,
}

/// Mutable state owned by the engine
#[derive(Debug, Default)]
struct RuntimeState {
    /// Handle of the current execution unit
    instance_id: Option<InstanceId>,
    /// Host port bound to the unit's diagnostics port
    diagnostics_port: Option<u16>,
    /// Last successful probe, or the moment the component entered Running
    last_healthy_at: Option<Instant>,
}

/// A managed service unit
#[derive(Debug)]
pub struct Component {
    spec: ComponentSpec,
    status: AtomicU8,
    state: Mutex<RuntimeState>,
}

impl Component {
    pub fn new(spec: ComponentSpec) -> Self {
        Self {
            spec,
            status: AtomicU8::new(Status::Unstarted as u8),
            state: Mutex::new(RuntimeState::default()),
        }
    }

    /// Unique name, also the container name and its host name on the network
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn run_spec(&self) -> &RunSpec {
        &self.spec.run_spec
    }

    pub fn dependencies(&self) -> &[String] {
        &self.spec.dependencies
    }

    pub fn ignore_health(&self) -> bool {
        self.spec.ignore_health
    }

    pub fn status(&self) -> Status {
        Status::from_u8(self.status.load(Ordering::Acquire))
    }

    /// Atomically move from `from` to `to`; false if the status was not `from`
    pub fn transition(&self, from: Status, to: Status) -> bool {
        self.status
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Mark the component running and restart its liveness clock
    pub async fn mark_running(&self) {
        self.state.lock().await.last_healthy_at = Some(Instant::now());
        self.status.store(Status::Running as u8, Ordering::Release);
    }

    pub async fn record_healthy(&self) {
        self.state.lock().await.last_healthy_at = Some(Instant::now());
    }

    /// Time since the last successful probe (or since entering Running)
    pub async fn unhealthy_for(&self) -> Duration {
        self.state
            .lock()
            .await
            .last_healthy_at
            .map(|t| t.elapsed())
            .unwrap_or(Duration::MAX)
    }

    pub async fn set_instance(&self, instance_id: InstanceId) {
        self.state.lock().await.instance_id = Some(instance_id);
    }

    /// Forget the current execution unit and its port
    pub async fn take_instance(&self) -> Option<InstanceId> {
        let mut state = self.state.lock().await;
        state.diagnostics_port = None;
        state.instance_id.take()
    }

    pub async fn instance_id(&self) -> Option<InstanceId> {
        self.state.lock().await.instance_id.clone()
    }

    pub async fn set_diagnostics_port(&self, port: u16) {
        self.state.lock().await.diagnostics_port = Some(port);
    }

    pub async fn diagnostics_port(&self) -> Option<u16> {
        self.state.lock().await.diagnostics_port
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn component() -> Component {
        Component::new(ComponentSpec {
            name: "ingestion".to_string(),
            run_spec: RunSpec {
                build_context: PathBuf::from("ingestion"),
                build_file: PathBuf::from("Dockerfile"),
                env: vec![],
            },
            dependencies: vec![],
            ignore_health: false,
        })
    }

    #[test]
    fn test_initial_status_is_unstarted() {
        assert_eq!(component().status(), Status::Unstarted);
    }

    #[test]
    fn test_transition_only_from_expected_status() {
        let c = component();
        assert!(!c.transition(Status::Running, Status::Failed));
        assert!(c.transition(Status::Unstarted, Status::Running));
        assert!(c.transition(Status::Running, Status::Failed));
        // second detection loses the race
        assert!(!c.transition(Status::Running, Status::Failed));
        assert_eq!(c.status(), Status::Failed);
    }

    #[tokio::test]
    async fn test_mark_running_restarts_liveness_clock() {
        let c = component();
        assert_eq!(c.unhealthy_for().await, Duration::MAX);
        c.mark_running().await;
        assert_eq!(c.status(), Status::Running);
        assert!(c.unhealthy_for().await < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_take_instance_clears_port() {
        let c = component();
        c.set_instance(InstanceId("abc".to_string())).await;
        c.set_diagnostics_port(32768).await;
        assert_eq!(c.take_instance().await, Some(InstanceId("abc".to_string())));
        assert_eq!(c.diagnostics_port().await, None);
        assert_eq!(c.instance_id().await, None);
    }
}
