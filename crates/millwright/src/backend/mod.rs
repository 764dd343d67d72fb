//! Collaborators consumed by the engine
//!
//! The launcher and reconciler only talk to the container runtime and to the
//! components' diagnostics endpoints through these traits, so the engine can
//! be driven against fakes in tests.

pub mod docker;
pub mod probe;

pub use docker::DockerCli;
pub use probe::HttpProbe;

use crate::runtime::{Component, InstanceId};
use async_trait::async_trait;

/// Identifier of the shared network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkId(pub String);

/// Lifecycle intents the engine needs from the container runtime
#[async_trait]
pub trait RuntimeClient: Send + Sync {
    /// Return the network with this name, creating it if it does not exist
    async fn get_or_create_network(&self, name: &str) -> Result<NetworkId, RuntimeError>;

    /// Find a running unit named after the component
    async fn find_existing_unit(&self, name: &str) -> Result<Option<InstanceId>, RuntimeError>;

    /// Build the component's image, create its unit on the shared network
    /// with the diagnostics port published, and start it
    async fn launch(&self, component: &Component) -> Result<InstanceId, RuntimeError>;

    /// Force-remove a unit
    async fn remove(&self, instance: &InstanceId) -> Result<(), RuntimeError>;

    /// Host port bound to the unit's diagnostics port
    async fn resolve_diagnostics_port(&self, instance: &InstanceId) -> Result<u16, RuntimeError>;
}

/// Liveness probe against a component's diagnostics endpoint
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn probe(&self, name: &str, port: u16) -> Result<(), ProbeError>;
}

/// Errors raised by the container runtime
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("Failed to run '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{command}' exited with code {code}: {stderr}")]
    CommandFailed {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("Unexpected output from '{command}': {output}")]
    InvalidOutput { command: String, output: String },

    #[error("Diagnostics port {port} is not published for unit {instance}")]
    PortNotPublished { instance: InstanceId, port: u16 },

    #[error("{0}")]
    Other(String),
}

/// A failed liveness probe
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("Diagnostics port of '{0}' is not resolved")]
    NoDiagnosticsPort(String),

    #[error("Probe request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Diagnostics endpoint answered with status {0}")]
    Status(u16),
}
