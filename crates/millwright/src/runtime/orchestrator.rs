//! Orchestrator - launches the component graph and keeps it healthy

use crate::backend::{HealthProbe, RuntimeClient, RuntimeError};
use crate::config::Settings;
use crate::runtime::component::Status;
use crate::runtime::graph::ComponentGraph;
use crate::runtime::launcher::{LaunchError, Launcher};
use crate::runtime::reconciler::{ReconcileConfig, Reconciler};
use std::sync::Arc;
use tokio::sync::watch;

/// Owns the component graph and the collaborators used to run it
pub struct Millwright {
    graph: Arc<ComponentGraph>,
    runtime: Arc<dyn RuntimeClient>,
    probe: Arc<dyn HealthProbe>,
    settings: Settings,
}

impl Millwright {
    pub fn new(
        graph: ComponentGraph,
        runtime: Arc<dyn RuntimeClient>,
        probe: Arc<dyn HealthProbe>,
        settings: Settings,
    ) -> Self {
        Self {
            graph: Arc::new(graph),
            runtime,
            probe,
            settings,
        }
    }

    pub fn graph(&self) -> &ComponentGraph {
        &self.graph
    }

    fn launcher(&self) -> Launcher {
        Launcher::new(self.runtime.clone(), self.graph.clone())
    }

    /// Create the shared network, launch every component and reconcile until
    /// shutdown is signalled. A closed shutdown channel counts as a signal.
    pub async fn run(&self, shutdown_rx: watch::Receiver<()>) -> Result<(), MillwrightError> {
        if shutdown_rx.has_changed().unwrap_or(true) {
            return Ok(());
        }

        self.runtime
            .get_or_create_network(&self.settings.network_name)
            .await
            .map_err(MillwrightError::Network)?;

        if shutdown_rx.has_changed().unwrap_or(true) {
            return Ok(());
        }

        self.start(&shutdown_rx).await?;
        self.reconcile(shutdown_rx).await;
        Ok(())
    }

    /// Launch every component tree, in configuration order
    pub async fn start(&self, shutdown_rx: &watch::Receiver<()>) -> Result<(), LaunchError> {
        log::info!("Starting components");
        let launcher = self.launcher();
        for component in self.graph.iter() {
            if shutdown_rx.has_changed().unwrap_or(true) {
                log::info!("Shutdown requested, aborting launch");
                return Ok(());
            }
            launcher.launch_tree(component.name()).await?;
        }
        log::info!("All components launched");
        Ok(())
    }

    /// Probe components and recover failed ones until shutdown
    pub async fn reconcile(&self, shutdown_rx: watch::Receiver<()>) {
        let config = ReconcileConfig {
            cycle_delay: self.settings.reconcile_cycle_delay(),
            failed_timeout: self.settings.reconcile_failed_timeout(),
        };
        let mut reconciler =
            Reconciler::new(self.graph.clone(), self.launcher(), self.probe.clone(), config);
        reconciler.run(shutdown_rx).await;
    }

    /// Name and status of every component
    pub fn status(&self) -> Vec<(&str, Status)> {
        self.graph
            .iter()
            .map(|component| (component.name(), component.status()))
            .collect()
    }
}

/// Errors that abort the orchestrator
#[derive(Debug, thiserror::Error)]
pub enum MillwrightError {
    #[error("Failed to create the shared network")]
    Network(#[source] RuntimeError),

    #[error("Failed to start components")]
    Launch(#[from] LaunchError),
}
