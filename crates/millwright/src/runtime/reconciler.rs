//! Health reconciliation loop and failure recovery

use crate::backend::{HealthProbe, ProbeError, RuntimeError};
use crate::runtime::component::{Component, Status};
use crate::runtime::graph::ComponentGraph;
use crate::runtime::launcher::Launcher;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;

/// Reconciliation timings
#[derive(Debug, Clone, Copy)]
pub struct ReconcileConfig {
    /// Delay between two passes
    pub cycle_delay: Duration,
    /// Time without a successful probe after which a component is failed
    pub failed_timeout: Duration,
}

/// Periodically probes components and recovers those that stop responding
pub struct Reconciler {
    graph: Arc<ComponentGraph>,
    launcher: Launcher,
    probe: Arc<dyn HealthProbe>,
    config: ReconcileConfig,
    recoveries: JoinSet<()>,
}

impl Reconciler {
    pub fn new(
        graph: Arc<ComponentGraph>,
        launcher: Launcher,
        probe: Arc<dyn HealthProbe>,
        config: ReconcileConfig,
    ) -> Self {
        Self {
            graph,
            launcher,
            probe,
            config,
            recoveries: JoinSet::new(),
        }
    }

    /// Run passes until shutdown is signalled, then wait for recoveries that
    /// are still in flight.
    pub async fn run(&mut self, mut shutdown_rx: watch::Receiver<()>) {
        log::info!(
            "Reconciling {} components every {:?}",
            self.graph.len(),
            self.config.cycle_delay
        );

        loop {
            if shutdown_rx.has_changed().unwrap_or(true) {
                break;
            }

            self.pass().await;

            tokio::select! {
                _ = shutdown_rx.changed() => break,
                _ = tokio::time::sleep(self.config.cycle_delay) => {}
            }
        }

        self.drain().await;
    }

    /// Probe every eligible component once
    pub async fn pass(&mut self) {
        while let Some(result) = self.recoveries.try_join_next() {
            if let Err(e) = result {
                log::error!("Recovery task panicked: {}", e);
            }
        }

        for component in self.graph.iter() {
            if component.ignore_health() || component.status() != Status::Running {
                continue;
            }

            match self.probe_component(component).await {
                Ok(()) => {
                    component.record_healthy().await;
                    continue;
                }
                Err(e) => log::info!("[{}] Heartbeat failed: {}", component.name(), e),
            }

            let unhealthy_for = component.unhealthy_for().await;
            if unhealthy_for <= self.config.failed_timeout {
                continue;
            }

            // Only the detection that wins this transition dispatches recovery
            if component.transition(Status::Running, Status::Failed) {
                log::warn!(
                    "[{}] No successful heartbeat for {:?}, marking failed",
                    component.name(),
                    unhealthy_for
                );
                let launcher = self.launcher.clone();
                let component = component.clone();
                self.recoveries.spawn(async move {
                    handle_failed_component(&launcher, &component).await;
                });
            }
        }
    }

    async fn probe_component(&self, component: &Component) -> Result<(), ProbeError> {
        let port = component
            .diagnostics_port()
            .await
            .ok_or_else(|| ProbeError::NoDiagnosticsPort(component.name().to_string()))?;
        self.probe.probe(component.name(), port).await
    }

    /// Number of recoveries spawned and not yet reaped
    pub fn recoveries_in_flight(&self) -> usize {
        self.recoveries.len()
    }

    /// Wait for every outstanding recovery
    pub async fn drain(&mut self) {
        if !self.recoveries.is_empty() {
            log::info!(
                "Waiting for {} recoveries to finish",
                self.recoveries.len()
            );
        }
        while let Some(result) = self.recoveries.join_next().await {
            if let Err(e) = result {
                log::error!("Recovery task panicked: {}", e);
            }
        }
    }
}

/// Relaunch a failed component and mark it running again.
///
/// The component goes back to `Running` even if the relaunch failed; if it is
/// still broken the next failed probes will flag it again.
pub async fn handle_failed_component(launcher: &Launcher, component: &Component) {
    log::info!("[{}] Relaunching failed component", component.name());
    match launcher.relaunch(component).await {
        Ok(()) => log::info!("[{}] Relaunched", component.name()),
        Err(source) => {
            let err = RecoveryError {
                component: component.name().to_string(),
                source,
            };
            log::error!("ACTION REQUIRED: {}", err);
        }
    }
    component.mark_running().await;
}

/// A failed component could not be relaunched
#[derive(Debug, thiserror::Error)]
#[error("Failed component '{component}' couldn't be relaunched: {source}")]
pub struct RecoveryError {
    pub component: String,
    #[source]
    pub source: RuntimeError,
}
