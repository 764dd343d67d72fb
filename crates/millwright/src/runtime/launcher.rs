//! Dependency-ordered launch of component trees

use crate::backend::{RuntimeClient, RuntimeError};
use crate::runtime::component::{Component, Status};
use crate::runtime::graph::ComponentGraph;
use futures::future::BoxFuture;
use std::sync::Arc;

/// Launches components after their dependencies
#[derive(Clone)]
pub struct Launcher {
    runtime: Arc<dyn RuntimeClient>,
    graph: Arc<ComponentGraph>,
}

impl Launcher {
    pub fn new(runtime: Arc<dyn RuntimeClient>, graph: Arc<ComponentGraph>) -> Self {
        Self { runtime, graph }
    }

    /// Launch a component and, before it, every dependency it transitively
    /// needs. Components that are no longer `Unstarted` are skipped, so
    /// shared dependencies are launched once. Stops at the first error.
    pub async fn launch_tree(&self, name: &str) -> Result<(), LaunchError> {
        self.launch_tree_inner(name.to_string(), Vec::new()).await
    }

    fn launch_tree_inner(
        &self,
        name: String,
        mut trail: Vec<String>,
    ) -> BoxFuture<'_, Result<(), LaunchError>> {
        Box::pin(async move {
            let component = self
                .graph
                .get(&name)
                .cloned()
                .ok_or_else(|| LaunchError::UnknownComponent(name.clone()))?;

            if component.status() != Status::Unstarted {
                return Ok(());
            }

            if trail.contains(&name) {
                trail.push(name);
                return Err(LaunchError::DependencyCycle(trail));
            }

            // A previous millwright may have left it running
            match self.runtime.find_existing_unit(&name).await {
                Ok(Some(instance)) => {
                    log::info!("[{}] Already launched, adopting {}", name, instance);
                    component.set_instance(instance).await;
                    self.resolve_port(&component).await;
                    component.mark_running().await;
                    return Ok(());
                }
                Ok(None) => {}
                Err(e) => log::debug!("[{}] Lookup of existing unit failed: {}", name, e),
            }

            log::info!("[{}] Checking dependencies", name);
            trail.push(name.clone());
            for dependency in component.dependencies() {
                self.launch_tree_inner(dependency.clone(), trail.clone())
                    .await?;
            }

            log::info!("[{}] Launching", name);
            self.launch_component(&component)
                .await
                .map_err(|source| LaunchError::Runtime {
                    component: name.clone(),
                    source,
                })?;
            component.mark_running().await;
            log::info!("[{}] Launched", name);

            Ok(())
        })
    }

    /// Launch a single component and record its handle and diagnostics port
    pub async fn launch_component(&self, component: &Component) -> Result<(), RuntimeError> {
        let instance = self.runtime.launch(component).await?;
        component.set_instance(instance).await;
        self.resolve_port(component).await;
        Ok(())
    }

    /// Remove the component's current unit, if any, and launch it again
    pub async fn relaunch(&self, component: &Component) -> Result<(), RuntimeError> {
        if let Some(instance) = component.take_instance().await {
            // It may already be gone; a unit that could not be removed will
            // make the launch below fail instead.
            if let Err(e) = self.runtime.remove(&instance).await {
                log::debug!("[{}] Removing {} failed: {}", component.name(), instance, e);
            }
        }
        self.launch_component(component).await
    }

    /// Look up the diagnostics port. A failure leaves the port unresolved;
    /// probes will fail and the reconciler will recover the component.
    async fn resolve_port(&self, component: &Component) {
        if component.ignore_health() {
            return;
        }
        let Some(instance) = component.instance_id().await else {
            return;
        };
        match self.runtime.resolve_diagnostics_port(&instance).await {
            Ok(port) => component.set_diagnostics_port(port).await,
            Err(e) => log::warn!(
                "[{}] Can't resolve diagnostics port: {}",
                component.name(),
                e
            ),
        }
    }
}

/// Errors that abort the initial launch
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("Failed to launch '{component}': {source}")]
    Runtime {
        component: String,
        #[source]
        source: RuntimeError,
    },

    #[error("Unknown component '{0}'")]
    UnknownComponent(String),

    #[error("Cyclic dependency detected while launching: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),
}
