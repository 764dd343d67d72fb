//! Command handlers behind the CLI subcommands

use crate::backend::{DockerCli, HttpProbe, RuntimeClient};
use crate::cli::{DestroyArgs, InspectArgs, KillArgs, StartArgs, ValidateArgs};
use crate::config::{PipelineFile, Settings};
use crate::coordination::Coordinator;
use crate::runtime::{ComponentGraph, Millwright};
use anyhow::{anyhow, Context, Result};
use std::sync::Arc;
use tokio::sync::watch;

/// Load the pipeline file, or the built-in pipeline when none is given
pub fn load_pipeline(path: Option<&str>) -> Result<PipelineFile> {
    let pipeline = match path {
        Some(path) => {
            log::info!("Loading pipeline file: {}", path);
            PipelineFile::from_file(path)?
        }
        None => PipelineFile::builtin()?,
    };
    Ok(pipeline)
}

/// Load and validate the pipeline into a component graph
pub fn build_graph(pipeline: &PipelineFile) -> Result<ComponentGraph> {
    let project_root = std::env::current_dir().context("Failed to get current directory")?;
    let graph = ComponentGraph::build(pipeline.component_specs(&project_root))?;
    Ok(graph)
}

/// Launch the pipeline and reconcile it until terminated or displaced
pub async fn start(args: StartArgs) -> Result<()> {
    let pipeline = load_pipeline(args.pipeline.as_deref())?;
    let graph = build_graph(&pipeline)?;
    let settings = pipeline.settings.clone();

    let (shutdown_tx, shutdown_rx) = watch::channel(());
    {
        let shutdown_tx = shutdown_tx.clone();
        ctrlc::set_handler(move || {
            log::error!("Terminating due to signal");
            let _ = shutdown_tx.send(());
        })
        .context("Failed to install signal handler")?;
    }

    let mut coordinator = Coordinator::in_temp_dir();
    coordinator.create_wait_file()?;
    let watcher = coordinator.watch_own_file(shutdown_tx.clone())?;

    if args.force {
        log::info!("--force enabled, preceding millwrights will be removed.");
        let removed = coordinator.cut_in_line()?;
        log::debug!("Removed {} wait file(s)", removed);
    } else {
        coordinator.wait_in_line(shutdown_rx.clone()).await?;
    }

    if shutdown_rx.has_changed().unwrap_or(true) {
        watcher.abort();
        return Ok(());
    }

    log::info!("Starting millwright");
    let runtime: Arc<dyn RuntimeClient> = Arc::new(DockerCli::new(&settings));
    let probe = Arc::new(HttpProbe::new(&settings)?);
    let millwright = Millwright::new(graph, runtime, probe, settings);

    let result = millwright.run(shutdown_rx).await;
    watcher.abort();
    result?;

    log::info!("Millwright exiting");
    Ok(())
}

/// Print the resolved pipeline in launch order
pub fn validate(args: ValidateArgs) -> Result<()> {
    let pipeline = load_pipeline(args.pipeline.as_deref())?;
    let graph = build_graph(&pipeline)?;

    println!("Pipeline is valid");
    println!("  Components: {}", graph.len());
    println!("  Network: {}", pipeline.settings.network_name);
    println!("Launch order:");
    for (i, name) in graph.launch_order().into_iter().enumerate() {
        let deps = graph
            .get(name)
            .map(|c| c.dependencies().join(", "))
            .unwrap_or_default();
        if deps.is_empty() {
            println!("  {}. {}", i + 1, name);
        } else {
            println!("  {}. {} (after {})", i + 1, name, deps);
        }
    }
    Ok(())
}

/// Settings of the pipeline file, or of the built-in pipeline
pub fn load_settings(path: Option<&str>) -> Result<Settings> {
    Ok(load_pipeline(path)?.settings)
}

/// Label filter for `destroy`: the explicit one, else the pipeline's
fn destroy_label(args: &DestroyArgs, settings: &Settings) -> String {
    args.label.clone().unwrap_or_else(|| settings.label_filter())
}

/// Force-remove every resource carrying the label
pub async fn destroy(args: DestroyArgs) -> Result<()> {
    let settings = load_settings(args.pipeline.as_deref())?;
    let label = destroy_label(&args, &settings);
    log::info!("Removing resources labelled {}", label);
    let docker = DockerCli::new(&settings);
    docker.remove_labelled(&label).await?;
    Ok(())
}

/// Force-remove one component's container
pub async fn kill(args: KillArgs) -> Result<()> {
    let settings = load_settings(args.pipeline.as_deref())?;
    let docker = DockerCli::new(&settings);
    let instance = docker
        .find_existing_unit(&args.name)
        .await?
        .ok_or_else(|| anyhow!("container for component {} not found", args.name))?;
    docker.remove(&instance).await?;
    log::info!("[{}] Removed {}", args.name, instance);
    Ok(())
}

/// Print the variables published on a component's diagnostics endpoint
pub async fn inspect(args: InspectArgs) -> Result<()> {
    let settings = Settings {
        diagnostics_port: args.port,
        ..Settings::default()
    };
    let docker = DockerCli::new(&settings);
    let instance = docker
        .find_existing_unit(&args.name)
        .await?
        .ok_or_else(|| anyhow!("container for component {} not found", args.name))?;
    let port = docker.resolve_diagnostics_port(&instance).await?;

    let probe = HttpProbe::new(&settings)?;
    let vars = probe.fetch_vars(port).await?;
    // stdout only, so logs on stderr can be muted
    print!("{}", vars);
    Ok(())
}
