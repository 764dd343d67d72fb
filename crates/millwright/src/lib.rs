//! Millwright
//!
//! Launches, health-checks and auto-recovers the containers that make up the
//! test-data pipeline.
//!
//! # Overview
//!
//! - Components and their dependencies are defined in a YAML pipeline file
//!   (or the built-in pipeline)
//! - A component is only launched once every dependency is running
//! - Running components are probed on their diagnostics endpoint; one that
//!   stops answering for too long is removed and launched again
//! - Only one millwright runs at a time; `--force` displaces the running one
//!
//! # Example Pipeline File
//!
//! ```yaml
//! settings:
//!   reconcile_cycle_delay_ms: 500
//!
//! components:
//!   demoware:
//!     build_context: "demoware"
//!     ignore_health: true
//!
//!   ingestion:
//!     build_context: "ingestion"
//!     env:
//!       - "METRICS_HOST=demoware"
//!     depends_on:
//!       - demoware
//! ```

pub mod backend;
pub mod cli;
pub mod commands;
pub mod config;
pub mod coordination;
pub mod runtime;

pub use backend::{
    DockerCli, HealthProbe, HttpProbe, NetworkId, ProbeError, RuntimeClient, RuntimeError,
};
pub use cli::MillwrightArgs;
pub use config::{PipelineFile, PipelineFileError, Settings};
pub use coordination::{CoordinationError, Coordinator};
pub use runtime::{
    Component, ComponentGraph, ComponentSpec, ConfigError, InstanceId, LaunchError, Launcher,
    Millwright, MillwrightError, ReconcileConfig, Reconciler, RecoveryError, RunSpec, Status,
};
