//! Orchestrator-wide settings
//!
//! Values that every part of the engine needs (the diagnostics port published
//! by each container, the shared network, the cleanup label and the
//! reconciliation timings) live here and are handed out explicitly.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings shared by the runtime adapter, the launcher and the reconciler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Port the diagnostics endpoint listens on inside every container
    #[serde(default = "default_diagnostics_port")]
    pub diagnostics_port: u16,

    /// Path of the diagnostics endpoint
    #[serde(default = "default_diagnostics_path")]
    pub diagnostics_path: String,

    /// Name of the bridge network all containers join
    #[serde(default = "default_network_name")]
    pub network_name: String,

    /// Value of the `used-by` label put on every created resource
    #[serde(default = "default_label")]
    pub label: String,

    /// Delay between two reconciliation passes
    #[serde(default = "default_reconcile_cycle_delay_ms")]
    pub reconcile_cycle_delay_ms: u64,

    /// Time without a successful probe after which a component is failed
    #[serde(default = "default_reconcile_failed_timeout_ms")]
    pub reconcile_failed_timeout_ms: u64,

    /// Per-request timeout of a liveness probe
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
}

fn default_diagnostics_port() -> u16 {
    8089
}

fn default_diagnostics_path() -> String {
    "/debug/vars".to_string()
}

fn default_network_name() -> String {
    "millwright-bridge".to_string()
}

fn default_label() -> String {
    "millwright".to_string()
}

fn default_reconcile_cycle_delay_ms() -> u64 {
    500
}

fn default_reconcile_failed_timeout_ms() -> u64 {
    3_000
}

fn default_probe_timeout_ms() -> u64 {
    1_000
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            diagnostics_port: default_diagnostics_port(),
            diagnostics_path: default_diagnostics_path(),
            network_name: default_network_name(),
            label: default_label(),
            reconcile_cycle_delay_ms: default_reconcile_cycle_delay_ms(),
            reconcile_failed_timeout_ms: default_reconcile_failed_timeout_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
        }
    }
}

impl Settings {
    pub fn reconcile_cycle_delay(&self) -> Duration {
        Duration::from_millis(self.reconcile_cycle_delay_ms)
    }

    pub fn reconcile_failed_timeout(&self) -> Duration {
        Duration::from_millis(self.reconcile_failed_timeout_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// The `key=value` label filter matching every resource we created
    pub fn label_filter(&self) -> String {
        format!("used-by={}", self.label)
    }
}
