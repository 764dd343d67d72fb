//! Pipeline file YAML schema definitions

use crate::config::Settings;
use crate::runtime::{ComponentSpec, RunSpec};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable telling a component which port its diagnostics
/// endpoint must listen on
pub const DIAGNOSTICS_PORT_ENV: &str = "INTROSPECTION_PORT";

/// Pipeline shipped with millwright, used when no pipeline file is given
const DEFAULT_PIPELINE: &str = r#"
components:
  dispatcher:
    build_file: "./dispatcher/Dockerfile"
    build_context: "."
    env:
      - "DISPATCHER_PORT=8080"
      - "DISPATCHER_MIN_BUFFER=20"
      - "DISPATCHER_INITIAL_BUFFER=50"
      - "DISPATCHER_MAX_METRICS=10"
      - "INGESTION_HOST=ingestion"
      - "INGESTION_PORT=8080"
    depends_on:
      - ingestion

  ingestion:
    build_context: "ingestion"
    env:
      - "INGESTION_MAX_METRICS=10"
      - "INGESTION_BUFFER_SIZE=50"
      - "INGESTION_PORT=8080"
      - "METRICS_HOST=demoware"
      - "METRICS_PORT=8080"
      - "METRICS_AUTH_USER=deadbeef"
      - "METRICS_AUTH_PASS="
    depends_on:
      - demoware

  demoware:
    build_context: "demoware"
    ignore_health: true

  handler_cpu_usage:
    build_file: "./handlercpu/Dockerfile"
    build_context: "."
    env:
      - "HANDLER_POLL_DELAY=500"
      - "DISPATCHER_HOST=dispatcher"
      - "DISPATCHER_PORT=8080"
    depends_on:
      - dispatcher

  handler_kernel_upgrade:
    build_file: "./handlerupgrade/Dockerfile"
    build_context: "."
    env:
      - "HANDLER_POLL_DELAY=500"
      - "DISPATCHER_HOST=dispatcher"
      - "DISPATCHER_PORT=8080"
    depends_on:
      - dispatcher

  handler_load:
    build_file: "./handlerload/Dockerfile"
    build_context: "."
    env:
      - "HANDLER_POLL_DELAY=500"
      - "DISPATCHER_HOST=dispatcher"
      - "DISPATCHER_PORT=8080"
    depends_on:
      - dispatcher
"#;

/// Root pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineFile {
    /// Orchestrator settings
    #[serde(default)]
    pub settings: Settings,

    /// Component definitions (ordered map for deterministic launch order)
    pub components: IndexMap<String, ComponentConfig>,
}

/// Component configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentConfig {
    /// Build file path, relative to the build context
    #[serde(default = "default_build_file")]
    pub build_file: String,

    /// Build context directory; relative paths are resolved against the
    /// project root
    pub build_context: String,

    /// Environment variables in KEY=VALUE form
    #[serde(default)]
    pub env: Vec<String>,

    /// Components that must be running before this one is launched
    #[serde(default)]
    pub depends_on: Vec<String>,

    /// Never probe nor recover this component (it has no diagnostics endpoint)
    #[serde(default)]
    pub ignore_health: bool,
}

fn default_build_file() -> String {
    "Dockerfile".to_string()
}

impl PipelineFile {
    /// Load pipeline file from a YAML file
    pub fn from_file(path: &str) -> Result<Self, PipelineFileError> {
        let content = std::fs::read_to_string(path).map_err(|e| PipelineFileError::Io {
            path: path.to_string(),
            source: e,
        })?;
        Self::from_yaml(&content)
    }

    /// Parse pipeline file from YAML string
    pub fn from_yaml(content: &str) -> Result<Self, PipelineFileError> {
        let pipeline: PipelineFile = serde_yaml::from_str(content)?;
        for (name, component) in &pipeline.components {
            if component.build_context.trim().is_empty() {
                return Err(PipelineFileError::InvalidComponent(format!(
                    "component '{}' has an empty build_context",
                    name
                )));
            }
            if let Some(bad) = component.env.iter().find(|e| !e.contains('=')) {
                return Err(PipelineFileError::InvalidComponent(format!(
                    "component '{}' env entry '{}' is not KEY=VALUE",
                    name, bad
                )));
            }
        }
        Ok(pipeline)
    }

    /// The built-in test-data pipeline
    pub fn builtin() -> Result<Self, PipelineFileError> {
        Self::from_yaml(DEFAULT_PIPELINE)
    }

    /// Resolve component definitions into specs ready for the graph.
    ///
    /// Components that are health checked get the diagnostics port injected
    /// into their environment.
    pub fn component_specs(&self, project_root: &Path) -> Vec<ComponentSpec> {
        self.components
            .iter()
            .map(|(name, component)| {
                let mut env = component.env.clone();
                if !component.ignore_health {
                    env.push(format!(
                        "{}={}",
                        DIAGNOSTICS_PORT_ENV, self.settings.diagnostics_port
                    ));
                }

                let context = PathBuf::from(&component.build_context);
                let build_context = if context.is_absolute() {
                    context
                } else {
                    project_root.join(context)
                };

                ComponentSpec {
                    name: name.clone(),
                    run_spec: RunSpec {
                        build_context,
                        build_file: PathBuf::from(&component.build_file),
                        env,
                    },
                    dependencies: component.depends_on.clone(),
                    ignore_health: component.ignore_health,
                }
            })
            .collect()
    }
}

/// Errors that can occur when loading a pipeline file
#[derive(Debug, thiserror::Error)]
pub enum PipelineFileError {
    #[error("Failed to read pipeline file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse pipeline file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid component: {0}")]
    InvalidComponent(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_pipeline_parses() {
        let pipeline = PipelineFile::builtin().unwrap();
        let names: Vec<_> = pipeline.components.keys().map(String::as_str).collect();
        assert_eq!(
            names,
            vec![
                "dispatcher",
                "ingestion",
                "demoware",
                "handler_cpu_usage",
                "handler_kernel_upgrade",
                "handler_load"
            ]
        );
        assert!(pipeline.components["demoware"].ignore_health);
        assert_eq!(pipeline.components["demoware"].build_file, "Dockerfile");
        assert_eq!(pipeline.settings, Settings::default());
    }

    #[test]
    fn test_diagnostics_port_injected_for_checked_components() {
        let yaml = r#"
settings:
  diagnostics_port: 9000
components:
  a:
    build_context: "a"
    ignore_health: true
  b:
    build_context: "/abs/b"
    env: ["X=1"]
    depends_on: [a]
"#;
        let pipeline = PipelineFile::from_yaml(yaml).unwrap();
        let specs = pipeline.component_specs(Path::new("/project"));

        assert!(specs[0].run_spec.env.is_empty());
        assert_eq!(specs[0].run_spec.build_context, PathBuf::from("/project/a"));

        assert_eq!(specs[1].run_spec.env, vec!["X=1", "INTROSPECTION_PORT=9000"]);
        assert_eq!(specs[1].run_spec.build_context, PathBuf::from("/abs/b"));
        assert_eq!(specs[1].dependencies, vec!["a"]);
    }

    #[test]
    fn test_invalid_env_entry_rejected() {
        let yaml = r#"
components:
  a:
    build_context: "a"
    env: ["NOVALUE"]
"#;
        let result = PipelineFile::from_yaml(yaml);
        assert!(matches!(result, Err(PipelineFileError::InvalidComponent(_))));
    }

    #[test]
    fn test_missing_components_is_parse_error() {
        let result = PipelineFile::from_yaml("settings: {}\n");
        assert!(matches!(result, Err(PipelineFileError::Parse(_))));
    }
}
