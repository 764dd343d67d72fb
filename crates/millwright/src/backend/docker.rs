//! Docker runtime client
//!
//! Drives the `docker` CLI. Every resource created here carries the
//! `used-by=<label>` label so `millwright destroy` can find it again.

use crate::backend::{NetworkId, RuntimeClient, RuntimeError};
use crate::config::Settings;
use crate::runtime::{Component, InstanceId};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

const DOCKER: &str = "docker";

/// Runtime client backed by the docker command-line tool
#[derive(Debug, Clone)]
pub struct DockerCli {
    network_name: String,
    diagnostics_port: u16,
    label: String,
}

impl DockerCli {
    pub fn new(settings: &Settings) -> Self {
        Self {
            network_name: settings.network_name.clone(),
            diagnostics_port: settings.diagnostics_port,
            label: settings.label_filter(),
        }
    }

    fn describe(&self, args: &[String]) -> String {
        format!("{} {}", DOCKER, args.join(" "))
    }

    /// Run a docker command to completion and return its trimmed stdout
    async fn run(&self, args: Vec<String>) -> Result<String, RuntimeError> {
        let command = self.describe(&args);
        log::debug!("Running: {}", command);

        let output = Command::new(DOCKER)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| RuntimeError::Spawn {
                command: command.clone(),
                source: e,
            })?;

        if !output.status.success() {
            return Err(RuntimeError::CommandFailed {
                command,
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Build the component's image, streaming build output to the log
    async fn build_image(&self, component: &Component) -> Result<(), RuntimeError> {
        let run_spec = component.run_spec();
        let build_file = run_spec.build_context.join(&run_spec.build_file);
        let args = vec![
            "build".to_string(),
            "--pull".to_string(),
            "--rm".to_string(),
            "--force-rm".to_string(),
            "--tag".to_string(),
            component.name().to_string(),
            "--label".to_string(),
            self.label.clone(),
            "--file".to_string(),
            build_file.to_string_lossy().into_owned(),
            run_spec.build_context.to_string_lossy().into_owned(),
        ];
        let command = self.describe(&args);
        log::info!("[{}] Building image", component.name());

        let mut child = Command::new(DOCKER)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RuntimeError::Spawn {
                command: command.clone(),
                source: e,
            })?;

        if let Some(stdout) = child.stdout.take() {
            let name = component.name().to_string();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    log::debug!("[{}] {}", name, line);
                }
            });
        }

        // Keep the tail of stderr for the error message
        let stderr_task = child.stderr.take().map(|stderr| {
            let name = component.name().to_string();
            tokio::spawn(async move {
                let mut tail: Vec<String> = Vec::new();
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    log::debug!("[{}] {}", name, line);
                    tail.push(line);
                    if tail.len() > 20 {
                        tail.remove(0);
                    }
                }
                tail.join("\n")
            })
        });

        let status = child.wait().await.map_err(|e| RuntimeError::Spawn {
            command: command.clone(),
            source: e,
        })?;

        if status.success() {
            return Ok(());
        }

        let stderr = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };
        Err(RuntimeError::CommandFailed {
            command,
            code: status.code().unwrap_or(-1),
            stderr,
        })
    }

    fn create_args(&self, component: &Component) -> Vec<String> {
        let mut args = vec![
            "create".to_string(),
            // remove the container when it exits
            "--rm".to_string(),
            "--name".to_string(),
            component.name().to_string(),
            "--network".to_string(),
            self.network_name.clone(),
            "--label".to_string(),
            self.label.clone(),
            "--publish".to_string(),
            format!("127.0.0.1::{}", self.diagnostics_port),
        ];
        for var in &component.run_spec().env {
            args.push("--env".to_string());
            args.push(var.clone());
        }
        args.push(component.name().to_string());
        args
    }

    /// Force-remove every container, image and network carrying `label`
    /// (a `key=value` filter).
    pub async fn remove_labelled(&self, label: &str) -> Result<(), RuntimeError> {
        let filter = format!("label={}", label);

        let containers = self
            .run(vec![
                "ps".to_string(),
                "--all".to_string(),
                "--quiet".to_string(),
                "--filter".to_string(),
                filter.clone(),
            ])
            .await?;
        for id in containers.lines().filter(|l| !l.is_empty()) {
            log::info!("Removing container {}", id);
            self.remove(&InstanceId(id.to_string())).await?;
        }

        let images = self
            .run(vec![
                "images".to_string(),
                "--quiet".to_string(),
                "--filter".to_string(),
                filter.clone(),
            ])
            .await?;
        for id in unique_lines(&images) {
            log::info!("Removing image {}", id);
            self.run(vec!["rmi".to_string(), "--force".to_string(), id.to_string()])
                .await?;
        }

        let networks = self
            .run(vec![
                "network".to_string(),
                "ls".to_string(),
                "--quiet".to_string(),
                "--filter".to_string(),
                filter,
            ])
            .await?;
        for id in networks.lines().filter(|l| !l.is_empty()) {
            log::info!("Removing network {}", id);
            self.run(vec!["network".to_string(), "rm".to_string(), id.to_string()])
                .await?;
        }

        Ok(())
    }
}

#[async_trait]
impl RuntimeClient for DockerCli {
    async fn get_or_create_network(&self, name: &str) -> Result<NetworkId, RuntimeError> {
        let listing = self
            .run(vec![
                "network".to_string(),
                "ls".to_string(),
                "--filter".to_string(),
                format!("name={}", name),
                "--format".to_string(),
                "{{.ID}} {{.Name}}".to_string(),
            ])
            .await?;
        if let Some(id) = find_by_name(&listing, name) {
            log::debug!("Reusing network {} ({})", name, id);
            return Ok(NetworkId(id));
        }

        let id = self
            .run(vec![
                "network".to_string(),
                "create".to_string(),
                "--driver".to_string(),
                "bridge".to_string(),
                "--label".to_string(),
                self.label.clone(),
                name.to_string(),
            ])
            .await?;
        log::info!("Created network {} ({})", name, id);
        Ok(NetworkId(id))
    }

    async fn find_existing_unit(&self, name: &str) -> Result<Option<InstanceId>, RuntimeError> {
        let listing = self
            .run(vec![
                "ps".to_string(),
                "--filter".to_string(),
                format!("name={}", name),
                "--format".to_string(),
                "{{.ID}} {{.Names}}".to_string(),
            ])
            .await?;
        Ok(find_by_name(&listing, name).map(InstanceId))
    }

    async fn launch(&self, component: &Component) -> Result<InstanceId, RuntimeError> {
        self.build_image(component).await?;

        let id = self.run(self.create_args(component)).await?;
        if id.is_empty() {
            return Err(RuntimeError::InvalidOutput {
                command: "docker create".to_string(),
                output: id,
            });
        }

        self.run(vec!["start".to_string(), id.clone()]).await?;
        Ok(InstanceId(id))
    }

    async fn remove(&self, instance: &InstanceId) -> Result<(), RuntimeError> {
        self.run(vec![
            "rm".to_string(),
            "--force".to_string(),
            instance.0.clone(),
        ])
        .await
        .map(|_| ())
    }

    async fn resolve_diagnostics_port(&self, instance: &InstanceId) -> Result<u16, RuntimeError> {
        let output = self
            .run(vec![
                "port".to_string(),
                instance.0.clone(),
                format!("{}/tcp", self.diagnostics_port),
            ])
            .await
            .map_err(|e| match e {
                RuntimeError::CommandFailed { .. } => RuntimeError::PortNotPublished {
                    instance: instance.clone(),
                    port: self.diagnostics_port,
                },
                other => other,
            })?;

        parse_host_port(&output).ok_or_else(|| RuntimeError::PortNotPublished {
            instance: instance.clone(),
            port: self.diagnostics_port,
        })
    }
}

/// Pick the ID from `<id> <name>[,<name>...]` lines whose name matches
/// exactly. Docker name filters match substrings.
fn find_by_name(listing: &str, name: &str) -> Option<String> {
    listing.lines().find_map(|line| {
        let (id, names) = line.trim().split_once(' ')?;
        names
            .split(',')
            .any(|n| n.trim().trim_start_matches('/') == name)
            .then(|| id.to_string())
    })
}

/// Parse the first binding of `docker port` output (`127.0.0.1:49153`)
fn parse_host_port(output: &str) -> Option<u16> {
    output
        .lines()
        .filter_map(|line| line.trim().rsplit_once(':'))
        .find_map(|(_, port)| port.parse().ok())
}

fn unique_lines(output: &str) -> Vec<&str> {
    let mut seen = Vec::new();
    for line in output.lines().filter(|l| !l.is_empty()) {
        if !seen.contains(&line) {
            seen.push(line);
        }
    }
    seen
}
