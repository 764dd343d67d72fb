//! HTTP liveness probe

use crate::backend::{HealthProbe, ProbeError};
use crate::config::Settings;
use async_trait::async_trait;

/// Probes `http://localhost:<port><path>` and expects a success status
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
    path: String,
}

impl HttpProbe {
    pub fn new(settings: &Settings) -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder()
            .timeout(settings.probe_timeout())
            .build()?;
        Ok(Self {
            client,
            path: settings.diagnostics_path.clone(),
        })
    }

    fn url(&self, port: u16) -> String {
        format!("http://localhost:{}{}", port, self.path)
    }

    /// Fetch the variables published on the diagnostics endpoint
    pub async fn fetch_vars(&self, port: u16) -> Result<String, ProbeError> {
        let resp = self.client.get(self.url(port)).send().await?;
        if !resp.status().is_success() {
            return Err(ProbeError::Status(resp.status().as_u16()));
        }
        Ok(resp.text().await?)
    }
}

#[async_trait]
impl HealthProbe for HttpProbe {
    async fn probe(&self, name: &str, port: u16) -> Result<(), ProbeError> {
        let resp = self.client.get(self.url(port)).send().await?;
        if !resp.status().is_success() {
            return Err(ProbeError::Status(resp.status().as_u16()));
        }
        log::debug!("[{}] Successful heartbeat", name);
        Ok(())
    }
}
