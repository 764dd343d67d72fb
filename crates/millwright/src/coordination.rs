//! Single active instance coordination
//!
//! Every millwright drops a marker file into a shared directory. Marker names
//! start with the creation time, so the oldest marker belongs to the instance
//! allowed to run. A newer instance either waits for older markers to
//! disappear or removes them (`--force`). An instance whose own marker is
//! removed has been displaced and shuts down.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::watch;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Marker-file based coordinator
#[derive(Debug)]
pub struct Coordinator {
    dir: PathBuf,
    poll_interval: Duration,
    own_file: Option<PathBuf>,
}

impl Coordinator {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            poll_interval: POLL_INTERVAL,
            own_file: None,
        }
    }

    /// Coordinator using `<tmp>/millwright`
    pub fn in_temp_dir() -> Self {
        Self::new(std::env::temp_dir().join("millwright"))
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn own_file(&self) -> Option<&Path> {
        self.own_file.as_deref()
    }

    /// Create this instance's marker file
    pub fn create_wait_file(&mut self) -> Result<PathBuf, CoordinationError> {
        std::fs::create_dir_all(&self.dir)?;
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let path = self
            .dir
            .join(format!("{:020}-{}", nanos, std::process::id()));
        std::fs::File::create(&path)?;
        log::debug!("Created wait file {}", path.display());
        self.own_file = Some(path.clone());
        Ok(path)
    }

    /// Marker files created before ours
    fn predecessors(&self) -> Result<Vec<PathBuf>, CoordinationError> {
        let own = self.own_file.as_ref().ok_or(CoordinationError::NoWaitFile)?;
        let own_name = own.file_name().map(|n| n.to_os_string());
        let mut found = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            if Some(name.as_os_str()) < own_name.as_deref() {
                found.push(entry.path());
            }
        }
        Ok(found)
    }

    /// Wait until no older instance holds a marker, or shutdown is signalled
    pub async fn wait_in_line(
        &self,
        mut shutdown_rx: watch::Receiver<()>,
    ) -> Result<(), CoordinationError> {
        loop {
            let ahead = self.predecessors()?;
            if ahead.is_empty() {
                return Ok(());
            }
            log::info!("Waiting for {} preceding millwright(s) to quit", ahead.len());

            tokio::select! {
                _ = shutdown_rx.changed() => return Ok(()),
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    /// Remove every other instance's marker so they shut down
    pub fn cut_in_line(&self) -> Result<usize, CoordinationError> {
        let own = self.own_file.as_ref().ok_or(CoordinationError::NoWaitFile)?;
        let mut removed = 0;
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if &path == own {
                continue;
            }
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(removed)
    }

    /// Fire `shutdown_tx` once our marker is removed by someone else
    pub fn watch_own_file(
        &self,
        shutdown_tx: watch::Sender<()>,
    ) -> Result<tokio::task::JoinHandle<()>, CoordinationError> {
        let own = self.own_file.clone().ok_or(CoordinationError::NoWaitFile)?;
        let interval = self.poll_interval;
        Ok(tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                if shutdown_tx.is_closed() {
                    return;
                }
                if !own.exists() {
                    log::error!("The wait file of this millwright was forcibly removed. Quitting.");
                    let _ = shutdown_tx.send(());
                    return;
                }
            }
        }))
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        if let Some(path) = self.own_file.take() {
            let _ = std::fs::remove_file(path);
        }
    }
}

/// Errors raised while coordinating with other instances
#[derive(Debug, thiserror::Error)]
pub enum CoordinationError {
    #[error("Coordination IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No wait file has been created")]
    NoWaitFile,
}
