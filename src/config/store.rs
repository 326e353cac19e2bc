//! Read/write holder for the scanner configuration.
//!
//! Detectors only ever see snapshots from [`ConfigStore::get_config`], taken
//! at cycle boundaries, so an update applies from the next cycle on.

use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::{ConfigError, ScannerConfiguration};
use crate::common::fs::write_atomic;

pub struct ConfigStore {
    path: Option<PathBuf>,
    current: RwLock<ScannerConfiguration>,
}

impl ConfigStore {
    /// Store without a backing file.
    pub fn in_memory(config: ScannerConfiguration) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            path: None,
            current: RwLock::new(config),
        })
    }

    /// Load and validate `path`; when the file does not exist the defaults
    /// are written to it.
    pub async fn load_or_init(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let config = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let config: ScannerConfiguration = serde_json::from_slice(&bytes)?;
                config.validate()?;
                info!(path = %path.display(), "Scanner configuration loaded");
                config
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = ScannerConfiguration::default();
                persist(&path, &config).await?;
                info!(path = %path.display(), "Scanner configuration initialized with defaults");
                config
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path: Some(path),
            current: RwLock::new(config),
        })
    }

    /// Like [`load_or_init`](Self::load_or_init) but falls back to defaults
    /// on any error. The offending file is left untouched.
    pub async fn load_or_default(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match Self::load_or_init(path.clone()).await {
            Ok(store) => store,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Scanner configuration unusable, running with defaults");
                Self {
                    path: Some(path),
                    current: RwLock::new(ScannerConfiguration::default()),
                }
            }
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Immutable snapshot of the current configuration.
    pub async fn get_config(&self) -> ScannerConfiguration {
        self.current.read().await.clone()
    }

    /// Validate, persist, then publish `config`.
    pub async fn set_config(&self, config: ScannerConfiguration) -> Result<(), ConfigError> {
        config.validate()?;
        let mut current = self.current.write().await;
        if let Some(path) = &self.path {
            persist(path, &config).await?;
        }
        *current = config;
        info!("Scanner configuration updated");
        Ok(())
    }

    /// Apply `f` to the live configuration without writing the file, for
    /// process-level overrides that must not replace the user's settings.
    pub async fn apply_override<F>(&self, f: F) -> Result<ScannerConfiguration, ConfigError>
    where
        F: FnOnce(&mut ScannerConfiguration),
    {
        let mut current = self.current.write().await;
        let mut next = current.clone();
        f(&mut next);
        next.validate()?;
        *current = next.clone();
        Ok(next)
    }
}

async fn persist(path: &Path, config: &ScannerConfiguration) -> Result<(), ConfigError> {
    let bytes = serde_json::to_vec_pretty(config)?;
    write_atomic(path, &bytes).await?;
    Ok(())
}
