//! File system paths for the mirror.

use crate::{CoreError, CoreResult};
use std::path::PathBuf;

const BASE_DIR_NAME: &str = ".trustline-mirror";

/// Manages file system paths for the mirror process.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Base directory for runtime files (~/.trustline-mirror)
    base_dir: PathBuf,
}

impl Paths {
    /// Paths rooted at `~/.trustline-mirror`.
    pub fn new() -> CoreResult<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| CoreError::Path("Could not determine home directory".to_string()))?;

        Ok(Self {
            base_dir: home.join(BASE_DIR_NAME),
        })
    }

    /// Paths rooted at a custom directory.
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// `config.json`
    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// SQLite file holding trust-line and purchase records.
    pub fn database_file(&self) -> PathBuf {
        self.base_dir.join("mirror.sqlite")
    }

    /// Control channel socket.
    pub fn socket_file(&self) -> PathBuf {
        self.base_dir.join("control.sock")
    }

    pub fn pid_file(&self) -> PathBuf {
        self.base_dir.join("mirror.pid")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    /// JSONL log written by the observability layer.
    pub fn log_file(&self) -> PathBuf {
        self.logs_dir().join("mirror.jsonl")
    }

    /// Ensure all required directories exist.
    pub fn ensure_dirs(&self) -> CoreResult<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        std::fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }
}
