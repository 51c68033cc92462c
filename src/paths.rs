//! Path utilities for the supervisor's on-disk layout.
//!
//! Everything lives under a single root directory:
//!
//! # Base Directory
//! - [`default_root`] - `$NODPI_HOME` or `<data dir>/nodpi/`
//!
//! # Derived Files
//! - [`Layout::config_path`] - `<root>/config/nodpi.toml` (proxy settings)
//! - [`Layout::pid_path`] - `<root>/var/nodpi.pid` (last known server PID)
//!
//! # Binary Locations
//! - [`Layout::native_dir`] - `<root>/lib/` (platform-installed binaries)
//! - [`Layout::exec_dir`] - `<root>/bin/` (binaries extracted on demand)
//! - [`Layout::assets_dir`] - `<root>/assets/` (packaged asset store)

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Environment variable overriding the root directory.
pub const HOME_ENV: &str = "NODPI_HOME";

/// Get the default root directory.
///
/// Resolution order:
/// 1. `NODPI_HOME` environment variable (if set and non-empty)
/// 2. `<platform data dir>/nodpi/`
/// 3. `./.nodpi/` when the platform has no data directory
pub fn default_root() -> Result<PathBuf> {
    if let Ok(home) = std::env::var(HOME_ENV)
        && !home.is_empty()
    {
        return Ok(PathBuf::from(home));
    }

    if let Some(data) = dirs::data_dir() {
        return Ok(data.join("nodpi"));
    }

    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    Ok(cwd.join(".nodpi"))
}

/// Resolved directory layout rooted at one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    root: PathBuf,
    native_dir: PathBuf,
}

impl Layout {
    /// Layout with every location derived from `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let native_dir = root.join("lib");
        Self { root, native_dir }
    }

    /// Override where platform-installed binaries are looked up.
    #[must_use]
    pub fn with_native_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.native_dir = dir.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join("config").join("nodpi.toml")
    }

    pub fn pid_path(&self) -> PathBuf {
        self.root.join("var").join("nodpi.pid")
    }

    pub fn native_dir(&self) -> &Path {
        &self.native_dir
    }

    pub fn exec_dir(&self) -> PathBuf {
        self.root.join("bin")
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.root.join("assets")
    }
}
