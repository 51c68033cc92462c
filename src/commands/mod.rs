//! CLI command implementations.
//!
//! - [`run`] - supervised server with a live log view
//! - [`server`] - stale-server stop, status, args and install
//! - [`config`] - configuration file access
//! - [`blacklist`] - blacklist file access

pub mod blacklist;
pub mod config;
pub mod run;
pub mod server;

use anyhow::Result;
use std::path::PathBuf;

use nodpi_supervisor::paths::{self, Layout};

/// Resolve the directory layout from the global CLI options.
pub fn layout(root: Option<PathBuf>, native_dir: Option<PathBuf>) -> Result<Layout> {
    let root = match root {
        Some(root) => root,
        None => paths::default_root()?,
    };
    let layout = Layout::new(root);
    Ok(match native_dir {
        Some(dir) => layout.with_native_dir(dir),
        None => layout,
    })
}
