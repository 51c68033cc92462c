//! The proxy's domain blacklist file.

use std::fs;
use std::path::PathBuf;
use tracing::warn;

use crate::config::{ConfigStore, ProxyConfig};
use crate::error::{Error, Result};
use crate::installer::AssetInstaller;

/// Reads and writes the blacklist file named by [`ProxyConfig`].
#[derive(Debug, Clone)]
pub struct BlacklistStore {
    config_store: ConfigStore,
    installer: AssetInstaller,
}

impl BlacklistStore {
    pub fn new(config_store: ConfigStore, installer: AssetInstaller) -> Self {
        Self {
            config_store,
            installer,
        }
    }

    /// Absolute location of the configured blacklist.
    pub fn path(&self, config: &ProxyConfig) -> PathBuf {
        self.config_store.resolve_path(&config.blacklist_file)
    }

    /// Current blacklist contents.
    ///
    /// The packaged default is installed first if the file does not exist,
    /// and returned instead of a blank file.
    pub fn load(&self, config: &ProxyConfig) -> String {
        let path = self.path(config);
        if let Err(e) = self.installer.ensure_default_blacklist(&path) {
            warn!(path = %path.display(), error = %e, "Failed to install default blacklist");
        }

        match fs::read_to_string(&path) {
            Ok(text) if !text.trim().is_empty() => text,
            _ => self.installer.load_default_blacklist(),
        }
    }

    /// Replace the blacklist contents.
    ///
    /// # Errors
    ///
    /// Returns an error if the file or its directory cannot be written.
    pub fn save(&self, config: &ProxyConfig, contents: &str) -> Result<()> {
        let path = self.path(config);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::io(format!("creating {}", parent.display()), e))?;
        }
        fs::write(&path, contents).map_err(|e| Error::io(format!("writing {}", path.display()), e))
    }
}
