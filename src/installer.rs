//! Materializes packaged assets onto disk.
//!
//! The asset store holds one server build per CPU family plus the default
//! domain blacklist:
//!
//! ```text
//! <assets>/servers/<arch>/nodpi_server
//! <assets>/blacklist.txt
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::supervisor::binary::{SERVER_BINARY, make_executable};

/// Packaged default blacklist, relative to the asset root.
pub const DEFAULT_BLACKLIST_ASSET: &str = "blacklist.txt";

/// Directory holding per-architecture server builds.
const SERVERS_DIR: &str = "servers";

/// Asset folders, keyed by `std::env::consts::ARCH`.
const ARCH_FOLDERS: [(&str, &str); 4] = [
    ("x86_64", "x86_64"),
    ("aarch64", "arm64-v8a"),
    ("arm", "armeabi-v7a"),
    ("x86", "x86"),
];

/// Source of an executable server binary.
pub trait BinaryInstaller: Send + Sync {
    /// Path of a server binary ready to run, installing it if needed.
    fn ensure_server_binary(&self) -> Result<PathBuf>;
}

/// Asset folder for a CPU architecture name.
pub fn arch_folder(arch: &str) -> Option<&'static str> {
    ARCH_FOLDERS
        .iter()
        .find(|(name, _)| *name == arch)
        .map(|(_, folder)| *folder)
}

/// Installer backed by an on-disk asset directory.
#[derive(Debug, Clone)]
pub struct AssetInstaller {
    assets_dir: PathBuf,
    exec_dir: PathBuf,
    arch: String,
}

impl AssetInstaller {
    pub fn new(assets_dir: impl Into<PathBuf>, exec_dir: impl Into<PathBuf>) -> Self {
        Self {
            assets_dir: assets_dir.into(),
            exec_dir: exec_dir.into(),
            arch: std::env::consts::ARCH.to_string(),
        }
    }

    /// Install builds for `arch` instead of the host CPU.
    #[must_use]
    pub fn with_arch(mut self, arch: impl Into<String>) -> Self {
        self.arch = arch.into();
        self
    }

    pub fn assets_dir(&self) -> &Path {
        &self.assets_dir
    }

    /// Where the installed server binary lives.
    pub fn target_path(&self) -> PathBuf {
        self.exec_dir.join(SERVER_BINARY)
    }

    /// Packaged server binary for the configured architecture.
    pub fn asset_path(&self) -> Result<PathBuf> {
        let folder = arch_folder(&self.arch).ok_or_else(|| Error::UnsupportedArchitecture {
            arch: self.arch.clone(),
            supported: ARCH_FOLDERS.iter().map(|(_, folder)| *folder).collect(),
        })?;
        Ok(self
            .assets_dir
            .join(SERVERS_DIR)
            .join(folder)
            .join(SERVER_BINARY))
    }

    /// Copy the packaged blacklist to `target` unless it already exists.
    ///
    /// A missing packaged blacklist is not an error.
    pub fn ensure_default_blacklist(&self, target: &Path) -> Result<()> {
        let source = self.assets_dir.join(DEFAULT_BLACKLIST_ASSET);
        if target.exists() || !source.is_file() {
            return Ok(());
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::io(format!("creating {}", parent.display()), e))?;
        }
        fs::copy(&source, target)
            .map_err(|e| Error::io(format!("copying {}", source.display()), e))?;
        debug!(target = %target.display(), "Installed default blacklist");
        Ok(())
    }

    /// Packaged default blacklist, or an empty string if there is none.
    pub fn load_default_blacklist(&self) -> String {
        fs::read_to_string(self.assets_dir.join(DEFAULT_BLACKLIST_ASSET)).unwrap_or_default()
    }
}

impl BinaryInstaller for AssetInstaller {
    fn ensure_server_binary(&self) -> Result<PathBuf> {
        let target = self.target_path();
        if target.exists() {
            return Ok(target);
        }

        let source = self.asset_path()?;
        if !source.is_file() {
            return Err(Error::MissingAsset {
                path: source,
                arch: self.arch.clone(),
            });
        }

        fs::create_dir_all(&self.exec_dir)
            .map_err(|e| Error::io(format!("creating {}", self.exec_dir.display()), e))?;
        install_atomically(&source, &target)
            .map_err(|e| Error::io(format!("installing {}", target.display()), e))?;

        info!(source = %source.display(), target = %target.display(), "Installed server binary");
        Ok(target)
    }
}

/// Copy `source` next to `target` and rename it into place.
fn install_atomically(source: &Path, target: &Path) -> io::Result<()> {
    let dir = target.parent().unwrap_or_else(|| Path::new("."));
    let mut staged = NamedTempFile::new_in(dir)?;
    let mut input = fs::File::open(source)?;
    io::copy(&mut input, staged.as_file_mut())?;
    staged.as_file().sync_all()?;

    staged.persist(target).map_err(|e| e.error)?;
    make_executable(target)
}
