//! Proxy configuration and its persisted store.
//!
//! This module provides:
//!
//! - [`ProxyConfig`] - settings that become the server's command line
//! - [`FragmentMethod`] / [`DomainMatching`] - enumerated server modes
//! - [`ConfigStore`] - TOML persistence under the root directory
//!
//! Loading never fails. A missing file is created with defaults, and any
//! field that is missing or malformed falls back to its default.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

use crate::error::{Error, Result};

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8881;
pub const DEFAULT_BLACKLIST_FILE: &str = "blacklist.txt";

/// How the server splits outbound traffic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FragmentMethod {
    #[default]
    Random,
    Sni,
}

impl FragmentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Random => "random",
            Self::Sni => "sni",
        }
    }
}

impl fmt::Display for FragmentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FragmentMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "random" => Ok(Self::Random),
            "sni" => Ok(Self::Sni),
            other => Err(Error::Config(format!(
                "unknown fragment method '{other}' (expected random or sni)"
            ))),
        }
    }
}

/// Strictness of blacklist domain comparison.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DomainMatching {
    #[default]
    Strict,
    Loose,
}

impl DomainMatching {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Loose => "loose",
        }
    }
}

impl fmt::Display for DomainMatching {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DomainMatching {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "loose" => Ok(Self::Loose),
            other => Err(Error::Config(format!(
                "unknown domain matching mode '{other}' (expected strict or loose)"
            ))),
        }
    }
}

/// Server settings persisted in `config/nodpi.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
    pub blacklist_file: String,
    pub fragment_method: FragmentMethod,
    pub domain_matching: DomainMatching,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_access_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_error_file: Option<String>,
    pub no_blacklist: bool,
    pub auto_blacklist: bool,
    pub quiet: bool,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            blacklist_file: DEFAULT_BLACKLIST_FILE.to_string(),
            fragment_method: FragmentMethod::default(),
            domain_matching: DomainMatching::default(),
            out_host: None,
            log_access_file: None,
            log_error_file: None,
            no_blacklist: false,
            auto_blacklist: false,
            quiet: false,
        }
    }
}

impl ProxyConfig {
    /// `host:port` as shown in status output.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Update one field by its TOML key.
    ///
    /// Optional string fields are cleared by a blank value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for unknown keys or values that don't parse.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match key {
            "host" => self.host = value.to_string(),
            "port" => {
                self.port = value
                    .parse()
                    .map_err(|_| Error::Config(format!("invalid port '{value}'")))?;
            },
            "blacklist_file" => self.blacklist_file = value.to_string(),
            "fragment_method" => self.fragment_method = value.parse()?,
            "domain_matching" => self.domain_matching = value.parse()?,
            "out_host" => self.out_host = non_blank(value),
            "log_access_file" => self.log_access_file = non_blank(value),
            "log_error_file" => self.log_error_file = non_blank(value),
            "no_blacklist" => self.no_blacklist = parse_flag(key, value)?,
            "auto_blacklist" => self.auto_blacklist = parse_flag(key, value)?,
            "quiet" => self.quiet = parse_flag(key, value)?,
            other => return Err(Error::Config(format!("unknown config key '{other}'"))),
        }
        Ok(())
    }

    /// Build a config from a parsed TOML table, defaulting field by field.
    fn from_table(table: &toml::Table) -> Self {
        let mut cfg = Self::default();

        for (key, value) in table {
            let raw = match value {
                toml::Value::String(s) => s.clone(),
                toml::Value::Integer(i) => i.to_string(),
                toml::Value::Boolean(b) => b.to_string(),
                other => {
                    warn!(key = %key, value = %other, "Ignoring config value of unexpected type");
                    continue;
                },
            };
            if let Err(e) = cfg.set(key, &raw) {
                warn!(key = %key, error = %e, "Ignoring malformed config value");
            }
        }

        cfg
    }
}

fn non_blank(value: &str) -> Option<String> {
    (!value.trim().is_empty()).then(|| value.trim().to_string())
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(Error::Config(format!(
            "invalid value '{value}' for {key} (expected true or false)"
        ))),
    }
}

/// Reads and writes [`ProxyConfig`] under a root directory.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    root: PathBuf,
    config_file: PathBuf,
}

impl ConfigStore {
    /// Store for `<root>/config/nodpi.toml`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let config_file = crate::paths::Layout::new(root.clone()).config_path();
        Self { root, config_file }
    }

    pub fn path(&self) -> &Path {
        &self.config_file
    }

    /// Load the configuration, creating the file with defaults if absent.
    pub fn load(&self) -> ProxyConfig {
        if !self.config_file.exists() {
            let cfg = ProxyConfig::default();
            if let Err(e) = self.save(&cfg) {
                warn!(error = %e, "Failed to write default config");
            }
            return cfg;
        }

        let content = match fs::read_to_string(&self.config_file) {
            Ok(content) => content,
            Err(e) => {
                warn!(
                    path = %self.config_file.display(),
                    error = %e,
                    "Failed to read config, using defaults"
                );
                return ProxyConfig::default();
            },
        };

        match content.parse::<toml::Table>() {
            Ok(table) => {
                debug!(path = %self.config_file.display(), "Loaded config");
                ProxyConfig::from_table(&table)
            },
            Err(e) => {
                warn!(
                    path = %self.config_file.display(),
                    error = %e,
                    "Failed to parse config, using defaults"
                );
                ProxyConfig::default()
            },
        }
    }

    /// Write the configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn save(&self, config: &ProxyConfig) -> Result<()> {
        if let Some(parent) = self.config_file.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::io(format!("creating {}", parent.display()), e))?;
        }
        let text = toml::to_string_pretty(config)
            .map_err(|e| Error::Config(format!("failed to serialize config: {e}")))?;
        fs::write(&self.config_file, text)
            .map_err(|e| Error::io(format!("writing {}", self.config_file.display()), e))
    }

    /// Resolve a configured path: relative paths live under the root.
    pub fn resolve_path(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}
