//! Error types for supervision, installation and configuration.
//!
//! Library code returns [`Result`] over [`Error`]. The supervisor converts
//! every error into an [`ActionResult`](crate::supervisor::ActionResult)
//! before it reaches a caller, so these variants describe failures for logs
//! and messages rather than for control flow in the front-end.

use std::path::PathBuf;

/// Result type for library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Supervisor errors with structured context.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The host CPU has no matching packaged asset folder.
    #[error("unsupported architecture '{arch}'; supported asset folders: {}", .supported.join(", "))]
    UnsupportedArchitecture {
        arch: String,
        supported: Vec<&'static str>,
    },

    /// The packaged asset for this architecture is missing.
    #[error(
        "missing server binary asset: tried {path:?}; expected assets under servers/<arch>/nodpi_server for arch '{arch}'"
    )]
    MissingAsset { path: PathBuf, arch: String },

    /// The OS refused to execute the binary (typically a noexec mount).
    #[error("permission denied executing {binary:?}")]
    PermissionDenied { binary: PathBuf },

    /// Any other failure to exec the binary.
    #[error("failed to launch {binary:?}: {source}")]
    Launch {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// PID record holds something other than a usable process id.
    #[error("invalid pid: {0}")]
    InvalidPid(String),

    /// Delivering a signal to a process failed.
    #[error("failed to signal pid {pid}: {reason}")]
    Signal { pid: u32, reason: String },

    /// IO error with context.
    #[error("IO error in {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Create an IO error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Classify a spawn failure, separating permission errors from the rest.
    pub fn launch(binary: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let binary = binary.into();
        if source.kind() == std::io::ErrorKind::PermissionDenied {
            Self::PermissionDenied { binary }
        } else {
            Self::Launch { binary, source }
        }
    }

    /// True when the failure looks like a non-executable storage mount.
    pub fn is_permission_denied(&self) -> bool {
        match self {
            Self::PermissionDenied { .. } => true,
            Self::Launch { source, .. } | Self::Io { source, .. } => {
                source.kind() == std::io::ErrorKind::PermissionDenied
            },
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_launch_classifies_permission_denied() {
        let err = Error::launch(
            "/data/bin/nodpi_server",
            io::Error::from(io::ErrorKind::PermissionDenied),
        );
        assert!(matches!(err, Error::PermissionDenied { .. }));
        assert!(err.is_permission_denied());

        let err = Error::launch(
            "/data/bin/nodpi_server",
            io::Error::from(io::ErrorKind::NotFound),
        );
        assert!(matches!(err, Error::Launch { .. }));
        assert!(!err.is_permission_denied());
    }

    #[test]
    fn test_unsupported_architecture_message() {
        let err = Error::UnsupportedArchitecture {
            arch: "riscv64".to_string(),
            supported: vec!["x86_64", "arm64-v8a"],
        };
        assert_eq!(
            err.to_string(),
            "unsupported architecture 'riscv64'; supported asset folders: x86_64, arm64-v8a"
        );
    }
}
