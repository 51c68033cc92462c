//! Server binary lookup and permission handling.
//!
//! A platform-installed copy (shipped next to native libraries) is always
//! preferred: that location is mounted executable, while app-private storage
//! may not be.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name the server binary is installed and recognized under.
pub const SERVER_BINARY: &str = "nodpi_server";

/// File names accepted in the platform library directory, in priority order.
pub const NATIVE_CANDIDATES: [&str; 3] = ["libnodpi_server.so", "nodpi_server.so", "nodpi_server"];

/// First existing candidate in `native_dir`, if any.
pub fn find_native_binary(native_dir: &Path) -> Option<PathBuf> {
    NATIVE_CANDIDATES
        .iter()
        .map(|name| native_dir.join(name))
        .find(|path| path.is_file())
}

/// Set mode `0755` on `path`.
#[cfg(unix)]
pub fn make_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
pub fn make_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Best-effort [`make_executable`]; read-only library dirs are expected.
pub fn ensure_executable(path: &Path) {
    if let Err(e) = make_executable(path) {
        debug!(path = %path.display(), error = %e, "Could not chmod server binary");
    }
}

/// One-line description of a binary for the launch log.
pub fn describe(path: &Path) -> String {
    let meta = fs::metadata(path).ok();
    let size = meta.as_ref().map_or(0, fs::Metadata::len);
    format!(
        "exec: {} exists={} canExec={} size={}",
        path.display(),
        meta.is_some(),
        meta.as_ref().is_some_and(is_executable),
        size
    )
}

#[cfg(unix)]
fn is_executable(meta: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;

    meta.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(meta: &fs::Metadata) -> bool {
    meta.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_find_native_binary_priority() {
        let temp_dir = TempDir::new().unwrap();
        assert_eq!(find_native_binary(temp_dir.path()), None);

        fs::write(temp_dir.path().join("nodpi_server"), b"bin").unwrap();
        assert_eq!(
            find_native_binary(temp_dir.path()),
            Some(temp_dir.path().join("nodpi_server"))
        );

        fs::write(temp_dir.path().join("libnodpi_server.so"), b"bin").unwrap();
        assert_eq!(
            find_native_binary(temp_dir.path()),
            Some(temp_dir.path().join("libnodpi_server.so"))
        );
    }

    #[test]
    fn test_directory_is_not_a_binary() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir(temp_dir.path().join("nodpi_server")).unwrap();
        assert_eq!(find_native_binary(temp_dir.path()), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_make_executable_sets_0755() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nodpi_server");
        fs::write(&path, b"bin").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o600)).unwrap();

        make_executable(&path).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
        assert!(describe(&path).contains("canExec=true"));
    }

    #[test]
    fn test_describe_missing() {
        let line = describe(Path::new("/nonexistent/nodpi_server"));
        assert!(line.contains("exists=false"));
        assert!(line.ends_with("size=0"));
    }
}
