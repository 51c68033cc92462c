//! Shared helpers for supervisor integration tests.
//!
//! Tests install small `/bin/sh` scripts as the server binary in a
//! temporary native directory, so real processes are started, signalled and
//! reaped without needing the proxy itself.

#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tempfile::TempDir;

use nodpi_supervisor::log_buffer::LogBuffer;
use nodpi_supervisor::paths::Layout;
use nodpi_supervisor::supervisor::Supervisor;

/// Prints its arguments, exits cleanly on SIGTERM.
pub const WELL_BEHAVED: &str = r#"#!/bin/sh
trap 'echo "shutting down"; exit 0' TERM
echo "listening $*"
while :; do sleep 0.1; done
"#;

/// Ignores SIGTERM; only SIGKILL stops it.
pub const STUBBORN: &str = r#"#!/bin/sh
trap '' TERM
echo "ignoring term"
while :; do sleep 0.1; done
"#;

/// Exits on its own with status 3.
pub const CRASHING: &str = r#"#!/bin/sh
echo "fatal: bind failed"
exit 3
"#;

/// Runs briefly, then exits with status 3.
pub const LATE_CRASHING: &str = r#"#!/bin/sh
echo "serving"
sleep 0.5
echo "fatal: upstream lost"
exit 3
"#;

/// A temporary root with a scripted server in its native directory.
pub struct TestEnv {
    pub dir: TempDir,
    pub layout: Layout,
    pub logs: LogBuffer,
}

impl TestEnv {
    pub fn new(script: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let layout = Layout::new(dir.path().join("root")).with_native_dir(dir.path().join("lib"));
        install_script(&layout.native_dir().join("nodpi_server"), script);
        Self {
            dir,
            layout,
            logs: LogBuffer::new(),
        }
    }

    /// A root without any server binary.
    pub fn empty() -> Self {
        let dir = TempDir::new().unwrap();
        let layout = Layout::new(dir.path().join("root")).with_native_dir(dir.path().join("lib"));
        Self {
            dir,
            layout,
            logs: LogBuffer::new(),
        }
    }

    pub fn supervisor(&self) -> Supervisor {
        Supervisor::new(self.layout.clone(), self.logs.clone())
            .with_stop_timeout(Duration::from_millis(1500))
    }

    pub fn script_path(&self) -> PathBuf {
        self.layout.native_dir().join("nodpi_server")
    }
}

pub fn install_script(path: &Path, script: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, script).unwrap();
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}

/// Poll `condition` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    condition()
}

/// Whether `pid` still exists (signal 0).
pub fn pid_alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    kill(Pid::from_raw(pid as i32), None).is_ok()
}
