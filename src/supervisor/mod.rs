//! Lifecycle management for the proxy server process.
//!
//! The [`Supervisor`] owns at most one server process. It resolves the
//! binary, launches it with arguments derived from [`ProxyConfig`], pipes
//! its output into the shared [`LogBuffer`], persists its PID so a later
//! supervisor can reap it, and terminates it gracefully then forcibly.
//!
//! Every public operation reports an [`ActionResult`]; errors never escape.
//!
//! ## Module Structure
//!
//! - [`args`]: server command-line construction
//! - [`binary`]: binary lookup and permissions
//! - [`capture`]: output readers and exit watcher threads
//! - `lifecycle`: start, stop and restart
//! - [`pid_store`]: persisted PID record
//! - [`process_table`]: OS process inspection and kill
//! - [`stale`]: reaping servers left by a previous run

pub mod args;
pub mod binary;
pub mod capture;
mod lifecycle;
pub mod pid_store;
pub mod process_table;
pub mod stale;

pub use args::build_args;
pub use pid_store::PidStore;
pub use process_table::{ProcessInfo, ProcessTable, SystemProcessTable};
pub use stale::StaleOutcome;

use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::process::{Child, ExitStatus};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::warn;

use crate::config::{ConfigStore, ProxyConfig};
use crate::installer::{AssetInstaller, BinaryInstaller};
use crate::log_buffer::LogBuffer;
use crate::paths::Layout;

/// Grace period between SIGTERM and SIGKILL.
pub const STOP_TIMEOUT: Duration = Duration::from_secs(2);

/// Outcome of a lifecycle action, shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionResult {
    pub success: bool,
    pub message: String,
}

impl ActionResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

impl fmt::Display for ActionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// How [`Supervisor::shutdown`] ended the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    /// No live server was tracked.
    NotRunning,
    /// The server exited within the grace period.
    Graceful,
    /// The server had to be killed.
    Forced,
    /// Killing failed; the server may still be running.
    Uncertain(String),
}

impl From<StopOutcome> for ActionResult {
    /// Stopping always succeeds from the caller's point of view.
    fn from(outcome: StopOutcome) -> Self {
        match outcome {
            StopOutcome::NotRunning | StopOutcome::Graceful => Self::ok("Server stopped"),
            StopOutcome::Forced => Self::ok("Server stopped (forced)"),
            StopOutcome::Uncertain(reason) => Self::ok(format!(
                "Server stop requested; termination unconfirmed: {reason}"
            )),
        }
    }
}

/// A launched server and its background tasks.
struct Tracked {
    child: Arc<Mutex<Child>>,
    pid: u32,
    binary: PathBuf,
    alive: Arc<AtomicBool>,
    readers: Vec<JoinHandle<()>>,
    watcher: Option<JoinHandle<()>>,
}

/// Supervises a single proxy server process.
pub struct Supervisor {
    layout: Layout,
    config_store: ConfigStore,
    installer: Box<dyn BinaryInstaller>,
    processes: Box<dyn ProcessTable>,
    pids: PidStore,
    logs: LogBuffer,
    binary_name: String,
    stop_timeout: Duration,
    current: Mutex<Option<Tracked>>,
}

impl fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Supervisor")
            .field("root", &self.layout.root())
            .field("binary_name", &self.binary_name)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl Supervisor {
    /// Supervisor using the asset store and process table of the host.
    pub fn new(layout: Layout, logs: LogBuffer) -> Self {
        let installer = AssetInstaller::new(layout.assets_dir(), layout.exec_dir());
        Self {
            config_store: ConfigStore::new(layout.root()),
            pids: PidStore::new(layout.pid_path()),
            installer: Box::new(installer),
            processes: Box::new(SystemProcessTable),
            logs,
            binary_name: binary::SERVER_BINARY.to_string(),
            stop_timeout: STOP_TIMEOUT,
            current: Mutex::new(None),
            layout,
        }
    }

    #[must_use]
    pub fn with_installer(mut self, installer: impl BinaryInstaller + 'static) -> Self {
        self.installer = Box::new(installer);
        self
    }

    #[must_use]
    pub fn with_process_table(mut self, table: impl ProcessTable + 'static) -> Self {
        self.processes = Box::new(table);
        self
    }

    #[must_use]
    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    pub fn config_store(&self) -> &ConfigStore {
        &self.config_store
    }

    pub fn pid_store(&self) -> &PidStore {
        &self.pids
    }

    pub fn logs(&self) -> &LogBuffer {
        &self.logs
    }

    /// Argument vector the server would be launched with.
    pub fn args_for(&self, config: &ProxyConfig) -> Vec<String> {
        build_args(config, &self.config_store)
    }

    /// True while a launched server is alive. Never waits on start/stop.
    pub fn is_running(&self) -> bool {
        self.live_pid().is_some()
    }

    /// PID of the tracked server, if one is alive.
    pub fn pid(&self) -> Option<u32> {
        self.live_pid()
    }

    fn live_pid(&self) -> Option<u32> {
        let (pid, status) = {
            let current = self.current.lock();
            let tracked = current.as_ref()?;
            if !tracked.alive.load(Ordering::Acquire) {
                return None;
            }
            match poll_unwatched(tracked) {
                Some(status) => (tracked.pid, status),
                None => return Some(tracked.pid),
            }
        };

        self.pids.clear_if(pid);
        self.logs
            .append(&format!("[info] exited with {}", capture::describe_exit(status)));
        None
    }

    /// Kill a server left running by a previous supervisor.
    pub fn reap_stale(&self) -> StaleOutcome {
        stale::reap_stale(
            &self.pids,
            self.processes.as_ref(),
            &self.binary_name,
            std::process::id(),
            &self.logs,
        )
    }

    /// Stop, then start. The server is briefly down in between.
    pub fn restart(&self, config: &ProxyConfig) -> ActionResult {
        self.stop();
        self.start(config)
    }
}

/// Exit status of a tracked server whose exit watcher never started.
///
/// Clears `alive` when the child has exited. Skips the poll while `stop`
/// holds the child.
fn poll_unwatched(tracked: &Tracked) -> Option<ExitStatus> {
    if tracked.watcher.is_some() {
        return None;
    }
    let mut child = tracked.child.try_lock()?;
    match child.try_wait() {
        Ok(Some(status)) => {
            tracked.alive.store(false, Ordering::Release);
            Some(status)
        },
        Ok(None) => None,
        Err(e) => {
            warn!(pid = tracked.pid, error = %e, "Failed to poll server status");
            None
        },
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::process::{Command, Stdio};
    use std::time::Instant;
    use tempfile::TempDir;

    /// Track `child` the way launch() does, minus the exit watcher.
    fn track_unwatched(supervisor: &Supervisor, child: Child) -> u32 {
        let pid = child.id();
        supervisor.pids.write(pid).unwrap();
        *supervisor.current.lock() = Some(Tracked {
            child: Arc::new(Mutex::new(child)),
            pid,
            binary: PathBuf::from("/bin/sh"),
            alive: Arc::new(AtomicBool::new(true)),
            readers: Vec::new(),
            watcher: None,
        });
        pid
    }

    #[test]
    fn test_exit_is_noticed_without_watcher() {
        let temp_dir = TempDir::new().unwrap();
        let supervisor = Supervisor::new(Layout::new(temp_dir.path()), LogBuffer::new());
        let child = Command::new("/bin/sh")
            .args(["-c", "exit 4"])
            .stdout(Stdio::null())
            .spawn()
            .unwrap();
        track_unwatched(&supervisor, child);

        let deadline = Instant::now() + Duration::from_secs(5);
        while supervisor.is_running() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(20));
        }

        assert!(!supervisor.is_running());
        assert_eq!(supervisor.pid(), None);
        assert_eq!(supervisor.pid_store().read().unwrap(), None);
        assert!(supervisor.logs().get().contains("[info] exited with code 4"));
    }

    #[test]
    fn test_unwatched_live_child_counts_as_running() {
        let temp_dir = TempDir::new().unwrap();
        let supervisor = Supervisor::new(Layout::new(temp_dir.path()), LogBuffer::new());
        let child = Command::new("sleep").arg("30").spawn().unwrap();
        let pid = track_unwatched(&supervisor, child);

        assert!(supervisor.is_running());
        assert_eq!(supervisor.pid(), Some(pid));
        assert_eq!(supervisor.shutdown(), StopOutcome::Graceful);
        assert!(!supervisor.is_running());
    }
}
