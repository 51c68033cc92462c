//! Server start, stop and termination.

use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::{ActionResult, StopOutcome, Supervisor, Tracked, binary, capture};
use crate::config::ProxyConfig;
use crate::error::{Error, Result};

/// How often `stop` polls the child during the grace period.
const EXIT_POLL: Duration = Duration::from_millis(50);

impl Supervisor {
    /// Start the server. Succeeds immediately if one is already running.
    pub fn start(&self, config: &ProxyConfig) -> ActionResult {
        if self.is_running() {
            return ActionResult::ok("Server already running");
        }

        self.reap_stale();
        let args = self.args_for(config);
        let native = binary::find_native_binary(self.layout.native_dir());

        let primary = match &native {
            Some(path) => path.clone(),
            None => match self.installer.ensure_server_binary() {
                Ok(path) => path,
                Err(e) => {
                    warn!(error = %e, "No server binary available");
                    self.logs.append(&format!("[warn] {e}"));
                    return ActionResult::failed(format!("Start failed: {e}"));
                },
            },
        };

        match self.launch(&primary, &args) {
            Ok(()) => ActionResult::ok("Server started"),
            Err(e) if e.is_permission_denied() => self.retry_alternate(&primary, native, &args),
            Err(e) => {
                warn!(binary = %primary.display(), error = %e, "Server launch failed");
                self.logs.append(&format!("[warn] start failed: {e}"));
                ActionResult::failed(format!("Start failed: {e}"))
            },
        }
    }

    /// Stop the server. Always reports success.
    pub fn stop(&self) -> ActionResult {
        self.shutdown().into()
    }

    /// Stop the server and report how it ended.
    ///
    /// Sends a graceful termination request, waits up to the stop timeout,
    /// then kills. The tracked handle and PID record are cleared in every
    /// case.
    pub fn shutdown(&self) -> StopOutcome {
        let tracked = self.current.lock().take();
        let Some(tracked) = tracked else {
            self.pids.clear();
            return StopOutcome::NotRunning;
        };

        let outcome = if tracked.alive.load(Ordering::Acquire) {
            info!(pid = tracked.pid, binary = %tracked.binary.display(), "Stopping server");
            terminate(&tracked.child, tracked.pid, self.stop_timeout)
        } else {
            StopOutcome::NotRunning
        };
        self.pids.clear();

        if let StopOutcome::Uncertain(reason) = &outcome {
            warn!(pid = tracked.pid, reason = %reason, "Server may still be running");
            self.logs
                .append(&format!("[warn] stop of pid {} unconfirmed: {reason}", tracked.pid));
        } else {
            // The watcher sees the exit within one poll and logs it
            if let Some(watcher) = tracked.watcher
                && watcher.join().is_err()
            {
                warn!(pid = tracked.pid, "Exit watcher panicked");
            }
        }
        // Readers finish on their own once every holder of the pipes exits
        drop(tracked.readers);

        outcome
    }

    fn retry_alternate(
        &self,
        primary: &Path,
        native: Option<PathBuf>,
        args: &[String],
    ) -> ActionResult {
        warn!(binary = %primary.display(), "Permission denied launching server");
        self.logs
            .append(&format!("[warn] permission denied: {}", primary.display()));

        let alternate = if native.as_deref() == Some(primary) {
            self.installer.ensure_server_binary().ok()
        } else {
            native
        };

        let last_error = match alternate {
            Some(path) if path != primary => {
                self.logs
                    .append(&format!("[info] retrying with {}", path.display()));
                match self.launch(&path, args) {
                    Ok(()) => return ActionResult::ok("Server started"),
                    Err(e) => e.to_string(),
                }
            },
            _ => format!("permission denied executing {}", primary.display()),
        };

        ActionResult::failed(format!(
            "Start failed: {last_error}. The storage holding the server binary is \
             likely mounted noexec. Install it as {} in the platform library directory \
             ({}) so the OS places it on an executable mount, then start again.",
            binary::NATIVE_CANDIDATES[0],
            self.layout.native_dir().display()
        ))
    }

    fn launch(&self, binary_path: &Path, args: &[String]) -> Result<()> {
        binary::ensure_executable(binary_path);
        self.logs
            .append(&format!("[info] {}", binary::describe(binary_path)));

        let root = self.layout.root();
        fs::create_dir_all(root)
            .map_err(|e| Error::io(format!("creating {}", root.display()), e))?;

        let mut child = Command::new(binary_path)
            .args(args)
            .current_dir(root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::launch(binary_path, e))?;

        let pid = child.id();
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.extend(capture::spawn_reader(stdout, "stdout", self.logs.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.extend(capture::spawn_reader(stderr, "stderr", self.logs.clone()));
        }

        match self.pids.write(pid) {
            Ok(()) => self.logs.append(&format!("[info] pid: {pid}")),
            Err(e) => {
                warn!(pid, error = %e, "Failed to persist server pid");
                self.logs.append("[warn] pid: unknown (record not saved)");
            },
        }

        let child = Arc::new(Mutex::new(child));
        let alive = Arc::new(AtomicBool::new(true));
        let watcher = capture::spawn_exit_watcher(
            Arc::clone(&child),
            pid,
            Arc::clone(&alive),
            self.pids.clone(),
            self.logs.clone(),
        );

        *self.current.lock() = Some(Tracked {
            child,
            pid,
            binary: binary_path.to_path_buf(),
            alive,
            readers,
            watcher,
        });

        info!(pid, binary = %binary_path.display(), "Server started");
        self.logs
            .append(&format!("[info] started: {}", binary_path.display()));
        Ok(())
    }
}

/// Request termination, wait up to `timeout`, then kill.
fn terminate(child: &Mutex<Child>, pid: u32, timeout: Duration) -> StopOutcome {
    {
        // Holding the lock keeps the watcher from reaping the pid mid-signal
        let mut guard = child.lock();
        match guard.try_wait() {
            Ok(Some(_)) => return StopOutcome::Graceful,
            Ok(None) => {},
            Err(e) => return StopOutcome::Uncertain(e.to_string()),
        }
        if let Err(e) = request_termination(&mut guard, pid) {
            debug!(pid, error = %e, "Graceful termination request failed");
        }
    }

    let deadline = Instant::now() + timeout;
    loop {
        match child.lock().try_wait() {
            Ok(Some(_)) => return StopOutcome::Graceful,
            Ok(None) => {},
            Err(e) => return StopOutcome::Uncertain(e.to_string()),
        }
        if Instant::now() >= deadline {
            break;
        }
        thread::sleep(EXIT_POLL);
    }

    warn!(pid, "Server ignored termination request, killing");
    let mut child = child.lock();
    if let Err(e) = child.kill() {
        return StopOutcome::Uncertain(e.to_string());
    }
    match child.wait() {
        Ok(_) => StopOutcome::Forced,
        Err(e) => StopOutcome::Uncertain(e.to_string()),
    }
}

#[cfg(unix)]
fn request_termination(_child: &mut Child, pid: u32) -> Result<()> {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let raw = i32::try_from(pid).map_err(|_| Error::InvalidPid(pid.to_string()))?;
    kill(Pid::from_raw(raw), Signal::SIGTERM).map_err(|errno| Error::Signal {
        pid,
        reason: errno.desc().to_string(),
    })
}

#[cfg(not(unix))]
fn request_termination(child: &mut Child, pid: u32) -> Result<()> {
    // No graceful signal; the kill is the request
    child.kill().map_err(|e| Error::Signal {
        pid,
        reason: e.to_string(),
    })
}
