//! Background tasks attached to a running server.
//!
//! Each server gets three OS threads:
//!
//! - two readers, one per output stream, that end when the stream closes or
//!   a read fails
//! - one exit watcher that ends when the process has exited
//!
//! None of them can fail the supervisor: read errors end the reader quietly,
//! and a thread that cannot be spawned is logged and skipped.

use parking_lot::Mutex;
use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::process::{Child, ExitStatus};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

use super::pid_store::PidStore;
use crate::log_buffer::LogBuffer;

/// How often the exit watcher polls the child.
pub const WATCH_INTERVAL: Duration = Duration::from_millis(100);

/// Spawn a thread forwarding every line of `stream` into `logs`.
pub fn spawn_reader<R>(stream: R, label: &'static str, logs: LogBuffer) -> Option<JoinHandle<()>>
where
    R: Read + Send + 'static,
{
    let spawned = thread::Builder::new()
        .name(format!("nodpi-{label}"))
        .spawn(move || drain(stream, label, &logs));

    match spawned {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!(stream = label, error = %e, "Failed to spawn output reader");
            None
        },
    }
}

fn drain<R: Read>(stream: R, label: &str, logs: &LogBuffer) {
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                if buf.last() == Some(&b'\n') {
                    buf.pop();
                }
                logs.append_raw(&String::from_utf8_lossy(&buf));
            },
            Err(e) if e.kind() == ErrorKind::Interrupted => {},
            Err(e) => {
                debug!(stream = label, error = %e, "Output reader stopped");
                break;
            },
        }
    }

    debug!(stream = label, "Output stream closed");
}

/// Spawn a thread that waits for `child` to exit.
///
/// On exit it clears `alive`, removes the PID record if it still names
/// `pid`, and logs the exit status.
pub fn spawn_exit_watcher(
    child: Arc<Mutex<Child>>,
    pid: u32,
    alive: Arc<AtomicBool>,
    pids: PidStore,
    logs: LogBuffer,
) -> Option<JoinHandle<()>> {
    let spawned = thread::Builder::new()
        .name("nodpi-exit".to_string())
        .spawn(move || {
            let Some(status) = wait_for_exit(&child) else {
                alive.store(false, Ordering::Release);
                return;
            };
            alive.store(false, Ordering::Release);
            pids.clear_if(pid);
            debug!(pid, %status, "Server exited");
            logs.append(&format!("[info] exited with {}", describe_exit(status)));
        });

    match spawned {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!(pid, error = %e, "Failed to spawn exit watcher");
            None
        },
    }
}

fn wait_for_exit(child: &Mutex<Child>) -> Option<ExitStatus> {
    loop {
        // Lock only for the non-blocking poll so stop() can reach the child
        match child.lock().try_wait() {
            Ok(Some(status)) => return Some(status),
            Ok(None) => {},
            Err(e) => {
                warn!(error = %e, "Failed to poll server status");
                return None;
            },
        }
        thread::sleep(WATCH_INTERVAL);
    }
}

/// `code N`. A process killed by signal S reports `code 128+S (signal S)`,
/// the status a shell would show.
pub fn describe_exit(status: ExitStatus) -> String {
    if let Some(code) = status.code() {
        return format!("code {code}");
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return format!("code {} (signal {signal})", 128 + signal);
        }
    }

    "code -1".to_string()
}
