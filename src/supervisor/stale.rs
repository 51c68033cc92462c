//! Reaping of servers left running by a previous supervisor.

use tracing::{info, warn};

use super::pid_store::PidStore;
use super::process_table::ProcessTable;
use crate::log_buffer::LogBuffer;

/// What happened to a persisted PID record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaleOutcome {
    /// There was no record.
    NoRecord,
    /// The record could not be parsed and was discarded.
    Invalid(String),
    /// The record named 0, 1 or this process and was discarded.
    SelfReferential(u32),
    /// Nothing runs under the recorded PID any more.
    Gone(u32),
    /// The PID now belongs to an unrelated program; it was left alone.
    Unrelated(u32),
    /// The stale server was killed.
    Killed(u32),
    /// The stale server was identified but the kill failed.
    KillFailed { pid: u32, reason: String },
}

/// Inspect the PID record and kill a stale server it points at.
///
/// The record is always discarded. A kill is only sent when the PID's
/// command line contains `binary_name`, so a PID reused by another program
/// is never signalled.
pub fn reap_stale(
    pids: &PidStore,
    table: &dyn ProcessTable,
    binary_name: &str,
    own_pid: u32,
    logs: &LogBuffer,
) -> StaleOutcome {
    let pid = match pids.read() {
        Ok(Some(pid)) => pid,
        Ok(None) => return StaleOutcome::NoRecord,
        Err(e) => {
            warn!(error = %e, "Discarding unreadable pid record");
            logs.append(&format!("[warn] discarding pid file: {e}"));
            pids.clear();
            return StaleOutcome::Invalid(e.to_string());
        },
    };

    let outcome = if pid <= 1 || pid == own_pid {
        warn!(pid, "Pid record points at this process");
        logs.append(&format!("[warn] pid file points to app pid: {pid}"));
        StaleOutcome::SelfReferential(pid)
    } else {
        match table.inspect(pid) {
            None => {
                info!(pid, "Stale server already gone");
                StaleOutcome::Gone(pid)
            },
            Some(process) if !process.runs_binary(binary_name) => {
                warn!(pid, command = %process.command_line, "Pid reused by another program");
                logs.append(&format!(
                    "[warn] pid {pid} is not {binary_name}; skipping kill"
                ));
                StaleOutcome::Unrelated(pid)
            },
            Some(_) => {
                logs.append(&format!("[info] found pid file: {pid}"));
                match table.kill(pid) {
                    Ok(()) => {
                        info!(pid, "Killed stale server");
                        logs.append(&format!("[info] killed pid {pid}"));
                        StaleOutcome::Killed(pid)
                    },
                    Err(e) => {
                        warn!(pid, error = %e, "Failed to kill stale server");
                        logs.append(&format!("[warn] kill failed for pid {pid}: {e}"));
                        StaleOutcome::KillFailed {
                            pid,
                            reason: e.to_string(),
                        }
                    },
                }
            },
        }
    };

    pids.clear();
    outcome
}
