//! OS process table access used for stale-process detection.
//!
//! [`ProcessTable`] is the seam between supervision logic and the host OS.
//! [`SystemProcessTable`] queries the real table with sysinfo and signals
//! through nix on unix.

use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind};

use crate::error::Result;
#[cfg(not(unix))]
use crate::error::Error;

/// What the process table knows about one PID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
    /// Arguments joined by spaces; the process name if arguments are hidden.
    pub command_line: String,
    /// Start time in seconds since the Unix epoch.
    pub start_time: u64,
}

impl ProcessInfo {
    /// Whether this process was launched from a binary named like `binary_name`.
    pub fn runs_binary(&self, binary_name: &str) -> bool {
        self.command_line.contains(binary_name)
    }
}

pub trait ProcessTable: Send + Sync {
    /// Look up a live process. `None` if no such process exists.
    fn inspect(&self, pid: u32) -> Option<ProcessInfo>;

    /// Forcefully terminate `pid`.
    fn kill(&self, pid: u32) -> Result<()>;
}

/// The host's process table.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProcessTable;

impl ProcessTable for SystemProcessTable {
    fn inspect(&self, pid: u32) -> Option<ProcessInfo> {
        let mut system = System::new();
        let target = Pid::from_u32(pid);
        // Command lines are not part of the default refresh
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[target]),
            true,
            ProcessRefreshKind::nothing().with_cmd(UpdateKind::Always),
        );

        let process = system.process(target)?;
        let args: Vec<String> = process
            .cmd()
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        let command_line = if args.is_empty() {
            process.name().to_string_lossy().into_owned()
        } else {
            args.join(" ")
        };

        Some(ProcessInfo {
            pid,
            command_line,
            start_time: process.start_time(),
        })
    }

    #[cfg(unix)]
    fn kill(&self, pid: u32) -> Result<()> {
        use nix::sys::signal::{Signal, kill};
        use nix::unistd::Pid as NixPid;

        let raw = i32::try_from(pid).map_err(|_| crate::error::Error::Signal {
            pid,
            reason: "pid out of range".to_string(),
        })?;
        kill(NixPid::from_raw(raw), Signal::SIGKILL).map_err(|errno| {
            crate::error::Error::Signal {
                pid,
                reason: errno.desc().to_string(),
            }
        })
    }

    #[cfg(not(unix))]
    fn kill(&self, pid: u32) -> Result<()> {
        let mut system = System::new();
        let target = Pid::from_u32(pid);
        system.refresh_processes(ProcessesToUpdate::Some(&[target]), true);

        match system.process(target) {
            Some(process) if process.kill() => Ok(()),
            Some(_) => Err(Error::Signal {
                pid,
                reason: "kill refused".to_string(),
            }),
            None => Err(Error::Signal {
                pid,
                reason: "no such process".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inspect_current_process() {
        let own = std::process::id();
        let info = SystemProcessTable.inspect(own).expect("own process is listed");
        assert_eq!(info.pid, own);
        assert!(!info.command_line.is_empty());
    }

    #[test]
    fn test_inspect_nonexistent_process() {
        // Very high PID unlikely to exist
        assert!(SystemProcessTable.inspect(u32::MAX - 1).is_none());
    }

    #[test]
    fn test_runs_binary() {
        let info = ProcessInfo {
            pid: 10,
            command_line: "/data/app/lib/arm64/libnodpi_server.so --host 0.0.0.0".to_string(),
            start_time: 0,
        };
        assert!(info.runs_binary("nodpi_server"));
        assert!(!info.runs_binary("sshd"));
    }
}
