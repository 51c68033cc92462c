//! One-shot server commands: stop, status, args, install.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use nodpi_supervisor::config::ConfigStore;
use nodpi_supervisor::installer::{AssetInstaller, BinaryInstaller};
use nodpi_supervisor::log_buffer::LogBuffer;
use nodpi_supervisor::paths::Layout;
use nodpi_supervisor::supervisor::binary::SERVER_BINARY;
use nodpi_supervisor::supervisor::{
    PidStore, ProcessTable, StaleOutcome, Supervisor, SystemProcessTable,
};
use nodpi_supervisor::ui::print_error_box;
use nodpi_supervisor::utils::format_duration;

/// Kill a server recorded in the PID file, with the same checks as start.
pub fn stop(layout: &Layout) -> Result<()> {
    let logs = LogBuffer::new();
    let supervisor = Supervisor::new(layout.clone(), logs.clone());

    let message = match supervisor.reap_stale() {
        StaleOutcome::NoRecord => "No server recorded".to_string(),
        StaleOutcome::Invalid(reason) => format!("Discarded unreadable pid record: {reason}"),
        StaleOutcome::SelfReferential(pid) => format!("Discarded pid record pointing at {pid}"),
        StaleOutcome::Gone(pid) => format!("Server {pid} was not running"),
        StaleOutcome::Unrelated(pid) => {
            format!("Pid {pid} belongs to another program; record discarded")
        },
        StaleOutcome::Killed(pid) => format!("Stopped server {pid}"),
        StaleOutcome::KillFailed { pid, reason } => {
            print_error_box(&format!("Failed to stop server {pid}"), Some(&reason));
            anyhow::bail!("Failed to stop server {pid}");
        },
    };

    println!("{message}");
    Ok(())
}

#[derive(Debug, Serialize)]
struct StatusReport {
    running: bool,
    pid: Option<u32>,
    command_line: Option<String>,
    started_at: Option<DateTime<Utc>>,
    endpoint: String,
    pid_file: String,
}

/// Report whether the PID record points at a live server.
pub fn status(layout: &Layout, json: bool) -> Result<()> {
    let pids = PidStore::new(layout.pid_path());
    let endpoint = ConfigStore::new(layout.root()).load().endpoint();

    let pid = pids.read().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Ignoring unreadable pid record");
        None
    });
    let process = pid
        .and_then(|pid| SystemProcessTable.inspect(pid))
        .filter(|info| info.runs_binary(SERVER_BINARY));

    let report = StatusReport {
        running: process.is_some(),
        pid: process.as_ref().map(|info| info.pid),
        command_line: process.as_ref().map(|info| info.command_line.clone()),
        started_at: process
            .as_ref()
            .and_then(|info| DateTime::from_timestamp(i64::try_from(info.start_time).ok()?, 0)),
        endpoint,
        pid_file: pids.path().display().to_string(),
    };

    if json {
        let text = serde_json::to_string_pretty(&report).context("Failed to serialize status")?;
        println!("{text}");
        return Ok(());
    }

    match (report.pid, report.started_at) {
        (Some(pid), started) => {
            println!("Status: Running · {}", report.endpoint);
            println!("  PID:     {pid}");
            if let Some(cmd) = &report.command_line {
                println!("  Command: {cmd}");
            }
            if let Some(started) = started {
                println!(
                    "  Started: {} ({} ago)",
                    started.format("%Y-%m-%d %H:%M:%S UTC"),
                    format_duration(Utc::now() - started)
                );
            }
        },
        (None, _) => {
            println!("Status: Stopped");
            if let Some(pid) = pid {
                println!("  Pid file names {pid}, which is not a running {SERVER_BINARY}");
            }
        },
    }
    Ok(())
}

/// Print the server argument vector for the current configuration.
pub fn args(layout: &Layout) -> Result<()> {
    let supervisor = Supervisor::new(layout.clone(), LogBuffer::new());
    let config = supervisor.config_store().load();
    println!("{}", supervisor.args_for(&config).join(" "));
    Ok(())
}

/// Install the server binary from the asset store.
pub fn install(layout: &Layout) -> Result<()> {
    let installer = AssetInstaller::new(layout.assets_dir(), layout.exec_dir());
    match installer.ensure_server_binary() {
        Ok(path) => {
            println!("{}", path.display());
            Ok(())
        },
        Err(e) => {
            print_error_box("Install failed", Some(&e.to_string()));
            Err(e).context("Failed to install server binary")
        },
    }
}
