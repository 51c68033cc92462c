//! Foreground service facade over the supervisor.
//!
//! Front-ends call [`ServiceController`] instead of the [`Supervisor`]
//! directly: it loads the current configuration, records every action in
//! the log buffer, and tracks a `running` flag that can be read without
//! touching the supervisor.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{debug, info};

use crate::config::ConfigStore;
use crate::error::{Error, Result};
use crate::log_buffer::LogBuffer;
use crate::supervisor::{ActionResult, Supervisor};

/// A lifecycle action a front-end can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Start,
    Stop,
    Restart,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runs lifecycle actions with logging and a shared running flag.
#[derive(Debug, Clone)]
pub struct ServiceController {
    supervisor: Arc<Supervisor>,
    config_store: ConfigStore,
    logs: LogBuffer,
    running: Arc<AtomicBool>,
}

impl ServiceController {
    pub fn new(supervisor: Arc<Supervisor>) -> Self {
        Self {
            config_store: supervisor.config_store().clone(),
            logs: supervisor.logs().clone(),
            running: Arc::new(AtomicBool::new(false)),
            supervisor,
        }
    }

    pub fn supervisor(&self) -> &Arc<Supervisor> {
        &self.supervisor
    }

    /// Last known server state, set by each action and by [`refresh`](Self::refresh).
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Re-read the supervisor's state into the running flag.
    ///
    /// The status monitor calls this every tick, so a server that exits on
    /// its own shows as stopped within one interval.
    pub fn refresh(&self) -> bool {
        let running = self.supervisor.is_running();
        if self.running.swap(running, Ordering::AcqRel) && !running {
            debug!("Server no longer running");
        }
        running
    }

    pub fn start(&self) -> ActionResult {
        let config = self.config_store.load();
        let result = self.supervisor.start(&config);
        self.finish(Action::Start, result)
    }

    pub fn stop(&self) -> ActionResult {
        let result = self.supervisor.stop();
        self.finish(Action::Stop, result)
    }

    pub fn restart(&self) -> ActionResult {
        let config = self.config_store.load();
        let result = self.supervisor.restart(&config);
        self.finish(Action::Restart, result)
    }

    /// Run `action` on the calling thread.
    pub fn run(&self, action: Action) -> ActionResult {
        match action {
            Action::Start => self.start(),
            Action::Stop => self.stop(),
            Action::Restart => self.restart(),
        }
    }

    /// Run `action` on a background thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn dispatch(&self, action: Action) -> Result<JoinHandle<ActionResult>> {
        let controller = self.clone();
        thread::Builder::new()
            .name(format!("nodpi-{action}"))
            .spawn(move || controller.run(action))
            .map_err(|e| Error::io(format!("spawning {action} action"), e))
    }

    fn finish(&self, action: Action, result: ActionResult) -> ActionResult {
        let running = match action {
            Action::Stop => false,
            Action::Start | Action::Restart => result.success && self.supervisor.is_running(),
        };
        self.running.store(running, Ordering::Release);

        info!(%action, success = result.success, message = %result.message, "Service action finished");
        self.logs
            .append(&format!("[info] service {action}: {}", result.message));
        result
    }
}
