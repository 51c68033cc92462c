//! Run the proxy server in the foreground with a live log view.
//!
//! The screen shows the tail of the log buffer and the latest status
//! update. It is redrawn on every log change and every status tick, and the
//! server is stopped on Ctrl-C or when it exits on its own.

use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::io::Stdout;
use std::sync::Arc;
use std::time::Duration;

use nodpi_supervisor::log_buffer::LogBuffer;
use nodpi_supervisor::monitor::{DEFAULT_INTERVAL, Status, StatusMonitor, TrafficSampler};
use nodpi_supervisor::paths::Layout;
use nodpi_supervisor::service::ServiceController;
use nodpi_supervisor::supervisor::Supervisor;
use nodpi_supervisor::ui::{LiveView, print_error_box};

/// How often to check whether the server is still alive.
const EXIT_CHECK: Duration = Duration::from_millis(500);

/// Shared screen state: the view, the log it shows and the last status lines.
struct Screen {
    view: Mutex<LiveView<Stdout>>,
    logs: LogBuffer,
    status: Mutex<Vec<String>>,
}

impl Screen {
    /// Redraw from the buffer's current contents.
    ///
    /// Snapshots from concurrent writers can arrive out of order, so the
    /// lines are read under the view lock instead of taken from the caller.
    fn draw(&self) {
        let mut view = self.view.lock();
        let lines = self.logs.lines();
        let status = self.status.lock().clone();
        if let Err(e) = view.render(&lines, &status) {
            tracing::debug!(error = %e, "Failed to draw live view");
        }
    }
}

/// Start the server and follow it until Ctrl-C.
pub async fn execute(layout: Layout, lines: usize) -> Result<()> {
    let logs = LogBuffer::new();
    let supervisor = Arc::new(Supervisor::new(layout, logs.clone()));
    let service = ServiceController::new(Arc::clone(&supervisor));

    let screen = Arc::new(Screen {
        view: Mutex::new(LiveView::stdout(lines)),
        logs: logs.clone(),
        status: Mutex::new(Vec::new()),
    });

    let subscription = {
        let screen = Arc::clone(&screen);
        logs.subscribe(move |_| screen.draw())
    };

    let starter = service.clone();
    let result = tokio::task::spawn_blocking(move || starter.start())
        .await
        .context("Start task failed")?;
    if !result.success {
        logs.unsubscribe(subscription);
        print_error_box("Start failed", Some(&result.message));
        anyhow::bail!("Failed to start server");
    }

    let spawned = {
        let screen = Arc::clone(&screen);
        StatusMonitor::spawn(
            service.clone(),
            TrafficSampler::new(),
            DEFAULT_INTERVAL,
            move |status: Status| {
                *screen.status.lock() = vec![status.headline(), status.traffic_line()];
                screen.draw();
            },
        )
    };
    let monitor = match spawned {
        Ok(monitor) => monitor,
        Err(e) => {
            tokio::task::block_in_place(|| service.stop());
            logs.unsubscribe(subscription);
            return Err(e).context("Failed to start status monitor");
        },
    };

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                tracing::warn!(error = %e, "Failed to listen for Ctrl-C, stopping");
            }
        },
        () = wait_for_exit(&supervisor) => {},
    }

    let stopper = service.clone();
    let result = tokio::task::spawn_blocking(move || {
        monitor.join();
        stopper.stop()
    })
    .await
    .context("Stop task failed")?;

    logs.unsubscribe(subscription);
    println!("\n{}", result.message);
    Ok(())
}

async fn wait_for_exit(supervisor: &Supervisor) {
    while supervisor.is_running() {
        tokio::time::sleep(EXIT_CHECK).await;
    }
}
