//! Periodic status and traffic reporting.
//!
//! [`StatusMonitor`] runs one background thread that, every interval,
//! refreshes the service's running flag from the supervisor, samples host
//! network counters, and hands a [`Status`] to a callback. It never blocks
//! on the supervisor's start or stop.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use sysinfo::Networks;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::service::ServiceController;
use crate::utils::{format_bytes, format_rate};

/// Default time between status updates.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(2);

/// Host-wide network totals with rates since the previous sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrafficSummary {
    pub rx: u64,
    pub tx: u64,
    pub rx_rate: f64,
    pub tx_rate: f64,
}

impl fmt::Display for TrafficSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Traffic: RX {} ({}), TX {} ({})",
            format_bytes(self.rx),
            format_rate(self.rx_rate),
            format_bytes(self.tx),
            format_rate(self.tx_rate)
        )
    }
}

/// One status update.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Status {
    pub running: bool,
    pub endpoint: String,
    pub traffic: Option<TrafficSummary>,
}

impl Status {
    /// `Status: Running · host:port` or `Status: Stopped`.
    pub fn headline(&self) -> String {
        if self.running {
            format!("Status: Running · {}", self.endpoint)
        } else {
            "Status: Stopped".to_string()
        }
    }

    pub fn traffic_line(&self) -> String {
        match &self.traffic {
            Some(traffic) => traffic.to_string(),
            None => "Traffic: n/a".to_string(),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\n{}", self.headline(), self.traffic_line())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Counters {
    rx: u64,
    tx: u64,
}

/// Reads host network counters and derives transfer rates.
pub struct TrafficSampler {
    networks: Networks,
    previous: Option<(Counters, Instant)>,
}

impl Default for TrafficSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TrafficSampler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrafficSampler")
            .field("interfaces", &self.networks.list().len())
            .finish_non_exhaustive()
    }
}

impl TrafficSampler {
    pub fn new() -> Self {
        Self {
            networks: Networks::new_with_refreshed_list(),
            previous: None,
        }
    }

    /// Current totals, or `None` if the host exposes no interfaces.
    pub fn sample(&mut self) -> Option<TrafficSummary> {
        self.networks.refresh(true);
        let list = self.networks.list();
        if list.is_empty() {
            return None;
        }

        let counters = list.values().fold(Counters { rx: 0, tx: 0 }, |acc, data| Counters {
            rx: acc.rx.saturating_add(data.total_received()),
            tx: acc.tx.saturating_add(data.total_transmitted()),
        });
        Some(self.record(counters, Instant::now()))
    }

    fn record(&mut self, counters: Counters, at: Instant) -> TrafficSummary {
        let (rx_rate, tx_rate) = match self.previous {
            Some((prev, then)) => {
                let secs = at.saturating_duration_since(then).as_secs_f64();
                if secs > 0.0 {
                    (
                        rate(prev.rx, counters.rx, secs),
                        rate(prev.tx, counters.tx, secs),
                    )
                } else {
                    (0.0, 0.0)
                }
            },
            None => (0.0, 0.0),
        };
        self.previous = Some((counters, at));

        TrafficSummary {
            rx: counters.rx,
            tx: counters.tx,
            rx_rate,
            tx_rate,
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn rate(before: u64, after: u64, secs: f64) -> f64 {
    // Counters reset when an interface goes away
    after.saturating_sub(before) as f64 / secs
}

/// Handle to the background status thread.
#[derive(Debug)]
pub struct StatusMonitor {
    active: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl StatusMonitor {
    /// Start polling `service` every `interval`.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn spawn<F>(
        service: ServiceController,
        mut sampler: TrafficSampler,
        interval: Duration,
        on_update: F,
    ) -> Result<Self>
    where
        F: Fn(Status) + Send + 'static,
    {
        let active = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&active);

        let handle = thread::Builder::new()
            .name("nodpi-monitor".to_string())
            .spawn(move || {
                debug!(interval_ms = interval.as_millis(), "Status monitor started");
                while flag.load(Ordering::Acquire) {
                    let status = Status {
                        running: service.refresh(),
                        endpoint: service.supervisor().config_store().load().endpoint(),
                        traffic: sampler.sample(),
                    };
                    on_update(status);
                    thread::sleep(interval);
                }
                debug!("Status monitor stopped");
            })
            .map_err(|e| Error::io("spawning status monitor", e))?;

        Ok(Self {
            active,
            handle: Some(handle),
        })
    }

    /// Ask the thread to exit after its current sleep.
    pub fn stop(&self) {
        self.active.store(false, Ordering::Release);
    }

    /// Stop and wait for the thread to exit.
    pub fn join(mut self) {
        self.stop();
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            warn!("Status monitor thread panicked");
        }
    }
}

impl Drop for StatusMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}
