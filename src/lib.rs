//! Supervisor and live log view for the nodpi proxy server.
//!
//! The [`Supervisor`] starts, stops and restarts one server process, pipes
//! its output into a [`LogBuffer`] that understands the terminal control
//! sequences the server prints, and reaps servers left behind by a previous
//! run. Everything else in the crate feeds it or presents its state:
//!
//! - [`config`] - persisted proxy settings
//! - [`installer`] - server binary and default blacklist from packaged assets
//! - [`blacklist`] - the proxy's domain blacklist file
//! - [`service`] - front-end facade with action logging
//! - [`monitor`] - periodic status and traffic updates
//! - [`ui`] - error boxes and live terminal rendering

pub mod blacklist;
pub mod config;
pub mod error;
pub mod installer;
pub mod log_buffer;
pub mod monitor;
pub mod paths;
pub mod service;
pub mod supervisor;
pub mod ui;
pub mod utils;

pub use config::{ConfigStore, ProxyConfig};
pub use error::{Error, Result};
pub use log_buffer::LogBuffer;
pub use supervisor::{ActionResult, StopOutcome, Supervisor};
