//! Liveness Module
//!
//! Runs one ICMP echo loop per device and publishes the device's online
//! flag from the probe results.

mod monitor;

pub use monitor::{LivenessMonitor, MonitorConfig};
