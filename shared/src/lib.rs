//! Fleetwatch Shared Types
//!
//! This crate provides the device model, the liveness state machine and the
//! error types shared between the monitoring daemon and status consumers.

pub mod device;
pub mod error;
pub mod state_machine;

pub use device::{
    Device, DeviceInfo, LogEntry, LogLevel, LogSink, RecordingSink, SshInfo, TracingSink,
    OS_FAMILY_KEY,
};
pub use error::{DialError, ResolveError, SessionError};
pub use state_machine::{Liveness, LivenessTracker, ProbeEvent, Transition};

/// Liveness parameters for ICMP monitoring
pub mod liveness {
    /// Round-trip timeout for a single echo request, also the probe round length
    pub const RTT_TIMEOUT_MS: u64 = 5000;

    /// Silence threshold - device is offline if no reply arrived for this long
    pub const SILENCE_THRESHOLD_MS: u64 = 10000;
}

/// SSH connection parameters
pub mod ssh {
    /// Port used for every dial
    pub const DEFAULT_PORT: u16 = 22;

    /// Upper bound on TCP connect plus handshake and authentication
    pub const DIAL_TIMEOUT_MS: u64 = 10000;
}

