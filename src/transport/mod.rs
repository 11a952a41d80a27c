//! Probe transports and address resolution for the liveness monitor

pub mod icmp;
pub mod resolve;
pub mod traits;

pub use icmp::IcmpConnector;
pub use resolve::resolve_ipv4;
pub use traits::{EchoProber, ProbeConnector};
