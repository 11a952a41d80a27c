//! Probe trait abstraction for pluggable reachability backends

use anyhow::Result;
use async_trait::async_trait;
use std::net::Ipv4Addr;
use std::time::Duration;

/// Sends echo requests to a single target
#[async_trait]
pub trait EchoProber: Send {
    /// Send one echo request and wait up to `timeout` for the reply.
    /// Returns the round-trip time on success.
    async fn echo(&mut self, sequence: u16, timeout: Duration) -> Result<Duration>;

    /// The address being probed
    fn target(&self) -> Ipv4Addr;
}

/// Factory for creating per-device probers
#[async_trait]
pub trait ProbeConnector: Send + Sync {
    /// Create a prober bound to `target`
    async fn open(&self, target: Ipv4Addr) -> Result<Box<dyn EchoProber>>;

    /// Human-readable name for this backend
    fn name(&self) -> &'static str;
}
