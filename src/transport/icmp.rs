//! ICMP echo backend
//!
//! Uses an unprivileged datagram ICMP socket where the kernel allows it and
//! falls back to a raw socket otherwise.

use crate::transport::traits::{EchoProber, ProbeConnector};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;
use surge_ping::{Client, Config, PingIdentifier, PingSequence, Pinger, ICMP};

/// Payload carried by every echo request
const PAYLOAD: [u8; 16] = *b"fleetwatch-probe";

/// Prober for one IPv4 target
pub struct IcmpProber {
    pinger: Pinger,
    target: Ipv4Addr,
}

#[async_trait]
impl EchoProber for IcmpProber {
    async fn echo(&mut self, sequence: u16, timeout: Duration) -> Result<Duration> {
        self.pinger.timeout(timeout);
        let (_packet, rtt) = self
            .pinger
            .ping(PingSequence(sequence), &PAYLOAD)
            .await
            .with_context(|| format!("echo {} to {}", sequence, self.target))?;
        Ok(rtt)
    }

    fn target(&self) -> Ipv4Addr {
        self.target
    }
}

/// Shares one ICMP socket between all per-device probers
pub struct IcmpConnector {
    client: Client,
    next_ident: AtomicU16,
}

impl IcmpConnector {
    /// Open the shared IPv4 ICMP socket
    pub fn new() -> Result<Self> {
        let config = Config::builder().kind(ICMP::V4).build();
        let client = Client::new(&config).context("open ICMP socket")?;

        Ok(Self {
            client,
            next_ident: AtomicU16::new(std::process::id() as u16),
        })
    }
}

#[async_trait]
impl ProbeConnector for IcmpConnector {
    async fn open(&self, target: Ipv4Addr) -> Result<Box<dyn EchoProber>> {
        // Distinct identifiers keep replies from different devices apart
        let ident = self.next_ident.fetch_add(1, Ordering::Relaxed);
        let pinger = self.client.pinger(IpAddr::V4(target), PingIdentifier(ident)).await;

        Ok(Box::new(IcmpProber { pinger, target }))
    }

    fn name(&self) -> &'static str {
        "ICMP"
    }
}
