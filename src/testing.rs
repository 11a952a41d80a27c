//! Test doubles for probes, SSH connections and initializers
//!
//! Scripted stand-ins let the loops run under paused tokio time without
//! sockets or remote hosts.

use crate::initializer::OsInitializer;
use crate::ssh::{Capture, CommandChannel, DialTarget, RemoteSession, SshDialer};
use crate::transport::{EchoProber, ProbeConnector};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use fleetwatch_shared::{DialError, SessionError};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Prober that replies according to a per-round script.
///
/// Round `n` uses `script[n]`; past the end the last entry repeats. A missing
/// reply waits out the full timeout like a real unanswered echo.
pub struct ScriptedProber {
    target: Ipv4Addr,
    script: Vec<bool>,
}

impl ScriptedProber {
    pub fn new(target: Ipv4Addr, script: Vec<bool>) -> Self {
        Self { target, script }
    }
}

#[async_trait]
impl EchoProber for ScriptedProber {
    async fn echo(&mut self, sequence: u16, timeout: Duration) -> Result<Duration> {
        let index = (sequence as usize).min(self.script.len().saturating_sub(1));
        let reachable = self.script.get(index).copied().unwrap_or(false);

        if reachable {
            Ok(Duration::from_millis(2))
        } else {
            tokio::time::sleep(timeout).await;
            Err(anyhow!("request timeout for icmp_seq {}", sequence))
        }
    }

    fn target(&self) -> Ipv4Addr {
        self.target
    }
}

/// Connector handing out scripted probers
pub struct ScriptedConnector {
    script: Vec<bool>,
    opened: AtomicUsize,
}

impl ScriptedConnector {
    pub fn new(script: Vec<bool>) -> Self {
        Self {
            script,
            opened: AtomicUsize::new(0),
        }
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProbeConnector for ScriptedConnector {
    async fn open(&self, target: Ipv4Addr) -> Result<Box<dyn EchoProber>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedProber::new(target, self.script.clone())))
    }

    fn name(&self) -> &'static str {
        "Scripted"
    }
}

/// Connection that is already closed: every channel open fails
pub struct ClosedChannel;

#[async_trait]
impl CommandChannel for ClosedChannel {
    async fn exec(&self, _command: &str, _capture: Capture) -> Result<Vec<u8>, SessionError> {
        Err(SessionError::ChannelOpen("connection closed".into()))
    }
}

enum Reply {
    Output { stdout: String, stderr: String },
    Exit(u32),
}

/// Connection answering from a fixed command table
#[derive(Default)]
pub struct ScriptedChannel {
    replies: HashMap<String, Reply>,
    opened: AtomicUsize,
    released: AtomicUsize,
}

impl ScriptedChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output(mut self, command: &str, stdout: &str, stderr: &str) -> Self {
        self.replies.insert(
            command.to_string(),
            Reply::Output {
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
            },
        );
        self
    }

    pub fn with_failure(mut self, command: &str, exit_status: u32) -> Self {
        self.replies.insert(command.to_string(), Reply::Exit(exit_status));
        self
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommandChannel for ScriptedChannel {
    async fn exec(&self, command: &str, capture: Capture) -> Result<Vec<u8>, SessionError> {
        self.opened.fetch_add(1, Ordering::SeqCst);

        let result = match self.replies.get(command) {
            Some(Reply::Output { stdout, stderr }) => {
                let mut data = stdout.clone().into_bytes();
                if capture == Capture::Combined {
                    data.extend_from_slice(stderr.as_bytes());
                }
                Ok(data)
            }
            Some(Reply::Exit(status)) => Err(SessionError::ExitStatus(*status)),
            None => Err(SessionError::ExitStatus(127)),
        };

        self.released.fetch_add(1, Ordering::SeqCst);
        result
    }
}

/// Dialer returning a preset outcome and recording every target
pub struct ScriptedDialer {
    channel: Option<Arc<dyn CommandChannel>>,
    targets: Mutex<Vec<DialTarget>>,
}

impl ScriptedDialer {
    /// Every dial succeeds with `channel`
    pub fn connecting(channel: Arc<dyn CommandChannel>) -> Self {
        Self {
            channel: Some(channel),
            targets: Mutex::new(Vec::new()),
        }
    }

    /// Every dial is refused
    pub fn refusing() -> Self {
        Self {
            channel: None,
            targets: Mutex::new(Vec::new()),
        }
    }

    pub fn targets(&self) -> Vec<DialTarget> {
        self.targets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl SshDialer for ScriptedDialer {
    async fn dial(&self, target: &DialTarget) -> Result<Arc<dyn CommandChannel>, DialError> {
        self.targets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(target.clone());

        match &self.channel {
            Some(channel) => Ok(channel.clone()),
            None => Err(DialError::Connect {
                addr: target.address(),
                reason: "connection refused".into(),
            }),
        }
    }
}

/// Initializer that counts invocations and optionally fails
#[derive(Clone)]
pub struct CountingInitializer {
    calls: Arc<AtomicUsize>,
    failure: Option<String>,
}

impl CountingInitializer {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            failure: None,
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            failure: Some(message.to_string()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OsInitializer for CountingInitializer {
    async fn initialize(&self, _session: &RemoteSession) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.failure {
            Some(message) => Err(anyhow!("{}", message)),
            None => Ok(()),
        }
    }
}
