//! SSH dialing and per-command channels

use crate::ssh::AuthMethod;
use async_trait::async_trait;
use fleetwatch_shared::{ssh, DialError, SessionError};
use russh::client::{self, Handle, Msg};
use russh::{Channel, ChannelMsg};
use russh_keys::key;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::debug;

/// SSH extended data stream number for stderr
const SSH_EXTENDED_DATA_STDERR: u32 = 1;

/// Which output streams a command captures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capture {
    /// stdout only
    Stdout,
    /// stdout and stderr, interleaved in arrival order
    Combined,
}

/// An authenticated connection able to run commands
#[async_trait]
pub trait CommandChannel: Send + Sync {
    /// Run `command` on a fresh channel and return its captured output.
    /// The channel is released before returning, whatever the outcome.
    async fn exec(&self, command: &str, capture: Capture) -> Result<Vec<u8>, SessionError>;
}

/// Everything needed for a single dial attempt
#[derive(Debug, Clone)]
pub struct DialTarget {
    pub host: String,
    pub port: u16,
    pub username: String,
    /// Tried in order until one succeeds
    pub methods: Vec<AuthMethod>,
}

impl DialTarget {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Establishes authenticated connections
#[async_trait]
pub trait SshDialer: Send + Sync {
    async fn dial(&self, target: &DialTarget) -> Result<Arc<dyn CommandChannel>, DialError>;
}

/// Configuration for SSH dialing
#[derive(Debug, Clone)]
pub struct SshConfig {
    /// Port used for every device
    pub port: u16,
    /// Limit for connect, handshake and authentication together
    pub dial_timeout: Duration,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            port: ssh::DEFAULT_PORT,
            dial_timeout: Duration::from_millis(ssh::DIAL_TIMEOUT_MS),
        }
    }
}

/// Client handler that accepts any host key
struct AcceptAnyHostKey;

#[async_trait]
impl client::Handler for AcceptAnyHostKey {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &key::PublicKey,
    ) -> Result<bool, Self::Error> {
        debug!(
            "[SSH] Accepting {} host key {}",
            server_public_key.name(),
            server_public_key.fingerprint()
        );
        Ok(true)
    }
}

/// Dialer backed by russh
pub struct RusshDialer {
    config: SshConfig,
}

impl RusshDialer {
    pub fn new(config: SshConfig) -> Self {
        Self { config }
    }

    async fn connect_and_authenticate(
        &self,
        target: &DialTarget,
    ) -> Result<Handle<AcceptAnyHostKey>, DialError> {
        let addr = target.address();
        let config = Arc::new(client::Config::default());

        let mut handle = client::connect(
            config,
            (target.host.as_str(), target.port),
            AcceptAnyHostKey,
        )
        .await
        .map_err(|e| DialError::Connect {
                addr: addr.clone(),
                reason: e.to_string(),
            })?;

        if target.methods.is_empty() {
            // Some devices accept the "none" method
            let accepted = handle
                .authenticate_none(target.username.as_str())
                .await
                .map_err(|e| DialError::Auth(e.to_string()))?;
            if !accepted {
                return Err(DialError::NoAuthMethods(target.username.clone()));
            }
            return Ok(handle);
        }

        for method in &target.methods {
            let accepted = match method {
                AuthMethod::Password(password) => handle
                    .authenticate_password(target.username.as_str(), password.as_str())
                    .await
                    .map_err(|e| DialError::Auth(e.to_string()))?,
            };

            if accepted {
                debug!("[SSH] {} authenticated via {}", addr, method.name());
                return Ok(handle);
            }
        }

        Err(DialError::AuthRejected(target.username.clone()))
    }
}

impl Default for RusshDialer {
    fn default() -> Self {
        Self::new(SshConfig::default())
    }
}

#[async_trait]
impl SshDialer for RusshDialer {
    async fn dial(&self, target: &DialTarget) -> Result<Arc<dyn CommandChannel>, DialError> {
        let handle = timeout(self.config.dial_timeout, self.connect_and_authenticate(target))
            .await
            .map_err(|_| DialError::Timeout {
                addr: target.address(),
                timeout: self.config.dial_timeout,
            })??;

        Ok(Arc::new(RusshConnection {
            handle: Mutex::new(handle),
        }))
    }
}

/// An authenticated russh connection
struct RusshConnection {
    handle: Mutex<Handle<AcceptAnyHostKey>>,
}

#[async_trait]
impl CommandChannel for RusshConnection {
    async fn exec(&self, command: &str, capture: Capture) -> Result<Vec<u8>, SessionError> {
        let mut channel = self
            .handle
            .lock()
            .await
            .channel_open_session()
            .await
            .map_err(|e| SessionError::ChannelOpen(e.to_string()))?;

        let result = run_command(&mut channel, command, capture).await;
        let _ = channel.close().await;
        result
    }
}

/// Execute on an open channel and collect output until the channel closes
async fn run_command(
    channel: &mut Channel<Msg>,
    command: &str,
    capture: Capture,
) -> Result<Vec<u8>, SessionError> {
    channel
        .exec(true, command)
        .await
        .map_err(|e| SessionError::Exec(e.to_string()))?;

    let mut messages = Vec::new();
    while let Some(msg) = channel.wait().await {
        messages.push(msg);
    }

    collect_output(messages, capture)
}

/// Fold channel messages into the captured output.
///
/// stderr is appended only for [`Capture::Combined`], in arrival order. A
/// non-zero or missing exit status is an error.
fn collect_output(
    messages: impl IntoIterator<Item = ChannelMsg>,
    capture: Capture,
) -> Result<Vec<u8>, SessionError> {
    let mut output = Vec::new();
    let mut exit_status = None;

    for msg in messages {
        match msg {
            ChannelMsg::Data { ref data } => output.extend_from_slice(data),
            ChannelMsg::ExtendedData { ref data, ext }
                if ext == SSH_EXTENDED_DATA_STDERR && capture == Capture::Combined =>
            {
                output.extend_from_slice(data)
            }
            ChannelMsg::ExitStatus { exit_status: code } => exit_status = Some(code),
            _ => {}
        }
    }

    match exit_status {
        Some(0) => Ok(output),
        Some(code) => Err(SessionError::ExitStatus(code)),
        None => Err(SessionError::MissingExitStatus),
    }
}
