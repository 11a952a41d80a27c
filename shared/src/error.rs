//! Error types for address resolution and the SSH channel

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while resolving a device address
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("address is empty")]
    Empty,

    #[error("IPv6 address {0} is not supported")]
    Ipv6Unsupported(String),

    #[error("lookup of {addr} failed: {source}")]
    Lookup {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no IPv4 address found for {0}")]
    NoIpv4(String),
}

/// Errors that can occur while establishing an SSH connection
#[derive(Error, Debug)]
pub enum DialError {
    #[error("connect to {addr} failed: {reason}")]
    Connect { addr: String, reason: String },

    #[error("connect to {addr} timed out after {timeout:?}")]
    Timeout { addr: String, timeout: Duration },

    #[error("no authentication methods available for {0}")]
    NoAuthMethods(String),

    #[error("authentication rejected for user {0}")]
    AuthRejected(String),

    #[error("authentication error: {0}")]
    Auth(String),
}

/// Errors that can occur while running a single remote command
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("could not open channel: {0}")]
    ChannelOpen(String),

    #[error("{0}")]
    Exec(String),

    #[error("process exited with status {0}")]
    ExitStatus(u32),

    #[error("remote command exited without exit status")]
    MissingExitStatus,
}

impl SessionError {
    /// True when the failure happened before the command could start
    pub fn is_channel_failure(&self) -> bool {
        matches!(self, SessionError::ChannelOpen(_))
    }
}
