//! SSH channel to devices
//!
//! This module handles:
//! - Selecting authentication methods from device credentials
//! - Dialing and authenticating a connection
//! - Running single commands over per-command channels

mod auth;
mod connection;
mod session;

pub use auth::{auth_methods, AuthMethod};
pub use connection::{Capture, CommandChannel, DialTarget, RusshDialer, SshConfig, SshDialer};
pub use session::RemoteSession;
