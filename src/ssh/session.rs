//! Remote command execution bound to a device

use crate::ssh::{Capture, CommandChannel};
use fleetwatch_shared::{Device, SessionError};
use std::sync::Arc;

/// A device together with its authenticated SSH connection
///
/// Every call opens its own channel, so a failed command never poisons the
/// next one. Failures are logged on the device and returned as errors, which
/// keeps "no output" distinguishable from "command failed".
#[derive(Clone)]
pub struct RemoteSession {
    device: Arc<Device>,
    channel: Arc<dyn CommandChannel>,
}

impl RemoteSession {
    pub fn new(device: Arc<Device>, channel: Arc<dyn CommandChannel>) -> Self {
        Self { device, channel }
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Raw stdout of `command`
    pub async fn output_bytes(&self, command: &str) -> Result<Vec<u8>, SessionError> {
        self.run(command, Capture::Stdout).await
    }

    /// Raw stdout and stderr of `command`
    pub async fn combined_output_bytes(&self, command: &str) -> Result<Vec<u8>, SessionError> {
        self.run(command, Capture::Combined).await
    }

    /// stdout of `command`, decoded lossily as UTF-8
    pub async fn output(&self, command: &str) -> Result<String, SessionError> {
        let data = self.output_bytes(command).await?;
        Ok(String::from_utf8_lossy(&data).into_owned())
    }

    /// stdout and stderr of `command`, decoded lossily as UTF-8
    pub async fn combined_output(&self, command: &str) -> Result<String, SessionError> {
        let data = self.combined_output_bytes(command).await?;
        Ok(String::from_utf8_lossy(&data).into_owned())
    }

    async fn run(&self, command: &str, capture: Capture) -> Result<Vec<u8>, SessionError> {
        match self.channel.exec(command, capture).await {
            Ok(data) => Ok(data),
            Err(e) if e.is_channel_failure() => {
                self.device.warn(format!(
                    "could not create an SSH session for `{}`: {}",
                    command, e
                ));
                Err(e)
            }
            Err(e) => {
                self.device.warn(format!("command `{}` failed: {}", command, e));
                Err(e)
            }
        }
    }
}
