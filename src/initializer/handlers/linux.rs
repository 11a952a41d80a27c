//! Linux initializer

use crate::initializer::OsInitializer;
use crate::ssh::RemoteSession;
use async_trait::async_trait;

/// Records kernel identity and uptime of Linux hosts
#[derive(Debug, Clone, Copy, Default)]
pub struct LinuxInitializer;

#[async_trait]
impl OsInitializer for LinuxInitializer {
    async fn initialize(&self, session: &RemoteSession) -> anyhow::Result<()> {
        let device = session.device();

        let kernel = session.output("uname -srm").await?;
        device.log(format!("kernel: {}", kernel.trim()));

        // Uptime is informational only; the session already logged any failure
        if let Ok(uptime) = session.combined_output("uptime").await {
            device.debug(format!("uptime: {}", uptime.trim()));
        }

        Ok(())
    }
}
