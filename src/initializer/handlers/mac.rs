//! macOS initializer

use crate::initializer::OsInitializer;
use crate::ssh::RemoteSession;
use async_trait::async_trait;

/// Records the macOS product version
#[derive(Debug, Clone, Copy, Default)]
pub struct MacInitializer;

#[async_trait]
impl OsInitializer for MacInitializer {
    async fn initialize(&self, session: &RemoteSession) -> anyhow::Result<()> {
        let version = session.output("sw_vers -productVersion").await?;
        session.device().log(format!("macOS {}", version.trim()));
        Ok(())
    }
}
