//! Initializer registry - routes a connected device to its OS-family handler

use super::handlers;
use crate::ssh::RemoteSession;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Platform-specific setup run once per successful SSH connection
#[async_trait]
pub trait OsInitializer: Send + Sync {
    async fn initialize(&self, session: &RemoteSession) -> anyhow::Result<()>;
}

/// Result of dispatching a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The family's initializer ran to completion
    Initialized { family: String },
    /// The family's initializer returned an error
    Failed { family: String, message: String },
    /// No label on the device or no initializer for it
    Skipped,
}

/// Builds an [`InitializerRegistry`]; registration is only possible here
#[derive(Default)]
pub struct InitializerRegistryBuilder {
    handlers: HashMap<String, Arc<dyn OsInitializer>>,
}

impl InitializerRegistryBuilder {
    /// Register `initializer` for `family`, replacing any earlier one
    pub fn register(
        mut self,
        family: impl Into<String>,
        initializer: impl OsInitializer + 'static,
    ) -> Self {
        self.handlers.insert(family.into(), Arc::new(initializer));
        self
    }

    pub fn build(self) -> Arc<InitializerRegistry> {
        Arc::new(InitializerRegistry {
            handlers: self.handlers,
        })
    }
}

/// Read-only map from OS family to initializer, shared by all SSH loops
pub struct InitializerRegistry {
    handlers: HashMap<String, Arc<dyn OsInitializer>>,
}

impl InitializerRegistry {
    pub fn builder() -> InitializerRegistryBuilder {
        InitializerRegistryBuilder::default()
    }

    /// Registry with the built-in initializers
    pub fn with_defaults() -> Arc<Self> {
        Self::builder()
            .register("linux", handlers::LinuxInitializer)
            .register("mac", handlers::MacInitializer)
            .build()
    }

    pub fn contains(&self, family: &str) -> bool {
        self.handlers.contains_key(family)
    }

    /// Registered family names, sorted
    pub fn families(&self) -> Vec<&str> {
        let mut families: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        families.sort_unstable();
        families
    }

    /// Run the initializer for the session's device, if there is one
    pub async fn dispatch(&self, session: &RemoteSession) -> DispatchOutcome {
        let device = session.device();
        let Some(family) = device.info().os_family() else {
            return DispatchOutcome::Skipped;
        };
        let Some(handler) = self.handlers.get(family) else {
            return DispatchOutcome::Skipped;
        };

        device.debug(format!("initializing via ssh for OS family: {}", family));

        match handler.initialize(session).await {
            Ok(()) => DispatchOutcome::Initialized {
                family: family.to_string(),
            },
            Err(e) => {
                device.warn(format!("{} initialization failed: {:#}", family, e));
                DispatchOutcome::Failed {
                    family: family.to_string(),
                    message: e.to_string(),
                }
            }
        }
    }
}
