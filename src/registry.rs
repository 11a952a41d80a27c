//! Device registry with setup callbacks
//!
//! Subsystems register a callback once at startup; every device registered
//! afterwards is handed to each callback, which starts that subsystem's loop.
//! The registry itself knows nothing about networking.

use fleetwatch_shared::Device;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Called once per registered device; must return quickly
pub type SetupCallback = Box<dyn Fn(Arc<Device>) -> anyhow::Result<()> + Send + Sync>;

/// Errors returned to the caller of [`DeviceRegistry::register`]
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("device {0} is already registered")]
    Duplicate(String),

    #[error("setup of {device} failed in {} callback(s): {}", .errors.len(), summary(.errors))]
    Setup {
        device: String,
        errors: Vec<anyhow::Error>,
    },
}

fn summary(errors: &[anyhow::Error]) -> String {
    errors
        .iter()
        .map(|e| format!("{:#}", e))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Name and online flag of one device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceStatus {
    pub name: String,
    pub online: bool,
}

/// Owns the device records
#[derive(Default)]
pub struct DeviceRegistry {
    devices: Vec<Arc<Device>>,
    callbacks: Vec<SetupCallback>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a callback invoked for every device registered from now on
    pub fn add_setup_callback<F>(&mut self, callback: F)
    where
        F: Fn(Arc<Device>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.callbacks.push(Box::new(callback));
    }

    /// Register a device and run every setup callback with it.
    ///
    /// The device is kept even when callbacks fail. A failing callback does
    /// not prevent the remaining ones from running; all failures are returned
    /// together.
    pub fn register(&mut self, device: Device) -> Result<Arc<Device>, RegistryError> {
        if self.get(device.name()).is_some() {
            return Err(RegistryError::Duplicate(device.name().to_string()));
        }

        let device = Arc::new(device);
        self.devices.push(device.clone());
        debug!(device = %device.name(), "Registered device");

        let errors: Vec<anyhow::Error> = self
            .callbacks
            .iter()
            .filter_map(|callback| callback(device.clone()).err())
            .collect();

        if errors.is_empty() {
            Ok(device)
        } else {
            Err(RegistryError::Setup {
                device: device.name().to_string(),
                errors,
            })
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Device>> {
        self.devices.iter().find(|device| device.name() == name)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Snapshot of every device's online flag, in registration order
    pub fn statuses(&self) -> Vec<DeviceStatus> {
        self.devices
            .iter()
            .map(|device| DeviceStatus {
                name: device.name().to_string(),
                online: device.is_online(),
            })
            .collect()
    }
}
