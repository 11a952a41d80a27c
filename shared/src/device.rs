//! Device Model
//!
//! A device record is owned by the registry and shared with the monitoring
//! loops through `Arc<Device>`. Only the liveness loop writes the online flag.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Software label holding the OS family used for SSH initialization
pub const OS_FAMILY_KEY: &str = "OSFamily";

/// SSH settings for a device
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SshInfo {
    /// Whether the SSH loop should run at all
    pub enabled: bool,
    pub username: String,
    pub password: String,
    /// Reserved for public-key authentication
    pub uses_key: bool,
}

impl fmt::Debug for SshInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SshInfo")
            .field("enabled", &self.enabled)
            .field("username", &self.username)
            .field("password", &if self.password.is_empty() { "" } else { "***" })
            .field("uses_key", &self.uses_key)
            .finish()
    }
}

/// Configured (read-only) information about a device
#[derive(Debug, Clone, Default)]
pub struct DeviceInfo {
    /// Hostname or IPv4 literal
    pub addr_string: String,
    pub ssh: SshInfo,
    /// Free-form software labels, e.g. `OSFamily = "linux"`
    pub software: HashMap<String, String>,
}

impl DeviceInfo {
    /// Create info for the given address with SSH disabled
    pub fn new(addr_string: impl Into<String>) -> Self {
        Self {
            addr_string: addr_string.into(),
            ..Default::default()
        }
    }

    /// Enable SSH with password credentials
    pub fn with_ssh(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.ssh = SshInfo {
            enabled: true,
            username: username.into(),
            password: password.into(),
            uses_key: false,
        };
        self
    }

    /// Set the OS family label
    pub fn with_os_family(mut self, family: impl Into<String>) -> Self {
        self.software.insert(OS_FAMILY_KEY.to_string(), family.into());
        self
    }

    /// The OS family label, if one is known
    pub fn os_family(&self) -> Option<&str> {
        self.software
            .get(OS_FAMILY_KEY)
            .map(String::as_str)
            .filter(|family| !family.is_empty())
    }
}

/// Severity of a device log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
}

/// Destination for per-device log output
pub trait LogSink: Send + Sync {
    fn write(&self, device: &str, level: LogLevel, message: &str);
}

/// Forwards device log output to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn write(&self, device: &str, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug => tracing::debug!(device = %device, "{}", message),
            LogLevel::Info => tracing::info!(device = %device, "{}", message),
            LogLevel::Warn => tracing::warn!(device = %device, "{}", message),
        }
    }
}

/// A single recorded log line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub device: String,
    pub level: LogLevel,
    pub message: String,
}

/// Keeps device log output in memory
///
/// Entries are also forwarded to `tracing` so recorded devices still show up
/// in the process log.
#[derive(Debug, Default)]
pub struct RecordingSink {
    entries: Mutex<Vec<LogEntry>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all entries recorded so far
    pub fn entries(&self) -> Vec<LogEntry> {
        self.lock().clone()
    }

    /// Messages recorded at the given level, in order
    pub fn messages(&self, level: LogLevel) -> Vec<String> {
        self.lock()
            .iter()
            .filter(|entry| entry.level == level)
            .map(|entry| entry.message.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<LogEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl LogSink for RecordingSink {
    fn write(&self, device: &str, level: LogLevel, message: &str) {
        TracingSink.write(device, level, message);
        self.lock().push(LogEntry {
            device: device.to_string(),
            level,
            message: message.to_string(),
        });
    }
}

/// A monitored device
pub struct Device {
    name: String,
    info: DeviceInfo,
    online: AtomicBool,
    sink: Arc<dyn LogSink>,
}

impl Device {
    /// Create a device that logs through `tracing`
    pub fn new(name: impl Into<String>, info: DeviceInfo) -> Self {
        Self::with_sink(name, info, Arc::new(TracingSink))
    }

    /// Create a device with a custom log sink
    pub fn with_sink(name: impl Into<String>, info: DeviceInfo, sink: Arc<dyn LogSink>) -> Self {
        Self {
            name: name.into(),
            info,
            online: AtomicBool::new(false),
            sink,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    /// Last state published by the liveness loop
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }

    /// Publish a new online state. Called only by the liveness loop.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Release);
    }

    pub fn debug(&self, message: impl fmt::Display) {
        self.sink.write(&self.name, LogLevel::Debug, &message.to_string());
    }

    pub fn log(&self, message: impl fmt::Display) {
        self.sink.write(&self.name, LogLevel::Info, &message.to_string());
    }

    pub fn warn(&self, message: impl fmt::Display) {
        self.sink.write(&self.name, LogLevel::Warn, &message.to_string());
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("name", &self.name)
            .field("info", &self.info)
            .field("online", &self.is_online())
            .finish()
    }
}
