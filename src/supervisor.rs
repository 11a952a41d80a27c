//! Device loop supervisor
//!
//! Starts one liveness loop and one SSH loop per registered device through
//! registry setup callbacks and keeps their task handles for shutdown.

use crate::initializer::{DispatchOutcome, InitializerRegistry};
use crate::liveness::{LivenessMonitor, MonitorConfig};
use crate::registry::DeviceRegistry;
use crate::ssh::{auth_methods, DialTarget, RemoteSession, SshConfig, SshDialer};
use crate::transport::{resolve_ipv4, ProbeConnector};
use anyhow::{Context, Result};
use fleetwatch_shared::Device;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Configuration for both per-device loops
#[derive(Debug, Clone, Default)]
pub struct SupervisorConfig {
    pub monitor: MonitorConfig,
    pub ssh: SshConfig,
}

/// Where an SSH loop ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SshLoopState {
    /// SSH not enabled for the device
    Disabled,
    /// Dial or authentication failed; no reconnection
    DialFailed,
    /// Connected and handed to the initializer registry
    Dispatched(DispatchOutcome),
    /// Shutdown arrived before the loop finished
    Cancelled,
}

/// Launches and tracks the per-device loops
pub struct DeviceLoopSupervisor {
    config: SupervisorConfig,
    probes: Arc<dyn ProbeConnector>,
    dialer: Arc<dyn SshDialer>,
    initializers: Arc<InitializerRegistry>,
    cancel: CancellationToken,
    tasks: Mutex<HashMap<String, Vec<JoinHandle<()>>>>,
}

impl DeviceLoopSupervisor {
    pub fn new(
        config: SupervisorConfig,
        probes: Arc<dyn ProbeConnector>,
        dialer: Arc<dyn SshDialer>,
        initializers: Arc<InitializerRegistry>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            probes,
            dialer,
            initializers,
            cancel: CancellationToken::new(),
            tasks: Mutex::new(HashMap::new()),
        })
    }

    /// Register the liveness and SSH setup callbacks on `registry`
    pub fn install(self: &Arc<Self>, registry: &mut DeviceRegistry) {
        let supervisor = self.clone();
        registry.add_setup_callback(move |device| supervisor.start_liveness_loop(device));

        let supervisor = self.clone();
        registry.add_setup_callback(move |device| supervisor.start_ssh_loop(device));
    }

    /// Spawn the ICMP liveness loop for `device`
    fn start_liveness_loop(&self, device: Arc<Device>) -> Result<()> {
        let runtime = Handle::try_current().context("no tokio runtime to run the liveness loop")?;

        let probes = self.probes.clone();
        let config = self.config.monitor.clone();
        let cancel = self.device_token();
        let name = device.name().to_string();

        let handle = runtime.spawn(async move {
            run_liveness_loop(device, probes, config, cancel).await;
        });
        self.track(name, handle);
        Ok(())
    }

    /// Spawn the SSH loop for `device`; no-op when SSH is disabled
    fn start_ssh_loop(&self, device: Arc<Device>) -> Result<()> {
        if !device.info().ssh.enabled {
            return Ok(());
        }
        let runtime = Handle::try_current().context("no tokio runtime to run the SSH loop")?;

        let dialer = self.dialer.clone();
        let initializers = self.initializers.clone();
        let port = self.config.ssh.port;
        let cancel = self.device_token();
        let name = device.name().to_string();

        let handle = runtime.spawn(async move {
            let state = run_ssh_loop(device.clone(), dialer, initializers, port, cancel).await;
            debug!(device = %device.name(), "[SSH] Loop finished: {:?}", state);
        });
        self.track(name, handle);
        Ok(())
    }

    /// Number of loops started so far
    pub fn task_count(&self) -> usize {
        self.lock_tasks().values().map(Vec::len).sum()
    }

    /// Cancel every loop and wait for all of them to finish
    pub async fn shutdown(&self) {
        self.cancel.cancel();

        let handles: Vec<JoinHandle<()>> = self
            .lock_tasks()
            .drain()
            .flat_map(|(_, handles)| handles)
            .collect();
        let count = handles.len();

        futures::future::join_all(handles).await;
        info!("Stopped {} device loops", count);
    }

    /// Per-device child token. Cancelling it alone would stop just that
    /// device's loops, which is where device removal hooks in.
    fn device_token(&self) -> CancellationToken {
        self.cancel.child_token()
    }

    fn track(&self, device: String, handle: JoinHandle<()>) {
        self.lock_tasks().entry(device).or_default().push(handle);
    }

    fn lock_tasks(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<JoinHandle<()>>>> {
        self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Resolve, open a prober and monitor until cancelled
async fn run_liveness_loop(
    device: Arc<Device>,
    probes: Arc<dyn ProbeConnector>,
    config: MonitorConfig,
    cancel: CancellationToken,
) {
    let target = match resolve_ipv4(&device.info().addr_string).await {
        Ok(ip) => ip,
        Err(e) => {
            device.warn(format!("ping couldn't resolve the IP address: {}", e));
            return;
        }
    };

    let prober = match probes.open(target).await {
        Ok(prober) => prober,
        Err(e) => {
            device.warn(format!("{} probe setup failed: {:#}", probes.name(), e));
            return;
        }
    };

    LivenessMonitor::new(device, prober, config, cancel).run().await;
}

/// Dial once, then dispatch to the OS-family initializer
pub(crate) async fn run_ssh_loop(
    device: Arc<Device>,
    dialer: Arc<dyn SshDialer>,
    initializers: Arc<InitializerRegistry>,
    port: u16,
    cancel: CancellationToken,
) -> SshLoopState {
    let ssh = &device.info().ssh;
    if !ssh.enabled {
        return SshLoopState::Disabled;
    }

    let target = DialTarget {
        host: device.info().addr_string.trim().to_string(),
        port,
        username: ssh.username.clone(),
        methods: auth_methods(ssh),
    };

    let dialed = tokio::select! {
        biased;
        _ = cancel.cancelled() => return SshLoopState::Cancelled,
        dialed = dialer.dial(&target) => dialed,
    };

    let channel = match dialed {
        Ok(channel) => channel,
        Err(e) => {
            device.warn(format!("ssh dial failed: {}", e));
            return SshLoopState::DialFailed;
        }
    };

    device.log("SSH connection established");

    let session = RemoteSession::new(device.clone(), channel);
    tokio::select! {
        biased;
        _ = cancel.cancelled() => SshLoopState::Cancelled,
        outcome = initializers.dispatch(&session) => SshLoopState::Dispatched(outcome),
    }
}
