mod initializer;
mod liveness;
mod registry;
mod ssh;
mod supervisor;
#[cfg(test)]
mod testing;
mod transport;

use anyhow::{bail, Context, Result};
use fleetwatch_shared::{Device, DeviceInfo};
use initializer::InitializerRegistry;
use registry::DeviceRegistry;
use ssh::RusshDialer;
use std::sync::Arc;
use supervisor::{DeviceLoopSupervisor, SupervisorConfig};
use transport::IcmpConnector;

use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Default interval between status lines
const DEFAULT_STATUS_SECS: u64 = 30;

/// SSH settings applied to every device given on the command line
struct SshDefaults {
    username: String,
    password: String,
    os_family: Option<String>,
}

impl SshDefaults {
    fn from_env() -> Option<Self> {
        let username = std::env::var("FLEETWATCH_SSH_USER").ok()?;
        Some(Self {
            username,
            password: std::env::var("FLEETWATCH_SSH_PASSWORD").unwrap_or_default(),
            os_family: std::env::var("FLEETWATCH_OS_FAMILY").ok(),
        })
    }
}

/// Parse `name=address` arguments into device records
fn parse_devices(args: &[String], ssh: Option<&SshDefaults>) -> Result<Vec<Device>> {
    args.iter()
        .map(|arg| {
            let (name, addr) = arg
                .split_once('=')
                .with_context(|| format!("expected name=address, got {:?}", arg))?;
            if name.is_empty() || addr.is_empty() {
                bail!("expected name=address, got {:?}", arg);
            }

            let mut info = DeviceInfo::new(addr);
            if let Some(ssh) = ssh {
                info = info.with_ssh(ssh.username.as_str(), ssh.password.as_str());
                if let Some(family) = &ssh.os_family {
                    info = info.with_os_family(family.as_str());
                }
            }
            Ok(Device::new(name, info))
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        bail!("usage: fleetwatch NAME=ADDRESS [NAME=ADDRESS ...]");
    }

    let ssh_defaults = SshDefaults::from_env();
    let devices = parse_devices(&args, ssh_defaults.as_ref())?;
    let status_secs = std::env::var("FLEETWATCH_STATUS_SECS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .unwrap_or(DEFAULT_STATUS_SECS);

    let config = SupervisorConfig::default();
    info!("Fleetwatch starting: {} devices", devices.len());
    info!("  RTT timeout: {:?}", config.monitor.rtt_timeout);
    info!("  Silence threshold: {:?}", config.monitor.silence_threshold);
    info!("  SSH: {}", if ssh_defaults.is_some() { "enabled" } else { "disabled" });

    let probes = Arc::new(IcmpConnector::new()?);
    let dialer = Arc::new(RusshDialer::new(config.ssh.clone()));
    let initializers = InitializerRegistry::with_defaults();
    info!("OS initializers: {}", initializers.families().join(", "));
    if let Some(family) = ssh_defaults.as_ref().and_then(|ssh| ssh.os_family.as_deref()) {
        if !initializers.contains(family) {
            warn!("No initializer for OS family {}; devices will only be connected", family);
        }
    }

    let supervisor = DeviceLoopSupervisor::new(config, probes, dialer, initializers);
    let mut registry = DeviceRegistry::new();
    supervisor.install(&mut registry);

    for device in devices {
        if let Err(e) = registry.register(device) {
            error!("Device setup failed: {}", e);
        }
    }
    if registry.is_empty() {
        bail!("no devices registered");
    }
    info!(
        "{} devices registered, {} device loops running",
        registry.len(),
        supervisor.task_count()
    );

    let mut ticker = tokio::time::interval(tokio::time::Duration::from_secs(status_secs));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let statuses = registry.statuses();
                let online = statuses.iter().filter(|s| s.online).count();
                info!("Status: {}/{} online", online, statuses.len());
                for status in statuses.iter().filter(|s| !s.online) {
                    warn!("  {} offline", status.name);
                }
            }
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    error!("Failed to listen for shutdown signal: {}", e);
                }
                break;
            }
        }
    }

    info!("Shutting down");
    supervisor.shutdown().await;
    Ok(())
}
