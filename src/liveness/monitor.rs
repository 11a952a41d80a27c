//! Liveness Monitor
//!
//! Drives the liveness state machine from an echo prober. Each round sends
//! one echo request; a reply inside the round is a received event and the
//! end of every round is an idle tick.

use crate::transport::EchoProber;
use fleetwatch_shared::{liveness, Device, Liveness, LivenessTracker, Transition};
use std::sync::Arc;
use tokio::time::{interval, Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Configuration for the liveness loop
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Timeout for one echo request, also the length of a probe round
    pub rtt_timeout: Duration,
    /// Silence after which the device is presumed unreachable
    pub silence_threshold: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            rtt_timeout: Duration::from_millis(liveness::RTT_TIMEOUT_MS),
            silence_threshold: Duration::from_millis(liveness::SILENCE_THRESHOLD_MS),
        }
    }
}

/// Continuous echo loop for a single device
pub struct LivenessMonitor {
    device: Arc<Device>,
    prober: Box<dyn EchoProber>,
    config: MonitorConfig,
    cancel: CancellationToken,
}

impl LivenessMonitor {
    pub fn new(
        device: Arc<Device>,
        prober: Box<dyn EchoProber>,
        config: MonitorConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            device,
            prober,
            config,
            cancel,
        }
    }

    /// Run until the cancellation token fires
    pub async fn run(mut self) {
        let target = self.prober.target();
        let mut tracker = LivenessTracker::new(now(), self.config.silence_threshold);
        let mut rounds = interval(self.config.rtt_timeout);
        rounds.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut sequence: u16 = 0;

        info!(device = %self.device.name(), "[LIVENESS] Probing {}", target);

        // First tick completes immediately and marks the start of round one
        rounds.tick().await;

        loop {
            let reply = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                reply = self.prober.echo(sequence, self.config.rtt_timeout) => reply,
            };
            sequence = sequence.wrapping_add(1);

            match reply {
                Ok(rtt) => {
                    self.device.debug(format!(
                        "received ICMP packet: addr={}, rtt={:?}",
                        target, rtt
                    ));
                    let transition = tracker.on_received(now());
                    self.publish(transition);
                }
                Err(e) => {
                    self.device.debug(format!("no ICMP reply: {:#}", e));
                }
            }

            // End of the round
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = rounds.tick() => {}
            }

            self.device.debug("ICMP idle");
            let transition = tracker.on_idle(now());
            self.publish(transition);
        }

        debug!(device = %self.device.name(), "[LIVENESS] Monitoring stopped");
    }

    fn publish(&self, transition: Option<Transition>) {
        let Some(transition) = transition else {
            return;
        };

        match transition.to {
            Liveness::Online => {
                self.device.set_online(true);
                self.device.log("device is online");
            }
            Liveness::Offline => {
                self.device.set_online(false);
                self.device.log("device is offline");
            }
            Liveness::Unknown => {}
        }
    }
}

/// Current time on the tokio clock, so paused-time tests stay consistent
fn now() -> std::time::Instant {
    Instant::now().into_std()
}
