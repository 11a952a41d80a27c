//! Liveness State Machine
//!
//! Classifies a device as online or offline from probe-received and idle
//! events. Time is passed in explicitly so the rules can be checked without
//! a network or a clock.

use std::time::{Duration, Instant};

/// Observed liveness of a device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// No transition has happened yet
    Unknown,
    Online,
    Offline,
}

/// Events fed into the state machine by the probe loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeEvent {
    /// An echo reply arrived
    Received { rtt: Duration },
    /// A probe round ended
    Idle,
}

/// A state change produced by an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: Liveness,
    pub to: Liveness,
}

/// Per-device liveness state held by the monitor loop
#[derive(Debug, Clone)]
pub struct LivenessTracker {
    state: Liveness,
    last_seen: Instant,
    silence_threshold: Duration,
}

impl LivenessTracker {
    /// Create a tracker whose silence clock starts at `started_at`
    pub fn new(started_at: Instant, silence_threshold: Duration) -> Self {
        Self {
            state: Liveness::Unknown,
            last_seen: started_at,
            silence_threshold,
        }
    }

    pub fn state(&self) -> Liveness {
        self.state
    }

    pub fn is_online(&self) -> bool {
        self.state == Liveness::Online
    }

    /// Instant of the last reply (or loop start if none arrived yet)
    pub fn last_seen(&self) -> Instant {
        self.last_seen
    }

    /// Time since the last reply
    pub fn silence(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_seen)
    }

    /// Feed one event; returns the transition it caused, if any
    pub fn process_event(&mut self, event: ProbeEvent, now: Instant) -> Option<Transition> {
        match event {
            ProbeEvent::Received { .. } => self.on_received(now),
            ProbeEvent::Idle => self.on_idle(now),
        }
    }

    /// An echo reply arrived at `now`
    pub fn on_received(&mut self, now: Instant) -> Option<Transition> {
        self.last_seen = now;
        if self.state == Liveness::Online {
            return None;
        }
        Some(self.transition_to(Liveness::Online))
    }

    /// A probe round ended at `now`
    pub fn on_idle(&mut self, now: Instant) -> Option<Transition> {
        if self.silence(now) < self.silence_threshold {
            return None;
        }
        if self.state == Liveness::Offline {
            return None;
        }
        Some(self.transition_to(Liveness::Offline))
    }

    fn transition_to(&mut self, to: Liveness) -> Transition {
        let from = self.state;
        self.state = to;
        Transition { from, to }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THRESHOLD: Duration = Duration::from_secs(10);

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    fn received() -> ProbeEvent {
        ProbeEvent::Received {
            rtt: Duration::from_millis(3),
        }
    }

    #[test]
    fn test_initial_state() {
        let fsm = LivenessTracker::new(Instant::now(), THRESHOLD);
        assert_eq!(fsm.state(), Liveness::Unknown);
        assert!(!fsm.is_online());
    }

    #[test]
    fn test_first_reply_goes_online() {
        let t0 = Instant::now();
        let mut fsm = LivenessTracker::new(t0, THRESHOLD);

        let result = fsm.on_received(t0 + secs(1));
        assert_eq!(
            result,
            Some(Transition {
                from: Liveness::Unknown,
                to: Liveness::Online
            })
        );
        assert!(fsm.is_online());

        // Further replies only refresh last-seen
        assert_eq!(fsm.on_received(t0 + secs(2)), None);
        assert_eq!(fsm.last_seen(), t0 + secs(2));
    }

    #[test]
    fn test_idle_before_threshold_keeps_unknown() {
        let t0 = Instant::now();
        let mut fsm = LivenessTracker::new(t0, THRESHOLD);

        assert_eq!(fsm.on_idle(t0 + secs(5)), None);
        assert_eq!(fsm.on_idle(t0 + secs(9)), None);
        assert_eq!(fsm.state(), Liveness::Unknown);
    }

    #[test]
    fn test_silent_device_goes_offline_once() {
        let t0 = Instant::now();
        let mut fsm = LivenessTracker::new(t0, THRESHOLD);

        let result = fsm.on_idle(t0 + THRESHOLD);
        assert_eq!(
            result,
            Some(Transition {
                from: Liveness::Unknown,
                to: Liveness::Offline
            })
        );

        // Repeated idle ticks while offline emit nothing
        assert_eq!(fsm.on_idle(t0 + secs(15)), None);
        assert_eq!(fsm.on_idle(t0 + secs(60)), None);
        assert_eq!(fsm.state(), Liveness::Offline);
    }

    #[test]
    fn test_threshold_boundary() {
        let t0 = Instant::now();
        let mut fsm = LivenessTracker::new(t0, THRESHOLD);
        let last = t0 + secs(3);
        fsm.on_received(last);

        assert_eq!(fsm.on_idle(last + secs(9)), None);
        assert!(fsm.is_online());

        let result = fsm.on_idle(last + secs(10));
        assert_eq!(
            result,
            Some(Transition {
                from: Liveness::Online,
                to: Liveness::Offline
            })
        );
    }

    #[test]
    fn test_reply_after_offline_goes_online() {
        let t0 = Instant::now();
        let mut fsm = LivenessTracker::new(t0, THRESHOLD);

        fsm.on_received(t0);
        fsm.on_idle(t0 + secs(10));
        assert_eq!(fsm.state(), Liveness::Offline);

        let result = fsm.on_received(t0 + secs(12));
        assert_eq!(
            result,
            Some(Transition {
                from: Liveness::Offline,
                to: Liveness::Online
            })
        );
    }

    #[test]
    fn test_no_consecutive_duplicate_transitions() {
        let t0 = Instant::now();
        let mut fsm = LivenessTracker::new(t0, THRESHOLD);

        // Reachable for 20s, silent for 30s, reachable again
        let mut events = Vec::new();
        for s in (0..=20).step_by(5) {
            events.push((received(), t0 + secs(s)));
            events.push((ProbeEvent::Idle, t0 + secs(s + 5)));
        }
        for s in (30..=50).step_by(5) {
            events.push((ProbeEvent::Idle, t0 + secs(s)));
        }
        for s in (55..=70).step_by(5) {
            events.push((received(), t0 + secs(s)));
            events.push((ProbeEvent::Idle, t0 + secs(s + 5)));
        }

        let transitions: Vec<Liveness> = events
            .into_iter()
            .filter_map(|(event, at)| fsm.process_event(event, at))
            .map(|t| t.to)
            .collect();

        assert_eq!(
            transitions,
            vec![Liveness::Online, Liveness::Offline, Liveness::Online]
        );
    }
}
