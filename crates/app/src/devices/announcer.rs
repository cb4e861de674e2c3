//! System announcer: publishes host identity and uptime every 30 s.

use std::time::Duration;

use tokio::time::Instant;

use iotsim_domain::device::DeviceKind;
use iotsim_domain::reading::SystemStatus;
use iotsim_domain::time::Timestamp;

use crate::schedule::{FirstTick, Schedule};

/// Where the simulator runs, as reported in announcements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostIdentity {
    pub hostname: String,
    pub ip: String,
}

impl Default for HostIdentity {
    fn default() -> Self {
        Self {
            hostname: "localhost".to_string(),
            ip: "127.0.0.1".to_string(),
        }
    }
}

/// Periodic system-status announcer.
#[derive(Debug, Clone)]
pub struct Announcer {
    identity: HostIdentity,
    devices: Vec<DeviceKind>,
    started_at: Instant,
}

impl Announcer {
    /// `devices` is the list of active device kinds to advertise.
    #[must_use]
    pub fn new(identity: HostIdentity, devices: Vec<DeviceKind>, started_at: Instant) -> Self {
        Self {
            identity,
            devices: devices.into_iter().filter(|k| k.is_physical()).collect(),
            started_at,
        }
    }

    #[must_use]
    pub fn schedule() -> Schedule {
        Schedule::every(Duration::from_secs(30)).with_first_tick(FirstTick::AfterDelay)
    }

    #[must_use]
    pub fn next_reading(&self, now: Timestamp) -> SystemStatus {
        SystemStatus {
            system: "IoT Simulator",
            status: "online",
            hostname: self.identity.hostname.clone(),
            ip: self.identity.ip.clone(),
            devices: self.devices.clone(),
            uptime: self.started_at.elapsed().as_secs_f64(),
            timestamp: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iotsim_domain::time::now;

    #[test]
    fn should_advertise_only_physical_devices() {
        let announcer = Announcer::new(
            HostIdentity::default(),
            DeviceKind::ALL.to_vec(),
            Instant::now(),
        );
        let status = announcer.next_reading(now());
        assert_eq!(
            status.devices,
            vec![
                DeviceKind::Temperature,
                DeviceKind::Motion,
                DeviceKind::Light,
                DeviceKind::Door,
                DeviceKind::Energy,
            ]
        );
        assert_eq!(status.status, "online");
    }

    #[tokio::test(start_paused = true)]
    async fn should_report_uptime_since_start() {
        let announcer = Announcer::new(HostIdentity::default(), vec![], Instant::now());
        tokio::time::advance(Duration::from_secs(90)).await;
        let status = announcer.next_reading(now());
        assert!((status.uptime - 90.0).abs() < 1.0);
    }

    #[test]
    fn should_wait_thirty_seconds_before_first_announcement() {
        let schedule = Announcer::schedule();
        assert_eq!(schedule.first_tick, FirstTick::AfterDelay);
        assert_eq!(
            schedule.cadence,
            crate::schedule::Cadence::Fixed(Duration::from_secs(30))
        );
    }
}
