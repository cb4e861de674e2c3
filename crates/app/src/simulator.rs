//! Device simulator actor: one task per device kind.
//!
//! The actor owns its [`Device`] and serializes every state mutation: the
//! periodic tick and routed commands are handled by the same task, so no
//! lock guards the device state.

use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use iotsim_domain::command::Command;
use iotsim_domain::device::DeviceKind;
use iotsim_domain::reading::DeviceReading;
use iotsim_domain::time::now;

use crate::devices::{self, Device};
use crate::ports::MessageBus;
use crate::schedule::Schedule;

/// Mailbox depth for routed commands.
const COMMAND_CAPACITY: usize = 16;

/// Counters returned by a simulator when it stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulatorReport {
    pub kind: DeviceKind,
    /// Ticks that passed the emission draw.
    pub emitted: u64,
    /// Readings accepted by the bus.
    pub published: u64,
    /// Readings the bus refused.
    pub failed: u64,
    /// Commands applied to the device state.
    pub commands: u64,
}

impl SimulatorReport {
    fn new(kind: DeviceKind) -> Self {
        Self {
            kind,
            emitted: 0,
            published: 0,
            failed: 0,
            commands: 0,
        }
    }
}

/// Handle to a running simulator.
pub struct SimulatorHandle {
    kind: DeviceKind,
    commands: mpsc::Sender<Command>,
    join: JoinHandle<SimulatorReport>,
}

impl SimulatorHandle {
    #[must_use]
    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    /// Sender for routing commands into the actor.
    #[must_use]
    pub fn commands(&self) -> mpsc::Sender<Command> {
        self.commands.clone()
    }

    /// Wait for the actor to observe shutdown and return its counters.
    ///
    /// # Errors
    ///
    /// Returns the join error if the task panicked or was aborted.
    pub async fn join(self) -> Result<SimulatorReport, tokio::task::JoinError> {
        self.join.await
    }
}

/// Builder for a simulator actor.
pub struct DeviceSimulator<B> {
    device: Device,
    schedule: Schedule,
    bus: B,
    rng: StdRng,
}

impl<B> DeviceSimulator<B>
where
    B: MessageBus + 'static,
{
    /// Simulate `device` with its default schedule.
    pub fn new(device: Device, bus: B, seed: u64) -> Self {
        Self {
            schedule: device.schedule(),
            device,
            bus,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Override the scheduling policy.
    #[must_use]
    pub fn with_schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = schedule;
        self
    }

    /// Spawn the actor. It runs until `shutdown` turns `true` or its
    /// sender is dropped.
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> SimulatorHandle {
        let kind = self.device.kind();
        let (tx, rx) = mpsc::channel(COMMAND_CAPACITY);
        let join = tokio::spawn(self.run(rx, shutdown));
        tracing::info!(%kind, "simulator started");
        SimulatorHandle {
            kind,
            commands: tx,
            join,
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut shutdown: watch::Receiver<bool>,
    ) -> SimulatorReport {
        let mut report = SimulatorReport::new(self.device.kind());
        let mut tick = 0_u64;

        'ticks: loop {
            let deadline = Instant::now() + self.schedule.delay_before(tick, &mut self.rng);
            tick += 1;

            loop {
                if *shutdown.borrow_and_update() {
                    break 'ticks;
                }
                tokio::select! {
                    biased;
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break 'ticks;
                        }
                    }
                    Some(command) = commands.recv() => {
                        self.apply_command(&command, &mut report).await;
                    }
                    () = tokio::time::sleep_until(deadline) => break,
                }
            }

            if !self.schedule.should_emit(&mut self.rng) {
                tracing::trace!(kind = %report.kind, "tick skipped");
                continue;
            }
            report.emitted += 1;
            let reading = self.device.next_reading(&mut self.rng, now());
            self.publish(&reading, &mut report).await;
        }

        tracing::info!(
            kind = %report.kind,
            published = report.published,
            failed = report.failed,
            "simulator stopped"
        );
        report
    }

    async fn apply_command(&mut self, command: &Command, report: &mut SimulatorReport) {
        match self.device.apply_command(command, &mut self.rng, now()) {
            Ok(reading) => {
                report.commands += 1;
                tracing::info!(kind = %report.kind, device = %command.device_id, "command applied");
                self.publish(&reading, report).await;
            }
            Err(err) => {
                tracing::warn!(kind = %report.kind, device = %command.device_id, %err, "command rejected");
            }
        }
    }

    async fn publish(&self, reading: &DeviceReading, report: &mut SimulatorReport) {
        let message = match reading.to_message() {
            Ok(message) => message,
            Err(err) => {
                report.failed += 1;
                tracing::warn!(kind = %report.kind, %err, "failed to serialize reading");
                return;
            }
        };
        let topic = message.topic.clone();

        match self.bus.publish(message).await {
            Ok(()) => {
                report.published += 1;
                tracing::debug!(%topic, timestamp = %reading.timestamp(), "reading published");
                devices::log_published(reading);
            }
            Err(err) if err.is_transient() => {
                report.failed += 1;
                tracing::warn!(%topic, "bus disconnected, reading dropped");
            }
            Err(err) => {
                report.failed += 1;
                tracing::warn!(%topic, %err, "publish failed, continuing");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::devices::{EnergyMeter, SmartLight, TemperatureSensor};
    use crate::in_memory_bus::InMemoryBus;
    use crate::schedule::FirstTick;
    use iotsim_domain::topic;

    async fn connected_bus() -> Arc<InMemoryBus> {
        let bus = Arc::new(InMemoryBus::default());
        // The inbound sequence is not needed here.
        drop(bus.connect().await.unwrap());
        bus
    }

    #[tokio::test(start_paused = true)]
    async fn should_publish_on_fixed_cadence() {
        let bus = connected_bus().await;
        let (stop, shutdown) = watch::channel(false);
        let handle = DeviceSimulator::new(
            Device::Temperature(TemperatureSensor::default()),
            Arc::clone(&bus),
            1,
        )
        .spawn(shutdown);

        // Ticks at 0s, 5s and 10s.
        tokio::time::sleep(Duration::from_millis(12_000)).await;
        stop.send(true).unwrap();
        let report = handle.join().await.unwrap();

        assert_eq!(report.published, 3);
        let published = bus.published_on(topic::TEMPERATURE);
        assert_eq!(published.len(), 3);
        assert!(published.iter().all(|m| m.retain));
    }

    #[tokio::test(start_paused = true)]
    async fn should_stop_without_publishing_after_shutdown() {
        let bus = connected_bus().await;
        let (stop, shutdown) = watch::channel(false);
        let handle = DeviceSimulator::new(Device::Energy(EnergyMeter), Arc::clone(&bus), 1)
            .spawn(shutdown);

        tokio::time::sleep(Duration::from_millis(500)).await;
        stop.send(true).unwrap();
        let report = handle.join().await.unwrap();
        let count = bus.published().len();

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(report.published, 1);
        assert_eq!(bus.published().len(), count);
    }

    #[tokio::test(start_paused = true)]
    async fn should_keep_running_when_publish_fails() {
        let bus = connected_bus().await;
        let (stop, shutdown) = watch::channel(false);
        let handle = DeviceSimulator::new(Device::Energy(EnergyMeter), Arc::clone(&bus), 1)
            .with_schedule(Schedule::every(Duration::from_secs(1)).with_first_tick(FirstTick::AfterDelay))
            .spawn(shutdown);

        bus.drop_connection("test");
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        bus.restore_connection();
        tokio::time::sleep(Duration::from_millis(2_000)).await;
        stop.send(true).unwrap();
        let report = handle.join().await.unwrap();

        assert_eq!(report.failed, 2);
        assert_eq!(report.published, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn should_skip_ticks_that_lose_the_draw() {
        let bus = connected_bus().await;
        let (stop, shutdown) = watch::channel(false);
        let handle = DeviceSimulator::new(Device::Light(SmartLight::default()), Arc::clone(&bus), 1)
            .with_schedule(Schedule::every(Duration::from_secs(1)).with_probability(0.0))
            .spawn(shutdown);

        tokio::time::sleep(Duration::from_secs(10)).await;
        stop.send(true).unwrap();
        let report = handle.join().await.unwrap();
        assert_eq!(report.emitted, 0);
        assert!(bus.published().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn should_apply_routed_commands_between_ticks() {
        let bus = connected_bus().await;
        let (stop, shutdown) = watch::channel(false);
        let handle = DeviceSimulator::new(Device::Light(SmartLight::default()), Arc::clone(&bus), 1)
            .with_schedule(Schedule::every(Duration::from_secs(3600)).with_probability(0.0))
            .spawn(shutdown);

        let command = Command::parse("lights", b"turn_on").unwrap();
        handle.commands().send(command).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        stop.send(true).unwrap();
        let report = handle.join().await.unwrap();

        assert_eq!(report.commands, 1);
        let published = bus.published_on(topic::LIGHT);
        assert_eq!(published.len(), 1);
        let value: serde_json::Value = serde_json::from_slice(&published[0].payload).unwrap();
        assert_eq!(value["on"], true);
        assert_eq!(value["brightness"], 100);
    }

    #[tokio::test(start_paused = true)]
    async fn should_stop_when_shutdown_sender_is_dropped() {
        let bus = connected_bus().await;
        let (stop, shutdown) = watch::channel(false);
        let handle = DeviceSimulator::new(Device::Energy(EnergyMeter), bus, 1).spawn(shutdown);
        drop(stop);
        let report = handle.join().await.unwrap();
        assert_eq!(report.kind, DeviceKind::Energy);
    }
}
