//! Simulation engine: owns the bus session and the lifecycle of every
//! simulator and the inbound listener.
//!
//! ```text
//! Idle → Connecting → Running → ShuttingDown → Stopped
//!            └──────── connect failed ────────────┘
//! ```

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tokio::sync::watch;
use tokio::time::Instant;

use iotsim_domain::device::DeviceKind;
use iotsim_domain::error::BusError;
use iotsim_domain::topic;

use crate::devices::{
    Announcer, Device, DoorSensor, EnergyMeter, HostIdentity, MotionSensor, SmartLight,
    TemperatureSensor,
};
use crate::ports::{BusEvent, BusEvents, MessageBus};
use crate::router::{CHAT_DELAY, CommandRouter};
use crate::schedule::Schedule;
use crate::simulator::{DeviceSimulator, SimulatorHandle, SimulatorReport};

/// Lifecycle state of a [`SimulationEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Connecting,
    Running,
    ShuttingDown,
    Stopped,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Connecting => f.write_str("connecting"),
            Self::Running => f.write_str("running"),
            Self::ShuttingDown => f.write_str("shutting down"),
            Self::Stopped => f.write_str("stopped"),
        }
    }
}

/// Errors that end a run before it reaches `Running`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("could not connect to the message bus")]
    Connect(#[source] BusError),

    #[error("could not subscribe to `{filter}`")]
    Subscribe {
        filter: &'static str,
        #[source]
        source: BusError,
    },
}

/// What to simulate.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Device kinds to run. Duplicates are ignored.
    pub devices: Vec<DeviceKind>,
    /// Identity reported by the announcer.
    pub identity: HostIdentity,
    /// Location label of the temperature sensor.
    pub location: String,
    /// Seed for every random draw. `None` seeds from the OS.
    pub seed: Option<u64>,
    /// Processing delay before chat replies.
    pub chat_delay: Duration,
    /// Per-kind schedule overrides.
    pub schedules: Vec<(DeviceKind, Schedule)>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            devices: DeviceKind::ALL.to_vec(),
            identity: HostIdentity::default(),
            location: "living_room".to_string(),
            seed: None,
            chat_delay: CHAT_DELAY,
            schedules: Vec::new(),
        }
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone, Default)]
pub struct EngineReport {
    pub simulators: Vec<SimulatorReport>,
    /// Inbound messages handed to the router.
    pub inbound: u64,
}

impl EngineReport {
    /// Counters of the simulator for `kind`, if it ran.
    #[must_use]
    pub fn simulator(&self, kind: DeviceKind) -> Option<&SimulatorReport> {
        self.simulators.iter().find(|r| r.kind == kind)
    }
}

/// Orchestrates the message bus, the device simulators and the router.
pub struct SimulationEngine<B> {
    bus: Arc<B>,
    config: EngineConfig,
    state: watch::Sender<EngineState>,
}

impl<B> SimulationEngine<B>
where
    B: MessageBus + 'static,
{
    pub fn new(bus: B, config: EngineConfig) -> Self {
        Self::with_shared_bus(Arc::new(bus), config)
    }

    /// Build an engine on a bus the caller keeps a handle to.
    pub fn with_shared_bus(bus: Arc<B>, config: EngineConfig) -> Self {
        let (state, _) = watch::channel(EngineState::Idle);
        Self { bus, config, state }
    }

    /// Watch lifecycle transitions.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<EngineState> {
        self.state.subscribe()
    }

    /// Connect, run every simulator until `shutdown` resolves, then stop.
    ///
    /// The bus is disconnected on every path out of this function once
    /// the connection was attempted.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if connecting or subscribing fails; the
    /// engine is `Stopped` afterwards.
    pub async fn run<F>(self, shutdown: F) -> Result<EngineReport, EngineError>
    where
        F: Future<Output = ()> + Send,
    {
        self.transition(EngineState::Connecting);
        let events = match self.bus.connect().await {
            Ok(events) => events,
            Err(err) => {
                tracing::error!(%err, "connection failed");
                self.release().await;
                return Err(EngineError::Connect(err));
            }
        };
        tracing::info!("connected to message bus");

        if let Err(err) = self.subscribe_all().await {
            self.release().await;
            return Err(err);
        }

        let report = self.run_connected(events, shutdown).await;
        self.release().await;
        Ok(report)
    }

    async fn subscribe_all(&self) -> Result<(), EngineError> {
        for filter in topic::SUBSCRIPTIONS {
            self.bus
                .subscribe(filter)
                .await
                .map_err(|source| EngineError::Subscribe { filter, source })?;
            tracing::info!(%filter, "subscribed");
        }
        Ok(())
    }

    async fn run_connected<F>(&self, events: BusEvents, shutdown: F) -> EngineReport
    where
        F: Future<Output = ()> + Send,
    {
        let mut rng = self
            .config
            .seed
            .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        let (stop, stop_rx) = watch::channel(false);

        let mut router = CommandRouter::new(Arc::clone(&self.bus), rng.next_u64())
            .with_chat_delay(self.config.chat_delay);
        let simulators = self.spawn_simulators(&mut rng, &stop_rx, &mut router);
        let listener = tokio::spawn(listen(events, router, stop_rx));

        self.transition(EngineState::Running);
        shutdown.await;

        self.transition(EngineState::ShuttingDown);
        let _ = stop.send(true);

        let mut report = EngineReport::default();
        for handle in simulators {
            let kind = handle.kind();
            match handle.join().await {
                Ok(sim) => report.simulators.push(sim),
                Err(err) => tracing::error!(%kind, %err, "simulator task failed"),
            }
        }
        match listener.await {
            Ok(inbound) => report.inbound = inbound,
            Err(err) => tracing::error!(%err, "inbound listener failed"),
        }
        report
    }

    fn spawn_simulators(
        &self,
        rng: &mut StdRng,
        shutdown: &watch::Receiver<bool>,
        router: &mut CommandRouter<Arc<B>>,
    ) -> Vec<SimulatorHandle> {
        let kinds: BTreeSet<DeviceKind> = self.config.devices.iter().copied().collect();
        let active: Vec<DeviceKind> = kinds.iter().copied().collect();
        let started_at = Instant::now();

        kinds
            .into_iter()
            .map(|kind| {
                let device = match kind {
                    DeviceKind::Temperature => {
                        Device::Temperature(TemperatureSensor::new(self.config.location.clone()))
                    }
                    DeviceKind::Motion => Device::Motion(MotionSensor),
                    DeviceKind::Light => Device::Light(SmartLight::default()),
                    DeviceKind::Door => Device::Door(DoorSensor::default()),
                    DeviceKind::Energy => Device::Energy(EnergyMeter),
                    DeviceKind::Announcer => Device::Announcer(Announcer::new(
                        self.config.identity.clone(),
                        active.clone(),
                        started_at,
                    )),
                };
                let command_ids = device.command_ids();

                let mut simulator =
                    DeviceSimulator::new(device, Arc::clone(&self.bus), rng.next_u64());
                let schedule = self.config.schedules.iter().find(|(k, _)| *k == kind);
                if let Some((_, schedule)) = schedule {
                    simulator = simulator.with_schedule(*schedule);
                }
                let handle = simulator.spawn(shutdown.clone());
                for id in command_ids {
                    router.register(*id, handle.commands());
                }
                handle
            })
            .collect()
    }

    async fn release(&self) {
        if let Err(err) = self.bus.disconnect().await {
            tracing::warn!(%err, "failed to disconnect cleanly");
        }
        self.transition(EngineState::Stopped);
    }

    fn transition(&self, next: EngineState) {
        let previous = self.state.send_replace(next);
        tracing::debug!(from = %previous, to = %next, "engine state changed");
    }
}

/// Inbound listener: feeds every message to the router in arrival order.
///
/// Returns the number of messages routed.
async fn listen<B: MessageBus>(
    mut events: BusEvents,
    mut router: CommandRouter<B>,
    mut shutdown: watch::Receiver<bool>,
) -> u64 {
    let mut inbound = 0_u64;
    loop {
        if *shutdown.borrow_and_update() {
            break;
        }
        tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            event = events.recv() => match event {
                Some(BusEvent::Message(message)) => {
                    inbound += 1;
                    router.handle(message).await;
                }
                Some(BusEvent::Connected) => tracing::info!("message bus reconnected"),
                Some(BusEvent::Disconnected { reason }) => {
                    tracing::warn!(%reason, "message bus disconnected, waiting for reconnect");
                }
                None => {
                    tracing::warn!("inbound message stream ended");
                    break;
                }
            },
        }
    }
    inbound
}
