//! # iotsim-app
//!
//! Application layer: the concurrent device-simulation engine and the
//! **port definitions** (traits) it drives.
//!
//! ## Responsibilities
//! - Define the **`MessageBus` port** that transport adapters implement
//! - Model per-kind **scheduling policies** (fixed or bounded-random cadence)
//! - Own each device's **simulated state** inside a dedicated actor task
//! - Route inbound command and chat messages (`CommandRouter`)
//! - Orchestrate connect → subscribe → run → shutdown (`SimulationEngine`)
//! - Provide an **in-process bus** (`InMemoryBus`) that doesn't need IO
//!
//! ## Dependency rule
//! Depends on `iotsim-domain` only (plus `tokio` and `rand`).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod devices;
pub mod engine;
pub mod in_memory_bus;
pub mod ports;
pub mod router;
pub mod schedule;
pub mod simulator;
