//! # iotsim-domain
//!
//! Pure domain model for the iotsim device simulator.
//!
//! ## Responsibilities
//! - Foundational types: error conventions, timestamps, delivery guarantees
//! - Define **device kinds** and the **readings** each kind publishes
//! - Define **commands** parsed from inbound payloads and their **acks**
//! - Define the stable **topic namespace** and topic-filter matching
//! - Define the canned **chat responses**
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod message;
pub mod time;
pub mod topic;

pub mod chat;
pub mod command;
pub mod connection;
pub mod device;
pub mod reading;
