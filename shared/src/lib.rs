//! Habitat Shared Types
//!
//! This crate provides the sample types, wire record codec and link state
//! machine shared between the sensor node and the collector.

pub mod codec;
pub mod sample;
pub mod state_machine;

pub use codec::{Record, RecordError};
pub use sample::{DeliveryOutcome, Field, SensorSample};
pub use state_machine::{ConnectivityState, LinkEvent, LinkStateMachine, TransitionResult};

/// Default timing parameters for the node.
///
/// These are only defaults; the node takes every value from its
/// configuration at startup.
pub mod timing {
    /// How long one association attempt may take before it counts as failed
    pub const CONNECT_TIMEOUT_MS: u64 = 10_000;

    /// How long the link may stay down before the device restarts itself
    pub const RECOVER_TIMEOUT_MS: u64 = 30_000;

    /// Link status polling interval while associating
    pub const POLL_INTERVAL_MS: u64 = 500;

    /// Pause between two full passes over the sensors
    pub const TICK_INTERVAL_MS: u64 = 10_000;

    /// Pause after each delivery attempt
    pub const SENSOR_PAUSE_MS: u64 = 250;

    /// Upper bound for a single delivery round-trip
    pub const REQUEST_TIMEOUT_MS: u64 = 10_000;

    /// Status code the collector answers with when it accepted a record
    pub const COLLECTOR_OK: u16 = 200;
}
