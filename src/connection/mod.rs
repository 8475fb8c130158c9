//! Link management for an unreliable wireless connection
//!
//! This module handles:
//! - Tracking connectivity through the link state machine
//! - Bounded association attempts on every tick
//! - Restart escalation after a prolonged outage

mod manager;

pub use manager::{AgentClock, LinkManager, LinkTimeouts, ProcessRestart, RestartHandler};
