//! Status Module
//!
//! Reflects delivery outcomes and latest values locally. The agent pushes
//! events into a [`StatusSink`]; nothing flows back.

mod board;

pub use board::{SensorStatus, StatusBoard};

use async_trait::async_trait;
use habitat_shared::{DeliveryOutcome, SensorSample};

/// Consumer of per-tick feedback
#[async_trait]
pub trait StatusSink: Send + Sync {
    /// Called once per sensor per tick, in sensor order
    async fn on_outcome(&self, outcome: &DeliveryOutcome);

    /// Called once per tick with the samples acquired in it
    async fn on_samples(&self, samples: &[SensorSample]);
}
