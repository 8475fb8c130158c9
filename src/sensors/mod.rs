//! Reading sources and sample acquisition
//!
//! Raw channel values come from a [`ReadingSource`]; [`acquire`] turns the
//! channels of one configured sensor into a [`habitat_shared::SensorSample`].

mod acquire;
mod source;

pub use acquire::{acquire, Acquisition};
pub use source::{FileSource, SimulatedSource};

use crate::config::SourceConfig;
use async_trait::async_trait;
use std::sync::Arc;

/// One raw value from one channel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub value: f64,
    /// False means "no data this tick"
    pub valid: bool,
}

impl Reading {
    /// A reading is valid when its value is finite
    pub fn new(value: f64) -> Self {
        Self {
            value,
            valid: value.is_finite(),
        }
    }

    pub fn invalid() -> Self {
        Self {
            value: f64::NAN,
            valid: false,
        }
    }
}

/// Provides raw readings for measurement channels
#[async_trait]
pub trait ReadingSource: Send + Sync {
    async fn read(&self, channel: &str) -> Reading;
}

/// Build the source selected by the configuration
pub fn from_config(config: &SourceConfig) -> Arc<dyn ReadingSource> {
    match config {
        SourceConfig::Simulated => Arc::new(SimulatedSource::new()),
        SourceConfig::File { root } => Arc::new(FileSource::new(root.clone())),
    }
}
