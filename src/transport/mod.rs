//! Link drivers
//!
//! A driver reports link-layer status and starts association. The
//! connectivity state machine on top lives in [`crate::connection`].

pub mod interface;
pub mod tcp;
pub mod traits;

pub use interface::InterfaceLink;
pub use tcp::TcpProbe;
pub use traits::LinkDriver;

use crate::config::LinkConfig;
use std::sync::Arc;
use std::time::Duration;

/// Build the driver selected by the configuration
pub fn from_config(config: &LinkConfig) -> Arc<dyn LinkDriver> {
    match config {
        LinkConfig::Interface(iface) => Arc::new(InterfaceLink::new(iface)),
        LinkConfig::Probe(probe) => Arc::new(TcpProbe::new(
            probe.address.clone(),
            Duration::from_millis(probe.probe_timeout_ms),
        )),
    }
}
