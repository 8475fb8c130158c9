//! TCP reachability probe used as a link driver on wired or bench nodes

use crate::transport::traits::LinkDriver;
use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

/// Treats the link as up when a TCP connection to `address` can be opened
pub struct TcpProbe {
    address: String,
    probe_timeout: Duration,
}

impl TcpProbe {
    pub fn new(address: String, probe_timeout: Duration) -> Self {
        Self {
            address,
            probe_timeout,
        }
    }
}

#[async_trait]
impl LinkDriver for TcpProbe {
    async fn is_associated(&self) -> bool {
        match timeout(self.probe_timeout, TcpStream::connect(&self.address)).await {
            Ok(Ok(_stream)) => true,
            Ok(Err(e)) => {
                debug!("[LINK] Probe {} failed: {}", self.address, e);
                false
            }
            Err(_) => {
                debug!("[LINK] Probe {} timed out", self.address);
                false
            }
        }
    }

    async fn begin_association(&self) -> Result<()> {
        // Nothing to drive; the next probe decides
        Ok(())
    }

    fn name(&self) -> &'static str {
        "tcp-probe"
    }
}
