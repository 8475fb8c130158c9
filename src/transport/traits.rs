//! Link driver abstraction for pluggable network backends

use anyhow::Result;
use async_trait::async_trait;

/// Access to the device's network link
///
/// The link manager owns the connectivity state; a driver only reports what
/// the link layer sees and knows how to start an association.
#[async_trait]
pub trait LinkDriver: Send + Sync {
    /// Whether the link layer currently reports an association
    async fn is_associated(&self) -> bool;

    /// Start an association attempt without waiting for it to finish
    async fn begin_association(&self) -> Result<()>;

    /// Human-readable name for this link
    fn name(&self) -> &'static str;
}
