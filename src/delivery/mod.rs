//! Record delivery to the collector
//!
//! One request per record, no retries. The outcome is reported, never
//! replayed.

mod client;

pub use client::{Deliverer, HttpDelivery};
