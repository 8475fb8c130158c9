//! Agent loop
//!
//! One tick: ensure the link, then acquire, encode and deliver each sensor
//! in configured order, reporting every outcome to the status sink. Ticks
//! are separated by an explicit sleep phase.

mod runner;

pub use runner::{Agent, AgentPhase, Pacing, TickReport};
