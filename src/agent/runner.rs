//! Tick runner - sequences link, acquisition and delivery

use crate::config::{SensorConfig, TimingConfig};
use crate::connection::{AgentClock, LinkManager};
use crate::delivery::Deliverer;
use crate::sensors::{acquire, Acquisition, ReadingSource};
use crate::status::StatusSink;
use habitat_shared::{codec, DeliveryOutcome, SensorSample};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Where the agent is in its cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentPhase {
    /// Before the first tick
    Starting,
    /// Waiting on the link manager
    EnsuringLink,
    /// Visiting sensors
    Delivering { tick: u64 },
    /// Idle until `wake_at` (time since process start)
    Sleeping { tick: u64, wake_at: Duration },
}

/// Fixed pauses of the loop
#[derive(Debug, Clone, Copy)]
pub struct Pacing {
    pub tick_interval: Duration,
    /// Pause after each delivery attempt
    pub sensor_pause: Duration,
}

impl From<&TimingConfig> for Pacing {
    fn from(timing: &TimingConfig) -> Self {
        Self {
            tick_interval: timing.tick_interval(),
            sensor_pause: timing.sensor_pause(),
        }
    }
}

/// Outcomes of one tick, in sensor order
#[derive(Debug, Clone)]
pub struct TickReport {
    pub tick: u64,
    pub outcomes: Vec<DeliveryOutcome>,
}

impl TickReport {
    pub fn attempted(&self) -> usize {
        self.outcomes.iter().filter(|o| o.attempted).count()
    }

    pub fn delivered(&self) -> usize {
        self.outcomes.iter().filter(|o| o.succeeded).count()
    }
}

/// The top-level orchestrator
pub struct Agent {
    sensors: Vec<SensorConfig>,
    source: Arc<dyn ReadingSource>,
    link: LinkManager,
    delivery: Arc<dyn Deliverer>,
    sink: Arc<dyn StatusSink>,
    pacing: Pacing,
    clock: AgentClock,
    phase: AgentPhase,
    ticks: u64,
}

impl Agent {
    pub fn new(
        sensors: Vec<SensorConfig>,
        source: Arc<dyn ReadingSource>,
        link: LinkManager,
        delivery: Arc<dyn Deliverer>,
        sink: Arc<dyn StatusSink>,
        pacing: Pacing,
        clock: AgentClock,
    ) -> Self {
        Self {
            sensors,
            source,
            link,
            delivery,
            sink,
            pacing,
            clock,
            phase: AgentPhase::Starting,
            ticks: 0,
        }
    }

    pub fn phase(&self) -> AgentPhase {
        self.phase
    }

    pub fn link(&self) -> &LinkManager {
        &self.link
    }

    /// Run until the link manager escalates.
    ///
    /// With a process restart handler the process ends inside the
    /// escalation and this never returns.
    pub async fn run(mut self) {
        loop {
            let report = self.run_tick().await;
            info!(
                "[AGENT] Tick {} complete: {}/{} delivered, {} skipped",
                report.tick,
                report.delivered(),
                report.outcomes.len(),
                report.outcomes.len() - report.attempted()
            );

            if self.link.has_escalated() {
                error!("[AGENT] Link escalated after tick {}, stopping", report.tick);
                return;
            }

            self.sleep_until_next_tick().await;
        }
    }

    /// One full pass over all sensors
    pub async fn run_tick(&mut self) -> TickReport {
        self.ticks += 1;
        let tick = self.ticks;

        self.phase = AgentPhase::EnsuringLink;
        self.link.ensure().await;

        self.phase = AgentPhase::Delivering { tick };
        info!("[AGENT] Tick {}: link {}", tick, self.link.state());

        let mut outcomes = Vec::with_capacity(self.sensors.len());
        let mut samples = Vec::with_capacity(self.sensors.len());

        for sensor in &self.sensors {
            let outcome = match acquire(sensor, self.source.as_ref()).await {
                Acquisition::Ready(sample) => {
                    let outcome = self.deliver_sample(&sample).await;
                    samples.push(sample);
                    outcome
                }
                Acquisition::Unavailable { field, channel } => {
                    warn!(
                        "[SENSOR] {}: no {} on channel {}, skipping",
                        sensor.name, field, channel
                    );
                    DeliveryOutcome::skipped(&sensor.name)
                }
                Acquisition::Empty => {
                    warn!("[SENSOR] {}: no measurements this tick, skipping", sensor.name);
                    DeliveryOutcome::skipped(&sensor.name)
                }
            };

            self.sink.on_outcome(&outcome).await;
            let attempted = outcome.attempted;
            outcomes.push(outcome);

            if attempted {
                sleep(self.pacing.sensor_pause).await;
            }
        }

        self.sink.on_samples(&samples).await;

        TickReport { tick, outcomes }
    }

    /// The explicit wait between ticks
    pub async fn sleep_until_next_tick(&mut self) {
        let tick = self.ticks;
        let wake_at = self.clock.now() + self.pacing.tick_interval;
        self.phase = AgentPhase::Sleeping { tick, wake_at };
        debug!(
            "[AGENT] Sleeping {}ms until next tick",
            self.pacing.tick_interval.as_millis()
        );
        sleep(self.pacing.tick_interval).await;
    }

    async fn deliver_sample(&self, sample: &SensorSample) -> DeliveryOutcome {
        if !self.link.is_up() {
            debug!("[AGENT] {}: link down, not sending", sample.name);
            return DeliveryOutcome::skipped(&sample.name);
        }

        let record = match codec::encode(sample) {
            Ok(record) => record,
            Err(e) => {
                warn!("[AGENT] {}: {}", sample.name, e);
                return DeliveryOutcome::skipped(&sample.name);
            }
        };

        self.delivery.deliver(&sample.name, record).await
    }
}
