//! Link manager with bounded association attempts and restart escalation

use crate::config::TimingConfig;
use crate::transport::LinkDriver;
use habitat_shared::{ConnectivityState, LinkEvent, LinkStateMachine, TransitionResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

/// Process-wide monotonic clock
///
/// Starts at zero with the process; a restart begins a fresh timeline.
#[derive(Debug, Clone, Copy)]
pub struct AgentClock {
    start: Instant,
}

impl AgentClock {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Time since process start
    pub fn now(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Performs the device restart when the link cannot be recovered
///
/// Production implementations end the process and do not return.
pub trait RestartHandler: Send + Sync {
    fn restart(&self, reason: &str);
}

/// Restart by exiting; the supervisor starts the next life
pub struct ProcessRestart {
    exit_code: i32,
}

impl ProcessRestart {
    pub fn new(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

impl RestartHandler for ProcessRestart {
    fn restart(&self, reason: &str) {
        error!("[LINK] Restarting device: {}", reason);
        std::process::exit(self.exit_code);
    }
}

/// Timeouts driving the link manager
#[derive(Debug, Clone, Copy)]
pub struct LinkTimeouts {
    /// Budget for one association attempt
    pub connect_timeout: Duration,
    /// Longest tolerated outage before restart
    pub recover_timeout: Duration,
    /// Status polling interval during an attempt
    pub poll_interval: Duration,
}

impl From<&TimingConfig> for LinkTimeouts {
    fn from(timing: &TimingConfig) -> Self {
        Self {
            connect_timeout: timing.connect_timeout(),
            recover_timeout: timing.recover_timeout(),
            poll_interval: timing.poll_interval(),
        }
    }
}

/// Owns the connectivity state of the device's link
pub struct LinkManager {
    timeouts: LinkTimeouts,
    driver: Arc<dyn LinkDriver>,
    restart: Arc<dyn RestartHandler>,
    clock: AgentClock,
    fsm: LinkStateMachine,
    escalated: bool,
}

impl LinkManager {
    pub fn new(
        timeouts: LinkTimeouts,
        driver: Arc<dyn LinkDriver>,
        restart: Arc<dyn RestartHandler>,
        clock: AgentClock,
    ) -> Self {
        Self {
            fsm: LinkStateMachine::new(timeouts.recover_timeout),
            timeouts,
            driver,
            restart,
            clock,
            escalated: false,
        }
    }

    /// Current connectivity state
    pub fn state(&self) -> ConnectivityState {
        self.fsm.state()
    }

    /// Whether records can be delivered right now
    pub fn is_up(&self) -> bool {
        !self.escalated && self.fsm.state().is_connected()
    }

    /// Whether the restart escalation has been triggered
    pub fn has_escalated(&self) -> bool {
        self.escalated
    }

    /// Bring the link up if it is not.
    ///
    /// A no-op status check while connected. Otherwise blocks for at most
    /// one association attempt, or escalates to a restart when the outage
    /// has outlasted the recovery timeout. The result is observed through
    /// [`LinkManager::is_up`].
    pub async fn ensure(&mut self) {
        if self.escalated {
            return;
        }

        let associated = self.driver.is_associated().await;
        let now = self.clock.now();

        if associated {
            if !self.fsm.state().is_connected() {
                self.apply(LinkEvent::Associated, now);
            }
            return;
        }

        if self.fsm.state().is_connected() {
            self.apply(LinkEvent::LinkLost, now);
        }

        if let Some(event) = self.fsm.check_recovery(now) {
            if let TransitionResult::Escalate { reason } = self.fsm.process_event(event, now) {
                self.escalate(&reason);
                return;
            }
        }

        self.associate().await;
    }

    /// Run one association attempt, polling until it succeeds or times out
    async fn associate(&mut self) {
        let started = self.clock.now();
        self.apply(LinkEvent::AttemptStarted, started);

        if let Err(e) = self.driver.begin_association().await {
            warn!("[LINK] Could not start association via {}: {}", self.driver.name(), e);
        }

        loop {
            if self.driver.is_associated().await {
                let now = self.clock.now();
                self.apply(LinkEvent::Associated, now);
                return;
            }

            let now = self.clock.now();
            if now.saturating_sub(started) >= self.timeouts.connect_timeout {
                self.apply(LinkEvent::AttemptTimedOut, now);
                return;
            }

            sleep(self.timeouts.poll_interval).await;
        }
    }

    fn escalate(&mut self, reason: &str) {
        self.escalated = true;
        error!("[LINK] Link unrecoverable: {}", reason);
        self.restart.restart(reason);
    }

    fn apply(&mut self, event: LinkEvent, now: Duration) {
        let from = self.fsm.state();
        match self.fsm.process_event(event, now) {
            TransitionResult::Success(to) if from != to => match to {
                ConnectivityState::Connected => {
                    info!("[LINK] Connected via {} ({} -> {})", self.driver.name(), from, to)
                }
                ConnectivityState::Disconnected { .. } => {
                    warn!("[LINK] {} -> {}", from, to)
                }
                ConnectivityState::Connecting => debug!("[LINK] {} -> {}", from, to),
            },
            TransitionResult::Invalid { from, event } => {
                debug!("[LINK] Ignored {:?} in state {}", event, from)
            }
            _ => {}
        }
    }
}
