//! Link State Machine
//!
//! Defines valid connectivity transitions and the restart escalation rule.
//! Time is passed in as an offset from process start, so the machine itself
//! holds no clock and every transition can be driven from tests.

use std::fmt;
use std::time::Duration;

/// Connectivity of the device's network link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityState {
    /// Associated and usable
    Connected,
    /// An association attempt is in progress
    Connecting,
    /// Not associated; `since` marks the start of the outage
    Disconnected { since: Duration },
}

impl ConnectivityState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectivityState::Connected)
    }
}

impl fmt::Display for ConnectivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectivityState::Connected => write!(f, "connected"),
            ConnectivityState::Connecting => write!(f, "connecting"),
            ConnectivityState::Disconnected { since } => {
                write!(f, "disconnected since {}ms", since.as_millis())
            }
        }
    }
}

/// Events that can trigger state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    /// Link layer reports an association
    Associated,
    /// Link layer reports loss of a previously good association
    LinkLost,
    /// A new association attempt begins
    AttemptStarted,
    /// The attempt did not succeed within the connect timeout
    AttemptTimedOut,
    /// The outage has outlasted the recovery timeout
    RecoveryExpired,
}

/// Result of a state transition attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionResult {
    /// Transition was valid; carries the resulting state
    Success(ConnectivityState),
    /// Transition was invalid from current state
    Invalid {
        from: ConnectivityState,
        event: LinkEvent,
    },
    /// The device must restart
    Escalate { reason: String },
}

/// The connectivity state machine for one link
#[derive(Debug)]
pub struct LinkStateMachine {
    current_state: ConnectivityState,
    /// Start of the current outage, kept while retrying through `Connecting`
    outage_since: Option<Duration>,
    recover_timeout: Duration,
}

impl LinkStateMachine {
    /// Create a new state machine in `Connecting` state
    pub fn new(recover_timeout: Duration) -> Self {
        Self {
            current_state: ConnectivityState::Connecting,
            outage_since: None,
            recover_timeout,
        }
    }

    /// Get current state
    pub fn state(&self) -> ConnectivityState {
        self.current_state
    }

    /// Start of the current outage, if there is one
    pub fn outage_since(&self) -> Option<Duration> {
        self.outage_since
    }

    /// Whether the outage has lasted longer than the recovery timeout
    pub fn is_recovery_expired(&self, now: Duration) -> bool {
        match self.current_state {
            ConnectivityState::Disconnected { since } => {
                now.saturating_sub(since) > self.recover_timeout
            }
            _ => false,
        }
    }

    /// Check the recovery rule and return the event it raises, if any
    pub fn check_recovery(&self, now: Duration) -> Option<LinkEvent> {
        self.is_recovery_expired(now)
            .then_some(LinkEvent::RecoveryExpired)
    }

    /// Process an event and return the transition result
    pub fn process_event(&mut self, event: LinkEvent, now: Duration) -> TransitionResult {
        if event == LinkEvent::RecoveryExpired {
            return match self.current_state {
                ConnectivityState::Disconnected { since } if self.is_recovery_expired(now) => {
                    TransitionResult::Escalate {
                        reason: format!(
                            "link down for {}ms (limit {}ms)",
                            now.saturating_sub(since).as_millis(),
                            self.recover_timeout.as_millis()
                        ),
                    }
                }
                from => TransitionResult::Invalid { from, event },
            };
        }

        match self.get_next_state(event, now) {
            Some(state) => {
                self.outage_since = match state {
                    ConnectivityState::Connected => None,
                    ConnectivityState::Disconnected { since } => Some(since),
                    ConnectivityState::Connecting => self.outage_since,
                };
                self.current_state = state;
                TransitionResult::Success(state)
            }
            None => TransitionResult::Invalid {
                from: self.current_state,
                event,
            },
        }
    }

    /// Get the next state for a given event, if the transition is valid
    fn get_next_state(&self, event: LinkEvent, now: Duration) -> Option<ConnectivityState> {
        use ConnectivityState::*;
        use LinkEvent::*;

        match (self.current_state, event) {
            // Association clears the outage from any state
            (_, Associated) => Some(Connected),

            // Loss is only meaningful while connected
            (Connected, LinkLost) => Some(Disconnected { since: now }),

            // Every retry passes through Connecting
            (Disconnected { .. } | Connecting, AttemptStarted) => Some(Connecting),

            // A failed attempt keeps the outage start of the current episode
            (Connecting, AttemptTimedOut) => Some(Disconnected {
                since: self.outage_since.unwrap_or(now),
            }),

            // Invalid transition
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECOVER: Duration = Duration::from_secs(30);

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn test_initial_state() {
        let fsm = LinkStateMachine::new(RECOVER);
        assert_eq!(fsm.state(), ConnectivityState::Connecting);
        assert_eq!(fsm.outage_since(), None);
    }

    #[test]
    fn test_first_association() {
        let mut fsm = LinkStateMachine::new(RECOVER);
        let result = fsm.process_event(LinkEvent::Associated, secs(2));
        assert_eq!(result, TransitionResult::Success(ConnectivityState::Connected));
        assert!(fsm.state().is_connected());
    }

    #[test]
    fn test_failed_attempt_disconnects() {
        let mut fsm = LinkStateMachine::new(RECOVER);
        fsm.process_event(LinkEvent::AttemptStarted, secs(0));
        let result = fsm.process_event(LinkEvent::AttemptTimedOut, secs(10));
        assert_eq!(
            result,
            TransitionResult::Success(ConnectivityState::Disconnected { since: secs(10) })
        );
    }

    #[test]
    fn test_outage_start_set_once_per_episode() {
        let mut fsm = LinkStateMachine::new(RECOVER);
        fsm.process_event(LinkEvent::Associated, secs(1));
        fsm.process_event(LinkEvent::LinkLost, secs(5));

        // Two more failed attempts must not move the outage start
        for start in [5, 20] {
            fsm.process_event(LinkEvent::AttemptStarted, secs(start));
            assert_eq!(fsm.state(), ConnectivityState::Connecting);
            assert_eq!(fsm.outage_since(), Some(secs(5)));
            fsm.process_event(LinkEvent::AttemptTimedOut, secs(start + 10));
        }
        assert_eq!(
            fsm.state(),
            ConnectivityState::Disconnected { since: secs(5) }
        );

        // Reconnection clears it, the next loss starts a new episode
        fsm.process_event(LinkEvent::AttemptStarted, secs(40));
        fsm.process_event(LinkEvent::Associated, secs(41));
        assert_eq!(fsm.outage_since(), None);
        fsm.process_event(LinkEvent::LinkLost, secs(60));
        assert_eq!(fsm.outage_since(), Some(secs(60)));
    }

    #[test]
    fn test_recovery_timeout_escalates() {
        let mut fsm = LinkStateMachine::new(RECOVER);
        fsm.process_event(LinkEvent::Associated, secs(0));
        fsm.process_event(LinkEvent::LinkLost, secs(10));

        assert!(!fsm.is_recovery_expired(secs(40)));
        assert_eq!(fsm.check_recovery(secs(40)), None);

        assert!(fsm.is_recovery_expired(secs(41)));
        assert_eq!(fsm.check_recovery(secs(41)), Some(LinkEvent::RecoveryExpired));
        let result = fsm.process_event(LinkEvent::RecoveryExpired, secs(41));
        assert!(matches!(result, TransitionResult::Escalate { .. }));
    }

    #[test]
    fn test_recovery_not_checked_while_connecting() {
        let mut fsm = LinkStateMachine::new(RECOVER);
        fsm.process_event(LinkEvent::AttemptStarted, secs(0));
        assert!(!fsm.is_recovery_expired(secs(1000)));
        let result = fsm.process_event(LinkEvent::RecoveryExpired, secs(1000));
        assert!(matches!(result, TransitionResult::Invalid { .. }));
    }

    #[test]
    fn test_invalid_transition() {
        let mut fsm = LinkStateMachine::new(RECOVER);

        // Can't lose a link that never came up
        let result = fsm.process_event(LinkEvent::LinkLost, secs(1));
        assert!(matches!(result, TransitionResult::Invalid { .. }));
        assert_eq!(fsm.state(), ConnectivityState::Connecting);

        // Timeouts only apply to a running attempt
        fsm.process_event(LinkEvent::Associated, secs(2));
        let result = fsm.process_event(LinkEvent::AttemptTimedOut, secs(3));
        assert!(matches!(result, TransitionResult::Invalid { .. }));
        assert!(fsm.state().is_connected());
    }
}
