/// Round state machine
///
/// Represents the lifecycle of the game loop with explicit, checked transitions.
///
/// ```text
/// Locating ──start──▶ Active ──round_ended──▶ AwaitingResume ──terminate──▶ Terminated
///                       ▲                          │
///                       └────────resume────────────┘
/// ```

/// State of the game loop
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum RoundState {
    /// Finding the game window and pressing start
    #[default]
    Locating,

    /// Detecting and clicking objects until the round-end control appears
    Active,

    /// Round over, waiting one time unit for operator activity
    AwaitingResume,

    /// Operator stopped the loop
    Terminated,
}

impl RoundState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RoundState::Terminated)
    }

    /// Get a human-readable description of the state
    pub fn description(&self) -> &'static str {
        match self {
            RoundState::Locating => "Locating game window",
            RoundState::Active => "Playing round",
            RoundState::AwaitingResume => "Waiting before next round",
            RoundState::Terminated => "Stopped",
        }
    }
}

/// Rejected transition: the machine was not in the required state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionError {
    pub from: RoundState,
    pub to: RoundState,
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Cannot move from {:?} to {:?}", self.from, self.to)
    }
}

impl std::error::Error for TransitionError {}

/// State machine for round transitions
#[derive(Debug, Default)]
pub struct RoundStateMachine {
    state: RoundState,
}

impl RoundStateMachine {
    /// Create a new state machine in the Locating state
    pub fn new() -> Self {
        Self {
            state: RoundState::Locating,
        }
    }

    /// Get the current state
    pub fn state(&self) -> RoundState {
        self.state
    }

    fn transition(&mut self, from: RoundState, to: RoundState) -> Result<(), TransitionError> {
        if self.state != from {
            return Err(TransitionError {
                from: self.state,
                to,
            });
        }
        tracing::debug!("Round state: {:?} -> {:?}", from, to);
        self.state = to;
        Ok(())
    }

    /// Start control clicked
    pub fn start(&mut self) -> Result<(), TransitionError> {
        self.transition(RoundState::Locating, RoundState::Active)
    }

    /// Round-end control seen
    pub fn round_ended(&mut self) -> Result<(), TransitionError> {
        self.transition(RoundState::Active, RoundState::AwaitingResume)
    }

    /// Wait timed out, next round started
    pub fn resume(&mut self) -> Result<(), TransitionError> {
        self.transition(RoundState::AwaitingResume, RoundState::Active)
    }

    /// Operator activity during the wait
    pub fn terminate(&mut self) -> Result<(), TransitionError> {
        self.transition(RoundState::AwaitingResume, RoundState::Terminated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_cycle() {
        let mut sm = RoundStateMachine::new();
        assert_eq!(sm.state(), RoundState::Locating);

        assert!(sm.start().is_ok());
        assert_eq!(sm.state(), RoundState::Active);

        assert!(sm.round_ended().is_ok());
        assert_eq!(sm.state(), RoundState::AwaitingResume);

        assert!(sm.resume().is_ok());
        assert_eq!(sm.state(), RoundState::Active);

        assert!(sm.round_ended().is_ok());
        assert!(sm.terminate().is_ok());
        assert!(sm.state().is_terminal());
    }

    #[test]
    fn test_illegal_transitions_rejected() {
        let mut sm = RoundStateMachine::new();

        // Cannot end a round that never started
        assert_eq!(
            sm.round_ended(),
            Err(TransitionError {
                from: RoundState::Locating,
                to: RoundState::AwaitingResume,
            })
        );

        sm.start().unwrap();
        assert!(sm.start().is_err());
        assert!(sm.terminate().is_err());
        assert_eq!(sm.state(), RoundState::Active);
    }

    #[test]
    fn test_terminated_is_final() {
        let mut sm = RoundStateMachine::new();
        sm.start().unwrap();
        sm.round_ended().unwrap();
        sm.terminate().unwrap();

        assert!(sm.resume().is_err());
        assert!(sm.start().is_err());
        assert!(sm.round_ended().is_err());
        assert_eq!(sm.state(), RoundState::Terminated);
    }

    #[test]
    fn test_descriptions() {
        assert_eq!(RoundState::default(), RoundState::Locating);
        assert_eq!(RoundState::Terminated.description(), "Stopped");
    }
}
