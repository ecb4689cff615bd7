//! State machine for tracking one extraction run
//!
//! Transitions are strictly sequential; the only branch is the terminal
//! Failed state, reachable from every non-terminal state. The machine lives
//! and dies with a single publisher invocation, so history is in-memory only.

use crate::core::error::ExtractError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pipeline state of an extraction run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExtractionState {
    Pending,
    Acquiring,
    Unpacking,
    ExtractingRoot,
    ExtractingChildren,
    Reconciling,
    Archiving,
    Committing,
    Done,
    Failed,
}

impl ExtractionState {
    /// Next state in the sequential pipeline, None for terminal states
    fn successor(&self) -> Option<ExtractionState> {
        match self {
            Self::Pending => Some(Self::Acquiring),
            Self::Acquiring => Some(Self::Unpacking),
            Self::Unpacking => Some(Self::ExtractingRoot),
            Self::ExtractingRoot => Some(Self::ExtractingChildren),
            Self::ExtractingChildren => Some(Self::Reconciling),
            Self::Reconciling => Some(Self::Archiving),
            Self::Archiving => Some(Self::Committing),
            Self::Committing => Some(Self::Done),
            Self::Done | Self::Failed => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// State transition record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StateTransition {
    /// From state
    pub from: ExtractionState,

    /// To state
    pub to: ExtractionState,

    /// Timestamp
    pub timestamp: DateTime<Utc>,

    /// Additional detail (error code on failure)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// State machine owned by one publisher invocation
pub struct ExtractionStateMachine {
    current_state: ExtractionState,
    transitions: Vec<StateTransition>,
}

impl Default for ExtractionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractionStateMachine {
    /// Create a new state machine in the Pending state
    pub fn new() -> Self {
        Self {
            current_state: ExtractionState::Pending,
            transitions: Vec::new(),
        }
    }

    /// Advance to the next sequential state.
    ///
    /// Any jump that is not the declared successor of the current state is
    /// rejected; skipping or repeating a stage is a pipeline bug, not a
    /// recoverable condition.
    pub fn advance(&mut self, to: ExtractionState) -> Result<(), ExtractError> {
        if self.current_state.successor() != Some(to) {
            return Err(ExtractError::IllegalStateTransition {
                from: format!("{:?}", self.current_state),
                to: format!("{:?}", to),
            });
        }

        self.record(to, None);
        Ok(())
    }

    /// Enter the terminal Failed state from any non-terminal state
    pub fn fail(&mut self, detail: &str) -> Result<(), ExtractError> {
        if self.current_state.is_terminal() {
            return Err(ExtractError::IllegalStateTransition {
                from: format!("{:?}", self.current_state),
                to: format!("{:?}", ExtractionState::Failed),
            });
        }

        self.record(ExtractionState::Failed, Some(detail.to_string()));
        Ok(())
    }

    fn record(&mut self, to: ExtractionState, detail: Option<String>) {
        self.transitions.push(StateTransition {
            from: self.current_state,
            to,
            timestamp: Utc::now(),
            detail,
        });
        self.current_state = to;
    }

    /// Get current state
    pub fn state(&self) -> ExtractionState {
        self.current_state
    }

    /// Get state transition history
    pub fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }

    /// Get elapsed time between first and last transition in milliseconds
    pub fn elapsed_ms(&self) -> i64 {
        match (self.transitions.first(), self.transitions.last()) {
            (Some(first), Some(last)) => {
                (last.timestamp - first.timestamp).num_milliseconds()
            }
            _ => 0,
        }
    }

    /// Get transition history as human-readable string
    pub fn history(&self) -> String {
        self.transitions
            .iter()
            .map(|t| {
                let detail = t
                    .detail
                    .as_ref()
                    .map(|d| format!(" ({})", d))
                    .unwrap_or_default();
                format!(
                    "{}: {:?} → {:?}{}",
                    t.timestamp.to_rfc3339(),
                    t.from,
                    t.to,
                    detail
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_machine() {
        let machine = ExtractionStateMachine::new();

        assert_eq!(machine.state(), ExtractionState::Pending);
        assert!(machine.transitions().is_empty());
    }

    #[test]
    fn test_full_sequential_run() {
        let mut machine = ExtractionStateMachine::new();

        for state in [
            ExtractionState::Acquiring,
            ExtractionState::Unpacking,
            ExtractionState::ExtractingRoot,
            ExtractionState::ExtractingChildren,
            ExtractionState::Reconciling,
            ExtractionState::Archiving,
            ExtractionState::Committing,
            ExtractionState::Done,
        ] {
            machine.advance(state).unwrap();
        }

        assert_eq!(machine.state(), ExtractionState::Done);
        assert!(machine.state().is_terminal());
        assert_eq!(machine.transitions().len(), 8);
    }

    #[test]
    fn test_skipping_a_stage_is_rejected() {
        let mut machine = ExtractionStateMachine::new();
        machine.advance(ExtractionState::Acquiring).unwrap();

        let result = machine.advance(ExtractionState::Committing);
        assert!(matches!(
            result,
            Err(ExtractError::IllegalStateTransition { .. })
        ));
        // The rejected jump must not move the machine
        assert_eq!(machine.state(), ExtractionState::Acquiring);
    }

    #[test]
    fn test_failed_reachable_from_any_non_terminal_state() {
        let mut machine = ExtractionStateMachine::new();
        machine.advance(ExtractionState::Acquiring).unwrap();
        machine.advance(ExtractionState::Unpacking).unwrap();

        machine.fail("GIT_CLONE_ERROR").unwrap();

        assert_eq!(machine.state(), ExtractionState::Failed);
        let last = machine.transitions().last().unwrap();
        assert_eq!(last.detail.as_deref(), Some("GIT_CLONE_ERROR"));
    }

    #[test]
    fn test_failed_is_terminal() {
        let mut machine = ExtractionStateMachine::new();
        machine.fail("UNKNOWN_FILETYPE").unwrap();

        assert!(machine.fail("again").is_err());
        assert!(machine.advance(ExtractionState::Acquiring).is_err());
    }

    #[test]
    fn test_done_cannot_fail() {
        let mut machine = ExtractionStateMachine::new();
        for state in [
            ExtractionState::Acquiring,
            ExtractionState::Unpacking,
            ExtractionState::ExtractingRoot,
            ExtractionState::ExtractingChildren,
            ExtractionState::Reconciling,
            ExtractionState::Archiving,
            ExtractionState::Committing,
            ExtractionState::Done,
        ] {
            machine.advance(state).unwrap();
        }

        assert!(machine.fail("late").is_err());
    }

    #[test]
    fn test_history_rendering() {
        let mut machine = ExtractionStateMachine::new();
        machine.advance(ExtractionState::Acquiring).unwrap();
        machine.advance(ExtractionState::Unpacking).unwrap();

        let history = machine.history();
        assert!(history.contains("Pending → Acquiring"));
        assert!(history.contains("Acquiring → Unpacking"));
    }

    #[test]
    fn test_elapsed_ms_counts_from_first_transition() {
        let mut machine = ExtractionStateMachine::new();
        assert_eq!(machine.elapsed_ms(), 0);

        machine.advance(ExtractionState::Acquiring).unwrap();
        machine.advance(ExtractionState::Unpacking).unwrap();
        assert!(machine.elapsed_ms() >= 0);
    }
}
