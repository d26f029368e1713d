use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Write state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteState {
    Idle,
    AwaitingSignature,
    Submitted,
    Confirmed,
    Reverted,
    Cancelled,
    Failed,
}

impl WriteState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Confirmed | Self::Reverted | Self::Cancelled | Self::Failed
        )
    }

    pub fn is_in_flight(self) -> bool {
        matches!(self, Self::AwaitingSignature | Self::Submitted)
    }

    /// Legal moves of the single-write state machine. A multi-step action
    /// (approve, then stake) goes back to `AwaitingSignature` after each
    /// submitted step.
    pub fn can_transition_to(self, next: WriteState) -> bool {
        use WriteState::*;
        match (self, next) {
            (Idle, AwaitingSignature | Failed) => true,
            (AwaitingSignature, Submitted | Cancelled | Failed) => true,
            (Submitted, AwaitingSignature | Confirmed | Reverted | Failed) => true,
            (s, Idle) => s.is_terminal(),
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// PendingAction
// ---------------------------------------------------------------------------

/// A user-initiated write and how far it got.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingAction {
    pub control: String,
    /// Contract function the action ends in, e.g. `stake`.
    pub label: String,
    pub args: Vec<String>,
    pub state: WriteState,
    pub tx_hashes: Vec<String>,
    /// Toast that reported the outcome. Dismissing it discards the action.
    pub toast_id: Option<String>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl PendingAction {
    pub fn new(control: impl Into<String>, label: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            control: control.into(),
            label: label.into(),
            args,
            state: WriteState::Idle,
            tx_hashes: Vec::new(),
            toast_id: None,
            error: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Move to `next` if the state machine allows it. Returns whether the
    /// state changed.
    pub fn advance(&mut self, next: WriteState) -> bool {
        if !self.state.can_transition_to(next) {
            return false;
        }
        self.state = next;
        if next.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
        true
    }

    pub fn fail(&mut self, state: WriteState, error: impl Into<String>) -> bool {
        let moved = self.advance(state);
        if moved {
            self.error = Some(error.into());
        }
        moved
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_terminal()
    }
}
