use crate::error::WorkflowError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    Init,
    FannedOut,
    Validated,
    Resolved,
    SafetyChecked,
    Committed,
    FailedSafe,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Init => "INIT",
            SessionState::FannedOut => "FANNED_OUT",
            SessionState::Validated => "VALIDATED",
            SessionState::Resolved => "RESOLVED",
            SessionState::SafetyChecked => "SAFETY_CHECKED",
            SessionState::Committed => "COMMITTED",
            SessionState::FailedSafe => "FAILED_SAFE",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Committed | SessionState::FailedSafe)
    }

    /// The one forward step out of this state, if any
    fn next(self) -> Option<SessionState> {
        match self {
            SessionState::Init => Some(SessionState::FannedOut),
            SessionState::FannedOut => Some(SessionState::Validated),
            SessionState::Validated => Some(SessionState::Resolved),
            SessionState::Resolved => Some(SessionState::SafetyChecked),
            SessionState::SafetyChecked => Some(SessionState::Committed),
            SessionState::Committed | SessionState::FailedSafe => None,
        }
    }

    /// Forward steps are strictly sequential; FAILED_SAFE is reachable from
    /// every non-terminal state.
    pub fn can_transition_to(self, to: SessionState) -> bool {
        if self.is_terminal() {
            return false;
        }
        to == SessionState::FailedSafe || self.next() == Some(to)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One audited step of a session
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Transition {
    pub session_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub from: SessionState,
    pub to: SessionState,
    pub trigger: String,
}

/// Current state of one session plus every step taken to reach it
#[derive(Debug)]
pub struct Machine {
    session_id: Uuid,
    state: SessionState,
    trail: Vec<Transition>,
}

impl Machine {
    pub fn new(session_id: Uuid) -> Self {
        Self {
            session_id,
            state: SessionState::Init,
            trail: Vec::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn trail(&self) -> &[Transition] {
        &self.trail
    }

    pub fn advance(
        &mut self,
        to: SessionState,
        trigger: impl Into<String>,
    ) -> Result<Transition, WorkflowError> {
        if !self.state.can_transition_to(to) {
            return Err(WorkflowError::IllegalTransition {
                from: self.state.to_string(),
                to: to.to_string(),
            });
        }

        let transition = Transition {
            session_id: self.session_id,
            timestamp: Utc::now(),
            from: self.state,
            to,
            trigger: trigger.into(),
        };
        info!(
            "Session {}: {} -> {} ({})",
            self.session_id, transition.from, transition.to, transition.trigger
        );

        self.state = to;
        self.trail.push(transition.clone());
        Ok(transition)
    }
}
