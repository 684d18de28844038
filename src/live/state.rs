use serde::{Deserialize, Serialize};

/// Lifecycle of one live session. Transitions only move forward; a closed
/// session is never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SessionState {
    #[default]
    Idle,
    /// Output opened, waiting on the remote channel and the microphone.
    Connecting,
    /// Capturing and playing.
    Active,
    Closed,
}

/// Requests that may move a session to another state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionRequest {
    Start,
    /// Remote channel open and capture running.
    Ready,
    /// Acquisition failure or transport fault.
    Fail,
    Stop,
}

impl SessionState {
    /// Pure function: (current, request) -> next. `None` means the request is
    /// ignored in this state.
    pub fn transition(self, request: SessionRequest) -> Option<SessionState> {
        use SessionRequest::*;
        use SessionState::*;

        match (self, request) {
            (Idle, Start) => Some(Connecting),
            (Connecting, Ready) => Some(Active),
            (Connecting, Fail) | (Active, Fail) => Some(Closed),
            (Idle, Stop) | (Connecting, Stop) | (Active, Stop) => Some(Closed),
            _ => None,
        }
    }

    pub fn is_closed(self) -> bool {
        self == SessionState::Closed
    }
}
