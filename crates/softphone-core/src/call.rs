//! Call session data model
//!
//! Lightweight views of the call legs owned by the signaling client. The
//! resilience layer never mutates these; it reads a fresh snapshot through
//! [`SignalingClient::call_sessions`](crate::signaling::SignalingClient::call_sessions)
//! every time it needs one.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Signaling state of a call leg
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallState {
    /// Leg is being set up (INVITE in flight)
    Setup,
    /// Remote side is ringing
    Ringing,
    /// Call is answered and media is flowing
    Answered,
    /// Call has ended
    Terminated,
    /// Call failed to establish
    Failed,
    /// Any other engine-specific state
    Other(String),
}

impl CallState {
    /// Check if the call has live media that a network change would strand
    pub fn is_answered(&self) -> bool {
        matches!(self, CallState::Answered)
    }

    /// Check if the call is in a terminated state
    pub fn is_terminated(&self) -> bool {
        matches!(self, CallState::Terminated | CallState::Failed)
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallState::Setup => write!(f, "setup"),
            CallState::Ringing => write!(f, "ringing"),
            CallState::Answered => write!(f, "answered"),
            CallState::Terminated => write!(f, "terminated"),
            CallState::Failed => write!(f, "failed"),
            CallState::Other(state) => write!(f, "{}", state),
        }
    }
}

/// Direction of a call (from the phone's perspective)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallDirection {
    Inbound,
    Outbound,
}

/// Identifiers of one call leg as known to the remote session-control API
///
/// This is what placing a call returns and what a bring-in request carries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallHandle {
    pub session_id: String,
    pub party_id: String,
}

impl CallHandle {
    pub fn new(session_id: impl Into<String>, party_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            party_id: party_id.into(),
        }
    }
}

impl fmt::Display for CallHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.session_id, self.party_id)
    }
}

/// Snapshot of one call session in the signaling client's collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallSessionInfo {
    /// Remote session identifier
    pub session_id: String,
    /// Remote party identifier
    pub party_id: String,
    /// Direction of the leg
    pub direction: CallDirection,
    /// Current signaling state
    pub state: CallState,
    /// Whether this leg is the local phone's conference leg
    pub is_conference: bool,
}

impl CallSessionInfo {
    pub fn new(
        session_id: impl Into<String>,
        party_id: impl Into<String>,
        direction: CallDirection,
        state: CallState,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            party_id: party_id.into(),
            direction,
            state,
            is_conference: false,
        }
    }

    /// Mark this session as the conference leg
    pub fn as_conference(mut self) -> Self {
        self.is_conference = true;
        self
    }

    pub fn handle(&self) -> CallHandle {
        CallHandle::new(self.session_id.clone(), self.party_id.clone())
    }
}
