//! Error types and handling for the softphone-core library
//!
//! Errors are grouped the same way the resilience layer reacts to them:
//!
//! - **Connectivity** - the signaling transport could not be restarted. The
//!   transport watchdog absorbs these and keeps retrying with backoff; they are
//!   never returned to application code.
//! - **Recovery** - a single re-invite failed after a reconnect. Reported per
//!   session in a [`RecoveryReport`](crate::recovery::RecoveryReport), never
//!   retried and never aborting sibling sessions.
//! - **Conference** - the remote session-control API could not allocate a
//!   conference or bring a party into it. Returned to the caller of the
//!   conference operation, no automatic retry.
//!
//! Asking to invite or merge while no conference exists is not an error at all;
//! see [`ConferenceCoordinator`](crate::conference::ConferenceCoordinator).
//!
//! # Example
//!
//! ```rust
//! use softphone_core::ClientError;
//!
//! let err = ClientError::transport_restart_failed("websocket handshake refused");
//! assert!(err.is_recoverable());
//! assert_eq!(err.category(), "connectivity");
//! ```

use thiserror::Error;

use crate::call::CallHandle;

/// Result type alias for softphone-core operations
pub type ClientResult<T> = Result<T, ClientError>;

/// Error types for softphone session-resilience operations
#[derive(Error, Debug, Clone)]
pub enum ClientError {
    /// Connectivity errors
    #[error("Transport restart failed: {reason}")]
    TransportRestartFailed { reason: String },

    #[error("Phone has been disposed")]
    PhoneDisposed,

    /// Recovery errors
    #[error("Re-invite failed for session {session_id}: {reason}")]
    ReinviteFailed { session_id: String, reason: String },

    /// Conference errors
    #[error("Conference creation failed: {reason}")]
    ConferenceCreationFailed { reason: String },

    #[error("Bring-in of session {session_id}/{party_id} into conference {conference_session_id} failed: {reason}")]
    BringInFailed {
        conference_session_id: String,
        session_id: String,
        party_id: String,
        /// Leg dialed for this operation, if any; it is left unmerged
        leg: Option<CallHandle>,
        reason: String,
    },

    #[error("Found {count} conference sessions, expected at most one")]
    AmbiguousConference { count: usize },

    /// Call errors
    #[error("Call setup failed: {reason}")]
    CallSetupFailed { reason: String },

    #[error("Invalid call state for session {session_id}: {reason}")]
    InvalidCallState { session_id: String, reason: String },

    /// Subscription errors
    #[error("Event subscription failed: {reason}")]
    SubscriptionFailed { reason: String },

    /// Configuration errors
    #[error("Invalid configuration: {field} - {reason}")]
    InvalidConfiguration { field: String, reason: String },

    #[error("Missing required configuration: {field}")]
    MissingConfiguration { field: String },

    /// External service errors
    #[error("External service error: {service} - {reason}")]
    ExternalServiceError { service: String, reason: String },

    #[error("Internal error: {message}")]
    InternalError { message: String },
}

impl ClientError {
    /// Create a transport restart error
    pub fn transport_restart_failed(reason: impl Into<String>) -> Self {
        Self::TransportRestartFailed { reason: reason.into() }
    }

    /// Create a re-invite error for one session
    pub fn reinvite_failed(session_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ReinviteFailed {
            session_id: session_id.into(),
            reason: reason.into(),
        }
    }

    /// Create a conference creation error
    pub fn conference_creation_failed(reason: impl Into<String>) -> Self {
        Self::ConferenceCreationFailed { reason: reason.into() }
    }

    /// Create a call setup error
    pub fn call_setup_failed(reason: impl Into<String>) -> Self {
        Self::CallSetupFailed { reason: reason.into() }
    }

    /// Create an external service error
    pub fn external_service(service: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ExternalServiceError {
            service: service.into(),
            reason: reason.into(),
        }
    }

    /// Create an internal error
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::InternalError { message: message.into() }
    }

    /// Check if this error is recoverable by retrying the same operation
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ClientError::TransportRestartFailed { .. } | ClientError::ExternalServiceError { .. }
        )
    }

    /// Check if error came out of a conference operation
    pub fn is_conference_error(&self) -> bool {
        matches!(
            self,
            ClientError::ConferenceCreationFailed { .. }
                | ClientError::BringInFailed { .. }
                | ClientError::AmbiguousConference { .. }
        )
    }

    /// Leg left behind by a failed invite, if any
    pub fn unmerged_leg(&self) -> Option<&CallHandle> {
        match self {
            ClientError::BringInFailed { leg, .. } => leg.as_ref(),
            _ => None,
        }
    }

    /// Get error category for metrics/logging
    pub fn category(&self) -> &'static str {
        match self {
            ClientError::TransportRestartFailed { .. } | ClientError::PhoneDisposed => "connectivity",

            ClientError::ReinviteFailed { .. } => "recovery",

            ClientError::ConferenceCreationFailed { .. }
            | ClientError::BringInFailed { .. }
            | ClientError::AmbiguousConference { .. } => "conference",

            ClientError::CallSetupFailed { .. } | ClientError::InvalidCallState { .. } => "call",

            ClientError::SubscriptionFailed { .. } => "subscription",

            ClientError::InvalidConfiguration { .. } | ClientError::MissingConfiguration { .. } => {
                "configuration"
            }

            ClientError::ExternalServiceError { .. } | ClientError::InternalError { .. } => "system",
        }
    }
}
