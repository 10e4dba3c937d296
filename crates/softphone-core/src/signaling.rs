//! Signaling client interfaces
//!
//! The signaling engine itself (SIP over WebSocket, registration, dialogs) lives
//! outside this crate. These traits are the narrow surface the resilience layer
//! drives: start/restart, placing legs, re-invites, the session collection and
//! lifecycle events.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};

use crate::call::{CallHandle, CallSessionInfo};
use crate::error::ClientResult;

/// Connection state of one signaling transport instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportState {
    Open,
    Closing,
    Closed,
}

/// One signaling transport instance
///
/// A transport is never reopened in place: every restart of the signaling
/// client produces a fresh instance, so anything observing the old one has to
/// be attached again to the new one.
pub trait SignalingTransport: Send + Sync {
    /// Current connection state
    fn state(&self) -> TransportState;

    /// Watch channel following this instance's connection state
    ///
    /// The sender side is dropped together with the transport, which ends the
    /// watch without a `Closed` transition.
    fn state_changes(&self) -> watch::Receiver<TransportState>;
}

/// Events emitted by the signaling client
#[derive(Debug, Clone)]
pub enum SignalingEvent {
    /// A new outbound leg was created
    OutboundCallCreated { call: CallHandle },
    /// A leg failed terminally (rejected, unreachable, ...)
    CallFailed { session_id: String, reason: String },
    /// A leg was answered
    CallAnswered { session_id: String },
    /// A leg ended
    CallTerminated { session_id: String },
}

/// Signaling client consumed by the resilience layer
#[async_trait]
pub trait SignalingClient: Send + Sync {
    /// Establish the transport and signaling registration for the first time
    async fn start(&self) -> ClientResult<()>;

    /// Re-establish transport and registration, replacing the transport instance
    ///
    /// Fails with [`ClientError::TransportRestartFailed`](crate::ClientError::TransportRestartFailed)
    /// when connectivity is not available.
    async fn restart(&self) -> ClientResult<()>;

    /// The transport instance currently in use
    fn transport(&self) -> Arc<dyn SignalingTransport>;

    /// Place an outbound leg to `to`, optionally presenting `from` as caller id
    async fn call(&self, to: &str, from: Option<&str>) -> ClientResult<CallHandle>;

    /// Re-invite an existing session to refresh its signaling/media path
    async fn reinvite(&self, session_id: &str) -> ClientResult<()>;

    /// Snapshot of the current session collection
    async fn call_sessions(&self) -> Vec<CallSessionInfo>;

    /// Subscribe to call lifecycle events
    fn subscribe_events(&self) -> broadcast::Receiver<SignalingEvent>;

    /// Whether the phone has been explicitly torn down
    fn is_disposed(&self) -> bool;

    /// Tear the phone down; after this no reconnection is ever attempted
    async fn dispose(&self) -> ClientResult<()>;
}
