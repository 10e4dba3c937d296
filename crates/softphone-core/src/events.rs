//! Event handling for softphone-core operations
//!
//! Everything the resilience layer does in the background (reconnects,
//! recoveries, notifications) is reported as a [`PhoneEvent`] on a broadcast
//! channel so UI layers and tests can follow along.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// What made the watchdog start a reconnection episode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReconnectTrigger {
    /// The current transport closed unexpectedly
    TransportClosed,
    /// The host reported network connectivity was restored
    NetworkOnline,
    /// An application asked for a reconnect
    Manual,
}

/// User-visible notification handed to the presentation layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub message: String,
    pub description: String,
    /// How long the presentation layer should keep it on screen
    pub duration: Duration,
}

/// Presentation-layer sink for notifications
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, notification: Notification);
}

/// Background events emitted by the phone
#[derive(Debug, Clone)]
pub enum PhoneEvent {
    /// The watchdog observed the current transport closing
    TransportClosed {
        generation: u64,
        timestamp: DateTime<Utc>,
    },
    /// The watchdog attached its close observer to a transport instance
    TransportAttached {
        generation: u64,
        timestamp: DateTime<Utc>,
    },
    /// Next reconnect attempt is scheduled after `delay`
    ReconnectScheduled {
        attempt: u32,
        delay: Duration,
        timestamp: DateTime<Utc>,
    },
    /// A reconnect attempt failed; another one will follow
    ReconnectAttemptFailed {
        attempt: u32,
        reason: String,
        timestamp: DateTime<Utc>,
    },
    /// Transport and registration are back
    Reconnected {
        trigger: ReconnectTrigger,
        attempts: u32,
        timestamp: DateTime<Utc>,
    },
    /// Answered sessions were re-invited after a reconnect
    SessionsRecovered {
        reinvited: usize,
        failed: usize,
        timestamp: DateTime<Utc>,
    },
    /// An outbound call failure notification was emitted
    OutboundCallFailed {
        session_id: String,
        notification: Notification,
        timestamp: DateTime<Utc>,
    },
}

impl PhoneEvent {
    /// When the event was produced
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            PhoneEvent::TransportClosed { timestamp, .. }
            | PhoneEvent::TransportAttached { timestamp, .. }
            | PhoneEvent::ReconnectScheduled { timestamp, .. }
            | PhoneEvent::ReconnectAttemptFailed { timestamp, .. }
            | PhoneEvent::Reconnected { timestamp, .. }
            | PhoneEvent::SessionsRecovered { timestamp, .. }
            | PhoneEvent::OutboundCallFailed { timestamp, .. } => *timestamp,
        }
    }

    /// Short name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            PhoneEvent::TransportClosed { .. } => "transport_closed",
            PhoneEvent::TransportAttached { .. } => "transport_attached",
            PhoneEvent::ReconnectScheduled { .. } => "reconnect_scheduled",
            PhoneEvent::ReconnectAttemptFailed { .. } => "reconnect_attempt_failed",
            PhoneEvent::Reconnected { .. } => "reconnected",
            PhoneEvent::SessionsRecovered { .. } => "sessions_recovered",
            PhoneEvent::OutboundCallFailed { .. } => "outbound_call_failed",
        }
    }
}

/// Cloneable publisher for [`PhoneEvent`]s
///
/// Publishing never fails; with no subscribers the event is simply dropped.
#[derive(Debug, Clone)]
pub struct EventPublisher {
    tx: broadcast::Sender<PhoneEvent>,
}

impl EventPublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, event: PhoneEvent) {
        tracing::trace!(kind = event.kind(), "Publishing phone event");
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PhoneEvent> {
        self.tx.subscribe()
    }
}
