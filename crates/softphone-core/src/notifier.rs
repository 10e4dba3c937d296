//! Outbound call failure notifications
//!
//! Every outbound leg gets a one-shot failure subscription when it is created.
//! The first terminal failure of that leg produces one [`Notification`] for the
//! presentation layer; anything the leg reports afterwards is ignored.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::NotificationConfig;
use crate::events::{EventPublisher, Notification, NotificationSink, PhoneEvent};
use crate::signaling::SignalingEvent;

const OUTBOUND_FAILURE_MESSAGE: &str = "Outbound call failed";

/// Turns outbound-call failures into user-visible notifications
#[derive(Clone)]
pub struct OutboundFailureNotifier {
    sink: Arc<dyn NotificationSink>,
    duration: Duration,
    events: Option<EventPublisher>,
    /// Outbound calls whose failure has not been reported yet
    armed: Arc<DashMap<String, ()>>,
}

impl std::fmt::Debug for OutboundFailureNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutboundFailureNotifier")
            .field("duration", &self.duration)
            .field("armed", &self.armed.len())
            .finish()
    }
}

impl OutboundFailureNotifier {
    pub fn new(sink: Arc<dyn NotificationSink>, config: &NotificationConfig) -> Self {
        Self {
            sink,
            duration: config.outbound_failure_duration(),
            events: None,
            armed: Arc::new(DashMap::new()),
        }
    }

    /// Also publish each notification as a [`PhoneEvent::OutboundCallFailed`]
    pub fn with_events(mut self, events: EventPublisher) -> Self {
        self.events = Some(events);
        self
    }

    /// Number of outbound calls still waiting for a possible failure
    pub fn armed_calls(&self) -> usize {
        self.armed.len()
    }

    /// Handle one signaling event; returns `true` if a notification was sent
    pub async fn handle_event(&self, event: SignalingEvent) -> bool {
        match event {
            SignalingEvent::OutboundCallCreated { call } => {
                debug!(session_id = %call.session_id, "Watching outbound call for failure");
                self.armed.insert(call.session_id, ());
                false
            }
            SignalingEvent::CallFailed { session_id, reason } => {
                // remove() is the one-shot: only the first failure finds the entry
                if self.armed.remove(&session_id).is_none() {
                    debug!(session_id = %session_id, "Ignoring failure of unwatched or already reported call");
                    return false;
                }
                info!(session_id = %session_id, reason = %reason, "Outbound call failed");
                let notification = Notification {
                    message: OUTBOUND_FAILURE_MESSAGE.to_string(),
                    description: reason,
                    duration: self.duration,
                };
                if let Some(events) = &self.events {
                    events.publish(PhoneEvent::OutboundCallFailed {
                        session_id,
                        notification: notification.clone(),
                        timestamp: Utc::now(),
                    });
                }
                self.sink.notify(notification).await;
                true
            }
            SignalingEvent::CallAnswered { session_id } => {
                if self.armed.remove(&session_id).is_some() {
                    debug!(session_id = %session_id, "Outbound call answered, failure watch dropped");
                }
                false
            }
            SignalingEvent::CallTerminated { session_id } => {
                // Failures are reported before the leg ends; nothing is expected after this
                if self.armed.remove(&session_id).is_some() {
                    debug!(session_id = %session_id, "Outbound call ended, failure watch dropped");
                }
                false
            }
        }
    }

    /// Consume signaling events until the channel closes
    pub async fn run(self, mut events: broadcast::Receiver<SignalingEvent>) {
        loop {
            match events.recv().await {
                Ok(event) => {
                    self.handle_event(event).await;
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Outbound failure notifier lagged behind signaling events");
                }
                Err(RecvError::Closed) => {
                    debug!("Signaling event channel closed, notifier stopping");
                    break;
                }
            }
        }
    }

    /// Run the notifier on its own task
    pub fn spawn(self, events: broadcast::Receiver<SignalingEvent>) -> JoinHandle<()> {
        tokio::spawn(self.run(events))
    }
}
