//! Once-per-process event subscription
//!
//! The account telephony-session subscription is a process-wide side effect:
//! a re-login must not install a second listener. [`SubscriptionGate`] is the
//! guard for that. It is claimed right before installation starts and never
//! released, so every later attempt is skipped, including after a failed first
//! installation.

use std::future::Future;
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{ClientError, ClientResult};
use crate::pickup::QueuePickup;
use crate::session_control::{SessionControlApi, TelephonySessionEvent};

/// Gate guarding the account telephony-session subscription of this process
pub static SESSION_EVENTS_GATE: SubscriptionGate = SubscriptionGate::new();

/// Install-at-most-once guard
#[derive(Debug)]
pub struct SubscriptionGate {
    claimed_at: OnceLock<DateTime<Utc>>,
}

impl SubscriptionGate {
    pub const fn new() -> Self {
        Self {
            claimed_at: OnceLock::new(),
        }
    }

    /// Run `install` if this is the first call on the gate
    ///
    /// Returns `Ok(None)` when the gate was already claimed.
    ///
    /// ```rust
    /// use softphone_core::{ClientResult, SubscriptionGate};
    ///
    /// # tokio_test::block_on(async {
    /// let gate = SubscriptionGate::new();
    ///
    /// let first: ClientResult<Option<u32>> = gate.install_once(|| async { Ok(1) }).await;
    /// let second: ClientResult<Option<u32>> = gate.install_once(|| async { Ok(2) }).await;
    ///
    /// assert_eq!(first.unwrap(), Some(1));
    /// assert_eq!(second.unwrap(), None);
    /// # });
    /// ```
    pub async fn install_once<F, Fut, T>(&self, install: F) -> ClientResult<Option<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ClientResult<T>>,
    {
        if self.claimed_at.set(Utc::now()).is_err() {
            debug!("Subscription already installed in this process, skipping");
            return Ok(None);
        }
        install().await.map(Some)
    }

    pub fn is_claimed(&self) -> bool {
        self.claimed_at.get().is_some()
    }

    /// When the installation was started
    pub fn claimed_at(&self) -> Option<DateTime<Utc>> {
        self.claimed_at.get().copied()
    }
}

impl Default for SubscriptionGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Subscribe to telephony session events through `gate`
///
/// Returns the listener task when this call installed the subscription and
/// `None` when it had been installed before.
pub async fn install_session_event_subscription(
    gate: &SubscriptionGate,
    api: Arc<dyn SessionControlApi>,
    pickup: Option<QueuePickup>,
) -> ClientResult<Option<JoinHandle<()>>> {
    gate.install_once(|| async move {
        let events = api.subscribe_session_events().await.map_err(|e| {
            warn!(error = %e, "Telephony session subscription failed");
            ClientError::SubscriptionFailed { reason: e.to_string() }
        })?;
        info!(queue_pickup = pickup.is_some(), "Subscribed to telephony session events");
        Ok(tokio::spawn(listen(events, pickup)))
    })
    .await
}

async fn listen(mut events: broadcast::Receiver<TelephonySessionEvent>, pickup: Option<QueuePickup>) {
    loop {
        match events.recv().await {
            Ok(event) => {
                debug!(
                    telephony_session_id = ?event.telephony_session_id,
                    parties = event.parties.len(),
                    "Telephony session event"
                );
                if let Some(pickup) = &pickup {
                    pickup.handle(&event);
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Telephony session listener lagged");
            }
            Err(RecvError::Closed) => {
                debug!("Telephony session event stream ended");
                break;
            }
        }
    }
}
