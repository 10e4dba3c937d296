//! Automatic pickup of calls waiting in a call queue
//!
//! Driven by account telephony session notifications: when the first party of
//! a session is the watched queue extension and is still `Proceeding`, the call
//! is picked up onto this phone's device after a short delay.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::PickupConfig;
use crate::session_control::{SessionControlApi, TelephonySessionEvent};

const PROCEEDING: &str = "Proceeding";

/// Picks up calls proceeding in one call queue
#[derive(Clone)]
pub struct QueuePickup {
    api: Arc<dyn SessionControlApi>,
    queue_extension_id: String,
    device_id: String,
    delay: Duration,
}

impl std::fmt::Debug for QueuePickup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueuePickup")
            .field("queue_extension_id", &self.queue_extension_id)
            .field("device_id", &self.device_id)
            .field("delay", &self.delay)
            .finish()
    }
}

impl QueuePickup {
    pub fn new(api: Arc<dyn SessionControlApi>, config: &PickupConfig, device_id: impl Into<String>) -> Self {
        Self {
            api,
            queue_extension_id: config.queue_extension_id.clone(),
            device_id: device_id.into(),
            delay: config.delay(),
        }
    }

    /// Telephony session and party to pick up for `event`, if it qualifies
    pub fn target(&self, event: &TelephonySessionEvent) -> Option<(String, String)> {
        let session_id = event.telephony_session_id.as_ref()?;
        let party = event.first_party()?;
        if party.extension_id.as_deref() != Some(self.queue_extension_id.as_str()) {
            return None;
        }
        let status = party.status.as_ref().and_then(|s| s.code.as_deref());
        if status != Some(PROCEEDING) {
            return None;
        }
        let party_id = party.id.as_ref()?;
        Some((session_id.clone(), party_id.clone()))
    }

    /// Schedule a pickup for `event` if it qualifies
    pub fn handle(&self, event: &TelephonySessionEvent) -> Option<JoinHandle<()>> {
        let (session_id, party_id) = self.target(event)?;
        debug!(
            telephony_session_id = %session_id,
            party_id = %party_id,
            delay_ms = self.delay.as_millis() as u64,
            "Queue call proceeding, scheduling pickup"
        );

        let this = self.clone();
        Some(tokio::spawn(async move {
            tokio::time::sleep(this.delay).await;
            match this.api.pickup(&session_id, &party_id, &this.device_id).await {
                Ok(()) => info!(telephony_session_id = %session_id, "Picked up queue call"),
                Err(e) => warn!(
                    telephony_session_id = %session_id,
                    error = %e,
                    "Queue call pickup failed"
                ),
            }
        }))
    }
}
