//! Phone facade
//!
//! [`Softphone`] wires the resilience components around one signaling client
//! and one remote session-control API:
//!
//! - the [`TransportWatchdog`] observes the transport and reconnects it,
//!   recovering answered calls afterwards,
//! - the [`ConferenceCoordinator`] backs the conference actions,
//! - the [`OutboundFailureNotifier`] reports failed outbound calls,
//! - the process-wide [`SubscriptionGate`] installs the telephony-session
//!   subscription once.
//!
//! # Example
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # use softphone_core::{SoftphoneBuilder, SignalingClient, SessionControlApi, ClientResult};
//! # async fn example(client: Arc<dyn SignalingClient>, api: Arc<dyn SessionControlApi>) -> ClientResult<()> {
//! let phone = SoftphoneBuilder::new(client, api).build()?;
//! phone.start().await?;
//!
//! let mut events = phone.subscribe_events();
//! tokio::spawn(async move {
//!     while let Ok(event) = events.recv().await {
//!         println!("phone event: {}", event.kind());
//!     }
//! });
//!
//! // The host reports connectivity is back
//! phone.notify_online().await;
//!
//! if !phone.has_conference().await {
//!     phone.create_conference().await?;
//! }
//! phone.invite_to_conference("16505550123").await?;
//! # Ok(())
//! # }
//! ```

mod builder;

pub use builder::SoftphoneBuilder;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::account::{CallerIds, PhoneNumberRecord};
use crate::call::{CallHandle, CallSessionInfo};
use crate::conference::{ConferenceCoordinator, MergeOutcome};
use crate::config::SoftphoneConfig;
use crate::error::{ClientError, ClientResult};
use crate::events::{EventPublisher, PhoneEvent};
use crate::notifier::OutboundFailureNotifier;
use crate::pickup::QueuePickup;
use crate::recovery::{RecoveryReport, SessionRecovery};
use crate::session_control::SessionControlApi;
use crate::signaling::SignalingClient;
use crate::subscription::{install_session_event_subscription, SubscriptionGate};
use crate::watchdog::{ReconnectOutcome, TransportWatchdog};

/// Softphone session-resilience facade
pub struct Softphone {
    client: Arc<dyn SignalingClient>,
    api: Arc<dyn SessionControlApi>,
    config: SoftphoneConfig,
    events: EventPublisher,
    watchdog: TransportWatchdog,
    recovery: SessionRecovery,
    conference: ConferenceCoordinator,
    notifier: Option<OutboundFailureNotifier>,
    notifier_task: Mutex<Option<JoinHandle<()>>>,
    gate: &'static SubscriptionGate,
    caller_ids: RwLock<CallerIds>,
    started: AtomicBool,
}

impl std::fmt::Debug for Softphone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Softphone")
            .field("config", &self.config)
            .field("watchdog", &self.watchdog)
            .field("started", &self.started.load(Ordering::SeqCst))
            .finish()
    }
}

impl Softphone {
    /// Start the signaling client and the resilience machinery
    ///
    /// Calling `start` on a running phone does nothing. A failure to install
    /// the telephony-session subscription is logged, not returned.
    pub async fn start(&self) -> ClientResult<()> {
        if self.client.is_disposed() {
            return Err(ClientError::PhoneDisposed);
        }
        if self.started.swap(true, Ordering::SeqCst) {
            debug!("Softphone already started");
            return Ok(());
        }

        let signaling_events = self.client.subscribe_events();
        if let Err(e) = self.client.start().await {
            self.started.store(false, Ordering::SeqCst);
            return Err(e);
        }

        self.watchdog.attach(self.client.transport());

        if let Some(notifier) = &self.notifier {
            let handle = notifier.clone().spawn(signaling_events);
            if let Some(previous) = self.notifier_task.lock().replace(handle) {
                previous.abort();
            }
        }

        let pickup = match (&self.config.pickup, &self.config.device_id) {
            (Some(pickup), Some(device_id)) => Some(QueuePickup::new(self.api.clone(), pickup, device_id.clone())),
            _ => None,
        };
        match install_session_event_subscription(self.gate, self.api.clone(), pickup).await {
            Ok(Some(_listener)) => debug!("Telephony session listener running"),
            Ok(None) => debug!("Telephony session listener installed earlier in this process"),
            Err(e) => warn!(error = %e, "Continuing without telephony session events"),
        }

        info!("Softphone started");
        Ok(())
    }

    /// Tear the phone down; no reconnection is attempted afterwards
    pub async fn dispose(&self) -> ClientResult<()> {
        self.client.dispose().await?;
        self.watchdog.detach();
        if let Some(task) = self.notifier_task.lock().take() {
            task.abort();
        }
        self.started.store(false, Ordering::SeqCst);
        info!("Softphone disposed");
        Ok(())
    }

    pub fn is_disposed(&self) -> bool {
        self.client.is_disposed()
    }

    /// The host reports network connectivity is restored
    pub async fn notify_online(&self) -> ReconnectOutcome {
        self.watchdog.notify_online().await
    }

    /// Restart the transport and recover calls now
    pub async fn reconnect_now(&self) -> ReconnectOutcome {
        self.watchdog.reconnect_now().await
    }

    /// Re-invite answered calls without restarting the transport
    pub async fn recover_sessions(&self) -> RecoveryReport {
        self.recovery.recover_current().await
    }

    /// Place a call, presenting `from` or the default caller id
    pub async fn call(&self, to: &str, from: Option<&str>) -> ClientResult<CallHandle> {
        let default_from = self.default_caller_id();
        let from = from.or(default_from.as_deref());
        self.client.call(to, from).await
    }

    pub async fn call_sessions(&self) -> Vec<CallSessionInfo> {
        self.client.call_sessions().await
    }

    /// Start a new conference and join it
    pub async fn create_conference(&self) -> ClientResult<CallHandle> {
        let from = self.default_caller_id();
        self.conference.create_conference(from.as_deref()).await
    }

    /// Invite `target` into the active conference; `Ok(None)` without one
    pub async fn invite_to_conference(&self, target: &str) -> ClientResult<Option<CallHandle>> {
        let from = self.default_caller_id();
        self.conference.invite(target, from.as_deref()).await
    }

    /// Merge an existing call into the active conference
    pub async fn merge_to_conference(&self, session: &CallSessionInfo) -> ClientResult<MergeOutcome> {
        self.conference.merge(session).await
    }

    /// Whether a conference is active
    pub async fn has_conference(&self) -> bool {
        self.conference.has_conference().await
    }

    /// Answer a call through the remote call-control API instead of locally
    pub async fn call_control_answer(&self, session: &CallSessionInfo) -> ClientResult<()> {
        let device_id = self.device_id()?;
        self.api
            .answer(&session.session_id, &session.party_id, device_id)
            .await
    }

    /// Place a call through the remote call-control API, ringing this device first
    pub async fn call_out(&self, to: &str) -> ClientResult<()> {
        let device_id = self.device_id()?;
        self.api.call_out(device_id, to).await
    }

    /// Replace the caller ids from the extension's phone number records
    pub fn set_phone_numbers(&self, records: &[PhoneNumberRecord]) {
        *self.caller_ids.write() = CallerIds::from_records(records);
    }

    pub fn caller_ids(&self) -> CallerIds {
        self.caller_ids.read().clone()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<PhoneEvent> {
        self.events.subscribe()
    }

    pub fn watchdog(&self) -> &TransportWatchdog {
        &self.watchdog
    }

    pub fn config(&self) -> &SoftphoneConfig {
        &self.config
    }

    fn default_caller_id(&self) -> Option<String> {
        self.caller_ids.read().default_caller_id().map(str::to_string)
    }

    fn device_id(&self) -> ClientResult<&str> {
        self.config
            .device_id
            .as_deref()
            .ok_or_else(|| ClientError::MissingConfiguration {
                field: "device_id".to_string(),
            })
    }
}
