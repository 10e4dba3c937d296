//! Builder for [`Softphone`]

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::Softphone;
use crate::account::CallerIds;
use crate::conference::ConferenceCoordinator;
use crate::config::SoftphoneConfig;
use crate::error::{ClientError, ClientResult};
use crate::events::{EventPublisher, NotificationSink};
use crate::notifier::OutboundFailureNotifier;
use crate::recovery::SessionRecovery;
use crate::session_control::SessionControlApi;
use crate::signaling::SignalingClient;
use crate::subscription::{SubscriptionGate, SESSION_EVENTS_GATE};
use crate::watchdog::TransportWatchdog;

/// Fluent builder for a [`Softphone`]
///
/// # Examples
///
/// ```rust,no_run
/// # use std::sync::Arc;
/// # use softphone_core::{SoftphoneBuilder, SoftphoneConfig, SignalingClient, SessionControlApi, NotificationSink};
/// # fn example(
/// #     client: Arc<dyn SignalingClient>,
/// #     api: Arc<dyn SessionControlApi>,
/// #     sink: Arc<dyn NotificationSink>,
/// # ) -> softphone_core::ClientResult<()> {
/// let phone = SoftphoneBuilder::new(client, api)
///     .config(SoftphoneConfig::new().with_device_id("device-1"))
///     .notification_sink(sink)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct SoftphoneBuilder {
    client: Arc<dyn SignalingClient>,
    api: Arc<dyn SessionControlApi>,
    config: SoftphoneConfig,
    sink: Option<Arc<dyn NotificationSink>>,
    caller_ids: CallerIds,
    gate: &'static SubscriptionGate,
}

impl SoftphoneBuilder {
    pub fn new(client: Arc<dyn SignalingClient>, api: Arc<dyn SessionControlApi>) -> Self {
        Self {
            client,
            api,
            config: SoftphoneConfig::default(),
            sink: None,
            caller_ids: CallerIds::default(),
            gate: &SESSION_EVENTS_GATE,
        }
    }

    pub fn config(mut self, config: SoftphoneConfig) -> Self {
        self.config = config;
        self
    }

    /// Where outbound-call failure notifications go; none are produced without it
    pub fn notification_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn caller_ids(mut self, caller_ids: CallerIds) -> Self {
        self.caller_ids = caller_ids;
        self
    }

    /// Use a gate other than the process-wide [`SESSION_EVENTS_GATE`]
    pub fn subscription_gate(mut self, gate: &'static SubscriptionGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn build(self) -> ClientResult<Softphone> {
        self.config.validate()?;
        if self.config.pickup.is_some() && self.config.device_id.is_none() {
            return Err(ClientError::MissingConfiguration {
                field: "device_id".to_string(),
            });
        }

        let events = EventPublisher::new(self.config.event_channel_capacity);
        let recovery = SessionRecovery::new(self.client.clone());
        let watchdog = TransportWatchdog::new(
            self.client.clone(),
            recovery.clone(),
            self.config.reconnect.clone(),
            events.clone(),
        );
        let conference = ConferenceCoordinator::new(self.client.clone(), self.api.clone());
        let notifier = self.sink.map(|sink| {
            OutboundFailureNotifier::new(sink, &self.config.notifications).with_events(events.clone())
        });

        Ok(Softphone {
            client: self.client,
            api: self.api,
            config: self.config,
            events,
            watchdog,
            recovery,
            conference,
            notifier,
            notifier_task: Mutex::new(None),
            gate: self.gate,
            caller_ids: RwLock::new(self.caller_ids),
            started: AtomicBool::new(false),
        })
    }
}
