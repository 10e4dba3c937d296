//! Softphone-core: session resilience for a browser-style softphone
//!
//! This crate keeps a softphone's calls alive across signaling outages and
//! coordinates the call-control actions that go through the remote
//! telephony API. It sits between the UI layer and two collaborators it only
//! knows through traits:
//!
//! ```text
//! UI -> softphone-core -> {SignalingClient (SIP over WebSocket), SessionControlApi (REST)}
//! ```
//!
//! Softphone-core focuses on:
//! - Watching the signaling transport and reconnecting it with capped exponential backoff
//! - Re-inviting answered calls after a reconnect
//! - Starting, inviting to and merging into conferences
//! - One-shot notifications for failed outbound calls
//! - Installing the account telephony-session subscription once per process
//!
//! Media, SIP details and authentication are handled by the signaling client
//! and the REST layer behind the traits.

pub mod account;
pub mod backoff;
pub mod call;
pub mod conference;
pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod notifier;
pub mod phone;
pub mod pickup;
pub mod recovery;
pub mod session_control;
pub mod signaling;
pub mod subscription;
pub mod watchdog;

// Public API exports
pub use account::{CallerIds, PhoneNumberRecord};
pub use backoff::{BackoffConfig, BackoffScheduler};
pub use call::{CallDirection, CallHandle, CallSessionInfo, CallState};
pub use conference::{ConferenceCoordinator, MergeOutcome};
pub use config::{NotificationConfig, PickupConfig, ReconnectConfig, SoftphoneConfig};
pub use error::{ClientError, ClientResult};
pub use events::{
    EventPublisher, Notification, NotificationSink, PhoneEvent, ReconnectTrigger,
};
pub use logging::{setup_logging, LoggingConfig};
pub use notifier::OutboundFailureNotifier;
pub use phone::{Softphone, SoftphoneBuilder};
pub use pickup::QueuePickup;
pub use recovery::{RecoveryReport, SessionRecovery};
pub use session_control::{
    ConferenceSession, PartyStatus, SessionControlApi, SessionParty, TelephonySessionEvent,
};
pub use signaling::{SignalingClient, SignalingEvent, SignalingTransport, TransportState};
pub use subscription::{SubscriptionGate, SESSION_EVENTS_GATE};
pub use watchdog::{ReconnectOutcome, TransportWatchdog};

/// Softphone-core version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
