//! Remote session-control API interface
//!
//! The call-control REST API of the telephony platform. Only the calls the
//! resilience layer issues are modelled here; transport, auth and HTTP details
//! belong to the implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::call::CallHandle;
use crate::error::ClientResult;

/// Conference allocated by the remote API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConferenceSession {
    /// Telephony session id of the conference
    pub session_id: String,
    /// Token usable as a call destination to join the conference
    pub voice_call_token: String,
}

/// Status of a party in a telephony session event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PartyStatus {
    pub code: Option<String>,
}

/// One party of a telephony session event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SessionParty {
    pub id: Option<String>,
    pub extension_id: Option<String>,
    pub status: Option<PartyStatus>,
}

/// Account-level telephony session notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TelephonySessionEvent {
    pub telephony_session_id: Option<String>,
    #[serde(default)]
    pub parties: Vec<SessionParty>,
}

impl TelephonySessionEvent {
    pub fn first_party(&self) -> Option<&SessionParty> {
        self.parties.first()
    }
}

/// Remote session-control API consumed by the conference coordinator
#[async_trait]
pub trait SessionControlApi: Send + Sync {
    /// Allocate a new conference session
    async fn create_conference(&self) -> ClientResult<ConferenceSession>;

    /// Bring `party` into the conference identified by `conference_session_id`
    ///
    /// Fails if either identifier is invalid or the conference has ended.
    async fn bring_in(&self, conference_session_id: &str, party: &CallHandle) -> ClientResult<()>;

    /// Subscribe to account telephony session notifications
    async fn subscribe_session_events(&self) -> ClientResult<broadcast::Receiver<TelephonySessionEvent>>;

    /// Pick up a party of a telephony session onto `device_id`
    async fn pickup(&self, telephony_session_id: &str, party_id: &str, device_id: &str) -> ClientResult<()>;

    /// Answer a party of a telephony session on `device_id`
    async fn answer(&self, telephony_session_id: &str, party_id: &str, device_id: &str) -> ClientResult<()>;

    /// Start an outbound call from `device_id` to `to` through the API
    async fn call_out(&self, device_id: &str, to: &str) -> ClientResult<()>;
}
