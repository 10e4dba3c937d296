//! Conference bridging
//!
//! A conference is not stored anywhere in this crate: it is the one call leg
//! in the signaling client's collection flagged as the conference. Every
//! operation re-scans the collection, so a conference that ended between two
//! steps is never acted on from a stale reference.
//!
//! Each operation pairs a local signaling action (placing a leg) with a remote
//! session-control action (allocating a conference, bringing a party in).
//! Invite and merge share the same bring-in primitive; invite dials a new leg
//! first, merge uses a call that already exists.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::call::{CallHandle, CallSessionInfo};
use crate::error::{ClientError, ClientResult};
use crate::session_control::SessionControlApi;
use crate::signaling::SignalingClient;

/// Result of a merge request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The session was brought into the conference
    Merged { conference_session_id: String },
    /// No conference is active; nothing was done
    NoConference,
}

/// Coordinates conference creation, invites and merges
#[derive(Clone)]
pub struct ConferenceCoordinator {
    client: Arc<dyn SignalingClient>,
    api: Arc<dyn SessionControlApi>,
}

impl std::fmt::Debug for ConferenceCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConferenceCoordinator").finish_non_exhaustive()
    }
}

impl ConferenceCoordinator {
    pub fn new(client: Arc<dyn SignalingClient>, api: Arc<dyn SessionControlApi>) -> Self {
        Self { client, api }
    }

    /// The active conference session, if any
    ///
    /// Errors with [`ClientError::AmbiguousConference`] when more than one
    /// session carries the conference flag.
    pub async fn conference_session(&self) -> ClientResult<Option<CallSessionInfo>> {
        let sessions = self.client.call_sessions().await;
        find_conference(&sessions)
    }

    /// Whether a conference is currently active, for enabling UI actions
    pub async fn has_conference(&self) -> bool {
        matches!(self.conference_session().await, Ok(Some(_)))
    }

    /// Allocate a conference remotely and join it as its first party
    pub async fn create_conference(&self, from: Option<&str>) -> ClientResult<CallHandle> {
        let conference = self.api.create_conference().await.map_err(|e| match e {
            ClientError::ConferenceCreationFailed { .. } => e,
            other => ClientError::conference_creation_failed(other.to_string()),
        })?;
        debug!(
            conference_session_id = %conference.session_id,
            "Conference allocated, joining with voice call token"
        );

        let leg = self.client.call(&conference.voice_call_token, from).await?;
        info!(
            conference_session_id = %conference.session_id,
            leg = %leg,
            "Joined new conference"
        );
        Ok(leg)
    }

    /// Dial `target` and bring the new leg into the active conference
    ///
    /// Returns `Ok(None)` without dialing when no conference is active. If the
    /// bring-in fails the new leg stays up, unmerged, and is carried in
    /// [`ClientError::BringInFailed`] for the caller to handle.
    pub async fn invite(&self, target: &str, from: Option<&str>) -> ClientResult<Option<CallHandle>> {
        let Some(conference) = self.conference_session().await? else {
            debug!(to = %target, "Invite requested without an active conference, ignoring");
            return Ok(None);
        };

        let leg = self.client.call(target, from).await?;
        debug!(to = %target, leg = %leg, "Invite leg placed, bringing into conference");

        self.bring_in(&conference.session_id, &leg, Some(leg.clone()))
            .await?;
        info!(
            to = %target,
            conference_session_id = %conference.session_id,
            leg = %leg,
            "Party invited into conference"
        );
        Ok(Some(leg))
    }

    /// Bring an already established call into the active conference
    pub async fn merge(&self, session: &CallSessionInfo) -> ClientResult<MergeOutcome> {
        let Some(conference) = self.conference_session().await? else {
            debug!(session_id = %session.session_id, "Merge requested without an active conference, ignoring");
            return Ok(MergeOutcome::NoConference);
        };

        if conference.session_id == session.session_id {
            return Err(ClientError::InvalidCallState {
                session_id: session.session_id.clone(),
                reason: "session is the conference itself".to_string(),
            });
        }

        self.bring_in(&conference.session_id, &session.handle(), None)
            .await?;
        info!(
            session_id = %session.session_id,
            conference_session_id = %conference.session_id,
            "Call merged into conference"
        );
        Ok(MergeOutcome::Merged {
            conference_session_id: conference.session_id,
        })
    }

    async fn bring_in(
        &self,
        conference_session_id: &str,
        party: &CallHandle,
        leg: Option<CallHandle>,
    ) -> ClientResult<()> {
        self.api
            .bring_in(conference_session_id, party)
            .await
            .map_err(|e| {
                warn!(
                    conference_session_id,
                    party = %party,
                    error = %e,
                    "Bring-in failed"
                );
                ClientError::BringInFailed {
                    conference_session_id: conference_session_id.to_string(),
                    session_id: party.session_id.clone(),
                    party_id: party.party_id.clone(),
                    leg,
                    reason: e.to_string(),
                }
            })
    }
}

/// Pick the unique conference session out of `sessions`
pub fn find_conference(sessions: &[CallSessionInfo]) -> ClientResult<Option<CallSessionInfo>> {
    let mut matches = sessions.iter().filter(|s| s.is_conference);
    let first = matches.next();
    let extra = matches.count();
    if extra > 0 {
        warn!(count = extra + 1, "More than one conference session found");
        return Err(ClientError::AmbiguousConference { count: extra + 1 });
    }
    Ok(first.cloned())
}
