//! Call-session recovery after a reconnect
//!
//! A network path change invalidates the signaling/media association of calls
//! that were live when the transport dropped. After the watchdog brings the
//! transport back, every `answered` session gets a re-invite; sessions in any
//! other state are left alone.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::call::CallSessionInfo;
use crate::error::ClientError;
use crate::signaling::SignalingClient;

/// Outcome of one recovery pass
#[derive(Debug, Clone, Default)]
pub struct RecoveryReport {
    /// Sessions successfully re-invited
    pub reinvited: Vec<String>,
    /// Sessions not in `answered` state
    pub skipped: Vec<String>,
    /// Sessions whose re-invite failed
    pub failed: Vec<(String, ClientError)>,
}

impl RecoveryReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    /// Number of re-invites issued, successful or not
    pub fn attempted(&self) -> usize {
        self.reinvited.len() + self.failed.len()
    }
}

/// Restores answered call sessions after reconnection
#[derive(Clone)]
pub struct SessionRecovery {
    client: Arc<dyn SignalingClient>,
}

impl std::fmt::Debug for SessionRecovery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRecovery").finish_non_exhaustive()
    }
}

impl SessionRecovery {
    pub fn new(client: Arc<dyn SignalingClient>) -> Self {
        Self { client }
    }

    /// Re-invite every session of `sessions` that is currently answered
    ///
    /// Re-invites are independent: they run concurrently and one failure
    /// neither aborts nor retries the others.
    pub async fn recover(&self, sessions: &[CallSessionInfo]) -> RecoveryReport {
        let mut report = RecoveryReport::default();
        let mut targets = Vec::new();

        for session in sessions {
            if session.state.is_answered() {
                targets.push(session.session_id.clone());
            } else {
                debug!(
                    session_id = %session.session_id,
                    state = %session.state,
                    "Skipping session recovery, call not answered"
                );
                report.skipped.push(session.session_id.clone());
            }
        }

        let results = join_all(targets.iter().map(|session_id| {
            let client = self.client.clone();
            async move { client.reinvite(session_id).await }
        }))
        .await;

        for (session_id, result) in targets.into_iter().zip(results) {
            match result {
                Ok(()) => {
                    debug!(session_id = %session_id, "Session re-invited");
                    report.reinvited.push(session_id);
                }
                Err(e) => {
                    warn!(
                        session_id = %session_id,
                        error = %e,
                        "Re-invite failed during session recovery"
                    );
                    let err = match e {
                        ClientError::ReinviteFailed { .. } => e,
                        other => ClientError::reinvite_failed(session_id.clone(), other.to_string()),
                    };
                    report.failed.push((session_id, err));
                }
            }
        }

        info!(
            reinvited = report.reinvited.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "Session recovery finished"
        );
        report
    }

    /// Recover against a fresh snapshot of the client's session collection
    pub async fn recover_current(&self) -> RecoveryReport {
        let sessions = self.client.call_sessions().await;
        self.recover(&sessions).await
    }
}
