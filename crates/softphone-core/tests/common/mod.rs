//! Scripted collaborators shared by the integration tests

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;

use softphone_core::{
    CallDirection, CallHandle, CallSessionInfo, CallState, ClientError, ClientResult, ConferenceSession,
    Notification, NotificationSink, PhoneEvent, SessionControlApi, SignalingClient, SignalingEvent,
    SignalingTransport, SubscriptionGate, TelephonySessionEvent, TransportState,
};

/// Transport whose state the test drives directly
pub struct MockTransport {
    id: u32,
    state: watch::Sender<TransportState>,
}

impl MockTransport {
    pub fn new(id: u32) -> Self {
        let (state, _) = watch::channel(TransportState::Open);
        Self { id, state }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// Simulate the server or network dropping the connection
    pub fn close(&self) {
        self.state.send_replace(TransportState::Closing);
        self.state.send_replace(TransportState::Closed);
    }
}

impl SignalingTransport for MockTransport {
    fn state(&self) -> TransportState {
        *self.state.borrow()
    }

    fn state_changes(&self) -> watch::Receiver<TransportState> {
        self.state.subscribe()
    }
}

/// Signaling client with scripted restart failures
pub struct MockSignalingClient {
    transport: Mutex<Arc<MockTransport>>,
    transports_created: AtomicU32,
    restart_failures: AtomicU32,
    start_calls: AtomicU32,
    restart_times: Mutex<Vec<Instant>>,
    sessions: Mutex<Vec<CallSessionInfo>>,
    reinvites: Mutex<Vec<String>>,
    failing_reinvites: Mutex<HashSet<String>>,
    panicking_reinvites: AtomicU32,
    calls: Mutex<Vec<(String, Option<String>)>>,
    events: broadcast::Sender<SignalingEvent>,
    close_replaced: AtomicBool,
    disposed: AtomicBool,
}

impl MockSignalingClient {
    pub fn new() -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            transport: Mutex::new(Arc::new(MockTransport::new(1))),
            transports_created: AtomicU32::new(1),
            restart_failures: AtomicU32::new(0),
            start_calls: AtomicU32::new(0),
            restart_times: Mutex::new(Vec::new()),
            sessions: Mutex::new(Vec::new()),
            reinvites: Mutex::new(Vec::new()),
            failing_reinvites: Mutex::new(HashSet::new()),
            panicking_reinvites: AtomicU32::new(0),
            calls: Mutex::new(Vec::new()),
            events,
            close_replaced: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
        })
    }

    /// Make the next `count` restarts fail
    pub fn fail_restarts(&self, count: u32) {
        self.restart_failures.store(count, Ordering::SeqCst);
    }

    pub fn fail_reinvite(&self, session_id: &str) {
        self.failing_reinvites.lock().insert(session_id.to_string());
    }

    /// Make the next `count` re-INVITEs panic inside the client
    pub fn panic_reinvites(&self, count: u32) {
        self.panicking_reinvites.store(count, Ordering::SeqCst);
    }

    /// Close the old transport whenever a restart replaces it
    pub fn close_replaced_transports(&self) {
        self.close_replaced.store(true, Ordering::SeqCst);
    }

    pub fn set_sessions(&self, sessions: Vec<CallSessionInfo>) {
        *self.sessions.lock() = sessions;
    }

    pub fn current_transport(&self) -> Arc<MockTransport> {
        self.transport.lock().clone()
    }

    pub fn start_calls(&self) -> u32 {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn restart_calls(&self) -> usize {
        self.restart_times.lock().len()
    }

    pub fn restart_times(&self) -> Vec<Instant> {
        self.restart_times.lock().clone()
    }

    pub fn reinvites(&self) -> Vec<String> {
        let mut reinvites = self.reinvites.lock().clone();
        reinvites.sort();
        reinvites
    }

    pub fn calls(&self) -> Vec<(String, Option<String>)> {
        self.calls.lock().clone()
    }

    pub fn emit(&self, event: SignalingEvent) {
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl SignalingClient for MockSignalingClient {
    async fn start(&self) -> ClientResult<()> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn restart(&self) -> ClientResult<()> {
        self.restart_times.lock().push(Instant::now());
        let remaining = self.restart_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.restart_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(ClientError::transport_restart_failed("network unreachable"));
        }
        let id = self.transports_created.fetch_add(1, Ordering::SeqCst) + 1;
        let replaced = std::mem::replace(&mut *self.transport.lock(), Arc::new(MockTransport::new(id)));
        if self.close_replaced.load(Ordering::SeqCst) {
            replaced.close();
        }
        Ok(())
    }

    fn transport(&self) -> Arc<dyn SignalingTransport> {
        self.transport.lock().clone()
    }

    async fn call(&self, to: &str, from: Option<&str>) -> ClientResult<CallHandle> {
        let mut calls = self.calls.lock();
        calls.push((to.to_string(), from.map(str::to_string)));
        let n = calls.len();
        Ok(CallHandle::new(format!("out-{}", n), format!("out-{}-party", n)))
    }

    async fn reinvite(&self, session_id: &str) -> ClientResult<()> {
        let panics = self.panicking_reinvites.load(Ordering::SeqCst);
        if panics > 0 {
            self.panicking_reinvites.store(panics - 1, Ordering::SeqCst);
            panic!("media stack crashed re-inviting {}", session_id);
        }
        if self.failing_reinvites.lock().contains(session_id) {
            return Err(ClientError::internal_error("488 Not Acceptable Here"));
        }
        self.reinvites.lock().push(session_id.to_string());
        Ok(())
    }

    async fn call_sessions(&self) -> Vec<CallSessionInfo> {
        self.sessions.lock().clone()
    }

    fn subscribe_events(&self) -> broadcast::Receiver<SignalingEvent> {
        self.events.subscribe()
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    async fn dispose(&self) -> ClientResult<()> {
        self.disposed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Remote session-control API recording every request
pub struct MockSessionControlApi {
    conference: ConferenceSession,
    create_calls: AtomicU32,
    subscribe_calls: AtomicU32,
    fail_create: AtomicBool,
    fail_bring_in: AtomicBool,
    fail_subscribe: AtomicBool,
    bring_ins: Mutex<Vec<(String, CallHandle)>>,
    pickups: Mutex<Vec<(String, String, String)>>,
    answers: Mutex<Vec<(String, String, String)>>,
    call_outs: Mutex<Vec<(String, String)>>,
    session_events: broadcast::Sender<TelephonySessionEvent>,
}

impl MockSessionControlApi {
    pub fn new() -> Arc<Self> {
        let (session_events, _) = broadcast::channel(16);
        Arc::new(Self {
            conference: ConferenceSession {
                session_id: "conf-session".to_string(),
                voice_call_token: "conf-token-1234".to_string(),
            },
            create_calls: AtomicU32::new(0),
            subscribe_calls: AtomicU32::new(0),
            fail_create: AtomicBool::new(false),
            fail_bring_in: AtomicBool::new(false),
            fail_subscribe: AtomicBool::new(false),
            bring_ins: Mutex::new(Vec::new()),
            pickups: Mutex::new(Vec::new()),
            answers: Mutex::new(Vec::new()),
            call_outs: Mutex::new(Vec::new()),
            session_events,
        })
    }

    pub fn conference(&self) -> &ConferenceSession {
        &self.conference
    }

    pub fn create_calls(&self) -> u32 {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn subscribe_calls(&self) -> u32 {
        self.subscribe_calls.load(Ordering::SeqCst)
    }

    pub fn set_fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_bring_in(&self, fail: bool) {
        self.fail_bring_in.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_subscribe(&self, fail: bool) {
        self.fail_subscribe.store(fail, Ordering::SeqCst);
    }

    pub fn bring_ins(&self) -> Vec<(String, CallHandle)> {
        self.bring_ins.lock().clone()
    }

    pub fn pickups(&self) -> Vec<(String, String, String)> {
        self.pickups.lock().clone()
    }

    pub fn answers(&self) -> Vec<(String, String, String)> {
        self.answers.lock().clone()
    }

    pub fn call_outs(&self) -> Vec<(String, String)> {
        self.call_outs.lock().clone()
    }

    pub fn push_session_event(&self, event: TelephonySessionEvent) {
        let _ = self.session_events.send(event);
    }
}

#[async_trait]
impl SessionControlApi for MockSessionControlApi {
    async fn create_conference(&self) -> ClientResult<ConferenceSession> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(ClientError::external_service("call-control", "503 Service Unavailable"));
        }
        Ok(self.conference.clone())
    }

    async fn bring_in(&self, conference_session_id: &str, party: &CallHandle) -> ClientResult<()> {
        if self.fail_bring_in.load(Ordering::SeqCst) {
            return Err(ClientError::external_service("call-control", "404 conference not found"));
        }
        self.bring_ins
            .lock()
            .push((conference_session_id.to_string(), party.clone()));
        Ok(())
    }

    async fn subscribe_session_events(&self) -> ClientResult<broadcast::Receiver<TelephonySessionEvent>> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_subscribe.load(Ordering::SeqCst) {
            return Err(ClientError::external_service("subscription", "403 Forbidden"));
        }
        Ok(self.session_events.subscribe())
    }

    async fn pickup(&self, telephony_session_id: &str, party_id: &str, device_id: &str) -> ClientResult<()> {
        self.pickups.lock().push((
            telephony_session_id.to_string(),
            party_id.to_string(),
            device_id.to_string(),
        ));
        Ok(())
    }

    async fn answer(&self, telephony_session_id: &str, party_id: &str, device_id: &str) -> ClientResult<()> {
        self.answers.lock().push((
            telephony_session_id.to_string(),
            party_id.to_string(),
            device_id.to_string(),
        ));
        Ok(())
    }

    async fn call_out(&self, device_id: &str, to: &str) -> ClientResult<()> {
        self.call_outs.lock().push((device_id.to_string(), to.to_string()));
        Ok(())
    }
}

/// Notification sink keeping everything it receives
#[derive(Default)]
pub struct RecordingSink {
    received: Mutex<Vec<Notification>>,
}

impl RecordingSink {
    pub fn received(&self) -> Vec<Notification> {
        self.received.lock().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn notify(&self, notification: Notification) {
        self.received.lock().push(notification);
    }
}

/// A gate private to one test
pub fn fresh_gate() -> &'static SubscriptionGate {
    Box::leak(Box::new(SubscriptionGate::new()))
}

pub fn session(id: &str, state: CallState) -> CallSessionInfo {
    CallSessionInfo::new(id, format!("{}-party", id), CallDirection::Outbound, state)
}

pub fn conference_leg(id: &str) -> CallSessionInfo {
    session(id, CallState::Answered).as_conference()
}

/// Receive phone events until one matches `pred`
pub async fn wait_for_event<F>(rx: &mut broadcast::Receiver<PhoneEvent>, mut pred: F) -> PhoneEvent
where
    F: FnMut(&PhoneEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(3600), async {
        loop {
            match rx.recv().await {
                Ok(event) if pred(&event) => return event,
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("phone event channel closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for phone event")
}

/// Let spawned tasks run without moving the paused clock far
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
