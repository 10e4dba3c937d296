//! Transport watchdog
//!
//! Detects unexpected closes of the signaling transport and restores
//! connectivity without user intervention, while respecting explicit disposal
//! of the phone.
//!
//! # Reconnection episodes
//!
//! A close of the current transport, a network-online signal, or a manual
//! request all funnel into one reconnection *episode* per watchdog:
//!
//! 1. wait for the current backoff delay (skipped for the first attempt of an
//!    online/manual episode),
//! 2. stop if the phone was disposed meanwhile,
//! 3. restart the signaling client; on failure go back to 1 with the next delay,
//! 4. on success recover answered sessions, then attach the close observer to
//!    the fresh transport instance.
//!
//! There is no attempt ceiling. An episode ends only on success or disposal.
//! While an episode is running, any further trigger joins it instead of
//! starting another one, so restart attempts never overlap.
//!
//! # Current transport slot
//!
//! Restarting the client replaces the transport object, so the watchdog keeps
//! the instance it observes in a single slot together with an attach
//! generation. Re-attaching is an explicit step of every successful episode;
//! close notifications from older generations are ignored.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use chrono::Utc;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::backoff::BackoffScheduler;
use crate::config::ReconnectConfig;
use crate::events::{EventPublisher, PhoneEvent, ReconnectTrigger};
use crate::recovery::{RecoveryReport, SessionRecovery};
use crate::signaling::{SignalingClient, SignalingTransport, TransportState};

/// How a reconnection request ended
#[derive(Debug, Clone)]
pub enum ReconnectOutcome {
    /// Transport restarted and sessions were recovered
    Reconnected {
        trigger: ReconnectTrigger,
        /// Restart attempts made, including the successful one
        attempts: u32,
        recovery: RecoveryReport,
    },
    /// The phone is disposed; nothing was (or will be) attempted
    Disposed,
    /// Online signal ignored because the transport was healthy
    Skipped,
    /// The episode task died before finishing
    Aborted,
}

impl ReconnectOutcome {
    pub fn is_reconnected(&self) -> bool {
        matches!(self, ReconnectOutcome::Reconnected { .. })
    }
}

type EpisodeFuture = Shared<BoxFuture<'static, ReconnectOutcome>>;

struct InFlight {
    id: u64,
    outcome: EpisodeFuture,
}

#[derive(Default)]
struct ObserverSlot {
    generation: u64,
    transport: Option<Arc<dyn SignalingTransport>>,
    task: Option<JoinHandle<()>>,
}

struct WatchdogInner {
    client: Arc<dyn SignalingClient>,
    recovery: SessionRecovery,
    config: ReconnectConfig,
    events: EventPublisher,
    observer: Mutex<ObserverSlot>,
    in_flight: Mutex<Option<InFlight>>,
    episode_counter: AtomicU64,
    attach_count: AtomicU64,
}

/// Watches the signaling transport and drives reconnection
///
/// Cloning is cheap; all clones share the same observer slot and in-flight
/// episode.
#[derive(Clone)]
pub struct TransportWatchdog {
    inner: Arc<WatchdogInner>,
}

impl std::fmt::Debug for TransportWatchdog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportWatchdog")
            .field("generation", &self.generation())
            .field("attach_count", &self.attach_count())
            .field("reconnecting", &self.is_reconnecting())
            .finish()
    }
}

impl TransportWatchdog {
    pub fn new(
        client: Arc<dyn SignalingClient>,
        recovery: SessionRecovery,
        config: ReconnectConfig,
        events: EventPublisher,
    ) -> Self {
        Self {
            inner: Arc::new(WatchdogInner {
                client,
                recovery,
                config,
                events,
                observer: Mutex::new(ObserverSlot::default()),
                in_flight: Mutex::new(None),
                episode_counter: AtomicU64::new(0),
                attach_count: AtomicU64::new(0),
            }),
        }
    }

    /// Register the close observer on `transport`, replacing any previous one
    ///
    /// Must be called for every new transport instance; the watchdog does it
    /// itself after each successful reconnect. Returns the new generation.
    pub fn attach(&self, transport: Arc<dyn SignalingTransport>) -> u64 {
        self.inner.attach(transport)
    }

    /// Stop observing the current transport
    pub fn detach(&self) {
        let mut slot = self.inner.observer.lock();
        if let Some(task) = slot.task.take() {
            task.abort();
        }
        slot.transport = None;
        slot.generation += 1;
        debug!(generation = slot.generation, "Watchdog detached from transport");
    }

    /// React to the host reporting network connectivity restored
    ///
    /// Joins a running episode if there is one. Otherwise restarts right away
    /// and falls back to the regular backoff loop if that first attempt fails.
    pub async fn notify_online(&self) -> ReconnectOutcome {
        if self.inner.client.is_disposed() {
            debug!("Network online ignored, phone disposed");
            return ReconnectOutcome::Disposed;
        }
        if let Some(running) = self.inner.running_episode() {
            debug!("Network online while reconnecting, joining episode");
            return running.await;
        }
        if !self.inner.config.restart_on_online_when_healthy {
            let healthy = self
                .current_transport()
                .map(|t| t.state() == TransportState::Open)
                .unwrap_or(false);
            if healthy {
                debug!("Network online ignored, transport is open");
                return ReconnectOutcome::Skipped;
            }
        }
        info!("Network online, restarting signaling transport");
        self.inner.begin_episode(ReconnectTrigger::NetworkOnline).await
    }

    /// Reconnect on request, regardless of transport health
    pub async fn reconnect_now(&self) -> ReconnectOutcome {
        if self.inner.client.is_disposed() {
            return ReconnectOutcome::Disposed;
        }
        self.inner.begin_episode(ReconnectTrigger::Manual).await
    }

    /// Wait for the running episode, if any
    pub async fn wait_for_episode(&self) -> Option<ReconnectOutcome> {
        let running = self.inner.running_episode()?;
        Some(running.await)
    }

    pub fn is_reconnecting(&self) -> bool {
        self.inner.in_flight.lock().is_some()
    }

    /// Transport instance currently observed
    pub fn current_transport(&self) -> Option<Arc<dyn SignalingTransport>> {
        self.inner.observer.lock().transport.clone()
    }

    /// Current attach generation
    pub fn generation(&self) -> u64 {
        self.inner.observer.lock().generation
    }

    /// How many times a close observer was attached
    pub fn attach_count(&self) -> u64 {
        self.inner.attach_count.load(Ordering::SeqCst)
    }

    /// How many reconnection episodes were started
    pub fn episodes_started(&self) -> u64 {
        self.inner.episode_counter.load(Ordering::SeqCst)
    }
}

impl WatchdogInner {
    fn attach(self: &Arc<Self>, transport: Arc<dyn SignalingTransport>) -> u64 {
        let generation = self.next_generation();
        self.observe(transport, generation)
    }

    /// Retire the current observer; closes it reports from now on are stale
    fn next_generation(&self) -> u64 {
        let mut slot = self.observer.lock();
        slot.generation += 1;
        if let Some(previous) = slot.task.take() {
            previous.abort();
        }
        slot.generation
    }

    /// Start observing `transport` under `generation`
    ///
    /// Does nothing if the generation was superseded in the meantime, e.g. by
    /// a detach during disposal.
    fn observe(self: &Arc<Self>, transport: Arc<dyn SignalingTransport>, generation: u64) -> u64 {
        let mut rx = transport.state_changes();
        let weak: Weak<Self> = Arc::downgrade(self);

        {
            let mut slot = self.observer.lock();
            if slot.generation != generation {
                debug!(generation, current = slot.generation, "Not attaching, generation superseded");
                return slot.generation;
            }
            slot.task = Some(tokio::spawn(async move {
                if wait_for_close(&mut rx).await {
                    if let Some(inner) = weak.upgrade() {
                        inner.on_transport_closed(generation);
                    }
                }
            }));
            slot.transport = Some(transport);
        }

        self.attach_count.fetch_add(1, Ordering::SeqCst);
        debug!(generation, "Close observer attached to signaling transport");
        self.events.publish(PhoneEvent::TransportAttached {
            generation,
            timestamp: Utc::now(),
        });
        generation
    }

    fn on_transport_closed(self: &Arc<Self>, generation: u64) {
        // Held until the episode is begun or joined: a finishing episode
        // retires this generation before it releases the in-flight slot.
        let observer = self.observer.lock();
        if observer.generation != generation {
            debug!(generation, current = observer.generation, "Ignoring close of a superseded transport");
            return;
        }

        self.events.publish(PhoneEvent::TransportClosed {
            generation,
            timestamp: Utc::now(),
        });

        if self.client.is_disposed() {
            info!("Signaling transport closed after dispose, not reconnecting");
            return;
        }

        warn!(generation, "Signaling transport closed unexpectedly");
        // The episode runs in its own task; nothing to wait for here.
        drop(self.begin_episode(ReconnectTrigger::TransportClosed));
        drop(observer);
    }

    fn running_episode(&self) -> Option<EpisodeFuture> {
        self.in_flight.lock().as_ref().map(|f| f.outcome.clone())
    }

    /// Start an episode, or join the one already running
    fn begin_episode(self: &Arc<Self>, trigger: ReconnectTrigger) -> EpisodeFuture {
        let mut slot = self.in_flight.lock();
        if let Some(running) = slot.as_ref() {
            debug!(episode = running.id, ?trigger, "Reconnection already in progress, joining");
            return running.outcome.clone();
        }

        let id = self.episode_counter.fetch_add(1, Ordering::SeqCst) + 1;
        info!(episode = id, ?trigger, "Starting reconnection episode");

        let inner = self.clone();
        let task = tokio::spawn(async move {
            let _release = EpisodeGuard {
                inner: Arc::downgrade(&inner),
                id,
            };
            inner.run_episode(id, trigger).await
        });

        let outcome = task
            .map(move |joined| {
                joined.unwrap_or_else(|e| {
                    error!(episode = id, error = %e, "Reconnection episode task failed");
                    ReconnectOutcome::Aborted
                })
            })
            .boxed()
            .shared();

        *slot = Some(InFlight {
            id,
            outcome: outcome.clone(),
        });
        outcome
    }

    fn finish_episode(&self, id: u64) {
        let mut slot = self.in_flight.lock();
        if slot.as_ref().map(|f| f.id) == Some(id) {
            *slot = None;
        }
    }

    async fn run_episode(self: &Arc<Self>, id: u64, trigger: ReconnectTrigger) -> ReconnectOutcome {
        let mut backoff = BackoffScheduler::new(self.config.backoff.clone());
        let mut attempts: u32 = 0;
        let mut wait_first = trigger == ReconnectTrigger::TransportClosed;

        loop {
            if wait_first {
                let delay = backoff.next_delay();
                info!(
                    episode = id,
                    attempt = attempts + 1,
                    delay_ms = delay.as_millis() as u64,
                    "Reconnecting signaling transport after delay"
                );
                self.events.publish(PhoneEvent::ReconnectScheduled {
                    attempt: attempts + 1,
                    delay,
                    timestamp: Utc::now(),
                });
                tokio::time::sleep(delay).await;
            }
            wait_first = true;

            if self.client.is_disposed() {
                info!(episode = id, "Phone disposed, abandoning reconnection");
                return ReconnectOutcome::Disposed;
            }

            attempts += 1;
            match self.client.restart().await {
                Ok(()) => break,
                Err(e) => {
                    warn!(
                        episode = id,
                        attempt = attempts,
                        error = %e,
                        category = e.category(),
                        "Signaling transport restart failed"
                    );
                    self.events.publish(PhoneEvent::ReconnectAttemptFailed {
                        attempt: attempts,
                        reason: e.to_string(),
                        timestamp: Utc::now(),
                    });
                }
            }
        }

        info!(episode = id, attempts, "Signaling transport reconnected");
        self.events.publish(PhoneEvent::Reconnected {
            trigger,
            attempts,
            timestamp: Utc::now(),
        });

        let sessions = self.client.call_sessions().await;
        let recovery = self.recovery.recover(&sessions).await;
        self.events.publish(PhoneEvent::SessionsRecovered {
            reinvited: recovery.reinvited.len(),
            failed: recovery.failed.len(),
            timestamp: Utc::now(),
        });

        // restart() handed the client a new transport object. Retire the old
        // observer first so a late close from it is stale, then release the
        // slot so a close already pending on the new one starts a new episode.
        let generation = self.next_generation();
        self.finish_episode(id);
        self.observe(self.client.transport(), generation);

        ReconnectOutcome::Reconnected {
            trigger,
            attempts,
            recovery,
        }
    }
}

/// Releases the in-flight slot when an episode task ends, also by panic or abort
struct EpisodeGuard {
    inner: Weak<WatchdogInner>,
    id: u64,
}

impl Drop for EpisodeGuard {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.finish_episode(self.id);
        }
    }
}

/// Resolve `true` once the watched transport reports `Closed`
///
/// Resolves `false` if the transport is dropped without ever closing.
async fn wait_for_close(rx: &mut watch::Receiver<TransportState>) -> bool {
    loop {
        if *rx.borrow_and_update() == TransportState::Closed {
            return true;
        }
        if rx.changed().await.is_err() {
            return *rx.borrow() == TransportState::Closed;
        }
    }
}
