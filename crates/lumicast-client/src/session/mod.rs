//! Group session: one socket, one group, one receive loop.
//!
//! The session owns the transport connection and drives the handshake:
//! open the socket, wait for the broker's `system/connected` envelope, join
//! the group, then route every inbound frame to either the correlation
//! table (acks), the reply slot (group replies), or the broadcast stream of
//! unsolicited traffic. Frames this client sent itself are suppressed from
//! the stream.
//!
//! The receive loop never propagates errors: protocol errors drop the one
//! frame, transport loss fails outstanding waits with a synthesized
//! `disconnected` envelope and parks the session in `Disconnected`.
//! Reconnection is the caller's decision, never this component's.

pub mod state;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::value::RawValue;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::timeout;

use lumicast_core::protocol::envelope::{Envelope, GroupEnvelope};
use lumicast_core::protocol::frames;
use lumicast_core::{LumicastError, Result};

use crate::config::ClientConfig;
use crate::correlation::CorrelationTable;
use crate::negotiate::Negotiate;
use crate::obs::ClientCounters;
use crate::transport::{Transport, TransportEvent};

pub use state::SessionState;

/// Everything a session needs to know up front.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub hub: String,
    pub user: String,
    pub group: String,
    pub connect_timeout: Duration,
    pub ack_timeout: Duration,
    pub close_grace: Duration,
    pub event_buffer: usize,
}

impl From<&ClientConfig> for SessionOptions {
    fn from(cfg: &ClientConfig) -> Self {
        Self {
            hub: cfg.hub.clone(),
            user: cfg.user.clone(),
            group: cfg.group.clone(),
            connect_timeout: Duration::from_millis(cfg.timeouts.connect_timeout_ms),
            ack_timeout: Duration::from_millis(cfg.timeouts.ack_timeout_ms),
            close_grace: Duration::from_millis(cfg.timeouts.close_grace_ms),
            event_buffer: cfg.event_buffer,
        }
    }
}

/// State shared between the public handle and the receive loop task.
struct Shared {
    opts: SessionOptions,
    state: Mutex<SessionState>,
    connection_id: Mutex<Option<String>>,
    correlation: CorrelationTable,
    /// Waiter for the `system/connected` handshake envelope.
    system_slot: Mutex<Option<oneshot::Sender<Envelope>>>,
    /// Waiter for the next inbound group envelope (`receive`). Single-use;
    /// installing a new waiter cancels the previous one.
    reply_slot: Mutex<Option<oneshot::Sender<Envelope>>>,
    events: broadcast::Sender<GroupEnvelope>,
    out_tx: Mutex<Option<mpsc::Sender<String>>>,
    counters: ClientCounters,
}

/// Client handle for one hub/group/user session.
pub struct GroupSession {
    shared: Arc<Shared>,
    negotiate: Arc<dyn Negotiate>,
    transport: Arc<dyn Transport>,
}

impl GroupSession {
    pub fn new(
        opts: SessionOptions,
        negotiate: Arc<dyn Negotiate>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let (events, _) = broadcast::channel(opts.event_buffer.max(8));
        Self {
            shared: Arc::new(Shared {
                opts,
                state: Mutex::new(SessionState::Disconnected),
                connection_id: Mutex::new(None),
                correlation: CorrelationTable::new(),
                system_slot: Mutex::new(None),
                reply_slot: Mutex::new(None),
                events,
                out_tx: Mutex::new(None),
                counters: ClientCounters::default(),
            }),
            negotiate,
            transport,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        *lock(&self.shared.state)
    }

    /// Connectivity side channel for fire-and-forget senders.
    pub fn is_connected(&self) -> bool {
        self.state().can_publish()
    }

    /// Broker-assigned connection id, once the handshake completed.
    pub fn connection_id(&self) -> Option<String> {
        lock(&self.shared.connection_id).clone()
    }

    pub fn group(&self) -> &str {
        &self.shared.opts.group
    }

    pub fn hub(&self) -> &str {
        &self.shared.opts.hub
    }

    pub fn counters(&self) -> crate::obs::CounterSnapshot {
        self.shared.counters.snapshot()
    }

    /// Subscribe to unsolicited group traffic (echoes of this client's own
    /// sends are filtered out).
    pub fn subscribe(&self) -> broadcast::Receiver<GroupEnvelope> {
        self.shared.events.subscribe()
    }

    /// Open the socket, wait for the broker handshake, and join the group.
    ///
    /// On any failure the session ends up in `Closed` (or `Disconnected`)
    /// with nothing half-open; a retry goes through `connect` again from
    /// scratch.
    pub async fn connect(&self) -> Result<()> {
        {
            let mut st = lock(&self.shared.state);
            if !st.can_connect() {
                return Err(LumicastError::InvalidState(format!(
                    "connect called while {st}"
                )));
            }
            *st = SessionState::Connecting;
        }

        let result = self.connect_inner().await;
        if result.is_err() {
            self.teardown().await;
        }
        result
    }

    async fn connect_inner(&self) -> Result<()> {
        let opts = &self.shared.opts;
        let access = self
            .negotiate
            .negotiate(&opts.user, &opts.group)
            .await?;

        let conn = self.transport.open(&access.url).await?;
        let (sys_tx, sys_rx) = oneshot::channel();
        *lock(&self.shared.system_slot) = Some(sys_tx);
        *lock(&self.shared.out_tx) = Some(conn.tx);

        let shared = Arc::clone(&self.shared);
        tokio::spawn(run_receive_loop(shared, conn.events));

        // The broker announces itself before anything else may be sent.
        let envelope = match timeout(opts.connect_timeout, sys_rx).await {
            Ok(Ok(env)) => env,
            Ok(Err(_)) => return Err(LumicastError::Disconnected),
            Err(_) => return Err(LumicastError::Timeout),
        };
        match envelope {
            Envelope::System(sys) if sys.event == "connected" => {
                tracing::info!(
                    hub = %opts.hub,
                    connection_id = sys.connection_id.as_deref().unwrap_or(""),
                    "websocket connected"
                );
            }
            Envelope::Error(_) => return Err(LumicastError::Disconnected),
            other => {
                return Err(LumicastError::Protocol(format!(
                    "unexpected {} envelope during handshake",
                    other.kind()
                )))
            }
        }
        *lock(&self.shared.state) = SessionState::Connected;

        self.join_group().await?;
        *lock(&self.shared.state) = SessionState::GroupJoined;
        tracing::info!(group = %opts.group, "joined group");
        Ok(())
    }

    async fn join_group(&self) -> Result<()> {
        let opts = &self.shared.opts;
        let (ack_id, rx) = self.shared.correlation.register();
        let frame = frames::join_group(&opts.group, ack_id)?;
        if let Err(e) = self.transmit(frame) {
            self.shared.correlation.remove(ack_id);
            return Err(e);
        }

        match timeout(opts.ack_timeout, rx).await {
            Ok(Ok(Envelope::Ack(ack))) if ack.success => Ok(()),
            Ok(Ok(Envelope::Ack(ack))) => Err(LumicastError::Protocol(format!(
                "joinGroup rejected by broker (ackId {})",
                ack.ack_id
            ))),
            Ok(Ok(Envelope::Error(_))) | Ok(Err(_)) => Err(LumicastError::Disconnected),
            Ok(Ok(other)) => Err(LumicastError::Protocol(format!(
                "unexpected {} envelope answering joinGroup",
                other.kind()
            ))),
            Err(_) => {
                self.shared.correlation.remove(ack_id);
                Err(LumicastError::Timeout)
            }
        }
    }

    /// Fire-and-forget publish to the group.
    ///
    /// Failures do not come back to the caller: a refused write flips the
    /// session out of `GroupJoined`, observable via [`Self::is_connected`].
    pub fn send(&self, data: &RawValue) {
        if !self.state().can_publish() {
            tracing::warn!(state = %self.state(), "send skipped: not in a joined group");
            return;
        }
        let ack_id = self.shared.correlation.allocate();
        match frames::send_to_group(&self.shared.opts.group, data, ack_id) {
            Ok(frame) => {
                let _ = self.transmit(frame);
            }
            Err(e) => tracing::warn!(error = %e, "send skipped: frame encode failed"),
        }
    }

    /// Convenience wrapper for callers holding a `serde_json::Value`.
    pub fn send_value(&self, value: &serde_json::Value) {
        match serde_json::value::to_raw_value(value) {
            Ok(raw) => self.send(&raw),
            Err(e) => tracing::warn!(error = %e, "send skipped: value encode failed"),
        }
    }

    /// Correlated publish: embeds a fresh ackId and waits for the matching
    /// response.
    ///
    /// Always yields an envelope when the session was in a publishable
    /// state: the broker's ack, `Error{timeout}`, or `Error{disconnected}`.
    /// A timed-out entry is evicted so a late ack cannot resolve a future
    /// wait; the late ack is logged by the receive loop instead.
    pub async fn send_and_wait(&self, data: &RawValue, deadline: Duration) -> Result<Envelope> {
        if !self.state().can_publish() {
            return Err(LumicastError::InvalidState(format!(
                "send_and_wait called while {}",
                self.state()
            )));
        }
        let (ack_id, rx) = self.shared.correlation.register();
        let frame = frames::send_to_group(&self.shared.opts.group, data, ack_id)?;
        if self.transmit(frame).is_err() {
            self.shared.correlation.remove(ack_id);
            return Ok(Envelope::disconnected());
        }

        match timeout(deadline, rx).await {
            Ok(Ok(envelope)) => Ok(envelope),
            Ok(Err(_)) => Ok(Envelope::disconnected()),
            Err(_) => {
                self.shared.correlation.remove(ack_id);
                ClientCounters::inc(&self.shared.counters.timeouts);
                tracing::debug!(ack_id, "correlated send timed out");
                Ok(Envelope::timeout())
            }
        }
    }

    /// Wait for the next inbound group envelope (own echoes included).
    ///
    /// One waiter at a time: installing a new one resolves its predecessor
    /// with `Error{cancelled}`, so the superseded caller can tell the
    /// connection is still healthy.
    pub async fn receive(&self, deadline: Duration) -> Envelope {
        let (tx, rx) = oneshot::channel();
        if let Some(prev) = lock(&self.shared.reply_slot).replace(tx) {
            let _ = prev.send(Envelope::cancelled());
        }

        match timeout(deadline, rx).await {
            Ok(Ok(envelope)) => envelope,
            Ok(Err(_)) => Envelope::disconnected(),
            Err(_) => {
                lock(&self.shared.reply_slot).take();
                ClientCounters::inc(&self.shared.counters.timeouts);
                Envelope::timeout()
            }
        }
    }

    /// Leave the group (best effort, bounded by the close grace period) and
    /// shut the connection down. In-flight waits resolve as disconnected.
    pub async fn close(&self) {
        let was_joined = {
            let mut st = lock(&self.shared.state);
            let joined = *st == SessionState::GroupJoined;
            if matches!(*st, SessionState::Closed) {
                return;
            }
            *st = SessionState::Closing;
            joined
        };

        if was_joined {
            let (ack_id, rx) = self.shared.correlation.register();
            match frames::leave_group(&self.shared.opts.group, ack_id)
                .and_then(|frame| self.transmit(frame))
            {
                Ok(()) => {
                    if timeout(self.shared.opts.close_grace, rx).await.is_err() {
                        self.shared.correlation.remove(ack_id);
                        tracing::debug!("leaveGroup ack not received within grace period");
                    }
                }
                Err(_) => {
                    self.shared.correlation.remove(ack_id);
                }
            }
        }

        self.teardown().await;
    }

    /// Drop the connection and fail everything still waiting.
    async fn teardown(&self) {
        lock(&self.shared.out_tx).take();
        fail_waiters(&self.shared);
        *lock(&self.shared.state) = SessionState::Closed;
    }

    fn transmit(&self, frame: String) -> Result<()> {
        let guard = lock(&self.shared.out_tx);
        let Some(tx) = guard.as_ref() else {
            return Err(LumicastError::Disconnected);
        };
        match tx.try_send(frame) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                ClientCounters::inc(&self.shared.counters.sends_failed);
                tracing::warn!("outbound queue full, dropping frame");
                Err(LumicastError::Transport("outbound queue full".into()))
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                drop(guard);
                ClientCounters::inc(&self.shared.counters.sends_failed);
                tracing::warn!("transport write failed, marking session disconnected");
                on_connection_lost(&self.shared);
                Err(LumicastError::Disconnected)
            }
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Receive loop: runs until the transport reports closure, then fails every
/// outstanding wait. Individual bad frames are logged and dropped.
async fn run_receive_loop(shared: Arc<Shared>, mut events: mpsc::Receiver<TransportEvent>) {
    loop {
        match events.recv().await {
            Some(TransportEvent::Text(raw)) => handle_frame(&shared, &raw),
            Some(TransportEvent::Closed) | None => break,
        }
    }
    on_connection_lost(&shared);
}

fn handle_frame(shared: &Arc<Shared>, raw: &str) {
    ClientCounters::inc(&shared.counters.frames_rx);

    let envelope = match Envelope::decode(raw) {
        Ok(env) => env,
        Err(e) => {
            ClientCounters::inc(&shared.counters.decode_errors);
            tracing::warn!(error = %e, "dropping undecodable frame");
            return;
        }
    };

    match envelope {
        Envelope::System(sys) => {
            if sys.event == "connected" {
                *lock(&shared.connection_id) = sys.connection_id.clone();
                if let Some(tx) = lock(&shared.system_slot).take() {
                    let _ = tx.send(Envelope::System(sys));
                }
            } else {
                tracing::debug!(event = %sys.event, "system envelope");
            }
        }
        Envelope::Ack(ack) => {
            let ack_id = ack.ack_id;
            let success = ack.success;
            if !shared.correlation.resolve(ack_id, Envelope::Ack(ack)) {
                ClientCounters::inc(&shared.counters.stale_acks);
                tracing::debug!(ack_id, success, "ack with no waiter (late or duplicate)");
            }
        }
        Envelope::Group(group) => {
            let own_echo = group.from_user_id.as_deref() == Some(shared.opts.user.as_str());
            if !own_echo {
                // Nobody subscribed is fine; broadcast just reports it.
                let _ = shared.events.send(group.clone());
            }
            if let Some(tx) = lock(&shared.reply_slot).take() {
                let _ = tx.send(Envelope::Group(group));
            }
        }
        // Synthesized locally only; a broker frame never decodes to this.
        Envelope::Error(err) => {
            tracing::debug!(reason = %err.reason, "ignoring error envelope from wire");
        }
    }
}

/// Transport is gone: park the state machine and resolve every waiter with
/// a synthesized `disconnected` envelope so nothing hangs.
fn on_connection_lost(shared: &Arc<Shared>) {
    {
        let mut st = lock(&shared.state);
        *st = match *st {
            SessionState::Closing | SessionState::Closed => SessionState::Closed,
            _ => SessionState::Disconnected,
        };
    }
    lock(&shared.out_tx).take();
    fail_waiters(shared);
}

fn fail_waiters(shared: &Shared) {
    shared.correlation.fail_all(&Envelope::disconnected());
    if let Some(tx) = lock(&shared.system_slot).take() {
        let _ = tx.send(Envelope::disconnected());
    }
    if let Some(tx) = lock(&shared.reply_slot).take() {
        let _ = tx.send(Envelope::disconnected());
    }
}
