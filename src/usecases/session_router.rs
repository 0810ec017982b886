//! Session Router - Per-Connection State Machine
//!
//! Owns one `Session` per live connection, indexed by `ConnectionId`.
//! Each session is either `Subscribed` (receives scheduler pushes) or
//! `Searching(term)` (receives only its own private polling results).
//!
//! Private polling runs on a task owned by the session. The task handle is
//! aborted before a replacement is spawned, on every return to
//! `Subscribed`, and when the session is dropped, so at most one private
//! timer exists per session and none outlives its connection.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, info, instrument, warn};

use super::broadcast_scheduler::BroadcastState;
use super::market_cache::MarketCache;
use crate::adapters::metrics::MetricsRegistry;
use crate::domain::session::{ClientCommand, ConnectionId, ServerEvent, SessionState};

/// Sent to one session when its own request or polling tick fails.
pub const LOAD_ERROR_MESSAGE: &str = "Error loading data";

/// Outbound queue depth per connection. Shared pushes to a full queue are
/// dropped; the next cycle carries a full replacement list anyway.
pub const OUTBOX_CAPACITY: usize = 32;

/// Per-connection state.
struct Session {
    outbox: mpsc::Sender<ServerEvent>,
    state: SessionState,
    refresh_task: Option<JoinHandle<()>>,
}

impl Session {
    fn cancel_refresh(&mut self) {
        if let Some(task) = self.refresh_task.take() {
            task.abort();
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.cancel_refresh();
    }
}

/// Routes viewer commands and shared pushes to sessions.
pub struct SessionRouter {
    cache: Arc<MarketCache>,
    broadcast: Arc<BroadcastState>,
    refresh_interval: Duration,
    sessions: Mutex<HashMap<ConnectionId, Session>>,
    metrics: Arc<MetricsRegistry>,
}

impl SessionRouter {
    /// Create a router with no sessions.
    pub fn new(
        cache: Arc<MarketCache>,
        broadcast: Arc<BroadcastState>,
        refresh_interval: Duration,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            cache,
            broadcast,
            refresh_interval,
            sessions: Mutex::new(HashMap::new()),
            metrics,
        }
    }

    /// Register a new connection as `Subscribed`.
    ///
    /// The current top coins are queued immediately (possibly an empty
    /// list before the first broadcast). Events for the connection arrive
    /// on the returned receiver.
    pub fn connect(&self) -> (ConnectionId, mpsc::Receiver<ServerEvent>) {
        let id = ConnectionId::new();
        let (outbox, rx) = mpsc::channel(OUTBOX_CAPACITY);
        let _ = outbox.try_send(ServerEvent::CoinsData(self.broadcast.latest()));

        let mut sessions = self.lock();
        sessions.insert(
            id,
            Session {
                outbox,
                state: SessionState::Subscribed,
                refresh_task: None,
            },
        );
        self.metrics.sessions_connected.set(sessions.len() as i64);
        info!(connection = %id, sessions = sessions.len(), "Session connected");

        (id, rx)
    }

    /// Drop a connection and cancel its private timer, from any state.
    ///
    /// Returns `false` if the id was unknown.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        let removed = {
            let mut sessions = self.lock();
            let removed = sessions.remove(&id);
            self.metrics.sessions_connected.set(sessions.len() as i64);
            removed
        };
        match removed {
            Some(_) => {
                info!(connection = %id, "Session disconnected");
                true
            }
            None => false,
        }
    }

    /// Apply one inbound command.
    pub async fn handle(&self, id: ConnectionId, command: ClientCommand) {
        match command {
            ClientCommand::RequestCoins => self.request_default(id).await,
            ClientCommand::SearchCoins(term) => self.search(id, &term),
        }
    }

    /// Return to the shared channel and push top coins.
    ///
    /// Uses the broadcast state when it has data, otherwise resolves the
    /// `top` key through the cache once.
    #[instrument(skip(self, id), fields(connection = %id))]
    pub async fn request_default(&self, id: ConnectionId) {
        let outbox = {
            let mut sessions = self.lock();
            let Some(session) = sessions.get_mut(&id) else {
                return;
            };
            session.cancel_refresh();
            session.state = SessionState::Subscribed;
            session.outbox.clone()
        };

        let event = if self.broadcast.has_data() {
            ServerEvent::CoinsData(self.broadcast.latest())
        } else {
            match self.cache.get("").await {
                Ok(coins) => ServerEvent::CoinsData(coins),
                Err(e) => {
                    warn!(error = %e, "Cold top-coins fetch failed");
                    ServerEvent::CoinsError(LOAD_ERROR_MESSAGE.to_string())
                }
            }
        };

        // The session may have started a search while we were fetching.
        if self.state_of(id).is_some_and(|s| s.is_subscribed()) {
            deliver(&outbox, event);
        }
    }

    /// Enter `Searching(term)`, or return to `Subscribed` for an empty term.
    ///
    /// A non-empty term cancels any previous private timer, then starts a
    /// new one whose first tick resolves and pushes immediately.
    #[instrument(skip(self, id, term), fields(connection = %id))]
    pub fn search(&self, id: ConnectionId, term: &str) {
        let term = term.trim();
        let mut sessions = self.lock();
        let Some(session) = sessions.get_mut(&id) else {
            return;
        };

        session.cancel_refresh();

        if term.is_empty() {
            session.state = SessionState::Subscribed;
            deliver(
                &session.outbox,
                ServerEvent::CoinsData(self.broadcast.latest()),
            );
            debug!("Search cleared, back on shared channel");
            return;
        }

        session.state = SessionState::Searching(term.to_string());
        session.refresh_task = Some(tokio::spawn(private_refresh(
            Arc::clone(&self.cache),
            session.outbox.clone(),
            term.to_string(),
            self.refresh_interval,
        )));
        debug!(term, "Private polling started");
    }

    /// Push to every `Subscribed` session. Returns how many were reached.
    pub fn publish_shared(&self, event: &ServerEvent) -> usize {
        self.lock()
            .values()
            .filter(|s| s.state.is_subscribed())
            .filter(|s| deliver(&s.outbox, event.clone()))
            .count()
    }

    /// Push to every session regardless of state.
    pub fn publish_all(&self, event: &ServerEvent) -> usize {
        self.lock()
            .values()
            .filter(|s| deliver(&s.outbox, event.clone()))
            .count()
    }

    /// Current state of a session.
    pub fn state_of(&self, id: ConnectionId) -> Option<SessionState> {
        self.lock().get(&id).map(|s| s.state.clone())
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.lock().len()
    }

    /// Drop every session, cancelling all private timers.
    pub fn shutdown(&self) {
        let drained: Vec<Session> = {
            let mut sessions = self.lock();
            sessions.drain().map(|(_, s)| s).collect()
        };
        self.metrics.sessions_connected.set(0);
        info!(sessions = drained.len(), "All sessions closed");
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ConnectionId, Session>> {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Queue an event without waiting. `false` if the queue is full or closed.
fn deliver(outbox: &mpsc::Sender<ServerEvent>, event: ServerEvent) -> bool {
    match outbox.try_send(event) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(_)) => {
            debug!("Session outbox full, dropping event");
            false
        }
        Err(mpsc::error::TrySendError::Closed(_)) => false,
    }
}

/// Private polling loop for one session and term.
///
/// Captures only what it needs (cache, outbox, term) so it never keeps the
/// router or other sessions alive. Ends when aborted or when the
/// connection's receiver is gone.
async fn private_refresh(
    cache: Arc<MarketCache>,
    outbox: mpsc::Sender<ServerEvent>,
    term: String,
    period: Duration,
) {
    let mut ticker = interval(period);
    loop {
        ticker.tick().await;
        let event = match cache.get(&term).await {
            Ok(coins) => ServerEvent::CoinsData(coins),
            Err(e) => {
                warn!(term = %term, error = %e, "Private refresh failed");
                ServerEvent::CoinsError(LOAD_ERROR_MESSAGE.to_string())
            }
        };
        if outbox.send(event).await.is_err() {
            debug!(term = %term, "Connection gone, stopping private refresh");
            break;
        }
    }
}
