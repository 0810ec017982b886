//! Session domain types for the real-time channel.
//!
//! A session is one connected viewer. It is either subscribed to the shared
//! top-coins broadcast or polling a private search term. The inbound and
//! outbound message shapes of the channel live here too.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::coin::MarketSnapshot;

/// Identity of one live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Fresh random connection id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a session currently gets its data from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Member of the shared channel; receives scheduler pushes.
    Subscribed,
    /// Left the shared channel; a private timer polls this term.
    Searching(String),
}

impl SessionState {
    /// Whether scheduler pushes reach this session.
    pub fn is_subscribed(&self) -> bool {
        matches!(self, Self::Subscribed)
    }
}

/// Command received from a viewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    /// Go back to the shared top-coins channel.
    RequestCoins,
    /// Search for a term; empty means the same as `RequestCoins` minus the
    /// cold-cache fetch.
    SearchCoins(String),
}

/// Raw inbound frame: `{"event": "...", "data": ...}`.
#[derive(Debug, Deserialize)]
struct InboundFrame {
    event: String,
    #[serde(default)]
    data: Option<Value>,
}

impl ClientCommand {
    /// Parse a text frame. Unknown events and malformed frames yield `None`.
    pub fn parse(text: &str) -> Option<Self> {
        let frame: InboundFrame = serde_json::from_str(text).ok()?;
        match frame.event.as_str() {
            "requestCoins" => Some(Self::RequestCoins),
            "searchCoins" => match frame.data {
                None | Some(Value::Null) => Some(Self::SearchCoins(String::new())),
                Some(Value::String(term)) => Some(Self::SearchCoins(term)),
                Some(_) => None,
            },
            _ => None,
        }
    }
}

/// Event pushed to a viewer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    /// A full replacement list of coins.
    CoinsData(Arc<Vec<MarketSnapshot>>),
    /// Human-readable failure message.
    CoinsError(String),
}

impl ServerEvent {
    /// JSON text frame for the wire.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
