//! Per-connection finite state machine mapping request/response packet
//! pairs to [`Conversation`] records.

use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use tracing::debug;

use crate::error::ProtocolError;
use crate::packet::Packet;

/// `Done`/`Error` carry their `elapsed` duration so a "terminal" state is
/// structurally distinct from a live one — you can't have a `Done` without
/// having measured something.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversationStatus {
    /// The full query hasn't arrived yet (a partial, multi-frame command).
    Incomplete,
    /// The query was fully sent; waiting for the server's response.
    Waiting,
    Done { elapsed: Duration },
    Error { elapsed: Duration },
}

impl ConversationStatus {
    fn name(&self) -> &'static str {
        match self {
            ConversationStatus::Incomplete => "Incomplete",
            ConversationStatus::Waiting => "Waiting",
            ConversationStatus::Done { .. } => "Done",
            ConversationStatus::Error { .. } => "Error",
        }
    }
}

/// The in-flight or completed state of one client-issued query.
#[derive(Debug, Clone)]
pub struct Conversation {
    pub connection_key: u64,
    pub statement: Vec<u8>,
    pub status: ConversationStatus,
    pub created_at: SystemTime,
    /// When the request side finished sending (the clock `elapsed` measures
    /// from). Public so sink implementations in other crates can construct
    /// Conversations for their own tests; the tracker is the only thing that
    /// actually mutates it in production.
    pub executed_at: SystemTime,
}

impl Conversation {
    fn new(connection_key: u64, now: SystemTime) -> Self {
        Self {
            connection_key,
            statement: Vec::new(),
            status: ConversationStatus::Incomplete,
            created_at: now,
            executed_at: now,
        }
    }

    pub fn statement_text(&self) -> String {
        String::from_utf8_lossy(&self.statement).into_owned()
    }
}

/// Whether the tracker should abort the process or log-and-drop when a
/// response arrives out of turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvariantMode {
    Strict,
    Lenient,
}

/// Maps connection keys to their live Conversation and drives the state
/// transitions in response to decoded packets.
#[derive(Debug, Default)]
pub struct ConversationTracker {
    live: HashMap<u64, Conversation>,
}

impl ConversationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn created_at(&self, connection_key: u64) -> Option<SystemTime> {
        self.live.get(&connection_key).map(|c| c.created_at)
    }

    /// Drops every Conversation whose `created_at` is older than
    /// `threshold`, without emitting them.
    pub fn evict_older_than(&mut self, threshold: SystemTime) -> usize {
        let before = self.live.len();
        self.live.retain(|_, c| c.created_at >= threshold);
        before - self.live.len()
    }

    /// Processes one decoded packet, returning a completed Conversation if
    /// this packet finished one (`Done` or `Error`).
    ///
    /// Non-relevant packets are silently dropped without disturbing state.
    /// A response arriving for a Conversation that isn't `Waiting` is a
    /// protocol invariant violation: in [`InvariantMode::Strict`] (the
    /// default) this panics; in [`InvariantMode::Lenient`] the corrupted
    /// Conversation is discarded
    /// and `Err(ProtocolError)` is returned for the caller to log.
    pub fn process(
        &mut self,
        packet: &Packet,
        mode: InvariantMode,
    ) -> Result<Option<Conversation>, ProtocolError> {
        let key = packet.connection_key;

        if packet.is_response() {
            return self.process_response(key, packet, mode);
        }

        if !packet.is_relevant_command() {
            return Ok(None);
        }

        let now = packet.timestamp;
        let conv = self.live.entry(key).or_insert_with(|| Conversation::new(key, now));

        if packet.contains_query() {
            conv.statement.extend_from_slice(packet.statement());
        }

        if !packet.partial {
            if packet.contains_query() || packet.executes_query() {
                conv.executed_at = now;
            }
            if matches!(conv.status, ConversationStatus::Incomplete) {
                conv.status = ConversationStatus::Waiting;
            }
        } else {
            debug!(connection_key = %format!("{key:x}"), "partial frame, conversation stays Incomplete");
        }

        Ok(None)
    }

    fn process_response(
        &mut self,
        key: u64,
        packet: &Packet,
        mode: InvariantMode,
    ) -> Result<Option<Conversation>, ProtocolError> {
        let Some(conv) = self.live.get(&key) else {
            // Query results we're not tracking a request for — ignore.
            return Ok(None);
        };

        if conv.status != ConversationStatus::Waiting {
            let violation = ProtocolError {
                connection_key: key,
                status: conv.status.name().to_string(),
            };
            return match mode {
                InvariantMode::Strict => panic!("{violation}"),
                InvariantMode::Lenient => {
                    self.live.remove(&key);
                    Err(violation)
                }
            };
        }

        let mut conv = self.live.remove(&key).expect("checked above");
        let elapsed = packet
            .timestamp
            .duration_since(conv.executed_at)
            .unwrap_or(Duration::ZERO);
        conv.status = if packet.is_error_response() {
            ConversationStatus::Error { elapsed }
        } else {
            ConversationStatus::Done { elapsed }
        };
        debug!(connection_key = %format!("{key:x}"), "conversation completed");
        Ok(Some(conv))
    }
}
