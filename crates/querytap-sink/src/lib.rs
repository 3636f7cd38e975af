//! Output collaborators that render completed [`Conversation`]s.
//!
//! The core only needs something implementing [`OutputSink`]; these are the
//! two concrete renderings this workspace ships: a line-oriented text form
//! and a JSON-lines form for downstream tooling.

use std::io::Write;

use querytap_core::conversation::{Conversation, ConversationStatus};
use querytap_core::sink::OutputSink;
use serde::Serialize;
use tracing::warn;

/// Writes one line per Conversation: elapsed seconds to six decimal places,
/// the statement text, and a terminating `;`.
///
/// ```text
/// 0.002341 SELECT * FROM users WHERE id = 1;
/// ```
///
/// Errored conversations are prefixed with `[ERROR]`.
pub struct TextSink<W: Write> {
    out: W,
}

impl TextSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self { out: std::io::stdout() }
    }
}

impl<W: Write> TextSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write + Send> OutputSink for TextSink<W> {
    fn emit(&mut self, conversation: &Conversation) {
        let elapsed = match conversation.status {
            ConversationStatus::Done { elapsed } | ConversationStatus::Error { elapsed } => elapsed,
            ConversationStatus::Incomplete | ConversationStatus::Waiting => {
                warn!("sink received a non-terminal conversation; this is a pipeline bug");
                return;
            }
        };

        let prefix = if matches!(conversation.status, ConversationStatus::Error { .. }) {
            "[ERROR] "
        } else {
            ""
        };

        let line = format!(
            "{prefix}{:.6} {};",
            elapsed.as_secs_f64(),
            conversation.statement_text()
        );

        if let Err(e) = writeln!(self.out, "{line}") {
            warn!("sink: failed to write line: {e}");
        }
    }
}

#[derive(Serialize)]
struct JsonRecord<'a> {
    connection_key: String,
    statement: &'a str,
    elapsed_secs: f64,
    error: bool,
}

/// Writes one JSON object per line.
pub struct JsonSink<W: Write> {
    out: W,
}

impl JsonSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self { out: std::io::stdout() }
    }
}

impl<W: Write> JsonSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write + Send> OutputSink for JsonSink<W> {
    fn emit(&mut self, conversation: &Conversation) {
        let (elapsed, error) = match conversation.status {
            ConversationStatus::Done { elapsed } => (elapsed, false),
            ConversationStatus::Error { elapsed } => (elapsed, true),
            ConversationStatus::Incomplete | ConversationStatus::Waiting => {
                warn!("sink received a non-terminal conversation; this is a pipeline bug");
                return;
            }
        };

        let record = JsonRecord {
            connection_key: format!("{:x}", conversation.connection_key),
            statement: &conversation.statement_text(),
            elapsed_secs: elapsed.as_secs_f64(),
            error,
        };

        match serde_json::to_string(&record) {
            Ok(line) => {
                if let Err(e) = writeln!(self.out, "{line}") {
                    warn!("sink: failed to write line: {e}");
                }
            }
            Err(e) => warn!("sink: failed to serialize conversation: {e}"),
        }
    }
}
