//! Contract for the external output-sink collaborator.
//!
//! The concrete rendering (file/stdout writer, verbosity filter, hex
//! dumper) is out of scope for the core; this is just the seam the
//! pipeline driver pushes completed conversations through.

use crate::conversation::Conversation;

/// Receives one completed [`Conversation`] at a time (status is always
/// `Done` or `Error` by the time it reaches a sink).
pub trait OutputSink: Send {
    fn emit(&mut self, conversation: &Conversation);
}
