//! Contract for the external packet-capture collaborator.
//!
//! The core trusts whatever implements [`PacketSource`] to have already:
//! filtered traffic to a single MySQL server endpoint, classified direction
//! by comparing destination endpoints to that configured address, computed
//! `connection_key` as a symmetric hash of the network flow, dropped
//! non-TCP / payload-less packets, and delivered per-direction payloads in
//! wire order. None of that is this crate's algorithm — see the capture
//! crate for the one concrete (non-production) implementation.

use tokio::sync::mpsc;

use crate::error::CaptureError;
use crate::traffic::Direction;

/// One direction's payload for one connection, as handed to the core by the
/// packet source, before it becomes a [`crate::traffic::Traffic`].
#[derive(Debug, Clone)]
pub struct PacketRecord {
    pub connection_key: u64,
    pub timestamp: std::time::SystemTime,
    pub direction: Direction,
    pub payload: Vec<u8>,
}

/// Final counter snapshot a capture collaborator exposes at shutdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    pub received: u64,
    pub dropped_by_kernel: u64,
    pub dropped_by_interface: u64,
}

impl std::fmt::Display for CaptureStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Packets received: {:>28}\nPackets dropped by kernel: {:>19}\nPackets dropped by interface: {:>16}",
            self.received, self.dropped_by_kernel, self.dropped_by_interface
        )
    }
}

/// Abstraction over packet-capture backends.
///
/// `start` spawns whatever task actually produces traffic and returns a
/// channel of [`PacketRecord`]s; `stop` tears it down; `capture_stats` is
/// meaningful once the source has stopped.
pub trait PacketSource: Send {
    fn start(&mut self) -> Result<mpsc::Receiver<PacketRecord>, CaptureError>;

    fn stop(&mut self) -> Result<(), CaptureError>;

    /// Final counter snapshot, printed to the diagnostic stream on shutdown.
    fn capture_stats(&self) -> CaptureStats;

    fn name(&self) -> &str;
}
