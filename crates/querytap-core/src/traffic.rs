//! One direction's unconsumed wire bytes for one connection.

use std::time::SystemTime;

/// Client→server vs server→client, as classified by the packet source
/// (comparing destination endpoints against the configured MySQL server
/// address — see [`crate::source::PacketSource`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Incoming,
    Outgoing,
}

/// A mutable, direction-tagged byte buffer with a capture timestamp.
///
/// Invariant: `payload` holds only bytes not yet consumed by the packet
/// decoder. Not `Send`/shared — owned exclusively by the tracker task.
#[derive(Debug, Clone)]
pub struct Traffic {
    pub connection_key: u64,
    pub timestamp: SystemTime,
    pub direction: Direction,
    payload: Vec<u8>,
}

impl Traffic {
    /// Builds a new Traffic, or `None` if the payload is empty — an empty
    /// buffer carries no unconsumed bytes and isn't worth storing.
    pub fn new(
        connection_key: u64,
        timestamp: SystemTime,
        direction: Direction,
        payload: Vec<u8>,
    ) -> Option<Self> {
        if payload.is_empty() {
            return None;
        }
        Some(Self {
            connection_key,
            timestamp,
            direction,
            payload,
        })
    }

    pub fn is_incoming(&self) -> bool {
        self.direction == Direction::Incoming
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.payload
    }

    /// Appends more bytes captured for this (connection, direction) and
    /// bumps the timestamp forward.
    pub fn append(&mut self, payload: &[u8], timestamp: SystemTime) {
        self.payload.extend_from_slice(payload);
        if timestamp > self.timestamp {
            self.timestamp = timestamp;
        }
    }

    /// Excises the first `n` bytes from the front and returns them.
    /// Precondition: `n <= self.len()`.
    pub fn shift(&mut self, n: usize) -> Vec<u8> {
        debug_assert!(n <= self.payload.len());
        self.payload.drain(..n).collect()
    }
}
