//! Decodes one MySQL wire frame from the front of a [`Traffic`] buffer.

use std::time::SystemTime;

use crate::byte_reader::{read_u8, read_u24_le};
use crate::traffic::{Direction, Traffic};

/// Note that the "packet type" byte (OK/EOF/Err/command) is technically
/// part of the payload, not the header.
const PACKET_HEADER_SIZE: usize = 4;

pub const COM_QUERY: u8 = 0x03;
pub const COM_STMT_PREPARE: u8 = 0x16;
pub const COM_STMT_EXECUTE: u8 = 0x17;
pub const ERROR_HEADER: u8 = 0xFF;

/// A length of `0xFFFFFF` (the max value a 24-bit field can hold) means
/// "more frames follow with sequence id + 1".
const MAX_PACKET_LENGTH: u32 = 0xFFFFFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    Request,
    Response,
}

/// A decoded MySQL wire frame. Transient: decoded from the front of a
/// [`Traffic`] and discarded after the tracker has processed it.
#[derive(Debug, Clone)]
pub struct Packet {
    pub length: u32,
    pub sequence_id: u8,
    pub partial: bool,
    pub kind: PacketKind,
    pub connection_key: u64,
    pub timestamp: SystemTime,
    pub payload: Vec<u8>,
}

impl Packet {
    /// Attempts to decode one frame from the front of `traffic`. Returns
    /// `None` meaning "insufficient bytes, retry after more traffic
    /// arrives" and leaves `traffic` untouched in that case.
    pub fn decode(traffic: &mut Traffic) -> Option<Packet> {
        if traffic.len() < PACKET_HEADER_SIZE {
            return None;
        }

        let data = traffic.bytes();
        let (length, offset) = read_u24_le(data, 0);
        let (sequence_id, offset) = read_u8(data, offset);

        let total_len = PACKET_HEADER_SIZE + length as usize;
        if traffic.len() < total_len {
            return None;
        }

        let kind = if traffic.is_incoming() {
            PacketKind::Request
        } else {
            PacketKind::Response
        };
        let connection_key = traffic.connection_key;
        let timestamp = traffic.timestamp;

        let frame = traffic.shift(total_len);
        let payload = frame[offset..].to_vec();

        Some(Packet {
            length,
            sequence_id,
            partial: length == MAX_PACKET_LENGTH,
            kind,
            connection_key,
            timestamp,
            payload,
        })
    }

    pub fn is_request(&self) -> bool {
        self.kind == PacketKind::Request
    }

    pub fn is_response(&self) -> bool {
        self.kind == PacketKind::Response
    }

    /// The command byte for request packets (the first payload byte).
    /// Callers must check `!payload.is_empty()` first, e.g. via
    /// [`Self::is_relevant_command`].
    pub fn command(&self) -> u8 {
        self.payload[0]
    }

    pub fn is_relevant_command(&self) -> bool {
        self.is_request()
            && !self.payload.is_empty()
            && matches!(self.command(), COM_QUERY | COM_STMT_PREPARE | COM_STMT_EXECUTE)
    }

    pub fn contains_query(&self) -> bool {
        self.is_request()
            && !self.payload.is_empty()
            && matches!(self.command(), COM_QUERY | COM_STMT_PREPARE)
    }

    pub fn executes_query(&self) -> bool {
        self.is_request()
            && !self.payload.is_empty()
            && matches!(self.command(), COM_QUERY | COM_STMT_EXECUTE)
    }

    pub fn is_error_response(&self) -> bool {
        self.is_response() && self.payload.first() == Some(&ERROR_HEADER)
    }

    /// The SQL statement carried by a query-bearing request, i.e. the
    /// payload with the command byte dropped. Only meaningful when
    /// [`Self::contains_query`] holds.
    pub fn statement(&self) -> &[u8] {
        &self.payload[1..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn traffic_from(direction: Direction, bytes: &[u8]) -> Traffic {
        Traffic::new(1, SystemTime::UNIX_EPOCH, direction, bytes.to_vec()).unwrap()
    }

    #[test]
    fn decode_returns_none_below_header_size() {
        let mut t = traffic_from(Direction::Incoming, &[0x01, 0x00]);
        assert!(Packet::decode(&mut t).is_none());
        assert_eq!(t.len(), 2, "untouched when insufficient bytes");
    }

    #[test]
    fn decode_returns_none_when_payload_short() {
        // length=9 but only 2 payload bytes supplied
        let mut t = traffic_from(Direction::Incoming, &[0x09, 0x00, 0x00, 0x00, 0x53, 0x45]);
        assert!(Packet::decode(&mut t).is_none());
        assert_eq!(t.len(), 6, "decoder must not consume a short frame");
    }

    #[test]
    fn decode_com_query_select_1() {
        let bytes = [
            0x09, 0x00, 0x00, 0x00, 0x03, b'S', b'E', b'L', b'E', b'C', b'T', b' ', b'1',
        ];
        let mut t = traffic_from(Direction::Incoming, &bytes);
        let p = Packet::decode(&mut t).unwrap();
        assert_eq!(p.length, 9);
        assert_eq!(p.sequence_id, 0);
        assert!(!p.partial);
        assert!(p.is_request());
        assert!(p.contains_query());
        assert!(p.executes_query());
        assert_eq!(p.statement(), b"SELECT 1");
        assert!(t.is_empty());
    }

    #[test]
    fn decode_ok_response() {
        let bytes = [0x07, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00];
        let mut t = traffic_from(Direction::Outgoing, &bytes);
        let p = Packet::decode(&mut t).unwrap();
        assert!(p.is_response());
        assert!(!p.is_error_response());
    }

    #[test]
    fn decode_error_response() {
        let mut t = traffic_from(Direction::Outgoing, &[0x02, 0x00, 0x00, 0x01, 0xFF, 0x15]);
        let p = Packet::decode(&mut t).unwrap();
        assert!(p.is_error_response());
    }

    #[test]
    fn decode_leaves_remaining_bytes_for_next_frame() {
        let mut bytes = vec![0x01, 0x00, 0x00, 0x00, 0x03];
        bytes.extend_from_slice(&[0x01, 0x00, 0x00, 0x01, 0x00]);
        let mut t = traffic_from(Direction::Incoming, &bytes);
        let first = Packet::decode(&mut t).unwrap();
        assert_eq!(first.length, 1);
        assert_eq!(t.len(), 5, "second frame's header remains");
        let second = Packet::decode(&mut t).unwrap();
        assert_eq!(second.length, 1);
        assert!(t.is_empty());
    }

    #[test]
    fn empty_payload_frame_is_decoded_but_not_relevant() {
        let mut t = traffic_from(Direction::Incoming, &[0x00, 0x00, 0x00, 0x05]);
        let p = Packet::decode(&mut t).unwrap();
        assert_eq!(p.length, 0);
        assert!(p.payload.is_empty());
        assert!(!p.is_relevant_command());
    }

    #[test]
    fn partial_frame_marker() {
        let mut bytes = vec![0xFF, 0xFF, 0xFF, 0x00];
        bytes.extend(std::iter::repeat(0x41).take(0xFFFFFF));
        let mut t = traffic_from(Direction::Incoming, &bytes);
        let p = Packet::decode(&mut t).unwrap();
        assert!(p.partial);
    }

    #[test]
    fn com_stmt_prepare_contains_query() {
        let bytes = [0x08, 0x00, 0x00, 0x00, COM_STMT_PREPARE, b'S', b'E', b'L', b'E', b'C', b'T', b'?' ];
        let mut t = traffic_from(Direction::Incoming, &bytes);
        let p = Packet::decode(&mut t).unwrap();
        assert!(p.contains_query());
        assert_eq!(p.statement(), b"SELECT?");
    }

    #[test]
    fn com_stmt_execute_executes_but_does_not_contain_query() {
        let bytes = [0x01, 0x00, 0x00, 0x00, COM_STMT_EXECUTE];
        let mut t = traffic_from(Direction::Incoming, &bytes);
        let p = Packet::decode(&mut t).unwrap();
        assert!(!p.contains_query());
        assert!(p.executes_query());
    }

    #[test]
    fn re_decoding_unchanged_traffic_is_impossible_by_construction() {
        // decode() drains the frame it reads; calling it twice on the same
        // Traffic without new data returns None the second time because
        // the bytes are gone, which is the round-trip guarantee: the *next*
        // call sees the *next* frame's header, never the same bytes again.
        let bytes = [0x01, 0x00, 0x00, 0x00, 0x03];
        let mut t = traffic_from(Direction::Incoming, &bytes);
        assert!(Packet::decode(&mut t).is_some());
        assert!(Packet::decode(&mut t).is_none());
    }
}
