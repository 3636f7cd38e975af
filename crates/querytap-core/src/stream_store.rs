//! Per-connection, per-direction buffers of unconsumed wire bytes.

use std::collections::HashMap;
use std::time::SystemTime;

use crate::traffic::{Direction, Traffic};

/// At most one Traffic per direction; a slot is `None` iff no unconsumed
/// bytes remain for that direction.
#[derive(Debug, Default)]
struct StreamSet {
    incoming: Option<Traffic>,
    outgoing: Option<Traffic>,
}

impl StreamSet {
    fn slot(&mut self, direction: Direction) -> &mut Option<Traffic> {
        match direction {
            Direction::Incoming => &mut self.incoming,
            Direction::Outgoing => &mut self.outgoing,
        }
    }

    fn is_empty(&self) -> bool {
        self.incoming.is_none() && self.outgoing.is_none()
    }
}

/// Mapping from connection key to its [`StreamSet`].
#[derive(Debug, Default)]
pub struct StreamStore {
    sets: HashMap<u64, StreamSet>,
}

impl StreamStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `traffic`, appending to an existing buffer for this
    /// (connection, direction) or inserting fresh. Returns a mutable handle
    /// to the resident Traffic so the caller can drain packets from it.
    pub fn store(&mut self, traffic: Traffic) -> &mut Traffic {
        let key = traffic.connection_key;
        let set = self.sets.entry(key).or_default();
        let slot = set.slot(traffic.direction);

        match slot {
            Some(existing) => {
                existing.append(traffic.bytes(), traffic.timestamp);
            }
            None => {
                *slot = Some(traffic);
            }
        }

        slot.as_mut().expect("just inserted or appended to")
    }

    /// Removes the entire StreamSet for a connection.
    pub fn drop_connection(&mut self, connection_key: u64) {
        self.sets.remove(&connection_key);
    }

    /// Clears the given slot if the tracker fully drained it (the decoder
    /// leaves bytes behind only on a short trailing frame, in which case
    /// the slot is kept). Removes the connection's entry once both slots
    /// are empty.
    pub fn prune_if_empty(&mut self, connection_key: u64, direction: Direction) {
        let Some(set) = self.sets.get_mut(&connection_key) else {
            return;
        };
        let slot = set.slot(direction);
        if slot.as_ref().is_some_and(Traffic::is_empty) {
            *slot = None;
        }
        if set.is_empty() {
            self.sets.remove(&connection_key);
        }
    }

    /// Clears any slot whose timestamp is strictly before `threshold`,
    /// removing the connection's entry entirely once both slots are empty.
    pub fn evict_older_than(&mut self, threshold: SystemTime) -> usize {
        let mut evicted = 0;
        self.sets.retain(|_key, set| {
            for slot in [&mut set.incoming, &mut set.outgoing] {
                if slot.as_ref().is_some_and(|t| t.timestamp < threshold) {
                    *slot = None;
                    evicted += 1;
                }
            }
            !set.is_empty()
        });
        evicted
    }

    pub fn connection_count(&self) -> usize {
        self.sets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn traffic(key: u64, dir: Direction, ts: SystemTime, bytes: &[u8]) -> Traffic {
        Traffic::new(key, ts, dir, bytes.to_vec()).unwrap()
    }

    #[test]
    fn store_installs_fresh_traffic() {
        let mut store = StreamStore::new();
        let t = traffic(1, Direction::Incoming, SystemTime::UNIX_EPOCH, &[1, 2, 3]);
        let resident = store.store(t);
        assert_eq!(resident.bytes(), &[1, 2, 3]);
        assert_eq!(store.connection_count(), 1);
    }

    #[test]
    fn store_appends_to_existing_direction() {
        let mut store = StreamStore::new();
        store.store(traffic(1, Direction::Incoming, SystemTime::UNIX_EPOCH, &[1, 2]));
        let later = SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1);
        let resident = store.store(traffic(1, Direction::Incoming, later, &[3, 4]));
        assert_eq!(resident.bytes(), &[1, 2, 3, 4]);
        assert_eq!(resident.timestamp, later);
    }

    #[test]
    fn separate_directions_do_not_interfere() {
        let mut store = StreamStore::new();
        store.store(traffic(1, Direction::Incoming, SystemTime::UNIX_EPOCH, &[1]));
        store.store(traffic(1, Direction::Outgoing, SystemTime::UNIX_EPOCH, &[2]));
        assert_eq!(store.connection_count(), 1);
    }

    #[test]
    fn drop_connection_removes_both_directions() {
        let mut store = StreamStore::new();
        store.store(traffic(1, Direction::Incoming, SystemTime::UNIX_EPOCH, &[1]));
        store.store(traffic(1, Direction::Outgoing, SystemTime::UNIX_EPOCH, &[2]));
        store.drop_connection(1);
        assert_eq!(store.connection_count(), 0);
    }

    #[test]
    fn prune_if_empty_drops_fully_drained_slot() {
        let mut store = StreamStore::new();
        let resident = store.store(traffic(1, Direction::Incoming, SystemTime::UNIX_EPOCH, &[1, 2]));
        resident.shift(2);
        store.prune_if_empty(1, Direction::Incoming);
        assert_eq!(store.connection_count(), 0);
    }

    #[test]
    fn prune_if_empty_keeps_slot_with_leftover_bytes() {
        let mut store = StreamStore::new();
        let resident = store.store(traffic(1, Direction::Incoming, SystemTime::UNIX_EPOCH, &[1, 2]));
        resident.shift(1);
        store.prune_if_empty(1, Direction::Incoming);
        assert_eq!(store.connection_count(), 1);
    }

    #[test]
    fn evict_older_than_clears_only_stale_slots() {
        let mut store = StreamStore::new();
        let old = SystemTime::UNIX_EPOCH;
        let fresh = SystemTime::now();
        store.store(traffic(1, Direction::Incoming, old, &[1]));
        store.store(traffic(1, Direction::Outgoing, fresh, &[2]));

        let threshold = old + std::time::Duration::from_secs(1);
        let evicted = store.evict_older_than(threshold);

        assert_eq!(evicted, 1);
        assert_eq!(store.connection_count(), 1, "outgoing slot kept it alive");
    }

    #[test]
    fn evict_older_than_removes_connection_when_both_slots_clear() {
        let mut store = StreamStore::new();
        let old = SystemTime::UNIX_EPOCH;
        store.store(traffic(1, Direction::Incoming, old, &[1]));
        store.store(traffic(1, Direction::Outgoing, old, &[2]));

        let threshold = old + std::time::Duration::from_secs(1);
        store.evict_older_than(threshold);

        assert_eq!(store.connection_count(), 0);
    }
}
