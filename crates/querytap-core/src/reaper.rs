//! Periodic sweep removing stale streams and stale in-flight conversations.
//!
//! Connections can die silently — client crash, NAT rebinding — without a
//! response frame ever arriving. Without this, in-flight state would grow
//! unboundedly. Two sweeps, independent of each other.

use std::time::{Duration, SystemTime};

use tracing::debug;

use crate::conversation::ConversationTracker;
use crate::stream_store::StreamStore;

#[derive(Debug, Clone, Copy)]
pub struct ReaperConfig {
    pub traffic_timeout: Duration,
    pub conversation_timeout: Duration,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            traffic_timeout: Duration::from_secs(180),
            conversation_timeout: Duration::from_secs(180),
        }
    }
}

pub struct Reaper {
    config: ReaperConfig,
}

impl Reaper {
    pub fn new(config: ReaperConfig) -> Self {
        Self { config }
    }

    /// Runs both sweeps against `now`, returning how many traffic slots and
    /// conversations were evicted.
    pub fn sweep(
        &self,
        now: SystemTime,
        streams: &mut StreamStore,
        conversations: &mut ConversationTracker,
    ) -> SweepResult {
        let traffic_threshold = now
            .checked_sub(self.config.traffic_timeout)
            .unwrap_or(SystemTime::UNIX_EPOCH);
        let conversation_threshold = now
            .checked_sub(self.config.conversation_timeout)
            .unwrap_or(SystemTime::UNIX_EPOCH);

        let traffic_evicted = streams.evict_older_than(traffic_threshold);
        let conversations_evicted = conversations.evict_older_than(conversation_threshold);

        if traffic_evicted > 0 || conversations_evicted > 0 {
            debug!(
                traffic_evicted,
                conversations_evicted,
                remaining_connections = streams.connection_count(),
                remaining_conversations = conversations.live_count(),
                "reaper sweep"
            );
        }

        SweepResult {
            traffic_evicted,
            conversations_evicted,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SweepResult {
    pub traffic_evicted: usize,
    pub conversations_evicted: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{Packet, PacketKind};
    use crate::traffic::{Direction, Traffic};

    fn epoch(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[test]
    fn sweep_evicts_both_streams_and_conversations_past_threshold() {
        let mut streams = StreamStore::new();
        let mut conversations = ConversationTracker::new();

        streams.store(Traffic::new(1, epoch(0), Direction::Incoming, vec![1, 2]).unwrap());
        conversations
            .process(
                &Packet {
                    length: 1,
                    sequence_id: 0,
                    partial: false,
                    kind: PacketKind::Request,
                    connection_key: 2,
                    timestamp: epoch(0),
                    payload: vec![0x17],
                },
                crate::conversation::InvariantMode::Strict,
            )
            .unwrap();

        let reaper = Reaper::new(ReaperConfig {
            traffic_timeout: Duration::from_secs(10),
            conversation_timeout: Duration::from_secs(10),
        });

        let result = reaper.sweep(epoch(20), &mut streams, &mut conversations);
        assert_eq!(result.traffic_evicted, 1);
        assert_eq!(result.conversations_evicted, 1);
        assert_eq!(streams.connection_count(), 0);
        assert_eq!(conversations.live_count(), 0);
    }

    #[test]
    fn sweep_leaves_fresh_state_alone() {
        let mut streams = StreamStore::new();
        let mut conversations = ConversationTracker::new();
        streams.store(Traffic::new(1, epoch(19), Direction::Incoming, vec![1]).unwrap());

        let reaper = Reaper::new(ReaperConfig {
            traffic_timeout: Duration::from_secs(10),
            conversation_timeout: Duration::from_secs(10),
        });
        let result = reaper.sweep(epoch(20), &mut streams, &mut conversations);
        assert_eq!(result, SweepResult::default());
        assert_eq!(streams.connection_count(), 1);
    }
}
