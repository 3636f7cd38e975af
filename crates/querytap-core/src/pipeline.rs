//! Owns the stream store, tracker, and reaper; drives the external packet
//! source and emits completed Conversations to the output sink.

use std::future::Future;
use std::time::SystemTime;

use tokio::time::interval;
use tracing::{enabled, error, info, trace, warn, Level};

use crate::config::EngineConfig;
use crate::conversation::ConversationTracker;
use crate::error::{CaptureError, PipelineError};
use crate::packet::Packet;
use crate::reaper::Reaper;
use crate::sink::OutputSink;
use crate::source::{CaptureStats, PacketRecord, PacketSource};
use crate::stream_store::StreamStore;
use crate::traffic::Traffic;

pub struct PipelineDriver {
    config: EngineConfig,
    streams: StreamStore,
    conversations: ConversationTracker,
    reaper: Reaper,
}

impl PipelineDriver {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            reaper: Reaper::new(config.reaper),
            config,
            streams: StreamStore::new(),
            conversations: ConversationTracker::new(),
        }
    }

    /// Drives the pipeline until `shutdown` resolves or the packet source is
    /// exhausted. Returns the capture collaborator's final statistics
    /// snapshot.
    ///
    /// Main loop waits on one of: a new record from the packet source, the
    /// reap tick, or the shutdown future. Shutdown is cooperative: the loop
    /// exits and drops remaining in-flight Conversations without emitting
    /// them — no partial Conversation is ever emitted.
    pub async fn run(
        mut self,
        mut source: Box<dyn PacketSource>,
        mut sink: Box<dyn OutputSink>,
        shutdown: impl Future<Output = ()>,
    ) -> Result<CaptureStats, PipelineError> {
        let mut traffic_rx = source.start().map_err(PipelineError::from)?;

        let mut reap_tick = interval(self.config.reap_interval);
        reap_tick.tick().await; // the first tick fires immediately; skip it

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    info!("shutdown requested, stopping pipeline");
                    break;
                }

                record = traffic_rx.recv() => {
                    match record {
                        Some(record) => self.handle_record(record, sink.as_mut()),
                        None => {
                            warn!("packet source channel closed; stopping pipeline");
                            break;
                        }
                    }
                }

                _ = reap_tick.tick() => {
                    let now = SystemTime::now();
                    let started = std::time::Instant::now();
                    let result = self.reaper.sweep(now, &mut self.streams, &mut self.conversations);
                    trace!(
                        took_us = started.elapsed().as_micros() as u64,
                        traffic_evicted = result.traffic_evicted,
                        conversations_evicted = result.conversations_evicted,
                        "cleanup pass complete"
                    );
                }
            }
        }

        source.stop()?;
        Ok(source.capture_stats())
    }

    /// Stores the incoming record, then decodes and processes packets off
    /// the front of its Traffic until the decoder reports insufficient
    /// bytes.
    fn handle_record(&mut self, record: PacketRecord, sink: &mut dyn OutputSink) {
        let Some(traffic) = Traffic::new(
            record.connection_key,
            record.timestamp,
            record.direction,
            record.payload,
        ) else {
            return;
        };

        let connection_key = traffic.connection_key;
        let direction = traffic.direction;

        // Drain every complete frame into a local buffer first: `resident`
        // holds a `&mut self.streams` borrow that must end before
        // `dispatch_packet` can take `&mut self` for the conversation
        // tracker.
        let mut decoded = Vec::new();
        let resident = self.streams.store(traffic);
        while let Some(packet) = Packet::decode(resident) {
            decoded.push(packet);
        }

        self.streams.prune_if_empty(connection_key, direction);

        for packet in decoded {
            self.dispatch_packet(packet, sink);
        }
    }

    fn dispatch_packet(&mut self, packet: Packet, sink: &mut dyn OutputSink) {
        trace!(
            connection_key = %format!("{:x}", packet.connection_key),
            sequence_id = packet.sequence_id,
            len = packet.payload.len(),
            "decoded packet"
        );

        // The dump tier (source's `Output.Dump`) is expensive to format, so
        // it's built only when the trace filter is actually enabled.
        if enabled!(Level::TRACE) {
            trace!("{}", hex_dump(&packet.payload));
        }

        match self.conversations.process(&packet, self.config.invariant_mode) {
            Ok(Some(conversation)) => sink.emit(&conversation),
            Ok(None) => {}
            Err(violation) => {
                error!(%violation, "discarding conversation after invariant violation");
            }
        }
    }
}

/// Sixteen-bytes-per-row hex dump with an ASCII gutter, matching the
/// source's `Output.Dump`.
fn hex_dump(payload: &[u8]) -> String {
    let mut out = String::new();
    for chunk in payload.chunks(16) {
        for byte in chunk {
            out.push_str(&format!("{byte:02x} "));
        }
        for _ in chunk.len()..16 {
            out.push_str("   ");
        }
        out.push_str(" |");
        for byte in chunk {
            let c = if byte.is_ascii_graphic() || *byte == b' ' { *byte as char } else { '.' };
            out.push(c);
        }
        out.push_str("|\n");
    }
    out
}
