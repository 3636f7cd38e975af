//! A deliberately non-production packet source: replays a JSON-lines
//! capture file (or stdin) as [`PacketRecord`]s.
//!
//! The real packet-capture driver — libpcap-style live capture, BPF filter
//! compilation, interface handling — is out of scope for this crate (see
//! SPEC_FULL.md §1); this backend exists only so the binary and its
//! integration tests have something concrete implementing
//! [`PacketSource`] to drive. Each line is a JSON object:
//!
//! ```json
//! {"connection_key": "1", "direction": "incoming", "payload_hex": "0900000003...", "timestamp_ms": 1700000000000}
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

use querytap_core::error::CaptureError;
use querytap_core::source::{CaptureStats, PacketRecord, PacketSource};
use querytap_core::traffic::Direction;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

#[derive(Deserialize)]
struct ReplayLine {
    connection_key: String,
    direction: String,
    payload_hex: String,
    timestamp_ms: u64,
}

#[derive(Default)]
struct Counters {
    received: AtomicU64,
    dropped: AtomicU64,
}

pub struct ReplayPacketSource {
    /// Path to a capture file, or `None` to read from stdin.
    path: Option<PathBuf>,
    channel_capacity: usize,
    counters: Arc<Counters>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task_handle: Option<tokio::task::JoinHandle<()>>,
}

impl ReplayPacketSource {
    pub fn from_file(path: PathBuf, channel_capacity: usize) -> Self {
        Self {
            path: Some(path),
            channel_capacity,
            counters: Arc::new(Counters::default()),
            shutdown_tx: None,
            task_handle: None,
        }
    }

    pub fn from_stdin(channel_capacity: usize) -> Self {
        Self {
            path: None,
            channel_capacity,
            counters: Arc::new(Counters::default()),
            shutdown_tx: None,
            task_handle: None,
        }
    }
}

impl PacketSource for ReplayPacketSource {
    fn start(&mut self) -> Result<mpsc::Receiver<PacketRecord>, CaptureError> {
        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        let path = self.path.clone();
        let counters = self.counters.clone();

        let task_handle = tokio::spawn(async move {
            let reader: Box<dyn tokio::io::AsyncRead + Unpin + Send> = match &path {
                Some(p) => match tokio::fs::File::open(p).await {
                    Ok(f) => Box::new(f),
                    Err(e) => {
                        warn!("replay: failed to open {}: {e}", p.display());
                        return;
                    }
                },
                None => Box::new(tokio::io::stdin()),
            };
            let mut lines = BufReader::new(reader).lines();

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    line = lines.next_line() => {
                        match line {
                            Ok(Some(line)) => {
                                if line.trim().is_empty() {
                                    continue;
                                }
                                match parse_line(&line) {
                                    Some(record) => {
                                        counters.received.fetch_add(1, Ordering::Relaxed);
                                        if tx.send(record).await.is_err() {
                                            break;
                                        }
                                    }
                                    None => {
                                        counters.dropped.fetch_add(1, Ordering::Relaxed);
                                    }
                                }
                            }
                            Ok(None) => break, // EOF
                            Err(e) => {
                                warn!("replay: read error: {e}");
                                break;
                            }
                        }
                    }
                }
            }
        });

        self.shutdown_tx = Some(shutdown_tx);
        self.task_handle = Some(task_handle);
        Ok(rx)
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        Ok(())
    }

    fn capture_stats(&self) -> CaptureStats {
        CaptureStats {
            received: self.counters.received.load(Ordering::Relaxed),
            dropped_by_kernel: self.counters.dropped.load(Ordering::Relaxed),
            dropped_by_interface: 0,
        }
    }

    fn name(&self) -> &str {
        "replay"
    }
}

fn parse_line(line: &str) -> Option<PacketRecord> {
    let parsed: ReplayLine = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => {
            warn!("replay: failed to parse line as JSON: {e}");
            return None;
        }
    };

    let connection_key = match u64::from_str_radix(&parsed.connection_key, 16) {
        Ok(v) => v,
        Err(_) => parsed.connection_key.parse().ok()?,
    };

    let direction = match parsed.direction.as_str() {
        "incoming" => Direction::Incoming,
        "outgoing" => Direction::Outgoing,
        other => {
            warn!("replay: unknown direction {other:?}");
            return None;
        }
    };

    let payload = match hex::decode(&parsed.payload_hex) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("replay: failed to decode payload_hex: {e}");
            return None;
        }
    };
    let timestamp = UNIX_EPOCH + Duration::from_millis(parsed.timestamp_ms);

    Some(PacketRecord {
        connection_key,
        timestamp,
        direction,
        payload,
    })
}
