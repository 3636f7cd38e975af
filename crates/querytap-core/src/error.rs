use thiserror::Error;

/// A state-machine invariant was violated: a response frame arrived for a
/// connection whose Conversation wasn't in `Waiting`. Under `strict` mode
/// (the default) the caller should treat this as fatal; under lenient mode
/// it's logged and the Conversation is discarded.
#[derive(Debug, Error)]
#[error("protocol invariant violated on connection {connection_key:x}: response arrived while status was {status}")]
pub struct ProtocolError {
    pub connection_key: u64,
    pub status: String,
}

/// Failures surfaced by the external packet-source collaborator.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to start capture: {0}")]
    StartFailed(String),
    #[error("failed to stop capture: {0}")]
    StopFailed(String),
    #[error("capture error: {0}")]
    Other(String),
}

/// Failures surfaced by the pipeline driver at runtime (as opposed to the
/// local, recoverable "insufficient bytes" case handled by the decoder).
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Capture(#[from] CaptureError),
}
