//! Engine tunables, gathered into one value passed explicitly into the
//! pipeline driver's constructor rather than read from globals.

use std::time::Duration;

use crate::conversation::InvariantMode;
use crate::reaper::ReaperConfig;

#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    pub reaper: ReaperConfig,
    pub reap_interval: Duration,
    /// Capacity of the channel the packet source is constructed with.
    pub traffic_channel_capacity: usize,
    pub invariant_mode: InvariantMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reaper: ReaperConfig::default(),
            reap_interval: Duration::from_secs(30),
            traffic_channel_capacity: 100,
            invariant_mode: InvariantMode::Strict,
        }
    }
}
