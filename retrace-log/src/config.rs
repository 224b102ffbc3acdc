//! Recording configuration.

/// Event buffer configuration.
#[derive(Debug, Clone)]
pub struct BufferConfig {
    /// Byte budget for retained encoded events. Default: 32MB.
    pub max_bytes: usize,
    /// Per-subscriber capacity of the live tail channel. Default: 1024.
    pub tail_capacity: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            max_bytes: 32_000_000,
            tail_capacity: 1024,
        }
    }
}

impl BufferConfig {
    /// Config for testing (tiny budget, eviction on nearly every push).
    pub fn for_testing() -> Self {
        Self {
            max_bytes: 1024,
            tail_capacity: 16,
        }
    }
}

/// Recorder configuration.
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    pub buffer: BufferConfig,
    /// Interval between periodic snapshots (ms of recording time).
    /// Default: 10s. Zero disables periodic snapshots.
    pub snapshot_interval_ms: u32,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            buffer: BufferConfig::default(),
            snapshot_interval_ms: 10_000,
        }
    }
}

impl RecorderConfig {
    /// Config for testing (small buffer, snapshot every second).
    pub fn for_testing() -> Self {
        Self {
            buffer: BufferConfig::for_testing(),
            snapshot_interval_ms: 1_000,
        }
    }
}
