use std::sync::Arc;

use parking_lot::Mutex;

/// Counters shared by every thread of one pipeline run.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct PipelineStats {
    pub frames_encoded: u64,
    pub frames_emitted: u64,
    pub frames_captured: u64,
    pub decode_failures: u64,
    pub truncated_packets: u64,
    pub stored_packets: u64,
    pub duplicate_packets: u64,
    pub rejected_packets: u64,
}

#[derive(Clone, Default)]
pub struct SharedStats(Arc<Mutex<PipelineStats>>);

impl SharedStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stats<R>(&self, f: impl FnOnce(&mut PipelineStats) -> R) -> R {
        let mut guard = self.0.lock();
        f(&mut guard)
    }

    pub fn snapshot(&self) -> PipelineStats {
        *self.0.lock()
    }
}
