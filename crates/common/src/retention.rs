use std::time::Duration;

use crate::{
    ranges::TimeRange,
    time::UnixNanos,
};

/// A namespace's retention policy as the bootstrap path needs it.
///
/// A write with data timestamp `t` is accepted while the wall clock lies in
/// `[t - buffer_past, t + buffer_future]`. Equivalently: a commit-log file
/// whose entries arrived during the physical window `[start, start + window)`
/// can carry data timestamps anywhere in
/// `[start - buffer_past, start + window + buffer_future)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetentionOptions {
    pub block_size: Duration,
    pub buffer_past: Duration,
    pub buffer_future: Duration,
}

impl RetentionOptions {
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            !self.block_size.is_zero(),
            "retention block size must be nonzero"
        );
        Ok(())
    }

    pub fn block_start_for(&self, ts: UnixNanos) -> UnixNanos {
        ts.truncate_to(self.block_size)
    }

    /// The half-open range `[block_start, block_start + block_size)`.
    pub fn block_range(&self, block_start: UnixNanos) -> TimeRange {
        TimeRange::new(block_start, block_start + self.block_size)
    }

    /// How far a data timestamp can stray from the wall clock in either
    /// direction. Extending a read horizon left by this amount covers writes
    /// accepted after the horizon whose data timestamps fall before it.
    pub fn max_buffer(&self) -> Duration {
        self.buffer_past.max(self.buffer_future)
    }
}

impl Default for RetentionOptions {
    fn default() -> Self {
        Self {
            block_size: Duration::from_secs(2 * 3600),
            buffer_past: Duration::from_secs(10 * 60),
            buffer_future: Duration::from_secs(2 * 60),
        }
    }
}
