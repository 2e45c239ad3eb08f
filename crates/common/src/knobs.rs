//! Tunable parameters for the bootstrap path. Every knob can be overridden
//! with an environment variable of the same name.

use std::sync::LazyLock;

use crate::env::env_config;

fn half_the_cores() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get() / 2)
        .unwrap_or(2)
        .max(1)
}

/// Number of encoder workers the commit-log read pipeline fans out to.
pub static COMMITLOG_BOOTSTRAP_ENCODING_CONCURRENCY: LazyLock<usize> = LazyLock::new(|| {
    env_config(
        "COMMITLOG_BOOTSTRAP_ENCODING_CONCURRENCY",
        half_the_cores(),
    )
});

/// Number of shards merged concurrently after the encoders drain.
pub static COMMITLOG_BOOTSTRAP_MERGE_CONCURRENCY: LazyLock<usize> = LazyLock::new(|| {
    env_config("COMMITLOG_BOOTSTRAP_MERGE_CONCURRENCY", half_the_cores())
});

/// Capacity of each encoder worker's input channel. When a channel fills,
/// the commit-log reader blocks, throttling I/O to encoder throughput.
pub static COMMITLOG_BOOTSTRAP_CHANNEL_CAPACITY: LazyLock<usize> =
    LazyLock::new(|| env_config("COMMITLOG_BOOTSTRAP_CHANNEL_CAPACITY", 1000));

/// Log read progress every this many commit-log entries.
pub static COMMITLOG_BOOTSTRAP_PROGRESS_LOG_INTERVAL: LazyLock<u64> =
    LazyLock::new(|| env_config("COMMITLOG_BOOTSTRAP_PROGRESS_LOG_INTERVAL", 100_000));

/// Most encoders kept idle in the shared encoder pool.
pub static ENCODER_POOL_MAX_IDLE: LazyLock<usize> =
    LazyLock::new(|| env_config("ENCODER_POOL_MAX_IDLE", 1024));
