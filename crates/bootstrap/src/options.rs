use common::{
    knobs::{
        COMMITLOG_BOOTSTRAP_CHANNEL_CAPACITY,
        COMMITLOG_BOOTSTRAP_ENCODING_CONCURRENCY,
        COMMITLOG_BOOTSTRAP_MERGE_CONCURRENCY,
        ENCODER_POOL_MAX_IDLE,
    },
    retention::RetentionOptions,
};

/// Per-bootstrapper configuration. Concurrency defaults come from knobs;
/// the retention policy is the target namespace's and has no default.
#[derive(Clone, Debug)]
pub struct BootstrapOptions {
    /// Number of encoder workers commit-log entries fan out to.
    pub encoding_concurrency: usize,
    /// Number of shards merged concurrently.
    pub merge_shards_concurrency: usize,
    /// Capacity of each encoder worker's input channel.
    pub channel_capacity: usize,
    /// Most encoders kept idle in the shared pool.
    pub encoder_pool_max_idle: usize,
    pub retention: RetentionOptions,
}

impl BootstrapOptions {
    pub fn new(retention: RetentionOptions) -> Self {
        Self {
            encoding_concurrency: *COMMITLOG_BOOTSTRAP_ENCODING_CONCURRENCY,
            merge_shards_concurrency: *COMMITLOG_BOOTSTRAP_MERGE_CONCURRENCY,
            channel_capacity: *COMMITLOG_BOOTSTRAP_CHANNEL_CAPACITY,
            encoder_pool_max_idle: *ENCODER_POOL_MAX_IDLE,
            retention,
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.encoding_concurrency > 0,
            "encoding concurrency must be positive"
        );
        anyhow::ensure!(
            self.merge_shards_concurrency > 0,
            "merge shards concurrency must be positive"
        );
        anyhow::ensure!(self.channel_capacity > 0, "channel capacity must be positive");
        self.retention.validate()
    }
}
