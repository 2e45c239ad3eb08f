use std::sync::Arc;

use async_trait::async_trait;
use codec::EncoderPool;
use common::{
    commitlog::CommitLogSource,
    ranges::{
        ShardTimeRanges,
        TimeRange,
    },
    snapshots::SnapshotStorage,
    types::{
        Namespace,
        Shard,
    },
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::{
    catalog::SnapshotCatalog,
    inspection::Inspection,
    merge::merge_shards,
    metrics,
    options::BootstrapOptions,
    planner::ReadPlan,
    read::read_commit_log,
    result::BootstrapResult,
};

/// How the driver above intends to run its sources over the shards.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BootstrapStrategy {
    /// Sources run one after another over the full request.
    Sequential,
    /// Sources run concurrently over disjoint shard groups.
    Parallel,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("bootstrap interrupted by cancellation")]
    Interrupted,
    #[error("requested range {range:?} for shard {shard} is not a whole multiple of the block size")]
    UnalignedRange { shard: Shard, range: TimeRange },
}

/// A source of bootstrapped data, as the bootstrap driver sees it.
#[async_trait]
pub trait Bootstrapper: Send + Sync {
    fn can(&self, strategy: BootstrapStrategy) -> bool;

    /// The subset of `requested` this source could fulfill. The commit log
    /// source is last-ditch and echoes the request verbatim.
    fn available(&self, namespace: &Namespace, requested: &ShardTimeRanges) -> ShardTimeRanges;

    async fn read(
        &self,
        namespace: &Namespace,
        requested: &ShardTimeRanges,
    ) -> anyhow::Result<BootstrapResult>;
}

/// Rebuilds in-memory series buffers by replaying snapshots plus the commit
/// log. See the crate docs for the stage breakdown.
pub struct CommitLogBootstrapper {
    commit_log: Arc<dyn CommitLogSource>,
    snapshots: Arc<dyn SnapshotStorage>,
    options: BootstrapOptions,
    encoder_pool: EncoderPool,
    cancel: CancellationToken,
}

impl CommitLogBootstrapper {
    pub fn new(
        commit_log: Arc<dyn CommitLogSource>,
        snapshots: Arc<dyn SnapshotStorage>,
        options: BootstrapOptions,
    ) -> anyhow::Result<Self> {
        options.validate()?;
        let encoder_pool = EncoderPool::new(options.encoder_pool_max_idle);
        Ok(Self {
            commit_log,
            snapshots,
            options,
            encoder_pool,
            cancel: CancellationToken::new(),
        })
    }

    /// Cancelling the returned token stops the read loop at its next entry,
    /// drains the encoder workers, skips the merge, and makes `read` return
    /// [`BootstrapError::Interrupted`].
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn validate_requested(&self, requested: &ShardTimeRanges) -> Result<(), BootstrapError> {
        let block_size = self.options.retention.block_size;
        for (shard, ranges) in requested.iter() {
            for range in ranges.iter() {
                if !range.start.is_aligned_to(block_size) || !range.end.is_aligned_to(block_size)
                {
                    return Err(BootstrapError::UnalignedRange { shard, range });
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Bootstrapper for CommitLogBootstrapper {
    fn can(&self, strategy: BootstrapStrategy) -> bool {
        // Replay order approximates write order, so this source cannot be
        // split across concurrently bootstrapped shard groups.
        matches!(strategy, BootstrapStrategy::Sequential)
    }

    fn available(&self, _namespace: &Namespace, requested: &ShardTimeRanges) -> ShardTimeRanges {
        requested.clone()
    }

    async fn read(
        &self,
        namespace: &Namespace,
        requested: &ShardTimeRanges,
    ) -> anyhow::Result<BootstrapResult> {
        if requested.is_empty() {
            return Ok(BootstrapResult::default());
        }
        let _timer = metrics::bootstrap_timer();
        self.validate_requested(requested)?;

        let inspection = Inspection::capture(self.commit_log.as_ref()).await?;
        let catalog = Arc::new(
            SnapshotCatalog::load(self.snapshots.clone(), namespace.clone(), requested).await?,
        );
        let plan = ReadPlan::build(
            &catalog,
            inspection,
            requested,
            self.options.retention,
        )
        .await?;

        let read = read_commit_log(
            self.commit_log.as_ref(),
            &plan,
            namespace,
            requested,
            &self.options,
            self.encoder_pool.clone(),
            self.cancel.clone(),
        )
        .await?;

        let mut result = merge_shards(
            read,
            catalog,
            &self.options,
            self.encoder_pool.clone(),
            self.cancel.clone(),
        )
        .await?;
        result.fulfilled = requested.clone();
        tracing::info!(
            "Commit log bootstrap complete: {} shards with data, {} requested",
            result.shards.len(),
            requested.num_shards()
        );
        Ok(result)
    }
}
