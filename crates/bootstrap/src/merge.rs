use std::sync::Arc;

use bytes::Bytes;
use codec::{
    EncoderPool,
    MultiSeriesIterator,
    SeriesEncoder,
    SeriesIterator,
};
use common::{
    retention::RetentionOptions,
    series::{
        SeriesHash,
        SeriesId,
    },
    time::UnixNanos,
    types::Shard,
};
use futures::{
    stream,
    StreamExt,
    TryStreamExt,
};
use fxhash::FxHashMap;
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::{
    catalog::SnapshotCatalog,
    metrics,
    options::BootstrapOptions,
    read::{
        ReadOutput,
        UnmergedShardState,
    },
    result::{
        BootstrapResult,
        ShardResult,
    },
    source::BootstrapError,
};

/// Merges every shard's encoder output with the latest valid snapshot for
/// each (shard, block), fanning out one task per shard.
///
/// Snapshot reads go through a single-permit semaphore: the merge stays
/// CPU-parallel while at most one task performs large snapshot I/O at a
/// time. That is a throttle on disk contention, not a correctness device.
pub async fn merge_shards(
    read: ReadOutput,
    catalog: Arc<SnapshotCatalog>,
    options: &BootstrapOptions,
    encoder_pool: EncoderPool,
    cancel: CancellationToken,
) -> anyhow::Result<BootstrapResult> {
    let _timer = metrics::merge_stage_timer();
    let result = Arc::new(Mutex::new(BootstrapResult::default()));
    let fs_semaphore = Arc::new(Semaphore::new(1));

    let mut total_merge_errors = 0u64;
    let tasks = read.shards.into_values().filter_map(|state| {
        // Shards with neither commit log entries nor snapshot files have
        // nothing to contribute.
        if state.is_empty() && !catalog.has_files(state.shard) {
            return None;
        }
        let catalog = catalog.clone();
        let encoder_pool = encoder_pool.clone();
        let fs_semaphore = fs_semaphore.clone();
        let result = result.clone();
        let cancel = cancel.clone();
        let retention = options.retention;
        Some(async move {
            let shard = state.shard;
            let merger = ShardMerger {
                catalog,
                encoder_pool,
                fs_semaphore,
                retention,
                cancel,
            };
            let (shard_result, merge_errors) = merger.merge(state).await?;
            if !shard_result.is_empty() {
                result.lock().shards.insert(shard, shard_result);
            }
            anyhow::Ok(merge_errors)
        })
    });
    let merge_errors: Vec<u64> = stream::iter(tasks)
        .buffer_unordered(options.merge_shards_concurrency)
        .try_collect()
        .await?;
    total_merge_errors += merge_errors.into_iter().sum::<u64>();

    if total_merge_errors > 0 {
        metrics::log_merge_errors(total_merge_errors);
        tracing::warn!("Abandoned {total_merge_errors} series to merge encode errors");
    }
    let result = Arc::try_unwrap(result)
        .map_err(|_| anyhow::anyhow!("merge tasks still hold the result"))?
        .into_inner();
    Ok(result)
}

struct ShardMerger {
    catalog: Arc<SnapshotCatalog>,
    encoder_pool: EncoderPool,
    fs_semaphore: Arc<Semaphore>,
    retention: RetentionOptions,
    cancel: CancellationToken,
}

impl ShardMerger {
    async fn merge(&self, mut state: UnmergedShardState) -> anyhow::Result<(ShardResult, u64)> {
        let shard = state.shard;
        let mut shard_result = ShardResult::default();
        let mut merge_errors = 0u64;
        for range in state.ranges.clone().iter() {
            // Requests are validated block-aligned before any work starts;
            // this guards the internal call path.
            anyhow::ensure!(
                range.start.is_aligned_to(self.retention.block_size)
                    && range.end.is_aligned_to(self.retention.block_size),
                "unaligned bootstrap range {range:?} for shard {shard} reached the merger"
            );
            let mut block_start = range.start;
            while block_start < range.end {
                if self.cancel.is_cancelled() {
                    return Err(BootstrapError::Interrupted.into());
                }
                let snapshot = match self.read_snapshot(shard, block_start).await {
                    Ok(snapshot) => snapshot,
                    Err(e) => {
                        metrics::log_snapshot_read_failure();
                        tracing::warn!(
                            "Failed reading snapshot for shard {shard} block {block_start}, \
                             merging commit log data only: {e:#}"
                        );
                        None
                    },
                };
                let mut snapshot = snapshot.unwrap_or_default();

                if let Some(encoded) = state.blocks.remove(&block_start) {
                    for (hash, series) in encoded {
                        let snapshot_bytes =
                            snapshot.remove(&hash).map(|(_, bytes)| bytes);
                        match merge_series(
                            &self.encoder_pool,
                            block_start,
                            series.encoders,
                            snapshot_bytes,
                        ) {
                            Ok(Some(bytes)) => {
                                shard_result.add_block(series.id, block_start, bytes)
                            },
                            Ok(None) => {},
                            Err(e) => {
                                merge_errors += 1;
                                tracing::debug!(
                                    "Abandoning series {} in block {block_start}: {e:#}",
                                    series.id
                                );
                            },
                        }
                    }
                }
                // Series only the snapshot knows about pass through as-is.
                for (_, (id, bytes)) in snapshot {
                    shard_result.add_block(id, block_start, bytes);
                }
                block_start = block_start + self.retention.block_size;
            }
        }
        Ok((shard_result, merge_errors))
    }

    async fn read_snapshot(
        &self,
        shard: Shard,
        block_start: UnixNanos,
    ) -> anyhow::Result<Option<FxHashMap<SeriesHash, (SeriesId, Bytes)>>> {
        let Some(file) = self.catalog.latest_valid_for_block(shard, block_start) else {
            return Ok(None);
        };
        let file = file.clone();
        let _permit = self.fs_semaphore.acquire().await?;
        let mut entries = self.catalog.open(&file).await?;
        let mut snapshot = FxHashMap::default();
        while let Some(entry) = entries.next().await {
            let (id, bytes) = entry?;
            snapshot.insert(id.hash(), (id, bytes));
        }
        Ok(Some(snapshot))
    }
}

/// Folds a series' encoder streams and optional snapshot bytes into one
/// freshly encoded block.
///
/// Readers are ordered snapshot first, then encoders in creation order, so
/// the multi-stream iterator's last-reader-wins rule resolves duplicate
/// timestamps toward the most recent write.
fn merge_series(
    encoder_pool: &EncoderPool,
    block_start: UnixNanos,
    encoders: Vec<SeriesEncoder>,
    snapshot: Option<Bytes>,
) -> anyhow::Result<Option<Bytes>> {
    // A single in-order stream needs no re-sort.
    if snapshot.is_none() && encoders.len() == 1 {
        let mut encoder = encoders.into_iter().next().expect("len checked");
        let bytes = encoder.take_stream();
        encoder_pool.put(encoder);
        return Ok((!bytes.is_empty()).then_some(bytes));
    }

    let mut readers = Vec::with_capacity(encoders.len() + 1);
    if let Some(bytes) = snapshot {
        readers.push(SeriesIterator::new(block_start, bytes));
    }
    for mut encoder in encoders {
        readers.push(SeriesIterator::new(block_start, encoder.take_stream()));
        encoder_pool.put(encoder);
    }

    let mut merged = encoder_pool.take(block_start);
    let outcome = encode_merged(&mut merged, readers);
    let bytes = merged.take_stream();
    encoder_pool.put(merged);
    outcome?;
    Ok((!bytes.is_empty()).then_some(bytes))
}

fn encode_merged(merged: &mut SeriesEncoder, readers: Vec<SeriesIterator>) -> anyhow::Result<()> {
    for point in MultiSeriesIterator::new(readers)? {
        let point = point?;
        merged.encode(point.datapoint, point.unit, point.annotation.as_ref())?;
    }
    Ok(())
}
