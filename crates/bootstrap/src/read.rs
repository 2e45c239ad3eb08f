use std::{
    collections::BTreeMap,
    sync::Arc,
};

use anyhow::Context;
use codec::EncoderPool;
use common::{
    commitlog::{
        CommitLogEntry,
        CommitLogSource,
        ReadFilter,
    },
    knobs::COMMITLOG_BOOTSTRAP_PROGRESS_LOG_INTERVAL,
    ranges::{
        ShardTimeRanges,
        TimeRangeSet,
    },
    retention::RetentionOptions,
    series::{
        Series,
        SeriesHash,
        SeriesId,
    },
    time::UnixNanos,
    types::{
        Namespace,
        Shard,
    },
};
use futures::StreamExt;
use fxhash::FxHashMap;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    metrics,
    options::BootstrapOptions,
    planner::ReadPlan,
    source::BootstrapError,
};

/// Encoders accumulated for one series within one block. More than one
/// encoder means entries arrived out of timestamp order; the merger folds
/// them back together.
pub struct SeriesBlockEncoders {
    pub id: SeriesId,
    pub encoders: Vec<codec::SeriesEncoder>,
}

/// Everything one shard accumulated during the read stage, keyed by block
/// then series fingerprint, plus the ranges requested for the shard.
///
/// Written only by the single encoder worker the shard hashes to, so no
/// locking.
pub struct UnmergedShardState {
    pub shard: Shard,
    pub ranges: TimeRangeSet,
    pub blocks: BTreeMap<UnixNanos, FxHashMap<SeriesHash, SeriesBlockEncoders>>,
}

impl UnmergedShardState {
    fn new(shard: Shard, ranges: TimeRangeSet) -> Self {
        Self {
            shard,
            ranges,
            blocks: BTreeMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReadStats {
    pub entries_read: u64,
    pub datapoints_skipped: u64,
    pub encode_errors: u64,
}

pub struct ReadOutput {
    /// One state per requested shard, empty or not: snapshot-only shards
    /// still need merging.
    pub shards: BTreeMap<Shard, UnmergedShardState>,
    pub stats: ReadStats,
}

/// Admit a datapoint iff its series' shard was requested and the block the
/// datapoint lands in overlaps that shard's requested ranges.
fn should_encode(
    requested: &ShardTimeRanges,
    retention: &RetentionOptions,
    entry: &CommitLogEntry,
) -> bool {
    let Some(ranges) = requested.get(entry.series.shard) else {
        return false;
    };
    let block_start = retention.block_start_for(entry.datapoint.timestamp);
    ranges.overlaps(&retention.block_range(block_start))
}

struct EncoderWorker {
    states: BTreeMap<Shard, UnmergedShardState>,
    encoder_pool: EncoderPool,
    retention: RetentionOptions,
    encode_errors: u64,
}

impl EncoderWorker {
    fn handle(&mut self, entry: CommitLogEntry) {
        let Some(state) = self.states.get_mut(&entry.series.shard) else {
            // The driver only dispatches requested shards.
            return;
        };
        let block_start = self.retention.block_start_for(entry.datapoint.timestamp);
        let series = state
            .blocks
            .entry(block_start)
            .or_default()
            .entry(entry.series.id.hash())
            .or_insert_with(|| SeriesBlockEncoders {
                id: entry.series.id.clone(),
                encoders: Vec::new(),
            });

        // Append to an encoder this datapoint keeps in order, if one exists.
        let in_order = series
            .encoders
            .iter_mut()
            .find(|encoder| match encoder.last_write_at() {
                Some(last) => last < entry.datapoint.timestamp,
                None => true,
            });
        let encoder = match in_order {
            Some(encoder) => encoder,
            None => {
                // Out-of-order arrival: open another encoder for the series
                // and let the merge re-sort.
                let encoder = self.encoder_pool.take(block_start);
                series.encoders.push(encoder);
                series.encoders.last_mut().expect("just pushed")
            },
        };
        if let Err(e) = encoder.encode(entry.datapoint, entry.unit, entry.annotation.as_ref()) {
            self.encode_errors += 1;
            tracing::debug!("Dropped datapoint for {}: {e}", entry.series.id);
        }
    }
}

/// Streams the filtered commit log into `encoding_concurrency` workers,
/// each owning the shards that hash to it. Bounded channels throttle the
/// reader to encoder throughput.
pub async fn read_commit_log(
    commit_log: &dyn CommitLogSource,
    plan: &ReadPlan,
    namespace: &Namespace,
    requested: &ShardTimeRanges,
    options: &BootstrapOptions,
    encoder_pool: EncoderPool,
    cancel: CancellationToken,
) -> anyhow::Result<ReadOutput> {
    let _timer = metrics::read_stage_timer();
    let num_workers = options.encoding_concurrency;

    let mut senders = Vec::with_capacity(num_workers);
    let mut handles = Vec::with_capacity(num_workers);
    for worker_index in 0..num_workers {
        let (tx, mut rx) = mpsc::channel::<CommitLogEntry>(options.channel_capacity);
        let states: BTreeMap<_, _> = requested
            .iter()
            .filter(|(shard, _)| shard.as_usize() % num_workers == worker_index)
            .map(|(shard, ranges)| (shard, UnmergedShardState::new(shard, ranges.clone())))
            .collect();
        let mut worker = EncoderWorker {
            states,
            encoder_pool: encoder_pool.clone(),
            retention: options.retention,
            encode_errors: 0,
        };
        handles.push(tokio::spawn(async move {
            while let Some(entry) = rx.recv().await {
                worker.handle(entry);
            }
            worker
        }));
        senders.push(tx);
    }

    let series_filter = {
        let namespace = namespace.clone();
        Arc::new(move |series: &Series| series.namespace == namespace)
    };
    let filter = ReadFilter {
        file_filter: plan.file_predicate(),
        series_filter,
    };
    let mut entries = commit_log.read(filter).await?;

    let mut stats = ReadStats::default();
    let mut interrupted = false;
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                interrupted = true;
                break;
            },
            next = entries.next() => next,
        };
        let Some(next) = next else {
            break;
        };
        let entry = match next {
            Ok(entry) => entry,
            Err(e) => {
                // Whatever was encoded before the failure is still worth
                // merging; stop reading and keep it.
                tracing::warn!("Commit log iteration ended early: {e:#}");
                break;
            },
        };
        stats.entries_read += 1;
        if stats.entries_read % *COMMITLOG_BOOTSTRAP_PROGRESS_LOG_INTERVAL == 0 {
            tracing::info!("Read {} commit log entries", stats.entries_read);
        }
        if !should_encode(requested, &options.retention, &entry) {
            stats.datapoints_skipped += 1;
            metrics::log_datapoint_skipped();
            continue;
        }
        let worker_index = entry.series.shard.as_usize() % num_workers;
        if senders[worker_index].send(entry).await.is_err() {
            anyhow::bail!("encoder worker {worker_index} exited before the channel closed");
        }
    }
    drop(entries);
    drop(senders);

    let mut shards = BTreeMap::new();
    for handle in handles {
        let worker = handle.await.context("encoder worker panicked")?;
        stats.encode_errors += worker.encode_errors;
        for (shard, state) in worker.states {
            shards.insert(shard, state);
        }
    }
    metrics::log_entries_read(stats.entries_read);
    if stats.encode_errors > 0 {
        metrics::log_encode_errors(stats.encode_errors);
        tracing::warn!(
            "Dropped {} datapoints to encode errors during replay",
            stats.encode_errors
        );
    }
    tracing::info!(
        "Commit log read complete: {} entries, {} skipped",
        stats.entries_read,
        stats.datapoints_skipped
    );
    if interrupted {
        return Err(BootstrapError::Interrupted.into());
    }
    Ok(ReadOutput { shards, stats })
}
