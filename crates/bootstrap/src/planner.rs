use std::sync::Arc;

use common::{
    commitlog::FileFilter,
    ranges::{
        ShardTimeRanges,
        TimeRange,
        TimeRangeSet,
    },
    retention::RetentionOptions,
    time::UnixNanos,
    types::Shard,
};

use crate::{
    catalog::SnapshotCatalog,
    inspection::Inspection,
    metrics,
};

/// The read horizon: which spans of *data* timestamps the commit log must be
/// replayed for, and the file predicate derived from them.
///
/// Snapshot times bound the system time of writes already persisted, while a
/// commit-log file's eligibility depends on the data-time span its entries
/// can carry. Both sides of the comparison are therefore converted to
/// logical (data-time) windows: read ranges are extended left by
/// `max(buffer_past, buffer_future)` and file windows are widened by the
/// buffers before testing overlap.
pub struct ReadPlan {
    read_ranges: TimeRangeSet,
    inspection: Inspection,
    retention: RetentionOptions,
}

impl ReadPlan {
    pub async fn build(
        catalog: &SnapshotCatalog,
        inspection: Inspection,
        requested: &ShardTimeRanges,
        retention: RetentionOptions,
    ) -> anyhow::Result<Self> {
        let mut read_ranges = TimeRangeSet::new();
        if let Some(span) = requested.min_max() {
            let blocks = TimeRangeSet::from_range(span).block_starts(retention.block_size);
            for block_start in blocks {
                let block_range = retention.block_range(block_start);
                // Minimum effective snapshot time across the shards whose
                // request overlaps this block.
                let mut min_snapshot_time: Option<UnixNanos> = None;
                for (shard, ranges) in requested.iter() {
                    if !ranges.overlaps(&block_range) {
                        continue;
                    }
                    let effective =
                        effective_snapshot_time(catalog, shard, block_start).await;
                    min_snapshot_time = Some(match min_snapshot_time {
                        None => effective,
                        Some(min) => min.min(effective),
                    });
                }
                let Some(min_snapshot_time) = min_snapshot_time else {
                    continue;
                };
                read_ranges.add(TimeRange::new(
                    min_snapshot_time - retention.max_buffer(),
                    block_range.end,
                ));
            }
        }
        tracing::info!(
            "Planned {} commit log read ranges from {} inspected files",
            read_ranges.len(),
            inspection.num_files()
        );
        Ok(Self {
            read_ranges,
            inspection,
            retention,
        })
    }

    pub fn read_ranges(&self) -> &TimeRangeSet {
        &self.read_ranges
    }

    /// Admits a commit-log file iff it was present at inspection and its
    /// logical data-time window overlaps some read range.
    pub fn file_predicate(&self) -> FileFilter {
        let read_ranges = self.read_ranges.clone();
        let inspection = self.inspection.clone();
        let retention = self.retention;
        Arc::new(move |file| {
            if !inspection.contains(&file.name) {
                return false;
            }
            read_ranges.overlaps(&file.logical_range(&retention))
        })
    }
}

/// The instant replay must start from for `(shard, block_start)`: the latest
/// valid snapshot's recorded time, or the start of the block when no valid
/// snapshot exists or its time cannot be read.
async fn effective_snapshot_time(
    catalog: &SnapshotCatalog,
    shard: Shard,
    block_start: UnixNanos,
) -> UnixNanos {
    let Some(file) = catalog.latest_valid_for_block(shard, block_start) else {
        return block_start;
    };
    match catalog.snapshot_time(file).await {
        Ok(time) => time,
        Err(e) => {
            metrics::log_snapshot_read_failure();
            tracing::warn!(
                "Failed reading snapshot time for shard {shard} block {block_start} \
                 (index {}), replaying from block start: {e:#}",
                file.index
            );
            block_start
        },
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::Arc,
        time::Duration,
    };

    use common::{
        commitlog::CommitLogFile,
        ranges::{
            ShardTimeRanges,
            TimeRange,
        },
        retention::RetentionOptions,
        snapshots::SnapshotFileMeta,
        testing::TestSnapshotStorage,
        time::UnixNanos,
        types::Shard,
    };

    use super::ReadPlan;
    use crate::{
        catalog::SnapshotCatalog,
        inspection::Inspection,
    };

    const HOUR: u64 = 3600;
    const MINUTE: u64 = 60;

    fn retention() -> RetentionOptions {
        RetentionOptions {
            block_size: Duration::from_secs(2 * HOUR),
            buffer_past: Duration::from_secs(5 * MINUTE),
            buffer_future: Duration::from_secs(20 * MINUTE),
        }
    }

    fn mins(minutes: i64) -> UnixNanos {
        UnixNanos::from_secs(minutes * 60)
    }

    fn file(name: &str, start_min: i64, window_min: u64) -> CommitLogFile {
        CommitLogFile {
            name: name.to_string(),
            start: mins(start_min),
            window: Duration::from_secs(window_min * 60),
        }
    }

    fn snapshot_meta(shard: Shard, block_start: UnixNanos, index: u64) -> SnapshotFileMeta {
        SnapshotFileMeta {
            namespace: "metrics".into(),
            shard,
            block_start,
            index,
            checkpointed: true,
        }
    }

    async fn build_plan(
        storage: &TestSnapshotStorage,
        inspection: Inspection,
        requested: &ShardTimeRanges,
    ) -> ReadPlan {
        let catalog = SnapshotCatalog::load(
            Arc::new(storage.clone()),
            "metrics".into(),
            requested,
        )
        .await
        .unwrap();
        ReadPlan::build(&catalog, inspection, requested, retention())
            .await
            .unwrap()
    }

    // One block [12:00, 14:00), snapshot at 13:50. The read range starts at
    // 13:50 - 20m = 13:30, and a file whose entries arrived in
    // [13:30, 13:45) has logical window [13:25, 14:05), which overlaps.
    #[tokio::test]
    async fn test_snapshot_pulls_horizon_forward() {
        let shard = Shard::new(0);
        let block_start = mins(12 * 60);
        let storage = TestSnapshotStorage::new();
        storage.add_snapshot(snapshot_meta(shard, block_start, 0), mins(13 * 60 + 50), vec![]);

        let mut requested = ShardTimeRanges::new();
        requested.add(shard, TimeRange::new(block_start, mins(14 * 60)));

        let inspection = Inspection::from_names(["f1", "f2"]);
        let plan = build_plan(&storage, inspection, &requested).await;

        assert_eq!(
            plan.read_ranges().iter().collect::<Vec<_>>(),
            vec![TimeRange::new(mins(13 * 60 + 30), mins(14 * 60))]
        );
        let predicate = plan.file_predicate();
        assert!(predicate(&file("f1", 13 * 60 + 30, 15)));
        // Entries written in [12:00, 12:30) can carry data timestamps only
        // up to 12:50, an hour short of the horizon.
        assert!(!predicate(&file("f2", 12 * 60, 30)));
    }

    #[tokio::test]
    async fn test_no_snapshot_replays_from_block_start() {
        let shard = Shard::new(0);
        let block_start = mins(12 * 60);
        let storage = TestSnapshotStorage::new();

        let mut requested = ShardTimeRanges::new();
        requested.add(shard, TimeRange::new(block_start, mins(14 * 60)));

        let inspection = Inspection::from_names(["f1"]);
        let plan = build_plan(&storage, inspection, &requested).await;

        // 12:00 - max(5m, 20m) = 11:40.
        assert_eq!(
            plan.read_ranges().iter().collect::<Vec<_>>(),
            vec![TimeRange::new(mins(11 * 60 + 40), mins(14 * 60))]
        );
    }

    #[tokio::test]
    async fn test_post_inspection_file_is_excluded() {
        let shard = Shard::new(0);
        let block_start = mins(12 * 60);
        let storage = TestSnapshotStorage::new();

        let mut requested = ShardTimeRanges::new();
        requested.add(shard, TimeRange::new(block_start, mins(14 * 60)));

        let inspection = Inspection::from_names(["seen"]);
        let plan = build_plan(&storage, inspection, &requested).await;
        let predicate = plan.file_predicate();

        let overlapping = file("rotated-later", 12 * 60 + 30, 15);
        assert!(!predicate(&overlapping));
        assert!(predicate(&file("seen", 12 * 60 + 30, 15)));
    }

    #[tokio::test]
    async fn test_snapshot_time_failure_degrades_to_block_start() {
        let shard = Shard::new(3);
        let block_start = mins(12 * 60);
        let storage = TestSnapshotStorage::new();
        storage.add_snapshot(snapshot_meta(shard, block_start, 0), mins(13 * 60 + 50), vec![]);
        storage.fail_snapshot_time(shard, block_start);

        let mut requested = ShardTimeRanges::new();
        requested.add(shard, TimeRange::new(block_start, mins(14 * 60)));

        let inspection = Inspection::from_names(["f1"]);
        let plan = build_plan(&storage, inspection, &requested).await;

        assert_eq!(
            plan.read_ranges().iter().collect::<Vec<_>>(),
            vec![TimeRange::new(mins(11 * 60 + 40), mins(14 * 60))]
        );
    }

    // Shards A and B both cover block 12:00; A snapshotted at 13:50, B at
    // 13:20. The block's horizon is B's: 13:20 - 20m = 13:00.
    #[tokio::test]
    async fn test_minimum_across_shards_wins() {
        let shard_a = Shard::new(0);
        let shard_b = Shard::new(1);
        let block_start = mins(12 * 60);
        let storage = TestSnapshotStorage::new();
        storage.add_snapshot(snapshot_meta(shard_a, block_start, 0), mins(13 * 60 + 50), vec![]);
        storage.add_snapshot(snapshot_meta(shard_b, block_start, 0), mins(13 * 60 + 20), vec![]);

        let mut requested = ShardTimeRanges::new();
        requested.add(shard_a, TimeRange::new(block_start, mins(14 * 60)));
        requested.add(shard_b, TimeRange::new(block_start, mins(14 * 60)));

        let inspection = Inspection::from_names(["f1"]);
        let plan = build_plan(&storage, inspection, &requested).await;

        assert_eq!(
            plan.read_ranges().iter().collect::<Vec<_>>(),
            vec![TimeRange::new(mins(13 * 60), mins(14 * 60))]
        );
        // A file overlapping only [13:30, 13:50) is still admitted.
        let predicate = plan.file_predicate();
        assert!(predicate(&file("f1", 13 * 60 + 35, 10)));
    }

    // A shard whose request doesn't touch a block is excluded from that
    // block's minimum.
    #[tokio::test]
    async fn test_non_overlapping_shard_excluded_from_minimum() {
        let shard_a = Shard::new(0);
        let shard_b = Shard::new(1);
        let storage = TestSnapshotStorage::new();
        storage.add_snapshot(snapshot_meta(shard_a, mins(12 * 60), 0), mins(13 * 60 + 50), vec![]);

        let mut requested = ShardTimeRanges::new();
        requested.add(shard_a, TimeRange::new(mins(12 * 60), mins(14 * 60)));
        // Shard B requests only the following block; without a snapshot it
        // would otherwise drag block 12:00's horizon back to block start.
        requested.add(shard_b, TimeRange::new(mins(14 * 60), mins(16 * 60)));

        let inspection = Inspection::from_names(["f1"]);
        let plan = build_plan(&storage, inspection, &requested).await;

        // Block 12:00's horizon comes from A's snapshot alone (13:30); were
        // B included, the missing snapshot would force 11:40. Block 14:00's
        // horizon is 13:40, and the two ranges coalesce.
        assert_eq!(
            plan.read_ranges().iter().collect::<Vec<_>>(),
            vec![TimeRange::new(mins(13 * 60 + 30), mins(16 * 60))]
        );
    }

    #[tokio::test]
    async fn test_uncheckpointed_snapshot_is_invalid() {
        let shard = Shard::new(0);
        let block_start = mins(12 * 60);
        let storage = TestSnapshotStorage::new();
        let mut meta = snapshot_meta(shard, block_start, 0);
        meta.checkpointed = false;
        storage.add_snapshot(meta, mins(13 * 60 + 50), vec![]);

        let mut requested = ShardTimeRanges::new();
        requested.add(shard, TimeRange::new(block_start, mins(14 * 60)));

        let inspection = Inspection::from_names(["f1"]);
        let plan = build_plan(&storage, inspection, &requested).await;

        assert_eq!(
            plan.read_ranges().iter().collect::<Vec<_>>(),
            vec![TimeRange::new(mins(11 * 60 + 40), mins(14 * 60))]
        );
    }
}
