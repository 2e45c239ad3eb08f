//! Interface to the snapshot filesystem layer: enumeration and streaming
//! reads of per-(shard, block) snapshot files.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use crate::{
    series::SeriesId,
    time::UnixNanos,
    types::{
        Namespace,
        Shard,
    },
};

/// Metadata for one snapshot file. Several files can exist for the same
/// (shard, block); `index` increases with each rewrite and only
/// `checkpointed` files are complete enough to read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SnapshotFileMeta {
    pub namespace: Namespace,
    pub shard: Shard,
    pub block_start: UnixNanos,
    pub index: u64,
    pub checkpointed: bool,
}

/// The valid snapshot file with the highest index for `block_start`, if any.
pub fn latest_valid_for_block(
    files: &[SnapshotFileMeta],
    block_start: UnixNanos,
) -> Option<&SnapshotFileMeta> {
    files
        .iter()
        .filter(|file| file.block_start == block_start && file.checkpointed)
        .max_by_key(|file| file.index)
}

/// Stream of (series identity, encoded block bytes) pairs from one snapshot
/// file.
pub type SnapshotSeriesStream = BoxStream<'static, anyhow::Result<(SeriesId, Bytes)>>;

#[async_trait]
pub trait SnapshotStorage: Send + Sync + 'static {
    /// All snapshot files for `(namespace, shard)`, checkpointed or not.
    async fn snapshot_files(
        &self,
        namespace: &Namespace,
        shard: Shard,
    ) -> anyhow::Result<Vec<SnapshotFileMeta>>;

    /// The wall-clock instant recorded in the file's info block: the moment
    /// just before snapshotting began. The file contains every write for its
    /// (shard, block) accepted before that instant. Performs I/O.
    async fn snapshot_time(&self, file: &SnapshotFileMeta) -> anyhow::Result<UnixNanos>;

    /// Stream the file's contents. Performs I/O.
    async fn open(&self, file: &SnapshotFileMeta) -> anyhow::Result<SnapshotSeriesStream>;
}

#[cfg(test)]
mod tests {
    use super::{
        latest_valid_for_block,
        SnapshotFileMeta,
    };
    use crate::{
        time::UnixNanos,
        types::Shard,
    };

    fn meta(block_secs: i64, index: u64, checkpointed: bool) -> SnapshotFileMeta {
        SnapshotFileMeta {
            namespace: "metrics".into(),
            shard: Shard::new(0),
            block_start: UnixNanos::from_secs(block_secs),
            index,
            checkpointed,
        }
    }

    #[test]
    fn test_latest_valid_skips_uncheckpointed() {
        let files = vec![meta(0, 0, true), meta(0, 1, true), meta(0, 2, false)];
        let latest = latest_valid_for_block(&files, UnixNanos::from_secs(0));
        assert_eq!(latest.map(|f| f.index), Some(1));
    }

    #[test]
    fn test_latest_valid_filters_by_block() {
        let files = vec![meta(0, 3, true), meta(7200, 0, true)];
        let latest = latest_valid_for_block(&files, UnixNanos::from_secs(7200));
        assert_eq!(latest.map(|f| f.index), Some(0));
        assert!(latest_valid_for_block(&files, UnixNanos::from_secs(3600)).is_none());
    }
}
