use std::{
    collections::BTreeMap,
    sync::Arc,
};

use common::{
    ranges::ShardTimeRanges,
    snapshots::{
        latest_valid_for_block,
        SnapshotFileMeta,
        SnapshotSeriesStream,
        SnapshotStorage,
    },
    time::UnixNanos,
    types::{
        Namespace,
        Shard,
    },
};

/// Snapshot files for every requested shard, enumerated once up front.
///
/// Enumeration failures abort the bootstrap (setup error); everything else
/// here is a pure lookup except [`Self::snapshot_time`] and [`Self::open`],
/// which go back to storage.
pub struct SnapshotCatalog {
    storage: Arc<dyn SnapshotStorage>,
    files_by_shard: BTreeMap<Shard, Vec<SnapshotFileMeta>>,
}

impl SnapshotCatalog {
    pub async fn load(
        storage: Arc<dyn SnapshotStorage>,
        namespace: Namespace,
        requested: &ShardTimeRanges,
    ) -> anyhow::Result<Self> {
        let mut files_by_shard = BTreeMap::new();
        for shard in requested.shards() {
            let files = storage.snapshot_files(&namespace, shard).await?;
            files_by_shard.insert(shard, files);
        }
        let num_files: usize = files_by_shard.values().map(Vec::len).sum();
        tracing::info!(
            "Cataloged {num_files} snapshot files across {} shards",
            files_by_shard.len()
        );
        Ok(Self {
            storage,
            files_by_shard,
        })
    }

    pub fn latest_valid_for_block(
        &self,
        shard: Shard,
        block_start: UnixNanos,
    ) -> Option<&SnapshotFileMeta> {
        latest_valid_for_block(self.files_by_shard.get(&shard)?, block_start)
    }

    pub fn has_files(&self, shard: Shard) -> bool {
        self.files_by_shard
            .get(&shard)
            .is_some_and(|files| !files.is_empty())
    }

    pub async fn snapshot_time(&self, file: &SnapshotFileMeta) -> anyhow::Result<UnixNanos> {
        self.storage.snapshot_time(file).await
    }

    pub async fn open(&self, file: &SnapshotFileMeta) -> anyhow::Result<SnapshotSeriesStream> {
        self.storage.open(file).await
    }
}
