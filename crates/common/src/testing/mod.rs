//! In-memory fakes for the commit-log and snapshot-storage collaborators.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{
    stream,
    StreamExt,
};
use parking_lot::Mutex;

pub use crate::env::config_test as init_test_logging;
use crate::{
    commitlog::{
        CommitLogEntry,
        CommitLogFile,
        CommitLogSource,
        EntryStream,
        ReadFilter,
    },
    series::SeriesId,
    snapshots::{
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

/// An in-memory commit log. Files added after a caller captured `files()`
/// model segments rotated in mid-bootstrap.
#[derive(Clone, Default)]
pub struct TestCommitLog {
    inner: Arc<Mutex<Vec<(CommitLogFile, Vec<CommitLogEntry>)>>>,
}

impl TestCommitLog {
    pub fn new() -> Self {
        crate::env::config_test();
        Self::default()
    }

    pub fn add_file(&self, file: CommitLogFile, entries: Vec<CommitLogEntry>) {
        self.inner.lock().push((file, entries));
    }

    pub fn append(&self, file_name: &str, entry: CommitLogEntry) {
        let mut inner = self.inner.lock();
        let (_, entries) = inner
            .iter_mut()
            .find(|(file, _)| file.name == file_name)
            .unwrap_or_else(|| panic!("unknown commit log file {file_name}"));
        entries.push(entry);
    }
}

#[async_trait]
impl CommitLogSource for TestCommitLog {
    async fn files(&self) -> anyhow::Result<Vec<CommitLogFile>> {
        Ok(self.inner.lock().iter().map(|(file, _)| file.clone()).collect())
    }

    async fn read(&self, filter: ReadFilter) -> anyhow::Result<EntryStream> {
        let mut files: Vec<_> = self
            .inner
            .lock()
            .iter()
            .filter(|(file, _)| (filter.file_filter)(file))
            .cloned()
            .collect();
        files.sort_by(|(a, _), (b, _)| a.start.cmp(&b.start).then_with(|| a.name.cmp(&b.name)));
        let entries: Vec<_> = files
            .into_iter()
            .flat_map(|(_, entries)| entries)
            .filter(|entry| (filter.series_filter)(&entry.series))
            .map(Ok)
            .collect();
        Ok(stream::iter(entries).boxed())
    }
}

struct TestSnapshot {
    meta: SnapshotFileMeta,
    time: UnixNanos,
    data: Vec<(SeriesId, Bytes)>,
    fail_time: bool,
    fail_open: bool,
}

/// An in-memory snapshot filesystem with per-file fault injection.
#[derive(Clone, Default)]
pub struct TestSnapshotStorage {
    inner: Arc<Mutex<Vec<TestSnapshot>>>,
}

impl TestSnapshotStorage {
    pub fn new() -> Self {
        crate::env::config_test();
        Self::default()
    }

    pub fn add_snapshot(
        &self,
        meta: SnapshotFileMeta,
        time: UnixNanos,
        data: Vec<(SeriesId, Bytes)>,
    ) {
        self.inner.lock().push(TestSnapshot {
            meta,
            time,
            data,
            fail_time: false,
            fail_open: false,
        });
    }

    /// Makes `snapshot_time` fail for the file for `(shard, block_start)`
    /// with the highest index.
    pub fn fail_snapshot_time(&self, shard: Shard, block_start: UnixNanos) {
        self.with_latest(shard, block_start, |snapshot| snapshot.fail_time = true);
    }

    /// Makes `open` fail for the file for `(shard, block_start)` with the
    /// highest index.
    pub fn fail_open(&self, shard: Shard, block_start: UnixNanos) {
        self.with_latest(shard, block_start, |snapshot| snapshot.fail_open = true);
    }

    fn with_latest(
        &self,
        shard: Shard,
        block_start: UnixNanos,
        f: impl FnOnce(&mut TestSnapshot),
    ) {
        let mut inner = self.inner.lock();
        let snapshot = inner
            .iter_mut()
            .filter(|s| s.meta.shard == shard && s.meta.block_start == block_start)
            .max_by_key(|s| s.meta.index)
            .unwrap_or_else(|| panic!("no snapshot for shard {shard} at {block_start}"));
        f(snapshot);
    }

    fn find<T>(
        &self,
        file: &SnapshotFileMeta,
        f: impl FnOnce(&TestSnapshot) -> T,
    ) -> anyhow::Result<T> {
        let inner = self.inner.lock();
        let snapshot = inner
            .iter()
            .find(|s| &s.meta == file)
            .ok_or_else(|| anyhow::anyhow!("no such snapshot file: {file:?}"))?;
        Ok(f(snapshot))
    }
}

#[async_trait]
impl SnapshotStorage for TestSnapshotStorage {
    async fn snapshot_files(
        &self,
        namespace: &Namespace,
        shard: Shard,
    ) -> anyhow::Result<Vec<SnapshotFileMeta>> {
        Ok(self
            .inner
            .lock()
            .iter()
            .filter(|s| &s.meta.namespace == namespace && s.meta.shard == shard)
            .map(|s| s.meta.clone())
            .collect())
    }

    async fn snapshot_time(&self, file: &SnapshotFileMeta) -> anyhow::Result<UnixNanos> {
        self.find(file, |snapshot| {
            if snapshot.fail_time {
                anyhow::bail!("injected failure reading snapshot time for {file:?}");
            }
            Ok(snapshot.time)
        })?
    }

    async fn open(&self, file: &SnapshotFileMeta) -> anyhow::Result<SnapshotSeriesStream> {
        self.find(file, |snapshot| {
            if snapshot.fail_open {
                anyhow::bail!("injected failure opening snapshot {file:?}");
            }
            let data: Vec<_> = snapshot.data.iter().cloned().map(Ok).collect();
            Ok(stream::iter(data).boxed())
        })?
    }
}
