//! Interface to the commit-log layer. The bootstrap path only ever reads the
//! log through these types; the on-disk format and write path live elsewhere.

use std::{
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use crate::{
    ranges::TimeRange,
    retention::RetentionOptions,
    series::{
        Datapoint,
        Series,
    },
    time::UnixNanos,
    types::TimeUnit,
};

/// One commit-log file. `start` and `window` describe the *wall-clock*
/// window during which the file's entries were written, not the data
/// timestamps they carry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitLogFile {
    pub name: String,
    pub start: UnixNanos,
    pub window: Duration,
}

impl CommitLogFile {
    /// The span of *data* timestamps this file's entries can carry, given
    /// the namespace's write acceptance window: an entry written at wall
    /// time `w` may have a data timestamp anywhere in
    /// `[w - buffer_past, w + buffer_future)`.
    pub fn logical_range(&self, retention: &RetentionOptions) -> TimeRange {
        TimeRange::new(
            self.start - retention.buffer_past,
            self.start + self.window + retention.buffer_future,
        )
    }
}

/// One accepted write, as replayed from the commit log.
#[derive(Clone, Debug, PartialEq)]
pub struct CommitLogEntry {
    pub series: Series,
    pub datapoint: Datapoint,
    pub unit: TimeUnit,
    pub annotation: Option<Bytes>,
}

pub type FileFilter = Arc<dyn Fn(&CommitLogFile) -> bool + Send + Sync>;
pub type SeriesFilter = Arc<dyn Fn(&Series) -> bool + Send + Sync>;

/// Predicates handed to the commit-log iterator: which files to open at all,
/// and which series' entries to surface.
#[derive(Clone)]
pub struct ReadFilter {
    pub file_filter: FileFilter,
    pub series_filter: SeriesFilter,
}

impl ReadFilter {
    pub fn all() -> Self {
        Self {
            file_filter: Arc::new(|_| true),
            series_filter: Arc::new(|_| true),
        }
    }
}

pub type EntryStream = BoxStream<'static, anyhow::Result<CommitLogEntry>>;

/// Read-side of the commit log. Entries are yielded in file order, i.e.
/// approximately the system-time order writes were accepted in.
#[async_trait]
pub trait CommitLogSource: Send + Sync + 'static {
    /// Every commit-log file currently present, in no particular order.
    async fn files(&self) -> anyhow::Result<Vec<CommitLogFile>>;

    /// Stream entries from every file admitted by the filter.
    async fn read(&self, filter: ReadFilter) -> anyhow::Result<EntryStream>;
}
