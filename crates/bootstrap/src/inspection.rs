use std::{
    collections::BTreeSet,
    sync::Arc,
};

use common::commitlog::CommitLogSource;

/// The set of commit-log files present when bootstrapping began.
///
/// Captured exactly once, before any reading. A file that appears later was
/// rotated in by the live write path, so its contents are already in the
/// in-memory buffers and replaying it would double-count writes.
#[derive(Clone)]
pub struct Inspection {
    files: Arc<BTreeSet<String>>,
}

impl Inspection {
    pub async fn capture(commit_log: &dyn CommitLogSource) -> anyhow::Result<Self> {
        let files: BTreeSet<String> = commit_log
            .files()
            .await?
            .into_iter()
            .map(|file| file.name)
            .collect();
        tracing::info!("Inspected commit log: {} files present", files.len());
        Ok(Self {
            files: Arc::new(files),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.files.contains(name)
    }

    pub fn num_files(&self) -> usize {
        self.files.len()
    }

    #[cfg(test)]
    pub fn from_names(names: impl IntoIterator<Item = &'static str>) -> Self {
        Self {
            files: Arc::new(names.into_iter().map(String::from).collect()),
        }
    }
}
