use std::collections::BTreeMap;

use bytes::Bytes;
use common::{
    ranges::ShardTimeRanges,
    series::{
        SeriesHash,
        SeriesId,
    },
    time::UnixNanos,
    types::Shard,
};
use fxhash::FxHashMap;

/// Merged, encoded blocks for one series.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeriesBlocks {
    pub id: SeriesId,
    pub blocks: BTreeMap<UnixNanos, Bytes>,
}

/// All merged series for one shard, keyed by fingerprint.
#[derive(Clone, Debug, Default)]
pub struct ShardResult {
    series: FxHashMap<SeriesHash, SeriesBlocks>,
}

impl ShardResult {
    pub fn add_block(&mut self, id: SeriesId, block_start: UnixNanos, bytes: Bytes) {
        self.series
            .entry(id.hash())
            .or_insert_with(|| SeriesBlocks {
                id,
                blocks: BTreeMap::new(),
            })
            .blocks
            .insert(block_start, bytes);
    }

    pub fn get(&self, id: &SeriesId) -> Option<&SeriesBlocks> {
        self.series.get(&id.hash())
    }

    pub fn series(&self) -> impl Iterator<Item = &SeriesBlocks> {
        self.series.values()
    }

    pub fn num_series(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

/// What a bootstrap run produced. `fulfilled` always equals the requested
/// ranges: this source never rejects a range for missing data, and leaves
/// reacting to absent series to the caller.
#[derive(Clone, Debug, Default)]
pub struct BootstrapResult {
    pub shards: BTreeMap<Shard, ShardResult>,
    pub fulfilled: ShardTimeRanges,
}

impl BootstrapResult {
    pub fn shard(&self, shard: Shard) -> Option<&ShardResult> {
        self.shards.get(&shard)
    }

    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }
}
