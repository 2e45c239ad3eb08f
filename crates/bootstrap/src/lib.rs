//! Commit-log bootstrap: rebuilds a node's in-memory series buffers after a
//! restart by replaying the durable artifacts the write path produced.
//!
//! For each requested (shard, time-range) pair the bootstrapper decides,
//! from snapshot metadata, how far back into the commit log it must read
//! ([`planner`]), streams the admitted entries through a pool of per-shard
//! encoder workers ([`read`]), and merges the resulting encoder streams with
//! the latest valid snapshot for each (shard, block) ([`merge`]).
//!
//! This is a last-ditch source: it always reports its requested ranges as
//! fulfilled and prefers local recovery over hard failure.

pub mod catalog;
pub mod inspection;
pub mod merge;
pub mod metrics;
pub mod options;
pub mod planner;
pub mod read;
pub mod result;
pub mod source;

pub use options::BootstrapOptions;
pub use result::{
    BootstrapResult,
    SeriesBlocks,
    ShardResult,
};
pub use source::{
    BootstrapError,
    BootstrapStrategy,
    Bootstrapper,
    CommitLogBootstrapper,
};
