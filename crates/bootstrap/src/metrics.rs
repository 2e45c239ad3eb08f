use std::sync::LazyLock;

use prometheus::{
    register_histogram,
    register_int_counter,
    Histogram,
    HistogramTimer,
    IntCounter,
};

static COMMITLOG_BOOTSTRAP_SECONDS: LazyLock<Histogram> = LazyLock::new(|| {
    register_histogram!(
        "commitlog_bootstrap_seconds",
        "Time for a full commit log bootstrap read"
    )
    .expect("Metric initialization failed")
});
pub fn bootstrap_timer() -> HistogramTimer {
    COMMITLOG_BOOTSTRAP_SECONDS.start_timer()
}

static COMMITLOG_BOOTSTRAP_READ_SECONDS: LazyLock<Histogram> = LazyLock::new(|| {
    register_histogram!(
        "commitlog_bootstrap_read_seconds",
        "Time spent streaming the commit log into encoder workers"
    )
    .expect("Metric initialization failed")
});
pub fn read_stage_timer() -> HistogramTimer {
    COMMITLOG_BOOTSTRAP_READ_SECONDS.start_timer()
}

static COMMITLOG_BOOTSTRAP_MERGE_SECONDS: LazyLock<Histogram> = LazyLock::new(|| {
    register_histogram!(
        "commitlog_bootstrap_merge_seconds",
        "Time spent merging encoder output with snapshots"
    )
    .expect("Metric initialization failed")
});
pub fn merge_stage_timer() -> HistogramTimer {
    COMMITLOG_BOOTSTRAP_MERGE_SECONDS.start_timer()
}

static COMMITLOG_BOOTSTRAP_ENTRIES_READ_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(
        "commitlog_bootstrap_entries_read_total",
        "Commit log entries read during bootstrap"
    )
    .expect("Metric initialization failed")
});
pub fn log_entries_read(num_entries: u64) {
    COMMITLOG_BOOTSTRAP_ENTRIES_READ_TOTAL.inc_by(num_entries);
}

static COMMITLOG_BOOTSTRAP_DATAPOINTS_SKIPPED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(
        "commitlog_bootstrap_datapoints_skipped_total",
        "Datapoints outside the requested shards or ranges"
    )
    .expect("Metric initialization failed")
});
pub fn log_datapoint_skipped() {
    COMMITLOG_BOOTSTRAP_DATAPOINTS_SKIPPED_TOTAL.inc();
}

static COMMITLOG_BOOTSTRAP_ENCODE_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(
        "commitlog_bootstrap_encode_errors_total",
        "Datapoints dropped to encode errors during replay"
    )
    .expect("Metric initialization failed")
});
pub fn log_encode_errors(num_errors: u64) {
    COMMITLOG_BOOTSTRAP_ENCODE_ERRORS_TOTAL.inc_by(num_errors);
}

static COMMITLOG_BOOTSTRAP_MERGE_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(
        "commitlog_bootstrap_merge_errors_total",
        "Series abandoned to encode errors during merge"
    )
    .expect("Metric initialization failed")
});
pub fn log_merge_errors(num_errors: u64) {
    COMMITLOG_BOOTSTRAP_MERGE_ERRORS_TOTAL.inc_by(num_errors);
}

static COMMITLOG_BOOTSTRAP_SNAPSHOT_READ_FAILURES_TOTAL: LazyLock<IntCounter> =
    LazyLock::new(|| {
        register_int_counter!(
            "commitlog_bootstrap_snapshot_read_failures_total",
            "Snapshot files that failed to read and were treated as absent"
        )
        .expect("Metric initialization failed")
    });
pub fn log_snapshot_read_failure() {
    COMMITLOG_BOOTSTRAP_SNAPSHOT_READ_FAILURES_TOTAL.inc();
}
