use std::{
    fmt,
    ops::{
        Add,
        Sub,
    },
    time::Duration,
};

/// A point in time as nanoseconds since the Unix epoch.
///
/// All datapoint timestamps, block starts, and snapshot times in the engine
/// are `UnixNanos`. Arithmetic with [`Duration`] is saturating at the i64
/// boundaries, which are several centuries away from any retention window we
/// care about.
#[cfg_attr(any(test, feature = "testing"), derive(proptest_derive::Arbitrary))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnixNanos(i64);

impl UnixNanos {
    pub const MAX: UnixNanos = UnixNanos(i64::MAX);
    pub const MIN: UnixNanos = UnixNanos(i64::MIN);

    pub const fn from_nanos(nanos: i64) -> Self {
        Self(nanos)
    }

    pub const fn from_secs(secs: i64) -> Self {
        Self(secs * 1_000_000_000)
    }

    pub const fn as_nanos(&self) -> i64 {
        self.0
    }

    /// Truncates this timestamp down to a multiple of `block_size`.
    pub fn truncate_to(&self, block_size: Duration) -> Self {
        let size = duration_nanos(block_size);
        Self(self.0 - self.0.rem_euclid(size))
    }

    pub fn is_aligned_to(&self, block_size: Duration) -> bool {
        self.0.rem_euclid(duration_nanos(block_size)) == 0
    }
}

fn duration_nanos(duration: Duration) -> i64 {
    i64::try_from(duration.as_nanos()).unwrap_or(i64::MAX)
}

impl Add<Duration> for UnixNanos {
    type Output = UnixNanos;

    fn add(self, rhs: Duration) -> Self::Output {
        UnixNanos(self.0.saturating_add(duration_nanos(rhs)))
    }
}

impl Sub<Duration> for UnixNanos {
    type Output = UnixNanos;

    fn sub(self, rhs: Duration) -> Self::Output {
        UnixNanos(self.0.saturating_sub(duration_nanos(rhs)))
    }
}

impl fmt::Display for UnixNanos {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}ns", self.0)
    }
}
