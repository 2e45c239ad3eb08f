use std::{
    fmt,
    sync::Arc,
};

/// Index of a shard within the node's shard set. Each series maps to exactly
/// one shard; shard assignment itself lives outside this repo.
#[cfg_attr(any(test, feature = "testing"), derive(proptest_derive::Arbitrary))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Shard(u32);

impl Shard {
    pub const fn new(shard: u32) -> Self {
        Self(shard)
    }

    pub const fn as_u32(&self) -> u32 {
        self.0
    }

    pub const fn as_usize(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Shard {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Name of a namespace (a logical database with its own retention policy).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Namespace(Arc<str>);

impl Namespace {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Namespace {
    fn from(name: &str) -> Self {
        Self(name.into())
    }
}

impl From<String> for Namespace {
    fn from(name: String) -> Self {
        Self(name.into())
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolution a datapoint's timestamp was originally recorded at. Carried
/// through encode and merge untouched.
#[cfg_attr(any(test, feature = "testing"), derive(proptest_derive::Arbitrary))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TimeUnit {
    Seconds,
    Milliseconds,
    Microseconds,
    #[default]
    Nanoseconds,
}

impl From<TimeUnit> for u8 {
    fn from(unit: TimeUnit) -> u8 {
        match unit {
            TimeUnit::Seconds => 0,
            TimeUnit::Milliseconds => 1,
            TimeUnit::Microseconds => 2,
            TimeUnit::Nanoseconds => 3,
        }
    }
}

impl TryFrom<u8> for TimeUnit {
    type Error = anyhow::Error;

    fn try_from(tag: u8) -> anyhow::Result<Self> {
        let unit = match tag {
            0 => TimeUnit::Seconds,
            1 => TimeUnit::Milliseconds,
            2 => TimeUnit::Microseconds,
            3 => TimeUnit::Nanoseconds,
            _ => anyhow::bail!("unknown time unit tag {tag}"),
        };
        Ok(unit)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::TimeUnit;
    use crate::env::env_config;

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256 * env_config("SHALE_PROPTEST_MULTIPLIER", 1),
            failure_persistence: None,
            ..ProptestConfig::default()
        })]

        #[test]
        fn proptest_time_unit_tag_roundtrip(unit in any::<TimeUnit>()) {
            prop_assert_eq!(TimeUnit::try_from(u8::from(unit)).unwrap(), unit);
        }
    }
}
