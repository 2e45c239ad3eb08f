use std::sync::Arc;

use common::{
    pool::Pool,
    time::UnixNanos,
};

use crate::encoder::SeriesEncoder;

/// Shared pool of [`SeriesEncoder`]s. Taking an encoder resets it to the
/// requested block, so callers never observe another series' state.
#[derive(Clone)]
pub struct EncoderPool {
    pool: Arc<Pool<SeriesEncoder>>,
}

impl EncoderPool {
    pub fn new(max_idle: usize) -> Self {
        Self {
            pool: Arc::new(Pool::new(max_idle, SeriesEncoder::new)),
        }
    }

    pub fn take(&self, block_start: UnixNanos) -> SeriesEncoder {
        let mut encoder = self.pool.take();
        encoder.reset(block_start);
        encoder
    }

    pub fn put(&self, encoder: SeriesEncoder) {
        self.pool.put(encoder);
    }
}

#[cfg(test)]
mod tests {
    use common::{
        series::Datapoint,
        time::UnixNanos,
        types::TimeUnit,
    };

    use super::EncoderPool;

    #[test]
    fn test_take_resets_pooled_encoder() {
        let pool = EncoderPool::new(4);
        let mut encoder = pool.take(UnixNanos::from_secs(0));
        encoder
            .encode(
                Datapoint::new(UnixNanos::from_secs(1), 1.0),
                TimeUnit::Nanoseconds,
                None,
            )
            .unwrap();
        pool.put(encoder);

        let reused = pool.take(UnixNanos::from_secs(7200));
        assert!(reused.is_empty());
        assert_eq!(reused.block_start(), UnixNanos::from_secs(7200));
        assert_eq!(reused.last_write_at(), None);
    }
}
