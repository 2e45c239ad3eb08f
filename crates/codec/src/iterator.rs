use byteorder::{
    ByteOrder,
    LittleEndian,
};
use bytes::Bytes;
use common::{
    series::Datapoint,
    time::UnixNanos,
    types::TimeUnit,
};
use thiserror::Error;

use crate::varint;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("encoded stream ended mid-record")]
    UnexpectedEof,
    #[error("varint does not fit in 64 bits")]
    VarintOverflow,
    #[error("unknown time unit tag {0}")]
    UnknownTimeUnit(u8),
}

#[derive(Clone, Debug, PartialEq)]
pub struct DecodedPoint {
    pub datapoint: Datapoint,
    pub unit: TimeUnit,
    pub annotation: Option<Bytes>,
}

/// Decodes one encoded series stream back into datapoints.
pub struct SeriesIterator {
    data: Bytes,
    pos: usize,
    prev_ts: i64,
    failed: bool,
}

impl SeriesIterator {
    pub fn new(block_start: UnixNanos, data: Bytes) -> Self {
        Self {
            data,
            pos: 0,
            prev_ts: block_start.as_nanos(),
            failed: false,
        }
    }

    fn decode_next(&mut self) -> Result<DecodedPoint, DecodeError> {
        let delta = varint::read_i64(&self.data, &mut self.pos)?;
        let ts = self.prev_ts.wrapping_add(delta);

        let unit_tag = *self.data.get(self.pos).ok_or(DecodeError::UnexpectedEof)?;
        self.pos += 1;
        let unit = TimeUnit::try_from(unit_tag).map_err(|_| DecodeError::UnknownTimeUnit(unit_tag))?;

        let value_end = self.pos + 8;
        if value_end > self.data.len() {
            return Err(DecodeError::UnexpectedEof);
        }
        let value = LittleEndian::read_f64(&self.data[self.pos..value_end]);
        self.pos = value_end;

        let annotation_len = varint::read_u64(&self.data, &mut self.pos)? as usize;
        let annotation = if annotation_len == 0 {
            None
        } else {
            let end = self.pos + annotation_len;
            if end > self.data.len() {
                return Err(DecodeError::UnexpectedEof);
            }
            let annotation = self.data.slice(self.pos..end);
            self.pos = end;
            Some(annotation)
        };

        self.prev_ts = ts;
        Ok(DecodedPoint {
            datapoint: Datapoint::new(UnixNanos::from_nanos(ts), value),
            unit,
            annotation,
        })
    }
}

impl Iterator for SeriesIterator {
    type Item = Result<DecodedPoint, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.data.len() {
            return None;
        }
        let result = self.decode_next();
        if result.is_err() {
            self.failed = true;
        }
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use common::{
        series::Datapoint,
        time::UnixNanos,
        types::TimeUnit,
    };
    use proptest::prelude::*;

    use super::SeriesIterator;
    use crate::encoder::SeriesEncoder;

    #[test]
    fn test_roundtrip_units_and_annotations() {
        let block_start = UnixNanos::from_secs(7200);
        let mut encoder = SeriesEncoder::new();
        encoder.reset(block_start);
        let points = [
            (UnixNanos::from_secs(7201), 1.5, TimeUnit::Seconds, None),
            (
                UnixNanos::from_secs(7202),
                -2.25,
                TimeUnit::Nanoseconds,
                Some(Bytes::from_static(b"resampled")),
            ),
            (
                UnixNanos::from_nanos(7_203_000_000_001),
                f64::MAX,
                TimeUnit::Milliseconds,
                None,
            ),
        ];
        for (ts, value, unit, annotation) in &points {
            encoder
                .encode(Datapoint::new(*ts, *value), *unit, annotation.as_ref())
                .unwrap();
        }

        let decoded: Vec<_> = SeriesIterator::new(block_start, encoder.take_stream())
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(decoded.len(), points.len());
        for (decoded, (ts, value, unit, annotation)) in decoded.iter().zip(&points) {
            assert_eq!(decoded.datapoint, Datapoint::new(*ts, *value));
            assert_eq!(decoded.unit, *unit);
            assert_eq!(decoded.annotation, *annotation);
        }
    }

    #[test]
    fn test_truncated_stream_fails_once() {
        let block_start = UnixNanos::from_secs(0);
        let mut encoder = SeriesEncoder::new();
        encoder.reset(block_start);
        encoder
            .encode(
                Datapoint::new(UnixNanos::from_secs(1), 1.0),
                TimeUnit::Nanoseconds,
                None,
            )
            .unwrap();
        let stream = encoder.take_stream();
        let truncated = stream.slice(..stream.len() - 4);

        let mut iter = SeriesIterator::new(block_start, truncated);
        assert!(iter.next().unwrap().is_err());
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_empty_stream() {
        let mut iter = SeriesIterator::new(UnixNanos::from_secs(0), Bytes::new());
        assert!(iter.next().is_none());
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            failure_persistence: None,
            ..ProptestConfig::default()
        })]

        // Any strictly increasing sequence of points decodes back exactly,
        // across the whole timestamp, value, and unit domains.
        #[test]
        fn proptest_roundtrip_arbitrary_points(
            mut points in prop::collection::vec((any::<Datapoint>(), any::<TimeUnit>()), 0..64),
        ) {
            points.sort_by_key(|(point, _)| point.timestamp);
            points.dedup_by_key(|(point, _)| point.timestamp);

            let block_start = UnixNanos::from_secs(0);
            let mut encoder = SeriesEncoder::new();
            encoder.reset(block_start);
            for (point, unit) in &points {
                encoder.encode(*point, *unit, None).unwrap();
            }

            let decoded: Vec<_> = SeriesIterator::new(block_start, encoder.take_stream())
                .collect::<Result<_, _>>()
                .unwrap();
            prop_assert_eq!(decoded.len(), points.len());
            for (decoded, (point, unit)) in decoded.iter().zip(&points) {
                prop_assert_eq!(decoded.datapoint.timestamp, point.timestamp);
                // Bit equality keeps NaN values honest.
                prop_assert_eq!(decoded.datapoint.value.to_bits(), point.value.to_bits());
                prop_assert_eq!(decoded.unit, *unit);
                prop_assert!(decoded.annotation.is_none());
            }
        }
    }
}
