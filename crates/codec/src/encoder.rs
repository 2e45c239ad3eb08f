use std::mem;

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
pub enum EncodeError {
    #[error("datapoint at {attempted} does not advance the encoder's last write at {last}")]
    OutOfOrder {
        last: UnixNanos,
        attempted: UnixNanos,
    },
}

/// Encodes one (series, block) as a byte stream of strictly increasing
/// timestamps.
///
/// Record layout: zig-zag varint timestamp delta from the previous record
/// (the first record deltas from the block start), a one-byte time unit tag,
/// the value's eight f64 bits little-endian, then a varint annotation length
/// (zero for none) followed by the annotation bytes.
pub struct SeriesEncoder {
    block_start: UnixNanos,
    prev_ts: i64,
    last_write_at: Option<UnixNanos>,
    num_points: usize,
    buf: Vec<u8>,
}

impl SeriesEncoder {
    pub fn new() -> Self {
        Self {
            block_start: UnixNanos::from_nanos(0),
            prev_ts: 0,
            last_write_at: None,
            num_points: 0,
            buf: Vec::new(),
        }
    }

    /// Discards all state and retargets the encoder at a new block. Keeps
    /// the buffer's capacity, which is what makes pooling encoders worth it.
    pub fn reset(&mut self, block_start: UnixNanos) {
        self.block_start = block_start;
        self.prev_ts = block_start.as_nanos();
        self.last_write_at = None;
        self.num_points = 0;
        self.buf.clear();
    }

    pub fn block_start(&self) -> UnixNanos {
        self.block_start
    }

    /// Greatest timestamp encoded so far.
    pub fn last_write_at(&self) -> Option<UnixNanos> {
        self.last_write_at
    }

    pub fn num_points(&self) -> usize {
        self.num_points
    }

    pub fn is_empty(&self) -> bool {
        self.num_points == 0
    }

    pub fn encode(
        &mut self,
        datapoint: Datapoint,
        unit: TimeUnit,
        annotation: Option<&Bytes>,
    ) -> Result<(), EncodeError> {
        if let Some(last) = self.last_write_at {
            if datapoint.timestamp <= last {
                return Err(EncodeError::OutOfOrder {
                    last,
                    attempted: datapoint.timestamp,
                });
            }
        }
        let ts = datapoint.timestamp.as_nanos();
        varint::write_i64(&mut self.buf, ts.wrapping_sub(self.prev_ts));
        self.buf.push(u8::from(unit));
        let mut bits = [0u8; 8];
        LittleEndian::write_f64(&mut bits, datapoint.value);
        self.buf.extend_from_slice(&bits);
        match annotation {
            Some(annotation) => {
                varint::write_u64(&mut self.buf, annotation.len() as u64);
                self.buf.extend_from_slice(annotation);
            },
            None => varint::write_u64(&mut self.buf, 0),
        }
        self.prev_ts = ts;
        self.last_write_at = Some(datapoint.timestamp);
        self.num_points += 1;
        Ok(())
    }

    /// Takes the encoded stream, leaving the encoder drained and ready to be
    /// returned to its pool.
    pub fn take_stream(&mut self) -> Bytes {
        self.num_points = 0;
        Bytes::from(mem::take(&mut self.buf))
    }
}

impl Default for SeriesEncoder {
    fn default() -> Self {
        Self::new()
    }
}
