//! Series block codec: the encoder that turns a stream of datapoints into a
//! compact byte stream for one (series, block), the iterator that decodes it
//! back, and the multi-stream iterator that merge-sorts several encoded
//! streams into one.

mod encoder;
mod iterator;
mod multi;
mod pools;
mod varint;

pub use encoder::{
    EncodeError,
    SeriesEncoder,
};
pub use iterator::{
    DecodeError,
    DecodedPoint,
    SeriesIterator,
};
pub use multi::MultiSeriesIterator;
pub use pools::EncoderPool;
