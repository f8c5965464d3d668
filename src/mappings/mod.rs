//! Message payload → image frame mappings.

pub mod classify;
pub mod images;

use thiserror::Error;

pub use classify::{ClassifiedPayload, PayloadEncoding, classify};
pub use images::{ChannelOrder, DecodedFrame, RawGeometry, decode, write_jpeg};

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("compressed image marker not found in payload")]
    MissingMarker,
    #[error("compressed image marker at byte {position} leaves no room for the container header")]
    MarkerTooEarly { position: usize },
    #[error("raw frame truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
    #[error("raw geometry {width}x{height}x{channels} does not fit in memory")]
    OversizedGeometry { width: u32, height: u32, channels: u8 },
    #[error("image codec: {0}")]
    Codec(#[from] image::ImageError),
}
