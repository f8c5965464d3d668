//! Payload sniffing: find where pixel data starts inside a message blob.
//!
//! The bag schema carries no encoding tag beyond the topic name, so the
//! start offset is located from byte markers left in the payload header.

use super::DecodeError;
use crate::topics::TopicKind;

/// Marker identifying a JFIF container inside a compressed image message.
pub const JPEG_MARKER: &[u8] = b"JFIF";
/// Bytes between the start of the JPEG stream (SOI + APP0 header) and the marker.
pub const JPEG_MARKER_LEAD: usize = 6;
/// Vendor debug string found in some raw frame headers.
pub const RAW_MARKER_BAYER: &[u8] = b"bayer";
/// Encoding string preceding raw BGR data.
pub const RAW_MARKER_BGR: &[u8] = b"bgr";
/// Pixel data begins right after the `bgr` marker.
pub const RAW_MARKER_BGR_SKIP: usize = 3;
/// Raw markers further in than this are treated as pixel data.
pub const RAW_MARKER_SEARCH_BOUND: usize = 0x40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadEncoding {
    Compressed,
    RawPattern,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifiedPayload {
    pub encoding: PayloadEncoding,
    pub pixel_start: usize,
}

impl ClassifiedPayload {
    /// The slice of `payload` holding pixel data.
    pub fn pixels<'a>(&self, payload: &'a [u8]) -> &'a [u8] {
        &payload[self.pixel_start.min(payload.len())..]
    }
}

/// Classify a message payload from a topic of the given kind.
pub fn classify(payload: &[u8], kind: TopicKind) -> Result<ClassifiedPayload, DecodeError> {
    match kind {
        TopicKind::Compressed => classify_compressed(payload),
        TopicKind::Raw => Ok(classify_raw(payload)),
    }
}

fn classify_compressed(payload: &[u8]) -> Result<ClassifiedPayload, DecodeError> {
    let pos = find(payload, JPEG_MARKER).ok_or(DecodeError::MissingMarker)?;
    let pixel_start = pos
        .checked_sub(JPEG_MARKER_LEAD)
        .ok_or(DecodeError::MarkerTooEarly { position: pos })?;
    Ok(ClassifiedPayload {
        encoding: PayloadEncoding::Compressed,
        pixel_start,
    })
}

fn classify_raw(payload: &[u8]) -> ClassifiedPayload {
    let bayer = find_within(payload, RAW_MARKER_BAYER, RAW_MARKER_SEARCH_BOUND);
    let pixel_start = bayer
        .or_else(|| {
            find_within(payload, RAW_MARKER_BGR, RAW_MARKER_SEARCH_BOUND - RAW_MARKER_BGR_SKIP)
                .map(|i| i + RAW_MARKER_BGR_SKIP)
        })
        .unwrap_or(0);
    ClassifiedPayload {
        encoding: PayloadEncoding::RawPattern,
        pixel_start,
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// First `needle` starting at or before `last_start`; only that prefix is scanned.
fn find_within(haystack: &[u8], needle: &[u8], last_start: usize) -> Option<usize> {
    let end = haystack.len().min(last_start + needle.len());
    find(&haystack[..end], needle)
}
