use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ExtendedColorType, ImageError, ImageFormat};
use serde::{Deserialize, Serialize};

use super::DecodeError;
use super::classify::{ClassifiedPayload, PayloadEncoding};

pub const DEFAULT_JPEG_QUALITY: u8 = 95;

/// Largest raw frame buffer accepted, in bytes.
pub const MAX_RAW_FRAME_BYTES: usize = 256 << 20;

/// JPEG caps each dimension at 16 bits.
pub const MAX_JPEG_DIMENSION: u32 = u16::MAX as u32;

/// Channel order of decoded pixel buffers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelOrder {
    #[default]
    Rgb,
    Bgr,
}

/// Fixed geometry of raw sensor frames (interleaved 8-bit channels).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawGeometry {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
}

impl Default for RawGeometry {
    fn default() -> Self {
        Self {
            width: 2064,
            height: 1544,
            channels: 3,
        }
    }
}

impl RawGeometry {
    /// Buffer size of one frame, `None` when it does not fit in `usize`.
    pub fn byte_len(&self) -> Option<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)?
            .checked_mul(self.channels as usize)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub pixels: Vec<u8>,
}

impl DecodedFrame {
    fn color_type(&self) -> ExtendedColorType {
        if self.channels == 1 {
            ExtendedColorType::L8
        } else {
            ExtendedColorType::Rgb8
        }
    }
}

/// Decode a classified payload into a frame buffer.
pub fn decode(
    classified: ClassifiedPayload,
    payload: &[u8],
    order: ChannelOrder,
    geometry: RawGeometry,
) -> Result<DecodedFrame, DecodeError> {
    let data = classified.pixels(payload);
    match classified.encoding {
        PayloadEncoding::Compressed => decode_compressed(data, order),
        PayloadEncoding::RawPattern => decode_raw(data, geometry),
    }
}

fn decode_compressed(data: &[u8], order: ChannelOrder) -> Result<DecodedFrame, DecodeError> {
    let dyn_img = image::load_from_memory_with_format(data, ImageFormat::Jpeg)?;
    let frame = match dyn_img {
        DynamicImage::ImageLuma8(gray) => DecodedFrame {
            width: gray.width(),
            height: gray.height(),
            channels: 1,
            pixels: gray.into_raw(),
        },
        other => {
            let rgb8 = other.to_rgb8();
            let (width, height) = rgb8.dimensions();
            let mut pixels = rgb8.into_raw();
            if order == ChannelOrder::Bgr {
                swap_red_blue(&mut pixels);
            }
            DecodedFrame {
                width,
                height,
                channels: 3,
                pixels,
            }
        }
    };
    tracing::trace!(
        width = frame.width,
        height = frame.height,
        channels = frame.channels,
        "decoded compressed frame"
    );
    Ok(frame)
}

// No demosaicing: the sensor already delivers interleaved BGR, only the
// channel order is fixed up.
fn decode_raw(data: &[u8], geometry: RawGeometry) -> Result<DecodedFrame, DecodeError> {
    let expected = geometry
        .byte_len()
        .ok_or(DecodeError::OversizedGeometry {
            width: geometry.width,
            height: geometry.height,
            channels: geometry.channels,
        })?;
    if data.len() < expected {
        return Err(DecodeError::Truncated {
            expected,
            actual: data.len(),
        });
    }
    let mut pixels = data[..expected].to_vec();
    if geometry.channels == 3 {
        swap_red_blue(&mut pixels);
    }
    Ok(DecodedFrame {
        width: geometry.width,
        height: geometry.height,
        channels: geometry.channels,
        pixels,
    })
}

fn swap_red_blue(buf: &mut [u8]) {
    for px in buf.chunks_exact_mut(3) {
        px.swap(0, 2);
    }
}

/// Encode `frame` as JPEG at `path`.
///
/// The image is written to a `.part` sibling first and renamed into place,
/// so an existing file at `path` always holds a complete frame.
pub fn write_jpeg(frame: &DecodedFrame, path: &Path, quality: u8) -> Result<(), ImageError> {
    let tmp_path = part_path(path);
    let res = (|| -> Result<(), ImageError> {
        let mut writer = BufWriter::new(File::create(&tmp_path)?);
        JpegEncoder::new_with_quality(&mut writer, quality).encode(
            &frame.pixels,
            frame.width,
            frame.height,
            frame.color_type(),
        )?;
        writer.flush()?;
        Ok(())
    })();
    match res {
        Ok(()) => std::fs::rename(&tmp_path, path).map_err(ImageError::IoError),
        Err(e) => {
            let _ = std::fs::remove_file(&tmp_path);
            Err(e)
        }
    }
}

fn part_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mappings::classify::classify;
    use crate::topics::TopicKind;
    use image::{GrayImage, Luma, Rgb, RgbImage};

    fn rgb_jpeg(width: u32, height: u32, px: [u8; 3]) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb(px));
        let mut buf = Vec::new();
        JpegEncoder::new_with_quality(&mut buf, 100)
            .encode(img.as_raw(), width, height, ExtendedColorType::Rgb8)
            .unwrap();
        buf
    }

    fn gray_jpeg(width: u32, height: u32, value: u8) -> Vec<u8> {
        let img = GrayImage::from_pixel(width, height, Luma([value]));
        let mut buf = Vec::new();
        JpegEncoder::new_with_quality(&mut buf, 100)
            .encode(img.as_raw(), width, height, ExtendedColorType::L8)
            .unwrap();
        buf
    }

    fn with_header(jpeg: &[u8]) -> Vec<u8> {
        let mut payload = vec![0x00, 0x01, 0x00, 0x00, 0x05, 0x00, 0x00, 0x00];
        payload.extend_from_slice(b"jpeg\0\0\0\0");
        payload.extend_from_slice(jpeg);
        payload
    }

    fn close(a: u8, b: u8) -> bool {
        a.abs_diff(b) <= 8
    }

    #[test]
    fn compressed_decodes_to_rgb() {
        let payload = with_header(&rgb_jpeg(16, 8, [220, 30, 40]));
        let c = classify(&payload, TopicKind::Compressed).unwrap();
        let frame = decode(c, &payload, ChannelOrder::Rgb, RawGeometry::default()).unwrap();
        assert_eq!((frame.width, frame.height, frame.channels), (16, 8, 3));
        assert_eq!(frame.pixels.len(), 16 * 8 * 3);
        assert!(close(frame.pixels[0], 220) && close(frame.pixels[2], 40));
    }

    #[test]
    fn compressed_bgr_passthrough_swaps_channels() {
        let payload = with_header(&rgb_jpeg(8, 8, [220, 30, 40]));
        let c = classify(&payload, TopicKind::Compressed).unwrap();
        let frame = decode(c, &payload, ChannelOrder::Bgr, RawGeometry::default()).unwrap();
        assert!(close(frame.pixels[0], 40) && close(frame.pixels[2], 220));
    }

    #[test]
    fn compressed_grayscale_stays_single_channel() {
        let payload = with_header(&gray_jpeg(8, 4, 128));
        let c = classify(&payload, TopicKind::Compressed).unwrap();
        let frame = decode(c, &payload, ChannelOrder::Rgb, RawGeometry::default()).unwrap();
        assert_eq!(frame.channels, 1);
        assert_eq!(frame.pixels.len(), 32);
    }

    #[test]
    fn corrupt_jpeg_is_a_codec_error() {
        let mut payload = vec![0u8; 8];
        payload.extend_from_slice(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10]);
        payload.extend_from_slice(b"JFIF\0garbage");
        let c = classify(&payload, TopicKind::Compressed).unwrap();
        let err = decode(c, &payload, ChannelOrder::Rgb, RawGeometry::default()).unwrap_err();
        assert!(matches!(err, DecodeError::Codec(_)));
    }

    #[test]
    fn raw_reorders_bgr_to_rgb() {
        let geometry = RawGeometry {
            width: 2,
            height: 1,
            channels: 3,
        };
        let mut payload = b"hdr bgr".to_vec();
        payload.extend_from_slice(&[1, 2, 3, 4, 5, 6, 0xEE]);
        let c = classify(&payload, TopicKind::Raw).unwrap();
        let frame = decode(c, &payload, ChannelOrder::Rgb, geometry).unwrap();
        assert_eq!(frame.pixels, vec![3, 2, 1, 6, 5, 4]);
    }

    #[test]
    fn raw_short_buffer_is_truncated_error() {
        let payload = vec![0u8; 100];
        let c = classify(&payload, TopicKind::Raw).unwrap();
        let err = decode(c, &payload, ChannelOrder::Rgb, RawGeometry::default()).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Truncated {
                expected: 9_560_448,
                actual: 100
            }
        ));
    }

    #[test]
    fn byte_len_reports_overflow() {
        assert_eq!(RawGeometry::default().byte_len(), Some(9_560_448));
        let huge = RawGeometry {
            width: u32::MAX,
            height: u32::MAX,
            channels: 3,
        };
        assert_eq!(huge.byte_len(), None);
        let payload = vec![0u8; 16];
        let c = classify(&payload, TopicKind::Raw).unwrap();
        let err = decode(c, &payload, ChannelOrder::Rgb, huge).unwrap_err();
        assert!(matches!(err, DecodeError::OversizedGeometry { .. }));
    }

    #[test]
    fn write_jpeg_leaves_no_part_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("front_left_1.jpeg");
        let frame = DecodedFrame {
            width: 4,
            height: 4,
            channels: 3,
            pixels: vec![100; 48],
        };
        write_jpeg(&frame, &path, DEFAULT_JPEG_QUALITY).unwrap();
        assert!(path.exists());
        assert!(!dir.path().join("front_left_1.jpeg.part").exists());
        let back = image::open(&path).unwrap();
        assert_eq!((back.width(), back.height()), (4, 4));
    }

    #[test]
    fn write_jpeg_into_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("x_1.jpeg");
        let frame = DecodedFrame {
            width: 1,
            height: 1,
            channels: 1,
            pixels: vec![0],
        };
        assert!(write_jpeg(&frame, &path, DEFAULT_JPEG_QUALITY).is_err());
    }
}
