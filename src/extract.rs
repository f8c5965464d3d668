use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use indicatif::ProgressBar;

use crate::error::ExtractError;
use crate::mappings::images::{DEFAULT_JPEG_QUALITY, MAX_JPEG_DIMENSION, MAX_RAW_FRAME_BYTES};
use crate::mappings::{self, ChannelOrder, RawGeometry};
use crate::report::{StreamReport, StreamStatus};
use crate::rosbags_io::{BagReader, MessageHeader};
use crate::topics::{self, CAMERA_STREAMS, TopicKind};

/// Message headers fetched per query while walking a topic.
const HEADER_PAGE_SIZE: u32 = 256;

/// Options for extracting camera frames from a ROS 2 bag
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Path to the input .db3 file
    pub bag_path: PathBuf,
    /// Root of the output tree; each stream writes into `<output_dir>/<stream>/`
    pub output_dir: PathBuf,
    /// Camera streams to extract (empty means all known streams)
    pub streams: Vec<String>,
    /// Examine every Nth message of each topic
    pub stride: usize,
    /// Which topic flavour to read (compressed JPEG or raw frames)
    pub topic_kind: TopicKind,
    /// Channel order of compressed frames before writing
    pub color: ChannelOrder,
    /// Geometry of raw frames
    pub raw_geometry: RawGeometry,
    /// JPEG quality of written frames (1-100)
    pub jpeg_quality: u8,
    /// Ask workers to stop once this much time has passed
    pub timeout: Option<Duration>,
    /// Show per-stream progress bars
    pub show_progress: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            bag_path: PathBuf::new(),
            output_dir: PathBuf::new(),
            streams: Vec::new(),
            stride: 1,
            topic_kind: TopicKind::Compressed,
            color: ChannelOrder::Rgb,
            raw_geometry: RawGeometry::default(),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            timeout: None,
            show_progress: false,
        }
    }
}

impl ExtractOptions {
    /// Check the options and return the streams to extract.
    pub fn validate(&self) -> Result<Vec<String>, ExtractError> {
        if self.stride == 0 {
            return Err(ExtractError::Config("stride must be >= 1".into()));
        }
        let g = self.raw_geometry;
        if g.width == 0 || g.height == 0 || g.channels == 0 {
            return Err(ExtractError::Config(format!(
                "raw geometry must be non-zero, got {}x{}x{}",
                g.width, g.height, g.channels
            )));
        }
        if !matches!(g.channels, 1 | 3) {
            return Err(ExtractError::Config(format!(
                "raw frames must have 1 or 3 channels, got {}",
                g.channels
            )));
        }
        if g.width > MAX_JPEG_DIMENSION || g.height > MAX_JPEG_DIMENSION {
            return Err(ExtractError::Config(format!(
                "raw geometry {}x{} exceeds the JPEG limit of {} pixels per side",
                g.width, g.height, MAX_JPEG_DIMENSION
            )));
        }
        match g.byte_len() {
            Some(len) if len <= MAX_RAW_FRAME_BYTES => {}
            _ => {
                return Err(ExtractError::Config(format!(
                    "raw geometry {}x{}x{} exceeds {} bytes per frame",
                    g.width, g.height, g.channels, MAX_RAW_FRAME_BYTES
                )));
            }
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ExtractError::Config(format!(
                "jpeg quality must be in 1..=100, got {}",
                self.jpeg_quality
            )));
        }

        let streams: Vec<String> = if self.streams.is_empty() {
            CAMERA_STREAMS.iter().map(|s| s.to_string()).collect()
        } else {
            self.streams.clone()
        };
        let mut seen = HashSet::new();
        for stream in &streams {
            if !topics::is_known_stream(stream) {
                return Err(ExtractError::Config(format!(
                    "unknown stream '{}' (known: {})",
                    stream,
                    CAMERA_STREAMS.join(", ")
                )));
            }
            if !seen.insert(stream.as_str()) {
                return Err(ExtractError::Config(format!("stream '{}' requested twice", stream)));
            }
        }
        Ok(streams)
    }
}

/// Output file for the `seq`-th examined message of `stream` (1-based).
pub fn frame_path(output_dir: &Path, stream: &str, seq: u64) -> PathBuf {
    output_dir.join(stream).join(format!("{stream}_{seq}.jpeg"))
}

/// Extract one camera stream from the bag.
///
/// Opens a dedicated reader, resolves the stream's topic and walks its
/// messages in row order. Every `stride`-th message is examined and gets the
/// next sequence number; its frame is decoded and written unless the output
/// file already exists. Per-message failures are logged and counted.
///
/// Errors are returned only when the bag cannot be opened, its catalog
/// cannot be read, or the stream directory cannot be created.
pub fn extract_stream(
    options: &ExtractOptions,
    stream: &str,
    cancel: &AtomicBool,
    pb: &ProgressBar,
) -> Result<StreamReport, ExtractError> {
    let started = Instant::now();
    let span = tracing::info_span!("stream", stream);
    let _enter = span.enter();

    let mut reader = BagReader::open(&options.bag_path)
        .map_err(|e| ExtractError::handle(&options.bag_path, e))?;

    let topic = match topics::resolve_topic(&mut reader, stream, options.topic_kind) {
        Ok(topic) => topic,
        Err(e @ ExtractError::StreamAbsent { .. }) => {
            tracing::warn!("{e}; skipping stream");
            pb.finish_and_clear();
            let mut report = StreamReport::absent(stream);
            report.elapsed_ms = started.elapsed().as_millis() as u64;
            return Ok(report);
        }
        Err(e) => return Err(e),
    };

    let total = reader
        .count_messages(topic.id)
        .map_err(|e| ExtractError::handle(&options.bag_path, e))?;
    let stride = options.stride as u64;
    pb.set_length(total.div_ceil(stride));
    pb.set_message(stream.to_string());

    let stream_dir = options.output_dir.join(stream);
    std::fs::create_dir_all(&stream_dir).map_err(|source| ExtractError::OutputDir {
        path: stream_dir.clone(),
        source,
    })?;

    tracing::info!(topic = %topic.name, total, stride, "extracting");

    let log_every = std::env::var("BAG2FRAMES_LOG_EVERY")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .filter(|v| *v > 0);

    let mut report = StreamReport::new(stream);
    report.topic = Some(topic.name.clone());

    let mut index: u64 = 0;
    let mut seq: u64 = 0;
    let mut after_id = i64::MIN;
    'pages: loop {
        let page = match reader.message_headers(topic.id, after_id, HEADER_PAGE_SIZE) {
            Ok(page) => page,
            Err(e) => {
                tracing::error!(after_id, "failed to read messages: {e}");
                report.status = StreamStatus::Failed {
                    reason: format!("failed to read messages after id {after_id}: {e}"),
                };
                break;
            }
        };
        if page.is_empty() {
            break;
        }

        for header in &page {
            after_id = header.id;
            let selected = index % stride == 0;
            index += 1;
            if !selected {
                continue;
            }
            if cancel.load(Ordering::Relaxed) {
                tracing::warn!(seq, "cancelled");
                report.status = StreamStatus::Cancelled;
                break 'pages;
            }

            seq += 1;
            report.messages_seen += 1;
            let path = frame_path(&options.output_dir, stream, seq);
            if path.exists() {
                tracing::trace!(seq, "frame already extracted");
                report.frames_skipped_existing += 1;
            } else {
                match materialize(&mut reader, options, stream, seq, header, &path) {
                    Ok(()) => report.frames_written += 1,
                    Err(e) => {
                        tracing::warn!(seq, timestamp = header.timestamp, "{e}; skipping");
                        report.frames_skipped_error += 1;
                    }
                }
            }

            pb.inc(1);
            if let Some(n) = log_every && report.messages_seen % n == 0 {
                tracing::info!(
                    seen = report.messages_seen,
                    written = report.frames_written,
                    existing = report.frames_skipped_existing,
                    errors = report.frames_skipped_error,
                    elapsed = ?started.elapsed(),
                    "progress"
                );
            }
        }
    }

    if let Err(e) = reader.close() {
        tracing::warn!("failed to close bag: {e}");
    }
    pb.finish_and_clear();

    report.elapsed_ms = started.elapsed().as_millis() as u64;
    tracing::info!(
        seen = report.messages_seen,
        written = report.frames_written,
        existing = report.frames_skipped_existing,
        errors = report.frames_skipped_error,
        "finished"
    );
    Ok(report)
}

fn materialize(
    reader: &mut BagReader,
    options: &ExtractOptions,
    stream: &str,
    seq: u64,
    header: &MessageHeader,
    path: &Path,
) -> Result<(), ExtractError> {
    let payload = reader
        .payload(header.id)
        .map_err(|e| ExtractError::handle(&options.bag_path, e))?;
    let decode_err = |source| ExtractError::Decode {
        stream: stream.to_string(),
        seq,
        source,
    };
    let classified = mappings::classify(&payload, options.topic_kind).map_err(decode_err)?;
    let frame = mappings::decode(classified, &payload, options.color, options.raw_geometry)
        .map_err(decode_err)?;
    mappings::write_jpeg(&frame, path, options.jpeg_quality).map_err(|source| {
        ExtractError::Persist {
            stream: stream.to_string(),
            seq,
            path: path.to_path_buf(),
            source,
        }
    })?;
    tracing::debug!(seq, path = %path.display(), "frame written");
    Ok(())
}
