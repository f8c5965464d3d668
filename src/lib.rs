//! bag2frames - Extract camera frames from ROS 2 .db3 bags
//!
//! This library pulls per-camera image messages out of a ROS 2 SQLite bag
//! and writes them as individual JPEG files, ready for labeling.
//!
//! # Features
//!
//! - **Compressed topics**: `*/camera/<stream>/image/compressed`, JFIF payloads
//! - **Raw topics**: `*/camera/<stream>/image`, fixed-geometry BGR buffers
//! - **Parallel extraction**: one worker thread and bag reader per stream
//! - **Resumable**: frames already on disk are skipped, names are stable
//!   across runs (`<out>/<stream>/<stream>_<n>.jpeg`)
//! - **Subsampling**: examine every Nth message
//!
//! # Example
//!
//! ```rust,no_run
//! use bag2frames::{extract, ExtractOptions};
//!
//! let options = ExtractOptions {
//!     bag_path: "race_1.db3".into(),
//!     output_dir: "frames".into(),
//!     streams: vec!["front_left".to_string(), "rear_left".to_string()],
//!     stride: 5,
//!     ..Default::default()
//! };
//!
//! for report in extract(&options)? {
//!     println!("{}: {} frames written", report.stream, report.frames_written);
//! }
//! # Ok::<(), bag2frames::ExtractError>(())
//! ```

pub mod cli;
pub mod coordinator;
pub mod error;
pub mod extract;
pub mod mappings;
pub mod report;
pub mod rosbags_io;
pub mod topics;
pub mod validate;

// Re-export main types for convenience
pub use coordinator::{extract, extract_with_cancel};
pub use error::ExtractError;
pub use extract::{ExtractOptions, extract_stream, frame_path};
pub use report::{StreamReport, StreamStatus};
pub use rosbags_io::BagReader;
pub use validate::collect_frame_paths;
