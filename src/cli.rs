use clap::{ArgAction, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "bag2frames", about = "Extract camera frames from ROS 2 .db3 bags into JPEG files", version)]
pub struct Cli {
    /// Debug-level logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ColorArg {
    Rgb,
    Bgr,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List topics, types, message counts and time span of a bag
    Inspect {
        /// Path to the .db3 file
        bag: String,
    },

    /// Extract camera streams into <out>/<stream>/<stream>_<n>.jpeg
    Extract {
        /// Path to the .db3 file
        bag: String,
        /// Output root directory
        out: String,
        /// Camera stream to extract (can be repeated; default: all)
        #[arg(long = "stream", action = ArgAction::Append)]
        streams: Vec<String>,
        /// Examine every Nth message of each stream
        #[arg(long = "stride", default_value_t = 1)]
        stride: usize,
        /// Channel order of decoded compressed frames
        #[arg(long = "color", value_enum, default_value_t = ColorArg::Rgb)]
        color: ColorArg,
        /// Read raw image topics instead of compressed ones
        #[arg(long = "raw")]
        raw: bool,
        /// Raw frame width in pixels
        #[arg(long = "raw-width", default_value_t = 2064)]
        raw_width: u32,
        /// Raw frame height in pixels
        #[arg(long = "raw-height", default_value_t = 1544)]
        raw_height: u32,
        /// JPEG quality of written frames (1-100)
        #[arg(long = "quality", default_value_t = 95)]
        quality: u8,
        /// Ask workers to stop after this many seconds
        #[arg(long = "timeout")]
        timeout: Option<u64>,
        /// Hide progress bars
        #[arg(long = "no-progress")]
        no_progress: bool,
        /// Write the per-stream report as JSON to this path
        #[arg(long = "report")]
        report: Option<String>,
    },

    /// Show known camera streams and their topic patterns
    Streams {},

    /// Check an extracted frame tree
    Validate {
        /// Output root directory
        out: String,
        /// Decode every frame as well
        #[arg(long = "decode")]
        decode: bool,
    },
}
