use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

use bag2frames::cli::{Cli, ColorArg, Commands};
use bag2frames::mappings::{ChannelOrder, RawGeometry};
use bag2frames::topics::TopicKind;
use bag2frames::{ExtractOptions, report, rosbags_io, topics, validate};

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.command {
        Commands::Inspect { bag } => rosbags_io::inspect_bag(&bag),
        Commands::Extract {
            bag,
            out,
            streams,
            stride,
            color,
            raw,
            raw_width,
            raw_height,
            quality,
            timeout,
            no_progress,
            report: report_path,
        } => {
            let options = ExtractOptions {
                bag_path: PathBuf::from(bag),
                output_dir: PathBuf::from(out),
                streams,
                stride,
                topic_kind: if raw { TopicKind::Raw } else { TopicKind::Compressed },
                color: match color {
                    ColorArg::Rgb => ChannelOrder::Rgb,
                    ColorArg::Bgr => ChannelOrder::Bgr,
                },
                raw_geometry: RawGeometry {
                    width: raw_width,
                    height: raw_height,
                    channels: 3,
                },
                jpeg_quality: quality,
                timeout: timeout.map(Duration::from_secs),
                show_progress: !no_progress,
            };

            let cancel = Arc::new(AtomicBool::new(false));
            let handler_flag = Arc::clone(&cancel);
            ctrlc::set_handler(move || {
                eprintln!("[bag2frames] interrupt received; stopping after current frames");
                handler_flag.store(true, Ordering::Relaxed);
            })
            .context("failed to install Ctrl-C handler")?;

            let reports = bag2frames::extract_with_cancel(&options, cancel)?;
            report::print_reports(&reports);
            if let Some(path) = report_path {
                report::write_json(&reports, Path::new(&path))?;
            }
            let failed: Vec<&str> = reports
                .iter()
                .filter(|r| r.is_failed())
                .map(|r| r.stream.as_str())
                .collect();
            if !failed.is_empty() {
                anyhow::bail!("extraction failed for: {}", failed.join(", "));
            }
            Ok(())
        }
        Commands::Streams {} => topics::print_streams(),
        Commands::Validate { out, decode } => validate::validate_output(&out, decode),
    }
}
