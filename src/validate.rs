//! Validate command - Check an extracted frame tree
//!
//! Also hosts frame discovery, the contract downstream labeling relies on:
//! image files are found recursively by extension, no other metadata.

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use rayon::prelude::*;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

static FRAME_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<stream>.+)_(?P<seq>[1-9][0-9]*)\.jpeg$").expect("valid regex"));

/// All `.jpg` / `.jpeg` files under `root`, sorted.
///
/// Symlinks are not followed.
pub fn collect_frame_paths(root: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry.with_context(|| format!("failed to scan {}", root.display()))?;
        if entry.file_type().is_file() && is_image(entry.path()) {
            out.push(entry.into_path());
        }
    }
    out.sort();
    Ok(out)
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("jpg") || e.eq_ignore_ascii_case("jpeg"))
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StreamSummary {
    pub frames: usize,
    pub max_seq: u64,
    /// Sequence numbers below `max_seq` with no file (skipped messages).
    pub gaps: Vec<u64>,
}

#[derive(Debug, Default)]
pub struct ValidationSummary {
    pub streams: BTreeMap<String, StreamSummary>,
    pub misnamed: Vec<PathBuf>,
    pub undecodable: Vec<(PathBuf, String)>,
}

impl ValidationSummary {
    pub fn is_ok(&self) -> bool {
        self.misnamed.is_empty() && self.undecodable.is_empty()
    }
}

/// Check the `<root>/<stream>/<stream>_<n>.jpeg` layout; with `decode`,
/// also decode every frame in parallel.
pub fn check_output(root: &Path, decode: bool) -> Result<ValidationSummary> {
    let mut summary = ValidationSummary::default();
    let frames = collect_frame_paths(root)?;

    let mut seqs: BTreeMap<String, Vec<u64>> = BTreeMap::new();
    for path in &frames {
        match parse_frame(root, path) {
            Some((stream, seq)) => seqs.entry(stream).or_default().push(seq),
            None => summary.misnamed.push(path.clone()),
        }
    }
    for (stream, mut list) in seqs {
        list.sort_unstable();
        let max_seq = list.last().copied().unwrap_or(0);
        let gaps = (1..=max_seq).filter(|s| list.binary_search(s).is_err()).collect();
        summary.streams.insert(
            stream,
            StreamSummary {
                frames: list.len(),
                max_seq,
                gaps,
            },
        );
    }

    if decode {
        summary.undecodable = frames
            .par_iter()
            .filter_map(|p| image::open(p).err().map(|e| (p.clone(), e.to_string())))
            .collect();
        summary.undecodable.sort();
    }
    Ok(summary)
}

/// `(stream, seq)` when `path` sits at `<root>/<stream>/<stream>_<seq>.jpeg`.
fn parse_frame(root: &Path, path: &Path) -> Option<(String, u64)> {
    let rel = path.strip_prefix(root).ok()?;
    let mut parts = rel.iter();
    let dir = parts.next()?.to_str()?;
    let file = parts.next()?.to_str()?;
    if parts.next().is_some() {
        return None;
    }
    let caps = FRAME_NAME.captures(file)?;
    if &caps["stream"] != dir {
        return None;
    }
    let seq = caps["seq"].parse().ok()?;
    Some((dir.to_string(), seq))
}

/// Validate an extracted frame tree and print a summary
pub fn validate_output(root: &str, decode: bool) -> Result<()> {
    let root_path = Path::new(root);
    if !root_path.is_dir() {
        anyhow::bail!("Validation of {}: FAILED (not a directory)", root);
    }
    let summary = check_output(root_path, decode)?;

    println!("{:<22} {:>8} {:>8} {:>6}", "Stream", "Frames", "MaxSeq", "Gaps");
    println!("{}", "-".repeat(47));
    for (stream, s) in &summary.streams {
        println!("{:<22} {:>8} {:>8} {:>6}", stream, s.frames, s.max_seq, s.gaps.len());
    }
    for path in &summary.misnamed {
        println!("[ERROR] unexpected file {}", path.display());
    }
    for (path, err) in &summary.undecodable {
        println!("[ERROR] cannot decode {}: {}", path.display(), err);
    }

    if summary.is_ok() {
        println!("Validation of {}: PASSED", root);
        Ok(())
    } else {
        anyhow::bail!("Validation of {}: FAILED", root)
    }
}
