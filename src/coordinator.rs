//! Fan-out of one extraction worker per camera stream.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use flume::{Receiver, RecvTimeoutError, Sender};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::error::ExtractError;
use crate::extract::{ExtractOptions, extract_stream};
use crate::report::StreamReport;

/// Extract all requested streams concurrently and wait for every worker.
///
/// See [`extract_with_cancel`].
pub fn extract(options: &ExtractOptions) -> Result<Vec<StreamReport>, ExtractError> {
    extract_with_cancel(options, Arc::new(AtomicBool::new(false)))
}

/// Extract all requested streams concurrently, stopping early when `cancel`
/// is raised or `options.timeout` elapses.
///
/// Each stream runs on its own thread with its own bag reader. One report is
/// returned per stream, in request order; a failing stream never stops its
/// siblings. The only error is an invalid configuration, detected before any
/// worker starts.
pub fn extract_with_cancel(
    options: &ExtractOptions,
    cancel: Arc<AtomicBool>,
) -> Result<Vec<StreamReport>, ExtractError> {
    let streams = options.validate()?;
    let started = Instant::now();
    tracing::info!(
        bag = %options.bag_path.display(),
        out = %options.output_dir.display(),
        streams = streams.len(),
        "starting extraction"
    );

    let multi = if options.show_progress {
        MultiProgress::new()
    } else {
        MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
    };
    let style = ProgressStyle::with_template("{msg:>20} [{bar:40}] {pos}/{len} {elapsed}")
        .unwrap_or_else(|_| ProgressStyle::default_bar());

    let (result_tx, result_rx): (Sender<(usize, StreamReport)>, Receiver<(usize, StreamReport)>) =
        flume::unbounded();
    let mut workers = Vec::with_capacity(streams.len());
    for (i, stream) in streams.iter().enumerate() {
        let tx = result_tx.clone();
        let opts = options.clone();
        let cancel = Arc::clone(&cancel);
        let stream_name = stream.clone();
        let pb = multi.add(ProgressBar::new(0).with_style(style.clone()));
        let spawned = std::thread::Builder::new()
            .name(format!("extract-{stream}"))
            .spawn(move || stream_worker(i, &opts, &stream_name, &cancel, &pb, tx));
        match spawned {
            Ok(handle) => workers.push((i, handle)),
            Err(source) => {
                // Workers already running keep going; report this one as failed.
                let err = ExtractError::Spawn {
                    stream: stream.clone(),
                    source,
                };
                tracing::error!("{err}");
                let _ = result_tx.send((i, StreamReport::failed(stream, err.to_string())));
            }
        }
    }
    drop(result_tx);

    let mut reports: Vec<Option<StreamReport>> = vec![None; streams.len()];
    collect_reports(&result_rx, &mut reports, options, &cancel);

    for (i, handle) in workers {
        if handle.join().is_err() {
            tracing::error!(stream = %streams[i], "worker panicked");
        }
    }

    let reports: Vec<StreamReport> = reports
        .into_iter()
        .zip(&streams)
        .map(|(report, stream)| {
            report.unwrap_or_else(|| StreamReport::failed(stream, "worker panicked"))
        })
        .collect();

    tracing::info!(
        written = reports.iter().map(|r| r.frames_written).sum::<u64>(),
        failed = reports.iter().filter(|r| r.is_failed()).count(),
        elapsed = ?started.elapsed(),
        "extraction finished"
    );
    Ok(reports)
}

fn stream_worker(
    index: usize,
    options: &ExtractOptions,
    stream: &str,
    cancel: &AtomicBool,
    pb: &ProgressBar,
    tx: Sender<(usize, StreamReport)>,
) {
    let report = match extract_stream(options, stream, cancel, pb) {
        Ok(report) => report,
        Err(e) => {
            tracing::error!(stream, "{e}");
            pb.finish_and_clear();
            StreamReport::failed(stream, e.to_string())
        }
    };
    let _ = tx.send((index, report));
}

fn collect_reports(
    rx: &Receiver<(usize, StreamReport)>,
    reports: &mut [Option<StreamReport>],
    options: &ExtractOptions,
    cancel: &AtomicBool,
) {
    let deadline = options.timeout.map(|t| Instant::now() + t);
    let mut received = 0;
    while received < reports.len() {
        let next = match deadline {
            Some(d) if !cancel.load(Ordering::Relaxed) => rx.recv_deadline(d),
            _ => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match next {
            Ok((i, report)) => {
                reports[i] = Some(report);
                received += 1;
            }
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!("timeout reached; asking workers to stop");
                cancel.store(true, Ordering::Relaxed);
            }
            // every sender is gone; missing reports belong to panicked workers
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}
