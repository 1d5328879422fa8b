// orderlog-watcher - app/emitter.rs
//
// Component I: the bootstrap sweep. Runs once on startup (before the
// producer/consumer pair starts, per §5's "emitter runs before consumer
// starts" ordering), walking every file under the root that matches the
// adapter's filename pattern and covers today-or-later, tailing each
// from offset zero and running the same match/persist procedure the
// consumer uses. Exits early once `limit` messages have been processed
// or `stop_requested` is observed.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{Local, NaiveDate};

use crate::core::adapter::Adapter;
use crate::core::model::{SeenMarker, ServiceConfig};
use crate::core::order_cache::OrderSource;
use crate::util::error::{ConfigError, ServiceError};

use super::consumer::Consumer;

/// Reads the persistent "last seen" date, falling back to today when the
/// file is absent or unparseable (§6 "Seen file").
pub fn load_seen_marker(path: &std::path::Path) -> NaiveDate {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|contents| SeenMarker::parse(&contents))
        .map(|marker| marker.0)
        .unwrap_or_else(|| Local::now().date_naive())
}

pub fn save_seen_marker(path: &std::path::Path, date: NaiveDate) -> Result<(), ServiceError> {
    let marker = SeenMarker(date);
    std::fs::write(path, marker.to_file_contents()).map_err(|source| {
        ServiceError::Config(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    })
}

/// Enumerates every file under `root` whose adapter-recognized filename
/// date is on or after `floor_date`, sorted so older files are swept
/// first (matching the original's forward-from-last-seen ordering).
fn matching_files(root: &std::path::Path, adapter: &Adapter, config: &ServiceConfig, floor_date: NaiveDate) -> Vec<PathBuf> {
    let mut files: Vec<(NaiveDate, PathBuf)> = walkdir::WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .flatten()
        .filter(|e| e.file_type().is_file())
        .filter_map(|entry| {
            let path = entry.path().to_path_buf();
            let file_name = path.file_name()?.to_str()?;
            let haystack = path.to_string_lossy();
            if config.suppressed.iter().any(|needle| !needle.is_empty() && haystack.contains(needle.as_str())) {
                return None;
            }
            if let Some(mask) = &config.filemask {
                let pattern = glob::Pattern::new(mask).ok()?;
                if !pattern.matches(file_name) {
                    return None;
                }
            }
            let date = adapter.filename_date(file_name)?;
            if date < floor_date {
                return None;
            }
            Some((date, path))
        })
        .collect();

    files.sort_by_key(|(date, path)| (*date, path.clone()));
    files.into_iter().map(|(_, path)| path).collect()
}

/// Runs the sweep to completion (or cancellation/limit), returning the
/// latest file date observed so the caller can advance the seen marker.
pub fn run(
    consumer: &mut Consumer,
    root: &std::path::Path,
    adapter: &Adapter,
    config: &ServiceConfig,
    source: &mut dyn OrderSource,
    floor_date: NaiveDate,
    stop_requested: &Arc<AtomicBool>,
) -> Option<NaiveDate> {
    let files = matching_files(root, adapter, config, floor_date);
    let limit = config.limit.unwrap_or(u64::MAX);
    let mut latest = None;

    for path in files {
        if stop_requested.load(Ordering::Relaxed) {
            tracing::info!("emitter: stop requested, ending sweep early");
            break;
        }
        if consumer.processed() >= limit {
            tracing::info!(limit, "emitter: processed-message limit reached, ending sweep");
            break;
        }

        consumer.drain_matching_file(&path, source);

        if let Some(file_name) = path.file_name().and_then(|f| f.to_str()) {
            if let Some(date) = adapter.filename_date(file_name) {
                latest = Some(latest.map_or(date, |l: NaiveDate| l.max(date)));
            }
        }
    }

    latest
}
