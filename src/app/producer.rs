// orderlog-watcher - app/producer.rs
//
// Component G: the filesystem watcher. Generalizes the polling pattern
// used elsewhere in this codebase for directory watching - a background
// thread diffing successive directory snapshots against a cancel flag -
// into full create/modify/delete/move detection, since the original
// watcher observes all four event kinds rather than only new files.
//
// Every event is sent through a channel rather than applied to shared
// state directly: the redesign note in spec §9 replaces "event queue
// protected by a single mutex, offset table mutated by both producer and
// consumer under that mutex" with "mutate producer-only state via
// messages" - here, by letting the single consumer thread be the only
// writer of the offset table, reacting to every event kind including
// Created/Deleted/Moved.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::{Duration, SystemTime};

use chrono::{Local, NaiveDate};

use crate::core::adapter::Adapter;
use crate::core::model::{ServiceConfig, WatchEvent};
use crate::util::constants::{CANCEL_CHECK_INTERVAL_MS, DEFAULT_WATCH_POLL_INTERVAL_MS};

#[derive(Debug, Clone, Copy)]
struct Snapshot {
    size: u64,
    modified: SystemTime,
}

/// Builds the filename-filter policy (§4.C "filename-filter policy"):
/// excludes `suppressed` substrings, and when `check_filename` is set,
/// requires the adapter's today-stamp to appear in the filename.
fn passes_filter(config: &ServiceConfig, adapter: &Adapter, path: &Path, today: NaiveDate) -> bool {
    let file_name = match path.file_name().and_then(|n| n.to_str()) {
        Some(n) => n,
        None => return false,
    };
    let haystack = path.to_string_lossy();
    if config
        .suppressed
        .iter()
        .any(|needle| !needle.is_empty() && haystack.contains(needle.as_str()))
    {
        return false;
    }
    if config.check_filename && !adapter.filename_matches_today(file_name, today) {
        return false;
    }
    if let Some(mask) = &config.filemask {
        match glob::Pattern::new(mask) {
            Ok(pattern) => {
                if !pattern.matches(file_name) {
                    return false;
                }
            }
            Err(e) => tracing::warn!(mask, error = %e, "producer: invalid filemask, ignoring"),
        }
    }
    true
}

/// Owns the background polling thread and the channel the consumer
/// drains events from.
pub struct Producer {
    cancel: Arc<AtomicBool>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl Producer {
    /// Spawns the watcher thread, returning the `Producer` handle plus
    /// the receiving end of the event channel. `poll_interval` defaults
    /// to `DEFAULT_WATCH_POLL_INTERVAL_MS` when the config leaves
    /// `timeout` unset.
    pub fn spawn(
        root: PathBuf,
        config: ServiceConfig,
        adapter: Adapter,
    ) -> (Self, mpsc::Receiver<WatchEvent>) {
        let (tx, rx) = mpsc::channel();
        let cancel = Arc::new(AtomicBool::new(false));
        let thread_cancel = Arc::clone(&cancel);

        let poll_interval_ms = config.timeout.unwrap_or(DEFAULT_WATCH_POLL_INTERVAL_MS);
        let watch_everything = config.watch_everything;

        let handle = std::thread::spawn(move || {
            run_poll_loop(root, config, adapter, tx, thread_cancel, poll_interval_ms, watch_everything);
        });

        (
            Producer {
                cancel,
                handle: Some(handle),
            },
            rx,
        )
    }

    pub fn stop(&mut self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Producer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_poll_loop(
    root: PathBuf,
    config: ServiceConfig,
    adapter: Adapter,
    tx: mpsc::Sender<WatchEvent>,
    cancel: Arc<AtomicBool>,
    poll_interval_ms: u64,
    watch_everything: bool,
) {
    let mut known: HashMap<PathBuf, Snapshot> = HashMap::new();
    let poll_interval = Duration::from_millis(poll_interval_ms);
    let cancel_check = Duration::from_millis(CANCEL_CHECK_INTERVAL_MS);
    let sub_iters = (poll_interval.as_millis() / cancel_check.as_millis().max(1)).max(1) as u32;

    loop {
        let current = snapshot_root(&root, &config, &adapter);
        let events = diff(&known, &current, watch_everything);
        known = current;

        for event in events {
            if tx.send(event).is_err() {
                tracing::debug!("producer: consumer receiver dropped, exiting");
                return;
            }
        }

        for _ in 0..sub_iters {
            if cancel.load(Ordering::Relaxed) {
                tracing::debug!("producer: cancel flag set, exiting");
                return;
            }
            std::thread::sleep(cancel_check);
        }
    }
}

fn snapshot_root(root: &Path, config: &ServiceConfig, adapter: &Adapter) -> HashMap<PathBuf, Snapshot> {
    let today = Local::now().date_naive();
    let mut out = HashMap::new();
    for entry in walkdir::WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .flatten()
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path().to_path_buf();
        if !passes_filter(config, adapter, &path, today) {
            continue;
        }
        let Ok(metadata) = entry.metadata() else { continue };
        let Ok(modified) = metadata.modified() else { continue };
        out.insert(
            path,
            Snapshot {
                size: metadata.len(),
                modified,
            },
        );
    }
    out
}

/// Diffs two snapshots into watch events. Paths that disappeared and
/// reappeared under a different name with an identical size in the same
/// tick are reported as a single `Moved` event rather than a
/// delete+create pair; everything else reduces to straightforward
/// create/modify/delete.
fn diff(
    before: &HashMap<PathBuf, Snapshot>,
    after: &HashMap<PathBuf, Snapshot>,
    watch_everything: bool,
) -> Vec<WatchEvent> {
    let mut removed: Vec<PathBuf> = before.keys().filter(|p| !after.contains_key(*p)).cloned().collect();
    let mut added: Vec<PathBuf> = after.keys().filter(|p| !before.contains_key(*p)).cloned().collect();

    let mut events = Vec::new();

    // Match removed/added pairs with identical size as a rename, in
    // deterministic (sorted) order so the pairing is reproducible.
    removed.sort();
    added.sort();
    let mut matched_added = vec![false; added.len()];
    removed.retain(|old_path| {
        let old_size = before[old_path].size;
        if let Some(idx) = added
            .iter()
            .enumerate()
            .position(|(i, new_path)| !matched_added[i] && after[new_path].size == old_size)
        {
            matched_added[idx] = true;
            events.push(WatchEvent::Moved {
                src: old_path.clone(),
                dest: added[idx].clone(),
            });
            false
        } else {
            true
        }
    });

    for path in removed {
        events.push(WatchEvent::Deleted { path });
    }
    for (idx, path) in added.into_iter().enumerate() {
        if !matched_added[idx] {
            events.push(WatchEvent::Created { path });
        }
    }

    for (path, after_snap) in after {
        let Some(before_snap) = before.get(path) else { continue };
        let size_changed = after_snap.size != before_snap.size;
        let mtime_changed = after_snap.modified != before_snap.modified;
        if size_changed || (watch_everything && mtime_changed) {
            events.push(WatchEvent::Modified { path: path.clone() });
        }
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(size: u64) -> Snapshot {
        Snapshot {
            size,
            modified: SystemTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn new_path_is_created() {
        let before = HashMap::new();
        let mut after = HashMap::new();
        after.insert(PathBuf::from("/a.log"), snap(10));
        let events = diff(&before, &after, false);
        assert!(matches!(&events[0], WatchEvent::Created { path } if path == Path::new("/a.log")));
    }

    #[test]
    fn disappeared_path_is_deleted() {
        let mut before = HashMap::new();
        before.insert(PathBuf::from("/a.log"), snap(10));
        let after = HashMap::new();
        let events = diff(&before, &after, false);
        assert!(matches!(&events[0], WatchEvent::Deleted { path } if path == Path::new("/a.log")));
    }

    #[test]
    fn grown_file_is_modified() {
        let mut before = HashMap::new();
        before.insert(PathBuf::from("/a.log"), snap(10));
        let mut after = HashMap::new();
        after.insert(PathBuf::from("/a.log"), snap(20));
        let events = diff(&before, &after, false);
        assert!(matches!(&events[0], WatchEvent::Modified { path } if path == Path::new("/a.log")));
    }

    #[test]
    fn unchanged_file_produces_no_event() {
        let mut before = HashMap::new();
        before.insert(PathBuf::from("/a.log"), snap(10));
        let after = before.clone();
        assert!(diff(&before, &after, false).is_empty());
    }

    #[test]
    fn rename_pairs_into_a_single_moved_event() {
        let mut before = HashMap::new();
        before.insert(PathBuf::from("/old.log"), snap(10));
        let mut after = HashMap::new();
        after.insert(PathBuf::from("/new.log"), snap(10));
        let events = diff(&before, &after, false);
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            WatchEvent::Moved { src, dest }
            if src == Path::new("/old.log") && dest == Path::new("/new.log")
        ));
    }

    #[test]
    fn watch_everything_reports_mtime_only_change_as_modified() {
        let mut before = HashMap::new();
        before.insert(PathBuf::from("/a.log"), snap(10));
        let mut after = HashMap::new();
        after.insert(
            PathBuf::from("/a.log"),
            Snapshot {
                size: 10,
                modified: SystemTime::UNIX_EPOCH + Duration::from_secs(1),
            },
        );
        assert!(diff(&before, &after, false).is_empty());
        assert_eq!(diff(&before, &after, true).len(), 1);
    }
}
