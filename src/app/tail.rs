// orderlog-watcher - app/tail.rs
//
// Persistent-file tail reader (component B). Maintains a per-file byte
// offset table; `read_new_lines` opens the file, seeks to the stored
// offset, reads newly appended bytes, decodes complete lines with the
// configured single-byte codec, and advances the offset by the bytes
// actually consumed regardless of whether a trailing partial line
// remains. Survives rotation (file shrinks below the stored offset),
// deletion (file disappears: non-fatal, offset table entry remains
// until `forget_file` is called by the producer), and rename.
//
// This generalizes the live-tail poll loop pattern used elsewhere in
// this codebase, but is driven synchronously by the consumer loop
// rather than owning its own background thread, and never falls back
// to lossy UTF-8: a byte the configured codec cannot represent is
// reported as a decode exception rather than silently replaced.

use std::collections::HashMap;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::core::encoding::LineDecoder;
use crate::core::model::DecodeException;
use crate::util::constants::{MAX_TAIL_PARTIAL_BYTES, MAX_TAIL_READ_BYTES_PER_TICK};
use crate::util::error::TailError;

/// One decoded outcome for a single completed line.
#[derive(Debug, Clone)]
pub enum LineOutcome {
    Line(String),
    Exception(DecodeException),
}

struct FileState {
    offset: u64,
    /// Raw bytes following the last newline seen so far: an in-progress
    /// line, held back until it is terminated.
    partial: Vec<u8>,
}

/// Owns the offset table for every file currently being tailed.
pub struct TailReader {
    decoder: LineDecoder,
    files: HashMap<PathBuf, FileState>,
}

impl TailReader {
    pub fn new(decoder: LineDecoder) -> Self {
        TailReader {
            decoder,
            files: HashMap::new(),
        }
    }

    /// Registers a file at offset 0 if it is not already tracked. A
    /// second call for an already-registered path is a no-op, so the
    /// offset is never reset by re-registration.
    pub fn register_file(&mut self, path: &Path) {
        self.files.entry(path.to_path_buf()).or_insert_with(|| FileState {
            offset: 0,
            partial: Vec::new(),
        });
    }

    /// Drops a file from the offset table (deleted upstream).
    pub fn forget_file(&mut self, path: &Path) {
        self.files.remove(path);
    }

    /// Re-keys the offset table entry on a rename/move. If `new` was
    /// not already known, it starts from the offset the old path had
    /// reached (the content moved, not appeared fresh); if `new` was
    /// somehow already tracked as a distinct file, its own offset is
    /// kept.
    pub fn rename_file(&mut self, old: &Path, new: &Path) {
        if let Some(state) = self.files.remove(old) {
            self.files.entry(new.to_path_buf()).or_insert(state);
        } else {
            self.register_file(new);
        }
    }

    pub fn offset(&self, path: &Path) -> u64 {
        self.files.get(path).map(|s| s.offset).unwrap_or(0)
    }

    pub fn is_registered(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    /// Reads and decodes every newly appended, newline-terminated line
    /// since the last call. A missing file returns an empty list and
    /// leaves the offset untouched (non-fatal per §7).
    pub fn read_new_lines(&mut self, path: &Path) -> Result<Vec<LineOutcome>, TailError> {
        self.register_file(path);
        let state = self.files.get_mut(path).expect("just registered");

        let metadata = match std::fs::metadata(path) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(TailError::Io { path: path.to_path_buf(), source: e }),
        };
        let current_size = metadata.len();

        if current_size < state.offset {
            tracing::info!(file = %path.display(), old_offset = state.offset, new_size = current_size, "tail: truncated or rotated, resetting offset");
            state.offset = 0;
            state.partial.clear();
        }

        if current_size == state.offset {
            return Ok(Vec::new());
        }

        let bytes_available = usize::try_from(current_size - state.offset).unwrap_or(usize::MAX);
        let read_limit = bytes_available.min(MAX_TAIL_READ_BYTES_PER_TICK);

        let new_bytes = read_bytes_at(path, state.offset, read_limit)
            .map_err(|source| TailError::Io { path: path.to_path_buf(), source })?;

        let n = new_bytes.len();
        if n == 0 {
            return Ok(Vec::new());
        }
        state.offset += n as u64;

        state.partial.extend_from_slice(&new_bytes);

        if state.partial.len() > MAX_TAIL_PARTIAL_BYTES {
            let size = state.partial.len();
            tracing::warn!(file = %path.display(), partial_bytes = size, "tail: partial buffer exceeded limit, discarding fragment");
            state.partial.clear();
            return Err(TailError::PartialOverflow { path: path.to_path_buf(), size });
        }

        let mut outcomes = Vec::new();
        loop {
            let Some(nl_pos) = state.partial.iter().position(|&b| b == b'\n') else {
                break;
            };
            let mut raw_line: Vec<u8> = state.partial.drain(..=nl_pos).collect();
            raw_line.pop(); // drop '\n'
            if raw_line.last() == Some(&b'\r') {
                raw_line.pop();
            }
            if raw_line.is_empty() {
                continue;
            }
            match self.decoder.decode_line(&raw_line) {
                Ok(text) => outcomes.push(LineOutcome::Line(text)),
                Err(e) => outcomes.push(LineOutcome::Exception(DecodeException {
                    file_name: path.file_name().map(|f| f.to_string_lossy().into_owned()).unwrap_or_default(),
                    reason: e.reason,
                })),
            }
        }

        Ok(outcomes)
    }
}

fn read_bytes_at(path: &Path, offset: u64, limit: usize) -> std::io::Result<Vec<u8>> {
    let mut file = std::fs::File::open(path)?;
    file.seek(SeekFrom::Start(offset))?;
    let mut buf = vec![0u8; limit];
    let n = file.read(&mut buf)?;
    buf.truncate(n);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn reads_only_newly_appended_lines() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "first line").unwrap();
        let path = file.path().to_path_buf();

        let mut reader = TailReader::new(LineDecoder::default_codec());
        let first = reader.read_new_lines(&path).unwrap();
        assert_eq!(first.len(), 1);

        let second = reader.read_new_lines(&path).unwrap();
        assert!(second.is_empty(), "idempotent: no new bytes, no new lines");

        writeln!(file, "second line").unwrap();
        let third = reader.read_new_lines(&path).unwrap();
        assert_eq!(third.len(), 1);
    }

    #[test]
    fn offset_never_decreases_across_ticks() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "a").unwrap();
        let path = file.path().to_path_buf();

        let mut reader = TailReader::new(LineDecoder::default_codec());
        reader.read_new_lines(&path).unwrap();
        let after_first = reader.offset(&path);

        writeln!(file, "b").unwrap();
        reader.read_new_lines(&path).unwrap();
        let after_second = reader.offset(&path);

        assert!(after_second >= after_first);
    }

    #[test]
    fn partial_line_is_held_back_until_terminated() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "no newline yet").unwrap();
        let path = file.path().to_path_buf();

        let mut reader = TailReader::new(LineDecoder::default_codec());
        let outcomes = reader.read_new_lines(&path).unwrap();
        assert!(outcomes.is_empty());

        writeln!(file, " - now it's done").unwrap();
        let outcomes = reader.read_new_lines(&path).unwrap();
        assert_eq!(outcomes.len(), 1);
        match &outcomes[0] {
            LineOutcome::Line(text) => assert_eq!(text, "no newline yet - now it's done"),
            LineOutcome::Exception(_) => panic!("expected a decoded line"),
        }
    }

    #[test]
    fn truncation_resets_offset_to_zero() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "first line of some length").unwrap();
        let path = file.path().to_path_buf();

        let mut reader = TailReader::new(LineDecoder::default_codec());
        reader.read_new_lines(&path).unwrap();
        assert!(reader.offset(&path) > 0);

        file.as_file().set_len(0).unwrap();
        file.seek(SeekFrom::Start(0)).unwrap();
        writeln!(file, "x").unwrap();

        let outcomes = reader.read_new_lines(&path).unwrap();
        assert_eq!(outcomes.len(), 1);
    }

    #[test]
    fn missing_file_returns_empty_and_preserves_offset() {
        let path = PathBuf::from("/nonexistent/does-not-exist.log");
        let mut reader = TailReader::new(LineDecoder::default_codec());
        let outcomes = reader.read_new_lines(&path).unwrap();
        assert!(outcomes.is_empty());
        assert_eq!(reader.offset(&path), 0);
    }

    #[test]
    fn forget_and_rename_adjust_the_offset_table() {
        let mut reader = TailReader::new(LineDecoder::default_codec());
        let old = PathBuf::from("/tmp/old.log");
        let new = PathBuf::from("/tmp/new.log");

        reader.register_file(&old);
        assert!(reader.is_registered(&old));

        reader.rename_file(&old, &new);
        assert!(!reader.is_registered(&old));
        assert!(reader.is_registered(&new));

        reader.forget_file(&new);
        assert!(!reader.is_registered(&new));
    }
}
