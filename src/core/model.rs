// orderlog-watcher - core/model.rs
//
// Core data model types. Pure data definitions with no I/O, no platform
// dependencies (core depends on std + chrono only).
//
// These types are the shared vocabulary across app/tail, app/orders,
// core/correlate, and app/audit.

use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use std::path::PathBuf;

// =============================================================================
// Order
// =============================================================================

/// How far along an order's key derivation is. Populated lazily because
/// key derivation requires a round trip to the operational database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyState {
    #[default]
    PendingKeys,
    KeysReady,
    Sweeping,
}

/// A production order tracked by the operational database.
#[derive(Debug, Clone)]
pub struct Order {
    pub id: i64,
    pub name: String,
    pub client: String,
    pub status: i32,
    pub registered: NaiveDate,

    /// Strings used to decide whether a log line belongs to this order:
    /// the id as a string, the file name, the file name without
    /// extension, and batch TIDs/work-order numbers once derived.
    pub keys: Vec<String>,

    /// Client aliases, used only by adapters that opt into alias matching.
    pub aliases: Vec<String>,

    pub key_state: KeyState,

    /// Set when a `refresh` does not return this order again. The order
    /// is retained, not dropped, so late-arriving lines can still match.
    pub inactive: bool,
}

impl Order {
    pub fn is_completed(&self, complete_statuses: &[i32]) -> bool {
        complete_statuses.contains(&self.status)
    }
}

/// One row as returned by the operational database's `orders` view,
/// before it is merged into the cache (component D).
#[derive(Debug, Clone)]
pub struct RawOrder {
    pub id: i64,
    pub name: String,
    pub client: String,
    pub status: i32,
    pub registered: NaiveDate,
}

/// One row from the `batches` view / batch-parameters stored procedure:
/// a batch's `TID` and, if present, its work-order number. Folded into
/// `Order::keys` by `core::order_cache::derive_keys`.
#[derive(Debug, Clone)]
pub struct BatchKey {
    pub tid: String,
    pub work_order_no: Option<String>,
}

// =============================================================================
// LogFile
// =============================================================================

/// An external text file under a watched root. Identity is its absolute
/// path; state is the byte offset read so far.
#[derive(Debug, Clone)]
pub struct LogFile {
    pub path: PathBuf,
    pub offset: u64,
}

impl LogFile {
    pub fn new(path: PathBuf) -> Self {
        LogFile { path, offset: 0 }
    }
}

// =============================================================================
// LogLine / LogItem
// =============================================================================

/// A raw decoded line plus its originating filename. Transient: lives
/// only until matched against an order or dropped as overstock.
#[derive(Debug, Clone)]
pub struct LogLine {
    pub file_name: String,
    pub text: String,
}

/// A decode failure surfaced as data rather than dropped silently.
#[derive(Debug, Clone)]
pub struct DecodeException {
    pub file_name: String,
    pub reason: String,
}

/// A parsed line, optionally decorated with the order it matched.
#[derive(Debug, Clone)]
pub struct LogItem {
    pub timestamp: NaiveDateTime,
    pub severity: String,
    pub message: String,
    pub module: Option<String>,
    pub module_count: Option<u32>,

    pub order_id: Option<i64>,
    pub order_name: Option<String>,
    pub client: Option<String>,
}

impl LogItem {
    pub fn is_matched(&self) -> bool {
        self.order_id.is_some()
    }
}

// =============================================================================
// Source / Module / Log descriptors
// =============================================================================

/// Identifies an audit-store `source` row: `(root, host-ip, source-type)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceKey {
    pub root: String,
    pub ip: String,
    pub ctype: String,
}

/// Identifies an audit-store `module` row: `(source, module-name, module-path)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleKey {
    pub source_id: i64,
    pub name: String,
    pub path: String,
}

/// Identifies an audit-store `log` row: `(source, module, log-filename)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LogKey {
    pub source_id: i64,
    pub module_id: i64,
    pub file_name: String,
}

// =============================================================================
// Message
// =============================================================================

/// Outcome of submitting a message to the audit store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageStatus {
    /// Audit store returned a status beginning `ID:`: newly inserted.
    New,
    /// Any other non-empty, non-fatal status: already recorded.
    Exists,
    /// Status is one of `S|M|L|B`.
    Fatal,
    /// Audit store returned no row at all.
    Null,
}

impl MessageStatus {
    /// Classifies a raw status string returned by `registerMessage`.
    pub fn classify(raw: Option<&str>) -> Self {
        match raw {
            None => MessageStatus::Null,
            Some(s) if s.starts_with("ID:") => MessageStatus::New,
            Some(s) if matches!(s, "S" | "M" | "L" | "B") => MessageStatus::Fatal,
            Some(_) => MessageStatus::Exists,
        }
    }
}

/// Audit-store row, ready for `registerMessage`.
#[derive(Debug, Clone)]
pub struct Message {
    pub source_id: i64,
    pub module_id: i64,
    pub log_id: i64,
    pub order_id: i64,
    pub batch_id: Option<String>,
    pub client: String,
    pub file_name: String,
    pub code: String,
    pub count: u32,
    pub message: String,
    pub event_date: NaiveDateTime,
    pub inserted_at: NaiveDateTime,
}

// =============================================================================
// SeenMarker
// =============================================================================

/// A persistent single-date value recording the earliest date from which
/// the service should resume scanning on restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeenMarker(pub NaiveDate);

impl SeenMarker {
    /// Renders the marker in the ASCII `YYYYMMDD` on-disk format.
    pub fn to_file_contents(&self) -> String {
        self.0.format(super::super::util::constants::DATE_STAMP_FORMAT).to_string()
    }

    /// Parses the marker from its on-disk format. Returns `None` on any
    /// malformed content; callers fall back to "today".
    pub fn parse(contents: &str) -> Option<Self> {
        NaiveDate::parse_from_str(contents.trim(), super::super::util::constants::DATE_STAMP_FORMAT)
            .ok()
            .map(SeenMarker)
    }
}

// =============================================================================
// ServiceConfig
// =============================================================================

/// Which adapter family a service instance is configured to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    BankPerso,
    Sdc,
    Exchange,
}

impl SourceKind {
    pub fn from_ctype(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "sdc" => SourceKind::Sdc,
            "exchange" => SourceKind::Exchange,
            _ => SourceKind::BankPerso,
        }
    }

    pub fn as_ctype(&self) -> &'static str {
        match self {
            SourceKind::BankPerso => "bankperso",
            SourceKind::Sdc => "sdc",
            SourceKind::Exchange => "exchange",
        }
    }
}

/// Fully-validated, typed result of parsing the `key::value` config file.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub ctype: SourceKind,
    pub root: PathBuf,
    pub ip: String,
    pub alias: String,
    pub client: String,

    pub encoding: Option<String>,
    pub filemask: Option<String>,
    pub options: Vec<String>,

    pub seen: PathBuf,
    pub errorlog: Option<PathBuf>,

    pub emergency: Vec<String>,
    /// "Alarm-to-customer" recipients: `title:address:substring` entries,
    /// triggered individually when `substring` occurs in the message
    /// (§4.J). Mailing is considered configured (and thus enabled) when
    /// this or `emergency` is non-empty - there is no separate on/off
    /// switch.
    pub alarms: Vec<String>,
    pub mailkeys: Vec<String>,

    pub suppressed: Vec<String>,

    pub delta_near: i64,
    pub delta_far: i64,

    pub check_datefrom: bool,
    pub check_filename: bool,
    pub case_insensitive: bool,
    pub forced_refresh: bool,
    pub stack_events: bool,
    pub watch_everything: bool,
    pub decoder_trace: bool,
    pub debug: bool,
    pub deepdebug: bool,
    pub trace: bool,
    pub existstrace: bool,
    pub disableoutput: bool,
    pub observertrace: bool,

    pub limit: Option<u64>,
    pub timeout: Option<u64>,
    pub sleep: Option<u64>,
    pub restart: Option<u64>,

    pub complete: Vec<i32>,

    pub emitter: bool,

    /// Escape hatch: every raw key::value pair, including keys this
    /// struct does not surface as a named field.
    pub raw: HashMap<String, String>,
}

impl ServiceConfig {
    pub fn log_level(&self) -> Option<&'static str> {
        if self.deepdebug || self.trace {
            Some("trace")
        } else if self.debug {
            Some("debug")
        } else {
            None
        }
    }
}

// =============================================================================
// ExitSummary
// =============================================================================

/// The three counters printed on shutdown.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExitSummary {
    pub found: u64,
    pub processed: u64,
    pub unresolved: usize,
}

impl std::fmt::Display for ExitSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "New messages found: {} / Total processed: {} / Unresolved: {}",
            self.found, self.processed, self.unresolved
        )
    }
}

// =============================================================================
// Watcher / consumer progress events
// =============================================================================

/// A filesystem event as translated by the producer, analogous in spirit
/// to the original watchdog event shape but carrying only what the
/// consumer needs.
#[derive(Debug, Clone)]
pub enum WatchEvent {
    Created { path: PathBuf },
    Modified { path: PathBuf },
    Deleted { path: PathBuf },
    Moved { src: PathBuf, dest: PathBuf },
}

/// Progress reported by the consumer/emitter loop, primarily for tests
/// and diagnostic logging rather than a UI.
#[derive(Debug, Clone)]
pub enum ConsumerProgress {
    FileRegistered { path: PathBuf },
    FileForgotten { path: PathBuf },
    LinesMatched { path: PathBuf, matched: usize, unresolved: usize },
    ReclaimRun { before: usize, after: usize },
    Restarting,
}
