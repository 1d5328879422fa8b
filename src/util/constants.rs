// logsleuth-orderlog - util/constants.rs
//
// Single source of truth for all named constants, limits, and defaults.

// =============================================================================
// Application metadata
// =============================================================================

pub const APP_NAME: &str = "orderlog-watcher";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// Date/time formats
// =============================================================================

/// Filename-date format used by the Perso adapter and the seen marker file.
pub const DATE_STAMP_FORMAT: &str = "%Y%m%d";

/// Filename-date format used by the SDC and Exchange adapters.
pub const DOT_DATE_FORMAT: &str = "%d.%m.%Y";

/// Event timestamp format stored with every audit message.
pub const UTC_FULL_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Human-facing local timestamp format used in diagnostic dumps.
pub const LOCAL_FULL_TIMESTAMP_FORMAT: &str = "%d-%m-%Y %H:%M:%S";

// =============================================================================
// Encoding
// =============================================================================

/// Default single-byte codec used to decode log lines, expressed as the
/// `encoding_rs` static name. Matches the original system's 8-bit Cyrillic
/// default (`cp1251`-equivalent).
pub const DEFAULT_LINE_ENCODING: &str = "windows-1251";

/// Default unicode encoding, used only when a source root is explicitly
/// configured with `encoding::utf-8`.
pub const DEFAULT_UNICODE_ENCODING: &str = "utf-8";

// =============================================================================
// Order cache / correlation
// =============================================================================

/// Default "near" window: orders registered within this many days of `now`
/// are considered for normal (non-finalized) matching.
pub const DEFAULT_DELTA_NEAR_DAYS: i64 = -7;

/// Default "far" window: used when the overstock queue is reclaimed against
/// already-finalized orders.
pub const DEFAULT_DELTA_FAR_DAYS: i64 = -30;

/// Status codes considered terminal ("completed") for an order.
pub const DEFAULT_COMPLETE_STATUSES: &[i32] = &[62, 64, 98, 197, 198, 201, 202, 203, 255];

/// Overstock bound: (low watermark, high watermark, reclaim step).
/// When the unresolved-line queue passes `low` and has grown by at least
/// `step` since the previous reclaim attempt, a reclaim sweep runs against
/// finalized orders. When the queue exceeds `high` it is forcibly emptied.
pub const MAX_UNRESOLVED_LINES: (usize, usize, usize) = (9, 99, 3);

/// Minimum length (bytes) a decoded message must have to be considered for
/// correlation. Shorter lines are dropped by `lineIsValid` in every adapter.
pub const MIN_MESSAGE_SIZE: usize = 20;

// =============================================================================
// Tail reader
// =============================================================================

/// Maximum bytes read from a single file in one tail pass. Prevents a burst
/// of appended content from stalling the consumer loop.
pub const MAX_TAIL_READ_BYTES_PER_TICK: usize = 1024 * 1024; // 1 MiB

/// Maximum size of the held-back partial-line buffer before it is discarded
/// as unparseable (binary content, or a pathologically long line).
pub const MAX_TAIL_PARTIAL_BYTES: usize = 256 * 1024; // 256 KiB

// =============================================================================
// Producer / consumer / emitter timing
// =============================================================================

/// Default directory poll interval for the producer's watcher thread (ms).
pub const DEFAULT_WATCH_POLL_INTERVAL_MS: u64 = 1_000;

/// Default consumer idle sleep between empty event-queue checks (ms).
pub const DEFAULT_CONSUMER_SLEEP_MS: u64 = 1_000;

/// How often the cancel flag is checked within a poll sleep interval (ms).
pub const CANCEL_CHECK_INTERVAL_MS: u64 = 100;

/// Supervisor cooldown after a watcher exception before producer/consumer
/// are torn down and reconstructed.
pub const WATCHER_RESTART_COOLDOWN_SECS: u64 = 15;

// =============================================================================
// Audit / operational database client
// =============================================================================

/// Number of connection attempts before an engine is flagged as errored.
pub const DB_CONNECT_MAX_RETRIES: u32 = 3;

/// Backoff between connection attempts.
pub const DB_CONNECT_RETRY_DELAY_SECS: u64 = 3;

/// Default statement timeout (seconds), mirrors the original connection's
/// configured per-connection timeout.
pub const DB_DEFAULT_TIMEOUT_SECS: u64 = 15;

// =============================================================================
// Configuration
// =============================================================================

/// Environment variable consulted before config-derived log level.
pub const RUST_LOG_ENV: &str = "RUST_LOG";

/// Default log level when nothing else is configured.
pub const DEFAULT_LOG_LEVEL: &str = "info";
