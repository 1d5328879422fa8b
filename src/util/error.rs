// orderlog-watcher - util/error.rs
//
// Typed error hierarchy with context-preserving error chains.
// No string-based error propagation. All errors preserve the causal
// chain for diagnostic logging.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Top-level error type for all service operations.
/// Errors are categorised by the subsystem that produced them.
#[derive(Debug)]
pub enum ServiceError {
    /// Configuration loading or validation failed.
    Config(ConfigError),

    /// Persistent-file tail reading failed.
    Tail(TailError),

    /// Source-adapter line or filename parsing failed.
    Adapter(AdapterError),

    /// Audit store or operational database call failed.
    Audit(AuditError),

    /// Directory watcher (producer) failed.
    Watch(WatchError),

    /// I/O error with path context.
    Io {
        path: PathBuf,
        operation: &'static str,
        source: io::Error,
    },
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "Configuration error: {e}"),
            Self::Tail(e) => write!(f, "Tail reader error: {e}"),
            Self::Adapter(e) => write!(f, "Adapter error: {e}"),
            Self::Audit(e) => write!(f, "Audit store error: {e}"),
            Self::Watch(e) => write!(f, "Watcher error: {e}"),
            Self::Io {
                path,
                operation,
                source,
            } => write!(
                f,
                "I/O error during {operation} on '{}': {source}",
                path.display()
            ),
        }
    }
}

impl std::error::Error for ServiceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Tail(e) => Some(e),
            Self::Adapter(e) => Some(e),
            Self::Audit(e) => Some(e),
            Self::Watch(e) => Some(e),
            Self::Io { source, .. } => Some(source),
        }
    }
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

/// Errors related to loading the `key::value` service configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// The config file does not exist.
    FileNotFound { path: PathBuf },

    /// A required key is missing for the source being configured.
    MissingKey { source: String, key: &'static str },

    /// A config value could not be parsed into the expected type.
    InvalidValue {
        key: String,
        value: String,
        expected: &'static str,
    },

    /// A `source::*` block names a source the binary does not know how
    /// to build an adapter for.
    UnknownSource { name: String },

    /// I/O error reading the config file.
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FileNotFound { path } => {
                write!(f, "Config file '{}' does not exist", path.display())
            }
            Self::MissingKey { source, key } => {
                write!(f, "Source '{source}': missing required key '{key}'")
            }
            Self::InvalidValue {
                key,
                value,
                expected,
            } => write!(f, "Config '{key}' = '{value}' is invalid, expected {expected}"),
            Self::UnknownSource { name } => write!(f, "Unknown source '{name}'"),
            Self::Io { path, source } => {
                write!(f, "Config I/O error '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ConfigError> for ServiceError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Tail reader errors
// ---------------------------------------------------------------------------

/// Errors related to the persistent-offset tail reader.
#[derive(Debug)]
pub enum TailError {
    /// The file shrank below its last recorded offset: rotated or
    /// truncated. Not fatal, the reader resets to offset 0.
    Rotated { path: PathBuf, last_offset: u64, current_size: u64 },

    /// The held-back partial-line buffer exceeded its size bound and was
    /// discarded.
    PartialOverflow { path: PathBuf, size: usize },

    /// I/O error reading or stat-ing the tailed file.
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for TailError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rotated {
                path,
                last_offset,
                current_size,
            } => write!(
                f,
                "'{}' shrank from offset {last_offset} to size {current_size}, \
                 treating as rotated",
                path.display()
            ),
            Self::PartialOverflow { path, size } => write!(
                f,
                "'{}': partial line buffer reached {size} bytes without a \
                 newline, discarding",
                path.display()
            ),
            Self::Io { path, source } => {
                write!(f, "'{}': I/O error: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for TailError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<TailError> for ServiceError {
    fn from(e: TailError) -> Self {
        Self::Tail(e)
    }
}

// ---------------------------------------------------------------------------
// Adapter errors
// ---------------------------------------------------------------------------

/// Errors related to source-specific filename and line parsing.
#[derive(Debug)]
pub enum AdapterError {
    /// The filename did not match the adapter's expected pattern.
    UnmatchedFilename { name: String },

    /// A decoded line did not contain enough delimited columns.
    MalformedLine { raw: String, reason: &'static str },

    /// A line decoded to fewer bytes than the minimum message size and
    /// was dropped before correlation.
    TooShort { raw: String },
}

impl fmt::Display for AdapterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnmatchedFilename { name } => {
                write!(f, "filename '{name}' does not match adapter pattern")
            }
            Self::MalformedLine { raw, reason } => {
                write!(f, "malformed line ({reason}): '{raw}'")
            }
            Self::TooShort { raw } => write!(f, "line too short to correlate: '{raw}'"),
        }
    }
}

impl std::error::Error for AdapterError {}

impl From<AdapterError> for ServiceError {
    fn from(e: AdapterError) -> Self {
        Self::Adapter(e)
    }
}

// ---------------------------------------------------------------------------
// Audit / operational database errors
// ---------------------------------------------------------------------------

/// Errors related to the audit store and operational database clients.
#[derive(Debug)]
pub enum AuditError {
    /// Connecting to the database failed after exhausting retries.
    Connect { endpoint: String, attempts: u32, reason: String },

    /// A stored procedure call failed.
    Call { procedure: &'static str, reason: String },

    /// A stored procedure call exceeded its timeout.
    Timeout { procedure: &'static str },
}

impl fmt::Display for AuditError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect {
                endpoint,
                attempts,
                reason,
            } => write!(
                f,
                "failed to connect to '{endpoint}' after {attempts} attempts: {reason}"
            ),
            Self::Call { procedure, reason } => {
                write!(f, "call to {procedure} failed: {reason}")
            }
            Self::Timeout { procedure } => write!(f, "call to {procedure} timed out"),
        }
    }
}

impl std::error::Error for AuditError {}

impl From<AuditError> for ServiceError {
    fn from(e: AuditError) -> Self {
        Self::Audit(e)
    }
}

// ---------------------------------------------------------------------------
// Watcher errors
// ---------------------------------------------------------------------------

/// Errors related to the producer's directory watcher.
#[derive(Debug)]
pub enum WatchError {
    /// A configured root path does not exist or is not a directory.
    RootNotFound { path: PathBuf },

    /// I/O error while walking or stat-ing a watched root.
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for WatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RootNotFound { path } => {
                write!(f, "watch root '{}' does not exist", path.display())
            }
            Self::Io { path, source } => {
                write!(f, "'{}': I/O error: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for WatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<WatchError> for ServiceError {
    fn from(e: WatchError) -> Self {
        Self::Watch(e)
    }
}

/// Convenience type alias for service results.
pub type Result<T> = std::result::Result<T, ServiceError>;
