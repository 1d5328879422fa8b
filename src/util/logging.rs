// orderlog-watcher - util/logging.rs
//
// Structured logging with runtime-selectable debug mode.
//
// Activation:
//   - Environment variable: RUST_LOG=debug (or trace)
//   - CLI flag: --debug (sets RUST_LOG=debug)
//   - Config key: logging::level
//
// Output: stderr always, plus an optional errorlog file when
// `audit::errorlog` names a path in the service config.
// Never logs secrets, tokens, or PII at any level.

use std::path::Path;

use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

/// Initialise the logging subsystem.
///
/// `debug_flag` is true when the user passed --debug on the CLI.
/// `config_level` is the level from the service config (if present).
/// `log_file` is the optional errorlog path from `audit::errorlog`.
///
/// Priority: RUST_LOG env var > CLI --debug flag > config level > default "info".
pub fn init(debug_flag: bool, config_level: Option<&str>, log_file: Option<&Path>) {
    let filter = if std::env::var(super::constants::RUST_LOG_ENV).is_ok() {
        EnvFilter::from_default_env()
    } else if debug_flag {
        EnvFilter::new("debug")
    } else if let Some(level) = config_level {
        EnvFilter::new(level)
    } else {
        EnvFilter::new(super::constants::DEFAULT_LOG_LEVEL)
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .compact();

    match log_file {
        Some(path) => {
            let file = match std::fs::OpenOptions::new().create(true).append(true).open(path) {
                Ok(f) => f,
                Err(e) => {
                    // logging isn't up yet; fall back to stderr-only and
                    // report the problem once initialised.
                    builder.init();
                    tracing::error!(path = %path.display(), error = %e, "failed to open errorlog file, logging to stderr only");
                    return;
                }
            };
            let writer = std::io::stderr.and(file);
            builder.with_writer(writer).init();
        }
        None => {
            builder.init();
        }
    }

    tracing::debug!(
        app = super::constants::APP_NAME,
        version = super::constants::APP_VERSION,
        "Logging initialised"
    );
}
