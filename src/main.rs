// orderlog-watcher - main.rs
//
// Thin CLI bootstrap: parse arguments, load the `key::value` service
// config, initialise logging, open the two database clients, and hand
// off to the supervisor (app::service::run). All real behavior lives in
// the library crate so it stays unit-testable without a process.

use std::path::PathBuf;
use std::sync::atomic::Ordering;

use clap::Parser;

use orderlog_watcher::app::{config, service};
use orderlog_watcher::core::order_cache::OrderSource;
use orderlog_watcher::db::{operational::OperationalStore, DbConnectionInfo};
use orderlog_watcher::util;

/// Watches rotating upstream log files and correlates them against
/// business orders for audit-store registration and alarm notification.
#[derive(Parser, Debug)]
#[command(name = "orderlog-watcher", version, about)]
struct Cli {
    /// Path to the `key::value` service config file for this source.
    config: PathBuf,

    /// Enable debug logging (equivalent to RUST_LOG=debug).
    #[arg(short = 'd', long = "debug")]
    debug: bool,
}

fn main() {
    let cli = Cli::parse();

    let config = match config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            // Logging isn't initialised yet - config errors at startup
            // are fatal and reported directly to stderr (§7).
            eprintln!("Error: failed to load config '{}': {e}", cli.config.display());
            std::process::exit(1);
        }
    };

    util::logging::init(cli.debug, config.log_level(), config.errorlog.as_deref());

    tracing::info!(
        version = util::constants::APP_VERSION,
        ctype = config.ctype.as_ctype(),
        root = %config.root.display(),
        "orderlog-watcher starting"
    );

    let operational_info = match DbConnectionInfo::from_env("ORDERLOG_OPERATIONAL") {
        Ok(info) => info,
        Err(e) => {
            tracing::error!(error = %e, "failed to read operational database connection info");
            std::process::exit(1);
        }
    };
    let audit_info = match DbConnectionInfo::from_env("ORDERLOG_AUDIT") {
        Ok(info) => info,
        Err(e) => {
            tracing::error!(error = %e, "failed to read audit database connection info");
            std::process::exit(1);
        }
    };

    let operational_source: Box<dyn OrderSource> = Box::new(OperationalStore::new(operational_info));
    let registrar = service::open_registrar(audit_info);

    let handles = service::ServiceHandles::new();
    let ctrlc_handles = handles.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        tracing::info!("shutdown signal received, stopping workers");
        ctrlc_handles.request_stop();
    }) {
        tracing::warn!(error = %e, "failed to install Ctrl-C handler, relying on restart timeouts only");
    }

    let summary = service::run(config, operational_source, registrar, &handles);

    println!("{summary}");
    tracing::info!(%summary, "orderlog-watcher stopped");

    if handles.stop_requested.load(Ordering::Relaxed) {
        std::process::exit(0);
    }
}
