// orderlog-watcher - app/service.rs
//
// Component M: the supervisor. Wires the emitter (bootstrap sweep, run
// once to completion), then the producer/consumer pair, and tears the
// pair down and reconstructs it after `WATCHER_RESTART_COOLDOWN_SECS`
// whenever the consumer signals a restart (watcher exception or no
// event within the configured restart timeout) - §5's restart loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;

use crate::core::adapter::Adapter;
use crate::core::alarm::{AlarmSink, LoggingAlarmSink, NullAlarmSink};
use crate::core::audit_sink::AuditSink;
use crate::core::encoding::LineDecoder;
use crate::core::model::{ExitSummary, ServiceConfig};
use crate::core::order_cache::OrderSource;
use crate::db::audit::{AuditStore, Registrar};
use crate::util::constants::WATCHER_RESTART_COOLDOWN_SECS;

use super::consumer::Consumer;
use super::emitter;
use super::producer::Producer;
use super::tail::TailReader;

/// Owns the two atomics that cut across every worker thread: a clean
/// stop request, and a restart request the consumer raises when the
/// watcher looks dead.
#[derive(Clone)]
pub struct ServiceHandles {
    pub stop_requested: Arc<AtomicBool>,
}

impl ServiceHandles {
    pub fn new() -> Self {
        ServiceHandles {
            stop_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Relaxed);
    }
}

impl Default for ServiceHandles {
    fn default() -> Self {
        Self::new()
    }
}

/// Mailing is considered configured - and the logging sink wired in -
/// whenever `emergency` or the `alarms` (alarm-to-customer) list is
/// non-empty; there is no separate enable flag (§6/§4.J).
fn build_alarm_sink(config: &ServiceConfig) -> Box<dyn AlarmSink> {
    if !config.emergency.is_empty() || !config.alarms.is_empty() {
        Box::new(LoggingAlarmSink)
    } else {
        Box::new(NullAlarmSink)
    }
}

fn build_decoder(config: &ServiceConfig) -> LineDecoder {
    match config.encoding.as_deref() {
        Some(name) => LineDecoder::resolve(name),
        None => LineDecoder::default_codec(),
    }
}

/// Runs the service to completion: one emitter sweep, then the
/// producer/consumer loop with automatic watcher restarts, until
/// `handles.stop_requested` is set. Returns the final counters printed
/// on shutdown (§6 "Exit").
pub fn run(
    config: ServiceConfig,
    mut operational_source: Box<dyn OrderSource>,
    registrar: Box<dyn AuditSink>,
    handles: &ServiceHandles,
) -> ExitSummary {
    let adapter = Adapter::for_kind(config.ctype);
    let decoder = build_decoder(&config);

    let mut consumer = Consumer::new(
        config.clone(),
        adapter.clone(),
        TailReader::new(decoder),
        registrar,
        build_alarm_sink(&config),
    );

    let today = Local::now().date_naive();
    if let Err(e) = consumer.refresh_orders(operational_source.as_mut(), today) {
        tracing::warn!(error = %e, "service: initial order-cache refresh failed");
    }

    if config.emitter {
        let floor = load_floor(&config);
        let latest = emitter::run(
            &mut consumer,
            &config.root,
            &adapter,
            &config,
            operational_source.as_mut(),
            floor,
            &handles.stop_requested,
        );
        if let Some(latest) = latest {
            if let Err(e) = emitter::save_seen_marker(&config.seen, latest) {
                tracing::warn!(error = %e, "service: failed to persist seen marker");
            }
        }
    }

    while !handles.stop_requested.load(Ordering::Relaxed) {
        let (mut producer, rx) = Producer::spawn(config.root.clone(), config.clone(), adapter.clone());

        let restart_requested = consumer.run(&rx, operational_source.as_mut(), &handles.stop_requested);

        producer.stop();
        producer.join();

        if handles.stop_requested.load(Ordering::Relaxed) {
            break;
        }

        if restart_requested {
            tracing::warn!(
                cooldown_secs = WATCHER_RESTART_COOLDOWN_SECS,
                "service: restarting watcher after cooldown"
            );
            std::thread::sleep(Duration::from_secs(WATCHER_RESTART_COOLDOWN_SECS));
            if let Err(e) = consumer.refresh_orders(operational_source.as_mut(), Local::now().date_naive()) {
                tracing::warn!(error = %e, "service: order-cache refresh on restart failed");
            }
        }
    }

    ExitSummary {
        found: consumer.found(),
        processed: consumer.processed(),
        unresolved: consumer.unresolved(),
    }
}

fn load_floor(config: &ServiceConfig) -> chrono::NaiveDate {
    if config.check_datefrom {
        emitter::load_seen_marker(&config.seen)
    } else {
        Local::now().date_naive()
    }
}

pub fn open_registrar(info: crate::db::DbConnectionInfo) -> Box<dyn AuditSink> {
    Box::new(Registrar::new(AuditStore::new(info)))
}
