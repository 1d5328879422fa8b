// orderlog-watcher - app/consumer.rs
//
// Component H: the single consumer worker. Drains the producer's event
// channel, drives the tail reader, feeds decoded lines through the
// correlation engine, and persists matches via the audit-store
// registrar. Owns the offset table (the `TailReader`) and the order
// cache outright - nothing else writes to either while the consumer is
// running, per §5's "mutated only by consumer and emitter, never
// concurrently" rule.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{Local, NaiveDateTime, Utc};

use crate::core::adapter::Adapter;
use crate::core::alarm::{self, AlarmSink};
use crate::core::audit_sink::AuditSink;
use crate::core::correlate::{CorrelationEngine, MatchOptions};
use crate::core::model::{LogItem, LogKey, Message, MessageStatus, ModuleKey, Order, ServiceConfig, SourceKey, WatchEvent};
use crate::core::order_cache::{OrderCache, OrderSource};
use crate::core::parser;
use crate::util::constants::DEFAULT_CONSUMER_SLEEP_MS;
use crate::util::error::AuditError;

use super::tail::{LineOutcome, TailReader};

fn match_opts(config: &ServiceConfig) -> MatchOptions<'_> {
    MatchOptions {
        case_insensitive: config.case_insensitive,
        check_filename: config.check_filename,
        client: &config.client,
        alias: &config.alias,
    }
}

/// Every N idle ticks (no event within the recv timeout) the consumer
/// checks whether the overstock queue needs a reclaim pass.
const IDLE_TICKS_PER_RECLAIM_CHECK: u32 = 1;

pub struct Consumer {
    config: ServiceConfig,
    adapter: Adapter,
    tail: TailReader,
    engine: CorrelationEngine,
    cache: OrderCache,
    registrar: Box<dyn AuditSink>,
    alarm_sink: Box<dyn AlarmSink>,
    source_key: SourceKey,
    found: u64,
    processed: u64,
    idle_ticks: u32,
    last_event_at: Instant,
}

impl Consumer {
    pub fn new(
        config: ServiceConfig,
        adapter: Adapter,
        tail: TailReader,
        registrar: Box<dyn AuditSink>,
        alarm_sink: Box<dyn AlarmSink>,
    ) -> Self {
        let source_key = SourceKey {
            root: config.root.to_string_lossy().into_owned(),
            ip: config.ip.clone(),
            ctype: config.ctype.as_ctype().to_string(),
        };
        Consumer {
            config,
            adapter,
            tail,
            engine: CorrelationEngine::new(),
            cache: OrderCache::new(),
            registrar,
            alarm_sink,
            source_key,
            found: 0,
            processed: 0,
            idle_ticks: 0,
            last_event_at: Instant::now(),
        }
    }

    pub fn found(&self) -> u64 {
        self.found
    }

    pub fn processed(&self) -> u64 {
        self.processed
    }

    pub fn unresolved(&self) -> usize {
        self.engine.overstock_len()
    }

    /// Refreshes the non-finalized order-cache window. Called once at
    /// startup and again whenever the consumer decides a refresh is due
    /// (the original's `forced_refresh` flag forces one on every tick).
    pub fn refresh_orders(&mut self, source: &mut dyn OrderSource, date_from: chrono::NaiveDate) -> Result<(), AuditError> {
        let now = Local::now().date_naive();
        self.cache.refresh(source, date_from, now, self.config.delta_near, false, &self.config.complete)
    }

    /// Runs the event loop until `stop_requested` is set. Returns the
    /// restart signal: true when no event arrived within `restart`
    /// seconds and the supervisor should tear down and reconstruct the
    /// producer/watcher.
    pub fn run(
        &mut self,
        rx: &Receiver<WatchEvent>,
        source: &mut dyn OrderSource,
        stop_requested: &Arc<AtomicBool>,
    ) -> bool {
        let sleep = Duration::from_millis(self.config.sleep.unwrap_or(DEFAULT_CONSUMER_SLEEP_MS));
        let restart_timeout = self.config.restart.map(Duration::from_secs);

        loop {
            if stop_requested.load(Ordering::Relaxed) {
                return false;
            }

            match rx.recv_timeout(sleep) {
                Ok(event) => {
                    self.last_event_at = Instant::now();
                    self.idle_ticks = 0;
                    self.handle_event(event, source);
                }
                Err(RecvTimeoutError::Timeout) => {
                    self.idle_ticks += 1;
                    if self.idle_ticks % IDLE_TICKS_PER_RECLAIM_CHECK == 0 {
                        self.maybe_reclaim(source);
                    }
                    if let Some(timeout) = restart_timeout {
                        if self.last_event_at.elapsed() >= timeout {
                            tracing::warn!("consumer: no producer event within restart timeout, requesting restart");
                            return true;
                        }
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    tracing::warn!("consumer: producer channel disconnected, requesting restart");
                    return true;
                }
            }
        }
    }

    fn handle_event(&mut self, event: WatchEvent, source: &mut dyn OrderSource) {
        match event {
            WatchEvent::Created { path } => {
                self.tail.register_file(&path);
                tracing::debug!(file = %path.display(), "consumer: file created");
            }
            WatchEvent::Deleted { path } => {
                self.tail.forget_file(&path);
                tracing::debug!(file = %path.display(), "consumer: file deleted");
            }
            WatchEvent::Moved { src, dest } => {
                self.tail.rename_file(&src, &dest);
                tracing::debug!(old = %src.display(), new = %dest.display(), "consumer: file moved");
            }
            WatchEvent::Modified { path } => {
                self.drain_file(&path, source);
            }
        }
    }

    /// Entry point used by the bootstrap sweep (app::emitter): registers
    /// `path` at offset zero and runs the same drain procedure a
    /// `Modified` event would, so consumer and emitter share one
    /// implementation of "tail a file and persist its matches" (§4.I).
    pub fn drain_matching_file(&mut self, path: &Path, source: &mut dyn OrderSource) {
        self.tail.register_file(path);
        self.drain_file(path, source);
    }

    /// Tails `path`, matches every newly-decoded line, and persists
    /// matches. Mirrors the emitter's per-file loop so both share the
    /// same match/persist procedure per §4.I.
    fn drain_file(&mut self, path: &Path, source: &mut dyn OrderSource) {
        let outcomes = match self.tail.read_new_lines(path) {
            Ok(outcomes) => outcomes,
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "consumer: tail read failed");
                return;
            }
        };

        let file_name = path.file_name().map(|f| f.to_string_lossy().into_owned()).unwrap_or_default();
        let mut matched = 0usize;
        let mut unresolved = 0usize;

        for outcome in outcomes {
            match outcome {
                LineOutcome::Exception(exc) => {
                    tracing::warn!(file = %exc.file_name, reason = %exc.reason, "consumer: decode exception");
                }
                LineOutcome::Line(text) => {
                    let line = crate::core::model::LogLine {
                        file_name: file_name.clone(),
                        text,
                    };
                    let active = self.cache.active_orders();
                    let opts = match_opts(&self.config);
                    match self.engine.process_line(&self.adapter, &active, line, opts) {
                        Ok(Some((item, order_id))) => {
                            matched += 1;
                            self.persist_match(source, order_id, item, &file_name);
                        }
                        Ok(None) => unresolved += 1,
                        Err(e) => tracing::debug!(error = %e, "consumer: line did not parse"),
                    }
                }
            }
        }

        tracing::debug!(file = %path.display(), matched, unresolved, "consumer: drained file");
    }

    fn persist_match(&mut self, source: &mut dyn OrderSource, order_id: i64, item: LogItem, file_name: &str) {
        if let Err(e) = self.cache.derive_keys(source, order_id, self.adapter.uses_aliases) {
            tracing::warn!(order_id, error = %e, "consumer: failed to derive order keys");
        }
        let Some(order) = self.cache.get(order_id).cloned() else {
            return;
        };

        match self.register(&order, &item, file_name) {
            Ok(status) => {
                self.processed += 1;
                if status == MessageStatus::New {
                    self.found += 1;
                    self.fire_alarm(&order, &item, file_name, status);
                }
            }
            Err(e) => tracing::warn!(order_id, error = %e, "consumer: failed to register message"),
        }
    }

    fn register(&mut self, order: &Order, item: &LogItem, file_name: &str) -> Result<MessageStatus, AuditError> {
        let source_id = self.registrar.source_id(self.source_key.clone())?;
        let module_name = item.module.clone().unwrap_or_default();
        let module_id = self.registrar.module_id(ModuleKey {
            source_id,
            name: module_name,
            path: self.config.root.to_string_lossy().into_owned(),
        })?;
        let log_id = self.registrar.log_id(LogKey {
            source_id,
            module_id,
            file_name: file_name.to_string(),
        })?;

        let now: NaiveDateTime = Utc::now().naive_utc();
        let msg = Message {
            source_id,
            module_id,
            log_id,
            order_id: order.id,
            batch_id: None,
            client: order.client.clone(),
            file_name: file_name.to_string(),
            code: item.severity.clone(),
            count: item.module_count.unwrap_or(1),
            message: item.message.clone(),
            event_date: item.timestamp,
            inserted_at: now,
        };

        let (_id, status) = self.registrar.register_message(&msg)?;
        Ok(status)
    }

    fn fire_alarm(&self, order: &Order, item: &LogItem, file_name: &str, status: MessageStatus) {
        let is_alarmable = parser::is_alarmable(&self.adapter, item);
        let decision = alarm::evaluate(
            status,
            is_alarmable,
            order,
            item,
            file_name,
            &self.config.mailkeys,
            &self.config.emergency,
            &self.config.alarms,
        );
        if let Some(decision) = decision {
            self.alarm_sink.notify(&decision);
        }
    }

    fn maybe_reclaim(&mut self, source: &mut dyn OrderSource) {
        if !self.engine.needs_reclaim() {
            return;
        }
        let finalized = self.cache.finalized_orders(&self.config.complete);
        let opts = match_opts(&self.config);
        match self.engine.reclaim(&self.adapter, &finalized, opts) {
            Ok(matches) => {
                let count = matches.len();
                for (item, order_id) in matches {
                    let file_name = item.order_name.clone().unwrap_or_default();
                    self.persist_match(source, order_id, item, &file_name);
                }
                if count > 0 {
                    tracing::info!(reclaimed = count, "consumer: overstock reclaim matched lines");
                }
            }
            Err(e) => tracing::warn!(error = %e, "consumer: overstock reclaim failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::alarm::{AlarmDecision, AlarmSink};
    use crate::core::encoding::LineDecoder;
    use crate::core::model::{BatchKey, RawOrder, SourceKind};
    use crate::core::order_cache::OrderSource;
    use chrono::NaiveDate;
    use std::io::Write;
    use std::sync::atomic::AtomicBool;
    use std::sync::Mutex;
    use tempfile::tempdir;

    struct FakeSource {
        rows: Vec<RawOrder>,
    }

    impl OrderSource for FakeSource {
        fn fetch_orders(
            &mut self,
            _date_from: NaiveDate,
            _floor: NaiveDate,
            _finalized: bool,
            _complete_statuses: &[i32],
        ) -> Result<Vec<RawOrder>, AuditError> {
            Ok(self.rows.clone())
        }

        fn fetch_batch_keys(&mut self, _order_id: i64) -> Result<Vec<BatchKey>, AuditError> {
            Ok(vec![])
        }

        fn fetch_aliases(&mut self, _client: &str) -> Result<Vec<String>, AuditError> {
            Ok(vec![])
        }
    }

    /// Returns `New` the first time a given message text is registered,
    /// `Exists` on every later call for the same text - mirrors the audit
    /// store's idempotent-insert contract closely enough to exercise the
    /// consumer's new-vs-duplicate bookkeeping.
    #[derive(Default)]
    struct FakeRegistrar {
        seen_messages: Mutex<std::collections::HashSet<String>>,
        next_id: Mutex<i64>,
    }

    impl AuditSink for FakeRegistrar {
        fn source_id(&mut self, _key: SourceKey) -> Result<i64, AuditError> {
            Ok(1)
        }

        fn module_id(&mut self, _key: ModuleKey) -> Result<i64, AuditError> {
            Ok(1)
        }

        fn log_id(&mut self, _key: LogKey) -> Result<i64, AuditError> {
            Ok(1)
        }

        fn register_message(&mut self, msg: &Message) -> Result<(Option<i64>, MessageStatus), AuditError> {
            let mut seen = self.seen_messages.lock().unwrap();
            if seen.insert(msg.message.clone()) {
                let mut next_id = self.next_id.lock().unwrap();
                *next_id += 1;
                Ok((Some(*next_id), MessageStatus::New))
            } else {
                Ok((None, MessageStatus::Exists))
            }
        }
    }

    #[derive(Default, Clone)]
    struct RecordingAlarmSink {
        notifications: Arc<Mutex<Vec<AlarmDecision>>>,
    }

    impl AlarmSink for RecordingAlarmSink {
        fn notify(&self, decision: &AlarmDecision) -> bool {
            self.notifications.lock().unwrap().push(decision.clone());
            true
        }
    }

    fn minimal_config(root: &std::path::Path) -> ServiceConfig {
        ServiceConfig {
            ctype: SourceKind::BankPerso,
            root: root.to_path_buf(),
            ip: "10.0.0.1".into(),
            alias: String::new(),
            client: String::new(),
            encoding: None,
            filemask: None,
            options: vec![],
            seen: root.join("seen.txt"),
            errorlog: None,
            emergency: vec!["ops@example.com".into()],
            alarms: vec![],
            mailkeys: vec![],
            suppressed: vec![],
            delta_near: -7,
            delta_far: -30,
            check_datefrom: false,
            check_filename: false,
            case_insensitive: false,
            forced_refresh: false,
            stack_events: false,
            watch_everything: false,
            decoder_trace: false,
            debug: false,
            deepdebug: false,
            trace: false,
            existstrace: false,
            disableoutput: false,
            observertrace: false,
            limit: None,
            timeout: None,
            sleep: None,
            restart: None,
            complete: vec![62],
            emitter: true,
            raw: Default::default(),
        }
    }

    fn order(id: i64, name: &str) -> RawOrder {
        RawOrder {
            id,
            name: name.to_string(),
            client: "ACME".into(),
            status: 1,
            registered: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
        }
    }

    #[test]
    fn matching_line_is_persisted_and_counted_as_new() {
        let dir = tempdir().unwrap();
        let config = minimal_config(dir.path());
        let adapter = Adapter::for_kind(SourceKind::BankPerso);
        let tail = TailReader::new(LineDecoder::resolve("windows-1251"));

        let mut consumer = Consumer::new(
            config,
            adapter,
            tail,
            Box::new(FakeRegistrar::default()),
            Box::new(RecordingAlarmSink::default()),
        );

        let mut source = FakeSource { rows: vec![order(123, "X.TXT")] };
        consumer
            .refresh_orders(&mut source, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap())
            .unwrap();

        let file = dir.path().join("X.TXT");
        std::fs::File::create(&file)
            .unwrap()
            .write_all(b"20250101 12:00:00\tINFO\tprocessed order 123\n")
            .unwrap();

        consumer.drain_matching_file(&file, &mut source);

        assert_eq!(consumer.found(), 1);
        assert_eq!(consumer.processed(), 1);
        assert_eq!(consumer.unresolved(), 0);
    }

    /// SPEC_FULL §8 scenario 2: the file carrying the line does not
    /// contain any of the order's own keys (order `X.TXT` vs. file
    /// `20250101_log.tsv`). `check_filename` is off by default, so the
    /// message-key match alone must still find the order.
    #[test]
    fn matches_on_message_keys_even_when_filename_does_not_carry_any_order_key() {
        let dir = tempdir().unwrap();
        let config = minimal_config(dir.path());
        let adapter = Adapter::for_kind(SourceKind::BankPerso);
        let tail = TailReader::new(LineDecoder::resolve("windows-1251"));

        let mut consumer = Consumer::new(
            config,
            adapter,
            tail,
            Box::new(FakeRegistrar::default()),
            Box::new(RecordingAlarmSink::default()),
        );

        let mut source = FakeSource { rows: vec![order(123, "X.TXT")] };
        consumer
            .refresh_orders(&mut source, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap())
            .unwrap();

        let file = dir.path().join("20250101_log.tsv");
        std::fs::File::create(&file)
            .unwrap()
            .write_all(b"20250101 12:00:00\tINFO\tprocessed order 123\n")
            .unwrap();

        consumer.drain_matching_file(&file, &mut source);

        assert_eq!(consumer.found(), 1);
        assert_eq!(consumer.processed(), 1);
        assert_eq!(consumer.unresolved(), 0);
    }

    #[test]
    fn duplicate_line_counts_as_processed_but_not_new_and_fires_alarm_once() {
        let dir = tempdir().unwrap();
        let mut config = minimal_config(dir.path());
        config.mailkeys = vec!["ACME".into()];
        let adapter = Adapter::for_kind(SourceKind::BankPerso);
        let tail = TailReader::new(LineDecoder::resolve("windows-1251"));
        let alarm_sink = RecordingAlarmSink::default();
        let notifications = alarm_sink.notifications.clone();

        let mut consumer = Consumer::new(
            config,
            adapter,
            tail,
            Box::new(FakeRegistrar::default()),
            Box::new(alarm_sink),
        );

        let mut source = FakeSource { rows: vec![order(123, "X.TXT")] };
        consumer
            .refresh_orders(&mut source, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap())
            .unwrap();

        let file = dir.path().join("X.TXT");
        std::fs::File::create(&file)
            .unwrap()
            .write_all(b"20250101 12:00:00\tERROR\tduplicate failure text\n")
            .unwrap();
        consumer.drain_matching_file(&file, &mut source);

        let mut handle = std::fs::OpenOptions::new().append(true).open(&file).unwrap();
        handle.write_all(b"20250101 12:00:01\tERROR\tduplicate failure text\n").unwrap();
        drop(handle);
        consumer.drain_matching_file(&file, &mut source);

        assert_eq!(consumer.found(), 1);
        assert_eq!(consumer.processed(), 2);
        assert_eq!(notifications.lock().unwrap().len(), 1);
    }

    /// SPEC_FULL §8 scenario 5: `emergency`+`mailkeys` configured, no
    /// `alarms` entries at all - the notifier must still fire exactly
    /// once, since mailing is enabled by `emergency` alone.
    #[test]
    fn emergency_and_mailkeys_alone_fire_the_alarm_with_no_alarms_entries() {
        let dir = tempdir().unwrap();
        let mut config = minimal_config(dir.path());
        config.emergency = vec!["user@x".into()];
        config.mailkeys = vec!["VTB24".into()];
        config.alarms = vec![];
        let adapter = Adapter::for_kind(SourceKind::BankPerso);
        let tail = TailReader::new(LineDecoder::resolve("windows-1251"));
        let alarm_sink = RecordingAlarmSink::default();
        let notifications = alarm_sink.notifications.clone();

        let mut consumer = Consumer::new(
            config,
            adapter,
            tail,
            Box::new(FakeRegistrar::default()),
            Box::new(alarm_sink),
        );

        let mut source = FakeSource { rows: vec![order(123, "X.TXT")] };
        consumer
            .refresh_orders(&mut source, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap())
            .unwrap();

        let file = dir.path().join("X.TXT");
        std::fs::File::create(&file)
            .unwrap()
            .write_all(b"20250101 12:00:00\tERROR\tVTB24 batch rejected here\n")
            .unwrap();
        consumer.drain_matching_file(&file, &mut source);

        assert_eq!(notifications.lock().unwrap().len(), 1);
    }

    /// The `alarms` config list reaches `alarm::evaluate` as the real
    /// alarm-to-customer recipient list, not a hardcoded empty slice.
    #[test]
    fn alarms_config_list_reaches_the_alarm_to_customer_recipient() {
        let dir = tempdir().unwrap();
        let mut config = minimal_config(dir.path());
        config.emergency = vec![];
        config.alarms = vec!["Ops:ops@customer.example:rejected".into()];
        let adapter = Adapter::for_kind(SourceKind::BankPerso);
        let tail = TailReader::new(LineDecoder::resolve("windows-1251"));
        let alarm_sink = RecordingAlarmSink::default();
        let notifications = alarm_sink.notifications.clone();

        let mut consumer = Consumer::new(
            config,
            adapter,
            tail,
            Box::new(FakeRegistrar::default()),
            Box::new(alarm_sink),
        );

        let mut source = FakeSource { rows: vec![order(123, "X.TXT")] };
        consumer
            .refresh_orders(&mut source, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap())
            .unwrap();

        let file = dir.path().join("X.TXT");
        std::fs::File::create(&file)
            .unwrap()
            .write_all(b"20250101 12:00:00\tERROR\tcard batch rejected today\n")
            .unwrap();
        consumer.drain_matching_file(&file, &mut source);

        let recorded = notifications.lock().unwrap();
        assert_eq!(recorded.len(), 1);
        let customer = recorded[0].customer_recipient.as_ref().unwrap();
        assert_eq!(customer.address, "ops@customer.example");
    }

    /// SPEC_FULL §8 scenario 2 at the consumer level: the matching
    /// fixture file name carries none of the order's own keys, and
    /// `check_filename` is off by default, so the line still matches on
    /// message keys alone.
    #[test]
    fn matches_a_differently_named_file_by_default_when_check_filename_is_off() {
        let dir = tempdir().unwrap();
        let config = minimal_config(dir.path());
        let adapter = Adapter::for_kind(SourceKind::BankPerso);
        let tail = TailReader::new(LineDecoder::resolve("windows-1251"));

        let mut consumer = Consumer::new(
            config,
            adapter,
            tail,
            Box::new(FakeRegistrar::default()),
            Box::new(RecordingAlarmSink::default()),
        );

        let mut source = FakeSource { rows: vec![order(123, "X.TXT")] };
        consumer
            .refresh_orders(&mut source, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap())
            .unwrap();

        let file = dir.path().join("unrelated_name.log");
        std::fs::File::create(&file)
            .unwrap()
            .write_all(b"20250101 12:00:00\tINFO\tprocessed order 123\n")
            .unwrap();
        consumer.drain_matching_file(&file, &mut source);

        assert_eq!(consumer.found(), 1);
        assert_eq!(consumer.unresolved(), 0);
    }

    /// With `check_filename` enabled, a file whose name carries neither
    /// the configured `client` nor `alias` is rejected before any
    /// per-order key is even considered.
    #[test]
    fn check_filename_rejects_a_file_missing_client_or_alias_even_with_matching_order_keys() {
        let dir = tempdir().unwrap();
        let mut config = minimal_config(dir.path());
        config.check_filename = true;
        config.client = "VTB24".into();
        let adapter = Adapter::for_kind(SourceKind::BankPerso);
        let tail = TailReader::new(LineDecoder::resolve("windows-1251"));

        let mut consumer = Consumer::new(
            config,
            adapter,
            tail,
            Box::new(FakeRegistrar::default()),
            Box::new(RecordingAlarmSink::default()),
        );

        let mut source = FakeSource { rows: vec![order(123, "X.TXT")] };
        consumer
            .refresh_orders(&mut source, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap())
            .unwrap();

        let file = dir.path().join("X.TXT");
        std::fs::File::create(&file)
            .unwrap()
            .write_all(b"20250101 12:00:00\tINFO\tprocessed order 123\n")
            .unwrap();
        consumer.drain_matching_file(&file, &mut source);

        assert_eq!(consumer.found(), 0);
        assert_eq!(consumer.unresolved(), 1);
    }

    #[test]
    fn unmatched_line_is_held_in_overstock() {
        let dir = tempdir().unwrap();
        let config = minimal_config(dir.path());
        let adapter = Adapter::for_kind(SourceKind::BankPerso);
        let tail = TailReader::new(LineDecoder::resolve("windows-1251"));

        let mut consumer = Consumer::new(
            config,
            adapter,
            tail,
            Box::new(FakeRegistrar::default()),
            Box::new(RecordingAlarmSink::default()),
        );

        let mut source = FakeSource { rows: vec![order(1, "OTHER.TXT")] };
        consumer
            .refresh_orders(&mut source, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap())
            .unwrap();

        let file = dir.path().join("X.TXT");
        std::fs::File::create(&file)
            .unwrap()
            .write_all(b"20250101 12:00:00\tINFO\tprocessed order 999\n")
            .unwrap();
        consumer.drain_matching_file(&file, &mut source);

        assert_eq!(consumer.found(), 0);
        assert_eq!(consumer.processed(), 0);
        assert_eq!(consumer.unresolved(), 1);
    }

    #[test]
    fn run_exits_on_stop_requested_without_blocking() {
        let dir = tempdir().unwrap();
        let config = minimal_config(dir.path());
        let adapter = Adapter::for_kind(SourceKind::BankPerso);
        let tail = TailReader::new(LineDecoder::resolve("windows-1251"));
        let mut consumer = Consumer::new(
            config,
            adapter,
            tail,
            Box::new(FakeRegistrar::default()),
            Box::new(RecordingAlarmSink::default()),
        );

        let (_tx, rx) = std::sync::mpsc::channel::<WatchEvent>();
        let mut source = FakeSource { rows: vec![] };
        let stop_requested = Arc::new(AtomicBool::new(true));

        let restart = consumer.run(&rx, &mut source, &stop_requested);
        assert!(!restart);
    }
}
