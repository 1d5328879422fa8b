// orderlog-watcher - core/correlate.rs
//
// Matches one decoded `LogLine` against a set of active orders, and
// holds the "overstock" queue of lines that matched no active order
// along with the periodic reclaim-against-finalized-orders sweep.

use super::adapter::Adapter;
use super::model::{LogLine, Order};
use super::parser;
use crate::util::constants::MAX_UNRESOLVED_LINES;
use crate::util::error::AdapterError;

pub use super::model::LogItem;

/// Case-sensitive or case-insensitive substring test, per the
/// `case_insensitive` config flag (§6).
fn contains_key(haystack: &str, needle: &str, case_insensitive: bool) -> bool {
    if needle.is_empty() {
        return false;
    }
    if case_insensitive {
        haystack.to_lowercase().contains(&needle.to_lowercase())
    } else {
        haystack.contains(needle)
    }
}

/// Options threaded through matching that come from the service config
/// rather than from the order/line data itself.
#[derive(Debug, Clone, Copy)]
pub struct MatchOptions<'a> {
    pub case_insensitive: bool,
    /// §4.E step 1: "if the adapter requires it". Off by default; when
    /// set, a file-level pre-filter against `client`/`alias` runs before
    /// any per-order key is considered (original `__init__.py:1014`,
    /// `if check_filename and keys:`).
    pub check_filename: bool,
    pub client: &'a str,
    pub alias: &'a str,
}

/// Attempts to match `line` against every order in `orders`, in
/// iteration order; the first order satisfying the message-key check
/// (and, if `check_filename` is set, the filename/client-alias check)
/// wins. Returns the decorated item and matched order id, or `None` if
/// no order matched (a parse failure is still an `Err`, distinct from
/// "parsed but unmatched").
pub fn match_line(
    adapter: &Adapter,
    orders: &[Order],
    line: &LogLine,
    opts: MatchOptions,
) -> Result<Option<(LogItem, i64)>, AdapterError> {
    let item = parser::parse_line(adapter, &line.file_name, &line.text)?;

    if opts.check_filename {
        let keys = [opts.client, opts.alias];
        let filename_ok = keys.iter().any(|key| contains_key(&line.file_name, key, true));
        if !filename_ok {
            return Ok(None);
        }
    }

    for order in orders {
        if order.inactive {
            continue;
        }

        let message_ok = order
            .keys
            .iter()
            .any(|key| contains_key(&item.message, key, opts.case_insensitive));
        if !message_ok {
            continue;
        }

        if adapter.uses_aliases {
            let alias_ok = order
                .aliases
                .iter()
                .any(|alias| contains_key(&item.message, alias, opts.case_insensitive));
            if !alias_ok {
                continue;
            }
        }

        let mut decorated = item;
        decorated.order_id = Some(order.id);
        decorated.order_name = Some(order.name.clone());
        decorated.client = Some(order.client.clone());
        return Ok(Some((decorated, order.id)));
    }

    Ok(None)
}

/// Owns the overstock queue and the reclaim cadence.
#[derive(Debug, Default)]
pub struct CorrelationEngine {
    overstock: Vec<LogLine>,
    last_reclaim_len: usize,
    reclaim_attempts_without_progress: u32,
}

/// Consecutive no-progress reclaim attempts before the queue is forcibly
/// emptied regardless of the high watermark.
const MAX_STALE_RECLAIM_ATTEMPTS: u32 = 5;

impl CorrelationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn overstock_len(&self) -> usize {
        self.overstock.len()
    }

    /// Matches one line against the active order set; on no match, the
    /// line joins the overstock queue.
    pub fn process_line(
        &mut self,
        adapter: &Adapter,
        active_orders: &[Order],
        line: LogLine,
        opts: MatchOptions,
    ) -> Result<Option<(LogItem, i64)>, AdapterError> {
        match match_line(adapter, active_orders, &line, opts)? {
            Some(result) => Ok(Some(result)),
            None => {
                self.overstock.push(line);
                Ok(None)
            }
        }
    }

    /// True once the queue has passed the low watermark and grown by at
    /// least `step` lines since the previous reclaim attempt.
    pub fn needs_reclaim(&self) -> bool {
        let (low, _high, step) = MAX_UNRESOLVED_LINES;
        self.overstock.len() > low && self.overstock.len() >= self.last_reclaim_len + step
    }

    /// Re-attempts every queued line against `finalized_orders`. Matched
    /// lines are removed; indices are collected then removed in
    /// descending order so earlier indices stay valid during removal,
    /// while the remaining queue preserves original arrival order.
    pub fn reclaim(
        &mut self,
        adapter: &Adapter,
        finalized_orders: &[Order],
        opts: MatchOptions,
    ) -> Result<Vec<(LogItem, i64)>, AdapterError> {
        let before = self.overstock.len();
        let mut matched = Vec::new();
        let mut remove_indices = Vec::new();

        for (idx, line) in self.overstock.iter().enumerate() {
            if let Some(result) = match_line(adapter, finalized_orders, line, opts)? {
                matched.push(result);
                remove_indices.push(idx);
            }
        }

        for idx in remove_indices.into_iter().rev() {
            self.overstock.remove(idx);
        }

        if self.overstock.len() < before {
            self.reclaim_attempts_without_progress = 0;
        } else {
            self.reclaim_attempts_without_progress += 1;
        }
        self.last_reclaim_len = self.overstock.len();

        let (_low, high, _step) = MAX_UNRESOLVED_LINES;
        if self.overstock.len() > high
            || self.reclaim_attempts_without_progress >= MAX_STALE_RECLAIM_ATTEMPTS
        {
            tracing::warn!(
                dropped = self.overstock.len(),
                "overstock queue exceeded bound or stopped making progress, forcibly emptying"
            );
            self.overstock.clear();
            self.last_reclaim_len = 0;
            self.reclaim_attempts_without_progress = 0;
        }

        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{KeyState, SourceKind};
    use chrono::NaiveDate;

    fn order(id: i64, keys: Vec<&str>) -> Order {
        Order {
            id,
            name: format!("order-{id}"),
            client: "ACME".into(),
            status: 1,
            registered: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            keys: keys.into_iter().map(String::from).collect(),
            aliases: vec![],
            key_state: KeyState::KeysReady,
            inactive: false,
        }
    }

    /// Default options: no filename gate, case-sensitive message keys.
    fn opts() -> MatchOptions<'static> {
        MatchOptions {
            case_insensitive: false,
            check_filename: false,
            client: "",
            alias: "",
        }
    }

    fn opts_ci() -> MatchOptions<'static> {
        MatchOptions { case_insensitive: true, ..opts() }
    }

    #[test]
    fn matches_a_line_against_its_order() {
        let adapter = Adapter::for_kind(SourceKind::BankPerso);
        let orders = vec![order(123, vec!["123", "X.TXT"])];
        let line = LogLine {
            file_name: "X.TXT".into(),
            text: "20250101 12:00:00\tINFO\tprocessed order 123".into(),
        };
        let (item, order_id) = match_line(&adapter, &orders, &line, opts()).unwrap().unwrap();
        assert_eq!(order_id, 123);
        assert_eq!(item.order_id, Some(123));
    }

    /// SPEC_FULL §8 scenario 2: the file name carries none of the
    /// order's own keys. With `check_filename` off (the default) the
    /// filename is never consulted, so the message-key match alone
    /// decides.
    #[test]
    fn matches_by_message_keys_regardless_of_filename_when_check_filename_is_off() {
        let adapter = Adapter::for_kind(SourceKind::BankPerso);
        let orders = vec![order(123, vec!["123", "X.TXT", "X"])];
        let line = LogLine {
            file_name: "20250101_log.tsv".into(),
            text: "20250101 12:00:00\tINFO\tprocessed order 123".into(),
        };
        let (_, order_id) = match_line(&adapter, &orders, &line, opts()).unwrap().unwrap();
        assert_eq!(order_id, 123);
    }

    #[test]
    fn check_filename_gates_on_client_or_alias_not_order_keys() {
        let adapter = Adapter::for_kind(SourceKind::BankPerso);
        let orders = vec![order(123, vec!["123", "X.TXT", "X"])];
        let line = LogLine {
            file_name: "20250101_log.tsv".into(),
            text: "20250101 12:00:00\tINFO\tprocessed order 123".into(),
        };

        let gated = MatchOptions { check_filename: true, client: "VTB24", alias: "", ..opts() };
        assert!(match_line(&adapter, &orders, &line, gated).unwrap().is_none());

        let passing = MatchOptions { check_filename: true, client: "LOG", alias: "", ..opts() };
        let (_, order_id) = match_line(&adapter, &orders, &line, passing).unwrap().unwrap();
        assert_eq!(order_id, 123);
    }

    #[test]
    fn unmatched_line_joins_overstock() {
        let adapter = Adapter::for_kind(SourceKind::BankPerso);
        let orders = vec![order(1, vec!["1", "OTHER.TXT"])];
        let mut engine = CorrelationEngine::new();
        let line = LogLine {
            file_name: "X.TXT".into(),
            text: "20250101 12:00:00\tINFO\tprocessed order 999".into(),
        };
        let result = engine.process_line(&adapter, &orders, line, opts()).unwrap();
        assert!(result.is_none());
        assert_eq!(engine.overstock_len(), 1);
    }

    #[test]
    fn reclaim_matches_against_finalized_orders_and_removes_from_queue() {
        let adapter = Adapter::for_kind(SourceKind::BankPerso);
        let mut engine = CorrelationEngine::new();

        for _ in 0..10 {
            let line = LogLine {
                file_name: "999.TXT".into(),
                text: "20250101 12:00:00\tINFO\tprocessed order 999".into(),
            };
            engine.process_line(&adapter, &[], line, opts()).unwrap();
        }
        assert_eq!(engine.overstock_len(), 10);
        assert!(engine.needs_reclaim());

        let finalized = vec![order(999, vec!["999", "999.TXT"])];
        let matched = engine.reclaim(&adapter, &finalized, opts()).unwrap();
        assert_eq!(matched.len(), 10);
        assert_eq!(engine.overstock_len(), 0);
    }

    #[test]
    fn overstock_forcibly_emptied_past_high_watermark() {
        let adapter = Adapter::for_kind(SourceKind::BankPerso);
        let mut engine = CorrelationEngine::new();
        for i in 0..150 {
            let line = LogLine {
                file_name: format!("{i}.TXT"),
                text: "20250101 12:00:00\tINFO\tunmatchable line of text".into(),
            };
            engine.process_line(&adapter, &[], line, opts()).unwrap();
        }
        let _ = engine.reclaim(&adapter, &[], opts()).unwrap();
        assert_eq!(engine.overstock_len(), 0);
    }

    #[test]
    fn case_insensitive_flag_matches_differently_cased_keys() {
        let adapter = Adapter::for_kind(SourceKind::BankPerso);
        let orders = vec![order(123, vec!["x.txt"])];
        let line = LogLine {
            file_name: "irrelevant.log".into(),
            text: "20250101 12:00:00\tINFO\tprocessed order X.TXT".into(),
        };
        assert!(match_line(&adapter, &orders, &line, opts()).unwrap().is_none());
        let (_, order_id) = match_line(&adapter, &orders, &line, opts_ci()).unwrap().unwrap();
        assert_eq!(order_id, 123);
    }
}
