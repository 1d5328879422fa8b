// orderlog-watcher - core/parser.rs
//
// Turns one decoded raw line into a `LogItem`, via the adapter's column
// layout (core::adapter). Order correlation (which order, if any, this
// item belongs to) happens afterwards in core::correlate; this module
// only produces the unmatched item or an AdapterError.

use super::adapter::Adapter;
use super::model::LogItem;
use crate::util::error::AdapterError;

/// Parses one already-decoded line into a `LogItem` with no order
/// decoration. Returns `Err` for lines the adapter's `lineIsValid`
/// predicate rejects (too few columns, short message, unparseable
/// timestamp).
pub fn parse_line(adapter: &Adapter, file_name: &str, line: &str) -> Result<LogItem, AdapterError> {
    let (timestamp, module, module_count, severity, message) = adapter.parse_line(file_name, line)?;

    Ok(LogItem {
        timestamp,
        severity: severity.to_string(),
        message: message.to_string(),
        module,
        module_count,
        order_id: None,
        order_name: None,
        client: None,
    })
}

/// True when this item's severity is in the adapter's alarmable set.
pub fn is_alarmable(adapter: &Adapter, item: &LogItem) -> bool {
    adapter
        .alarm_severities
        .iter()
        .any(|s| s.eq_ignore_ascii_case(&item.severity))
}
