// orderlog-watcher - core/audit_sink.rs
//
// The write-side counterpart to `core::order_cache::OrderSource`: the
// seam the consumer uses to reach the audit store, kept here so the
// consumer's unit tests exercise the real correlation/alarm decision
// path against a fake rather than a live database. `db::audit::Registrar`
// is the concrete, database-backed implementation.

use super::model::{LogKey, Message, MessageStatus, ModuleKey, SourceKey};
use crate::util::error::AuditError;

pub trait AuditSink {
    fn source_id(&mut self, key: SourceKey) -> Result<i64, AuditError>;
    fn module_id(&mut self, key: ModuleKey) -> Result<i64, AuditError>;
    fn log_id(&mut self, key: LogKey) -> Result<i64, AuditError>;
    fn register_message(&mut self, msg: &Message) -> Result<(Option<i64>, MessageStatus), AuditError>;
}
