// orderlog-watcher - db/audit.rs
//
// The audit-store client (component F): four stored-procedure call
// sites addressed by logical name, each returning at most one row of
// `(id, status_text)`. `Registrar` layers the source/module/log
// id-caching the spec calls for ("assigned stable integer ids on first
// registration") on top of the raw `AuditStore` calls, so a hot path
// re-submitting many lines from the same file does not round-trip to
// the database for every line.

use std::collections::HashMap;

use chrono::{NaiveDateTime, Utc};

use crate::core::audit_sink::AuditSink;
use crate::core::model::{LogKey, Message, MessageStatus, ModuleKey, SourceKey};
use crate::util::error::AuditError;

use super::client::{DbConnectionInfo, DbEngine, DbHealth};

pub struct AuditStore {
    engine: DbEngine,
}

impl AuditStore {
    pub fn new(info: DbConnectionInfo) -> Self {
        AuditStore {
            engine: DbEngine::new(info, "audit"),
        }
    }

    pub fn health(&self) -> DbHealth {
        self.engine.health()
    }

    pub fn close(&mut self) {
        self.engine.close();
    }

    /// `checkSource(root, ip, ctype) -> sourceId`.
    pub fn check_source(&mut self, root: &str, ip: &str, ctype: &str) -> Result<Option<i64>, AuditError> {
        let row = self.engine.query_one(
            "checkSource",
            "{CALL dbo.usp_CheckSource(@p_root = @P1, @p_ip = @P2, @p_ctype = @P3)}",
            &[&root, &ip, &ctype],
        )?;
        Ok(row.and_then(|r| r.get::<i64, _>(0)))
    }

    /// `checkModule(sourceId, name, path) -> moduleId`.
    pub fn check_module(&mut self, source_id: i64, name: &str, path: &str) -> Result<Option<i64>, AuditError> {
        let row = self.engine.query_one(
            "checkModule",
            "{CALL dbo.usp_CheckModule(@p_source = @P1, @p_name = @P2, @p_path = @P3)}",
            &[&source_id, &name, &path],
        )?;
        Ok(row.and_then(|r| r.get::<i64, _>(0)))
    }

    /// `checkLog(sourceId, moduleId, name) -> logId`.
    pub fn check_log(&mut self, source_id: i64, module_id: i64, name: &str) -> Result<Option<i64>, AuditError> {
        let row = self.engine.query_one(
            "checkLog",
            "{CALL dbo.usp_CheckLog(@p_source = @P1, @p_module = @P2, @p_name = @P3)}",
            &[&source_id, &module_id, &name],
        )?;
        Ok(row.and_then(|r| r.get::<i64, _>(0)))
    }

    /// `registerMessage(...) -> (messageId, statusText)`. A `None` row
    /// classifies as `MessageStatus::Null` per §4.E; the caller
    /// (consumer) force-reopens the connection on that outcome.
    pub fn register_message(&mut self, msg: &Message) -> Result<(Option<i64>, MessageStatus), AuditError> {
        let now: NaiveDateTime = Utc::now().naive_utc();
        let row = self.engine.query_one(
            "registerMessage",
            "{CALL dbo.usp_RegisterMessage(\
                @p_source = @P1, @p_module = @P2, @p_log = @P3, \
                @p_order = @P4, @p_batch = @P5, @p_client = @P6, \
                @p_filename = @P7, @p_code = @P8, @p_count = @P9, \
                @p_message = @P10, @p_event_date = @P11, @p_now = @P12)}",
            &[
                &msg.source_id,
                &msg.module_id,
                &msg.log_id,
                &msg.order_id,
                &msg.batch_id,
                &msg.client,
                &msg.file_name,
                &msg.code,
                &msg.count,
                &msg.message,
                &msg.event_date,
                &now,
            ],
        )?;

        match row {
            None => {
                self.engine.mark_errored();
                Ok((None, MessageStatus::Null))
            }
            Some(r) => {
                let id = r.get::<i64, _>(0);
                let status: Option<&str> = r.get(1);
                Ok((id, MessageStatus::classify(status)))
            }
        }
    }
}

/// Caches source/module/log ids once registered, so repeated messages
/// from the same file only look up, never re-register.
pub struct Registrar {
    store: AuditStore,
    sources: HashMap<SourceKey, i64>,
    modules: HashMap<ModuleKey, i64>,
    logs: HashMap<LogKey, i64>,
}

impl Registrar {
    pub fn new(store: AuditStore) -> Self {
        Registrar {
            store,
            sources: HashMap::new(),
            modules: HashMap::new(),
            logs: HashMap::new(),
        }
    }

    pub fn health(&self) -> DbHealth {
        self.store.health()
    }

    pub fn source_id(&mut self, key: SourceKey) -> Result<i64, AuditError> {
        if let Some(id) = self.sources.get(&key) {
            return Ok(*id);
        }
        let id = self
            .store
            .check_source(&key.root, &key.ip, &key.ctype)?
            .ok_or_else(|| AuditError::Call {
                procedure: "checkSource",
                reason: "no row returned".to_string(),
            })?;
        self.sources.insert(key, id);
        Ok(id)
    }

    pub fn module_id(&mut self, key: ModuleKey) -> Result<i64, AuditError> {
        if let Some(id) = self.modules.get(&key) {
            return Ok(*id);
        }
        let id = self
            .store
            .check_module(key.source_id, &key.name, &key.path)?
            .ok_or_else(|| AuditError::Call {
                procedure: "checkModule",
                reason: "no row returned".to_string(),
            })?;
        self.modules.insert(key, id);
        Ok(id)
    }

    pub fn log_id(&mut self, key: LogKey) -> Result<i64, AuditError> {
        if let Some(id) = self.logs.get(&key) {
            return Ok(*id);
        }
        let id = self
            .store
            .check_log(key.source_id, key.module_id, &key.file_name)?
            .ok_or_else(|| AuditError::Call {
                procedure: "checkLog",
                reason: "no row returned".to_string(),
            })?;
        self.logs.insert(key, id);
        Ok(id)
    }

    pub fn register_message(&mut self, msg: &Message) -> Result<(Option<i64>, MessageStatus), AuditError> {
        self.store.register_message(msg)
    }

    pub fn close(&mut self) {
        self.store.close();
    }
}

impl AuditSink for Registrar {
    fn source_id(&mut self, key: SourceKey) -> Result<i64, AuditError> {
        Registrar::source_id(self, key)
    }

    fn module_id(&mut self, key: ModuleKey) -> Result<i64, AuditError> {
        Registrar::module_id(self, key)
    }

    fn log_id(&mut self, key: LogKey) -> Result<i64, AuditError> {
        Registrar::log_id(self, key)
    }

    fn register_message(&mut self, msg: &Message) -> Result<(Option<i64>, MessageStatus), AuditError> {
        Registrar::register_message(self, msg)
    }
}
