// orderlog-watcher - db/operational.rs
//
// Read-only client for the operational database's `orders`, `batches`,
// and `orderstate-aliases` views (§4.D/§6). Implements
// `core::order_cache::OrderSource` so `core::order_cache` stays free of
// any concrete database dependency - this is the "second, parallel
// client of the same shape" §4.F describes, sharing the retry/health
// machinery in `DbEngine` but never writing.

use chrono::NaiveDate;

use crate::core::model::{BatchKey, RawOrder};
use crate::core::order_cache::OrderSource;
use crate::util::error::AuditError;

use super::client::{DbConnectionInfo, DbEngine, DbHealth};

pub struct OperationalStore {
    engine: DbEngine,
}

impl OperationalStore {
    pub fn new(info: DbConnectionInfo) -> Self {
        OperationalStore {
            engine: DbEngine::new(info, "operational"),
        }
    }

    pub fn health(&self) -> DbHealth {
        self.engine.health()
    }

    pub fn close(&mut self) {
        self.engine.close();
    }
}

impl OrderSource for OperationalStore {
    fn fetch_orders(
        &mut self,
        date_from: NaiveDate,
        floor: NaiveDate,
        finalized: bool,
        complete_statuses: &[i32],
    ) -> Result<Vec<RawOrder>, AuditError> {
        let statuses_csv = complete_statuses
            .iter()
            .map(i32::to_string)
            .collect::<Vec<_>>()
            .join(",");

        let rows = self.engine.query_many(
            "orders",
            "SELECT FileID, FName, BankName, FileStatus, RegisterDate \
             FROM [BankDB].[dbo].[WEB_OrdersStatus_vw] \
             WHERE @P1 = 1 \
                AND StatusDate <= @P2 \
                AND FileStatus IN (SELECT value FROM STRING_SPLIT(@P4, ',')) \
                OR (@P1 = 0 \
                    AND RegisterDate <= @P3 \
                    AND (StatusDate >= @P2 OR FileStatus NOT IN (SELECT value FROM STRING_SPLIT(@P4, ','))))",
            &[&finalized, &floor, &date_from, &statuses_csv],
        )?;

        Ok(rows
            .iter()
            .filter_map(|row| {
                let id: i64 = row.get(0)?;
                let name: &str = row.get(1)?;
                let client: &str = row.get(2)?;
                let status: i32 = row.get(3)?;
                let registered: NaiveDate = row.get(4)?;
                Some(RawOrder {
                    id,
                    name: name.to_string(),
                    client: client.to_string(),
                    status,
                    registered,
                })
            })
            .collect())
    }

    fn fetch_batch_keys(&mut self, order_id: i64) -> Result<Vec<BatchKey>, AuditError> {
        let rows = self.engine.query_many(
            "batches",
            "{CALL dbo.usp_GetBatchParams(@p_file_id = @P1)}",
            &[&order_id],
        )?;

        Ok(rows
            .iter()
            .filter_map(|row| {
                let tid: i64 = row.get(0)?;
                let work_order_no: Option<&str> = row.get(1);
                Some(BatchKey {
                    tid: tid.to_string(),
                    work_order_no: work_order_no.map(str::to_string),
                })
            })
            .collect())
    }

    fn fetch_aliases(&mut self, client: &str) -> Result<Vec<String>, AuditError> {
        let rows = self.engine.query_many(
            "orderstate-aliases",
            "SELECT Alias FROM [BankDB].[dbo].[DIC_ClientAliases_tb] WHERE CName = @P1",
            &[&client],
        )?;

        Ok(rows
            .iter()
            .filter_map(|row| row.get::<&str, _>(0).map(str::to_string))
            .collect())
    }
}
