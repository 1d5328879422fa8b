// orderlog-watcher - core/order_cache.rs
//
// Component D: the active-order cache. Holds every order the service has
// ever seen from the operational database, keyed by its stable integer
// id, and never drops one on refresh — a `refresh` that does not return
// an order marks it `inactive` instead, so a late-arriving log line can
// still be matched during its retention window (see core::model::Order).
//
// The cache itself performs no I/O: it is handed rows by anything
// implementing `OrderSource`, the seam the redesign notes call for in
// place of a mutable global orders map. `db::operational::OperationalStore`
// is the real, database-backed implementation; tests use a small fake.

use std::collections::HashMap;

use chrono::NaiveDate;

use super::model::{BatchKey, KeyState, Order, RawOrder};
use super::pathutil::stem_without_extension;
use super::time::day_delta;
use crate::util::error::AuditError;

/// The read-only seam the order cache uses to reach the operational
/// database. Kept in `core` (not `db`) so `core::order_cache` stays free
/// of any concrete I/O dependency; `db::operational::OperationalStore`
/// implements this for the real service, tests implement it directly.
pub trait OrderSource {
    /// Returns every order whose status-date/registration falls inside
    /// the window described in §4.D, anchored at `floor` and `date_from`.
    /// `finalized` selects the completed-orders view used by overstock
    /// reclaim; the predicate itself is applied by the underlying view,
    /// this cache only merges what comes back.
    fn fetch_orders(
        &mut self,
        date_from: NaiveDate,
        floor: NaiveDate,
        finalized: bool,
        complete_statuses: &[i32],
    ) -> Result<Vec<RawOrder>, AuditError>;

    /// Batch TIDs / work-order numbers for one order, fetched once and
    /// cached by the caller (`derive_keys`).
    fn fetch_batch_keys(&mut self, order_id: i64) -> Result<Vec<BatchKey>, AuditError>;

    /// Client aliases, used only by adapters that opt into alias
    /// matching (SDC, Exchange).
    fn fetch_aliases(&mut self, client: &str) -> Result<Vec<String>, AuditError>;
}

/// Owns the in-memory order map. Mutated only by the consumer and
/// emitter (never concurrently, per §5 - the emitter runs to completion
/// before the consumer starts).
#[derive(Debug, Default)]
pub struct OrderCache {
    orders: HashMap<i64, Order>,
}

fn base_keys(order: &Order) -> Vec<String> {
    vec![
        order.id.to_string(),
        order.name.clone(),
        stem_without_extension(&order.name).to_string(),
    ]
}

impl OrderCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn get(&self, id: i64) -> Option<&Order> {
        self.orders.get(&id)
    }

    /// Queries `source` for the window `(date_from + delta, now)` and
    /// merges the result: new orders are added with `PendingKeys`;
    /// existing orders whose status code changed lose their
    /// `KeysReady` state (so `derive_keys` re-fetches batch keys); every
    /// cached order absent from this query is marked `inactive`.
    pub fn refresh(
        &mut self,
        source: &mut dyn OrderSource,
        date_from: NaiveDate,
        now: NaiveDate,
        delta_days: i64,
        finalized: bool,
        complete_statuses: &[i32],
    ) -> Result<(), AuditError> {
        let floor = day_delta(date_from, delta_days);
        let rows = source.fetch_orders(date_from, floor, finalized, complete_statuses)?;

        let mut seen = std::collections::HashSet::with_capacity(rows.len());
        for row in rows {
            seen.insert(row.id);
            match self.orders.get_mut(&row.id) {
                Some(existing) => {
                    if existing.status != row.status {
                        existing.key_state = KeyState::PendingKeys;
                    }
                    existing.status = row.status;
                    existing.name = row.name;
                    existing.client = row.client;
                    existing.registered = row.registered;
                    existing.inactive = false;
                }
                None => {
                    let mut order = Order {
                        id: row.id,
                        name: row.name,
                        client: row.client,
                        status: row.status,
                        registered: row.registered,
                        keys: Vec::new(),
                        aliases: Vec::new(),
                        key_state: KeyState::PendingKeys,
                        inactive: false,
                    };
                    order.keys = base_keys(&order);
                    self.orders.insert(order.id, order);
                }
            }
        }

        for (id, order) in self.orders.iter_mut() {
            if !seen.contains(id) {
                order.inactive = true;
            }
        }

        let _ = now; // retained in the signature: callers derive `floor` relative to `now` upstream
        Ok(())
    }

    /// Non-inactive order ids, in descending file-name lexicographic
    /// order (stable), matching the original iteration order the
    /// correlation engine relies on for "first order wins".
    pub fn active_keys(&self) -> Vec<i64> {
        self.active_orders().iter().map(|o| o.id).collect()
    }

    /// Clones of the currently-active orders, sorted descending by file
    /// name. Correlation takes a borrowed slice of owned clones rather
    /// than holding a cache borrow across the (potentially long) match
    /// loop, matching the "swap two owned maps" redesign note for the
    /// overstock-reclaim path.
    pub fn active_orders(&self) -> Vec<Order> {
        let mut v: Vec<Order> = self.orders.values().filter(|o| !o.inactive).cloned().collect();
        v.sort_by(|a, b| b.name.cmp(&a.name));
        v
    }

    /// Orders considered completed under `complete_statuses`, used by
    /// the overstock reclaim sweep against the "finalized" view.
    pub fn finalized_orders(&self, complete_statuses: &[i32]) -> Vec<Order> {
        let mut v: Vec<Order> = self
            .orders
            .values()
            .filter(|o| o.is_completed(complete_statuses))
            .cloned()
            .collect();
        v.sort_by(|a, b| b.name.cmp(&a.name));
        v
    }

    /// Populates `keys`/`aliases` for one order from the operational
    /// database, once per status change (`key_state != KeysReady`).
    pub fn derive_keys(
        &mut self,
        source: &mut dyn OrderSource,
        order_id: i64,
        uses_aliases: bool,
    ) -> Result<(), AuditError> {
        let Some(order) = self.orders.get(&order_id) else {
            return Ok(());
        };
        if order.key_state == KeyState::KeysReady {
            return Ok(());
        }
        let client = order.client.clone();

        let batch_keys = source.fetch_batch_keys(order_id)?;
        let aliases = if uses_aliases {
            source.fetch_aliases(&client)?
        } else {
            Vec::new()
        };

        let order = self.orders.get_mut(&order_id).expect("checked above");
        let mut keys = base_keys(order);
        for bk in batch_keys {
            keys.push(bk.tid);
            if let Some(wo) = bk.work_order_no {
                keys.push(wo);
            }
        }
        order.keys = keys;
        order.aliases = aliases;
        order.key_state = KeyState::KeysReady;
        Ok(())
    }
}
