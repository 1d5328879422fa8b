// orderlog-watcher - db/mod.rs
//
// Database access layer (component F plus the read-only operational
// client §4.D relies on). Everything here is an explicit I/O seam: the
// schemas of the operational and audit databases are a non-goal
// (spec §1), only the call shape of their stored-procedure endpoints is
// in scope.

pub mod audit;
pub mod client;
pub mod operational;

pub use client::{DbConnectionInfo, DbEngine, DbHealth};
