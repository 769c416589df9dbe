//! SQLite storage.
//!
//! - `migrations`: connection options and the embedded schema
//! - `repo`: order and ledger reads, the ingestion write transaction,
//!   materialized leaderboards and winner snapshots

pub mod migrations;
pub mod repo;

pub use migrations::{init_db, schema_version};
pub use repo::{DayOrderStat, LedgerTx, Repository};
