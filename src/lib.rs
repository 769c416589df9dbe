pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod orchestration;

pub use config::Config;
pub use db::{init_db, Repository};
pub use domain::{
    BusinessTz, Decimal, GameId, LedgerReason, OrderId, OrderStatus, PeriodKind, TimeMs, Uid,
    UploaderId,
};
pub use error::AppError;
pub use ingest::{parse_batch, RawBatch, RawRow, ValidationError};
pub use orchestration::{BatchIngestor, IngestError, IngestOutcome, Scheduler};
