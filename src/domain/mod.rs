//! Domain types for the loyalty points engine.
//!
//! This module provides:
//! - Lossless numeric handling via the Decimal wrapper
//! - Domain primitives: TimeMs, Uid, GameId, OrderId, UploaderId
//! - The business calendar (fixed timezone, period windows)
//! - Order, ledger, and leaderboard records

pub mod calendar;
pub mod decimal;
pub mod leaderboard;
pub mod ledger;
pub mod order;
pub mod primitives;

pub use calendar::{format_day, parse_day, BusinessTz, PeriodKind, PeriodWindow};
pub use decimal::Decimal;
pub use leaderboard::{LeaderboardRow, SearchHit, WinnerDemotion, WinnerSnapshot};
pub use ledger::{LedgerEntry, LedgerReason};
pub use order::{NewOrderRecord, OrderPatch, OrderRecord, OrderRow, OrderStatus};
pub use primitives::{GameId, OrderId, TimeMs, Uid, UploaderId};
