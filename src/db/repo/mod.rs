//! Repository layer for database operations.
//!
//! This module provides the `Repository` struct for all database operations.
//! Methods are organized across submodules by concern:
//! - `ledger_tx.rs` - the write transaction used by ingestion and daily highlights
//! - `leaderboard.rs` - materialized leaderboard rows and winner snapshots

mod leaderboard;
mod ledger_tx;

pub use ledger_tx::{DayOrderStat, LedgerTx};

use crate::domain::{
    parse_day, Decimal, GameId, LedgerEntry, LedgerReason, OrderId, OrderRecord, OrderStatus,
    PeriodWindow, TimeMs, Uid, UploaderId,
};
use crate::engine::LedgerSlice;
use chrono::NaiveDate;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use std::collections::HashSet;
use std::str::FromStr;
use tracing::warn;

pub(crate) const ORDER_COLUMNS: &str = "id, batch_id, order_id, order_status, uid, game_id, \
    total_price, timestamp_created, timestamp_updated, order_day, points, gmv, streak_count, \
    last_streak_date, same_day_order_count, highest_gmv_for_day, highest_orders_for_day, \
    uploaded_by, entry_updated";

/// Repository for database operations.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // =========================================================================
    // Ledger reads
    // =========================================================================

    /// Ledger rows whose effective day falls inside `window`.
    ///
    /// GMV is summed later in Rust; SQLite's SUM would go through REAL.
    pub async fn ledger_slices(&self, window: &PeriodWindow) -> Result<Vec<LedgerSlice>, sqlx::Error> {
        let (from, to) = window.day_bounds();
        let rows = sqlx::query(
            r#"
            SELECT game_id, order_id, points, gmv, reason
            FROM ledger_entries
            WHERE effective_day >= ? AND effective_day < ?
            ORDER BY id ASC
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(slice_from_row).collect())
    }

    /// Ledger rows for game ids starting with `prefix` inside `window`.
    ///
    /// `prefix` must already be checked to be hex; it is used in a LIKE pattern.
    pub async fn ledger_slices_for_prefix(
        &self,
        prefix: &str,
        window: &PeriodWindow,
    ) -> Result<Vec<LedgerSlice>, sqlx::Error> {
        let (from, to) = window.day_bounds();
        let rows = sqlx::query(
            r#"
            SELECT game_id, order_id, points, gmv, reason
            FROM ledger_entries
            WHERE game_id LIKE ? AND effective_day >= ? AND effective_day < ?
            ORDER BY id ASC
            "#,
        )
        .bind(format!("{}%", prefix.to_ascii_lowercase()))
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(slice_from_row).collect())
    }

    /// Every ledger entry written for one order, oldest first.
    pub async fn ledger_entries_for_order(
        &self,
        order_id: &OrderId,
    ) -> Result<Vec<LedgerEntry>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT order_id, game_id, gmv, points, reason, effective_at, effective_day
            FROM ledger_entries
            WHERE order_id = ?
            ORDER BY id ASC
            "#,
        )
        .bind(order_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .filter_map(|row| {
                let reason: String = row.get("reason");
                let Ok(reason) = LedgerReason::from_str(&reason) else {
                    warn!(reason = %reason, "Skipping ledger entry with unknown reason");
                    return None;
                };
                Some(LedgerEntry {
                    order_id: OrderId::new(row.get("order_id")),
                    game_id: GameId::new(row.get("game_id")),
                    gmv: decimal_col(row, "gmv"),
                    points: row.get("points"),
                    reason,
                    effective_at: TimeMs::new(row.get("effective_at")),
                    effective_day: day_col(row, "effective_day").unwrap_or_default(),
                })
            })
            .collect())
    }

    /// Sum of ledger points for one identity.
    pub async fn ledger_points_for_game(&self, game_id: &GameId) -> Result<i64, sqlx::Error> {
        let row = sqlx::query(
            "SELECT COALESCE(SUM(points), 0) AS total FROM ledger_entries WHERE game_id = ?",
        )
        .bind(game_id.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get("total"))
    }

    // =========================================================================
    // Order reads
    // =========================================================================

    /// Order ids that have a `cancelled` row anywhere in their history.
    pub async fn cancelled_order_ids(&self) -> Result<HashSet<OrderId>, sqlx::Error> {
        let rows = sqlx::query("SELECT DISTINCT order_id FROM orders WHERE order_status = 'cancelled'")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(|row| OrderId::new(row.get("order_id")))
            .collect())
    }

    /// Sum of the `points` column over an identity's order rows.
    pub async fn order_points_for_game(&self, game_id: &GameId) -> Result<i64, sqlx::Error> {
        let row =
            sqlx::query("SELECT COALESCE(SUM(points), 0) AS total FROM orders WHERE game_id = ?")
                .bind(game_id.as_str())
                .fetch_one(&self.pool)
                .await?;
        Ok(row.get("total"))
    }

    /// All rows recorded for an order id, oldest first.
    pub async fn orders_by_order_id(&self, order_id: &OrderId) -> Result<Vec<OrderRecord>, sqlx::Error> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM orders WHERE order_id = ? ORDER BY id ASC",
            ORDER_COLUMNS
        ))
        .bind(order_id.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(order_from_row).collect())
    }

    /// One page of an uploader's order rows, newest first, with the total row count.
    pub async fn list_uploads(
        &self,
        uploader: &UploaderId,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<OrderRecord>, i64), sqlx::Error> {
        let offset = i64::from(page.saturating_sub(1)) * i64::from(limit);
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM orders
            WHERE uploaded_by = ?
            ORDER BY timestamp_created DESC, id DESC
            LIMIT ? OFFSET ?
            "#,
            ORDER_COLUMNS
        ))
        .bind(uploader.as_str())
        .bind(i64::from(limit))
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query("SELECT COUNT(*) AS n FROM orders WHERE uploaded_by = ?")
            .bind(uploader.as_str())
            .fetch_one(&self.pool)
            .await?
            .get("n");

        Ok((rows.iter().map(order_from_row).collect(), total))
    }

    /// Every order row of an uploader, newest first.
    pub async fn all_uploads(&self, uploader: &UploaderId) -> Result<Vec<OrderRecord>, sqlx::Error> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM orders WHERE uploaded_by = ? ORDER BY timestamp_created DESC, id DESC",
            ORDER_COLUMNS
        ))
        .bind(uploader.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(order_from_row).collect())
    }

    pub async fn count_upload_batches(&self) -> Result<i64, sqlx::Error> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM upload_batches")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("n"))
    }
}

fn slice_from_row(row: &SqliteRow) -> LedgerSlice {
    LedgerSlice {
        game_id: GameId::new(row.get("game_id")),
        order_id: OrderId::new(row.get("order_id")),
        points: row.get("points"),
        gmv: decimal_col(row, "gmv"),
        places_order: LedgerReason::from_str(&row.get::<String, _>("reason"))
            .map(|reason| reason.places_order())
            .unwrap_or(false),
    }
}

pub(crate) fn decimal_col(row: &SqliteRow, column: &str) -> Decimal {
    let raw: String = row.get(column);
    Decimal::from_str(&raw).unwrap_or_else(|e| {
        warn!(column = column, value = %raw, error = %e, "Failed to parse decimal column, using default");
        Decimal::default()
    })
}

pub(crate) fn day_col(row: &SqliteRow, column: &str) -> Option<NaiveDate> {
    let raw: Option<String> = row.get(column);
    raw.as_deref().and_then(parse_day)
}

pub(crate) fn order_from_row(row: &SqliteRow) -> OrderRecord {
    let status_raw: String = row.get("order_status");
    let status = OrderStatus::from_str(&status_raw).unwrap_or_else(|_| {
        warn!(status = %status_raw, "Unknown stored order status, treating as active");
        OrderStatus::Active
    });

    OrderRecord {
        id: row.get("id"),
        batch_id: row.get("batch_id"),
        order_id: OrderId::new(row.get("order_id")),
        status,
        uid: Uid::new(row.get("uid")),
        game_id: GameId::new(row.get("game_id")),
        total_price: decimal_col(row, "total_price"),
        timestamp_created: TimeMs::new(row.get("timestamp_created")),
        timestamp_updated: row
            .get::<Option<i64>, _>("timestamp_updated")
            .map(TimeMs::new),
        order_day: day_col(row, "order_day").unwrap_or_default(),
        points: row.get("points"),
        gmv: decimal_col(row, "gmv"),
        streak_count: row.get("streak_count"),
        last_streak_date: day_col(row, "last_streak_date"),
        same_day_order_count: row.get("same_day_order_count"),
        highest_gmv_for_day: row.get("highest_gmv_for_day"),
        highest_orders_for_day: row.get("highest_orders_for_day"),
        uploaded_by: UploaderId::new(row.get("uploaded_by")),
        entry_updated: row.get("entry_updated"),
    }
}
