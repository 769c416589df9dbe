//! Write transaction over orders, ledger entries and upload batches.

use chrono::NaiveDate;
use sqlx::{Sqlite, Transaction};
use sqlx::Row;
use std::collections::HashMap;

use super::{decimal_col, order_from_row, Repository, ORDER_COLUMNS};
use crate::domain::{
    format_day, Decimal, GameId, LedgerEntry, LedgerReason, NewOrderRecord, OrderId, OrderPatch,
    OrderRecord, OrderStatus, TimeMs, Uid, UploaderId,
};

/// Per-identity totals for one local day, over orders that were never cancelled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayOrderStat {
    pub game_id: GameId,
    pub gmv: Decimal,
    pub orders: i64,
    /// Latest order of the day; highlight awards attach here.
    pub latest_order: OrderRecord,
}

/// An open write transaction. Dropping it without [`LedgerTx::commit`] rolls back.
pub struct LedgerTx {
    tx: Transaction<'static, Sqlite>,
    created_at: TimeMs,
}

/// Filter for "valid" open rows: the order never reached `cancelled`.
const NOT_CANCELLED: &str = "NOT EXISTS (SELECT 1 FROM orders c \
    WHERE c.order_id = orders.order_id AND c.order_status = 'cancelled')";

impl Repository {
    /// Begin a write transaction stamped with `now` as the ledger creation time.
    pub async fn begin_ledger_tx(&self, now: TimeMs) -> Result<LedgerTx, sqlx::Error> {
        Ok(LedgerTx {
            tx: self.pool.begin().await?,
            created_at: now,
        })
    }
}

impl LedgerTx {
    // =========================================================================
    // Upload batches
    // =========================================================================

    /// Record the batch. Issued first so the database write lock is held for
    /// the whole read-modify-write sequence that follows.
    pub async fn insert_upload_batch(
        &mut self,
        batch_id: &str,
        uploader: &UploaderId,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO upload_batches (id, uploaded_by, created_at)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(batch_id)
        .bind(uploader.as_str())
        .bind(self.created_at.as_ms())
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    pub async fn finish_upload_batch(
        &mut self,
        batch_id: &str,
        new_orders: usize,
        cancellations: usize,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE upload_batches
            SET row_count = ?, new_orders = ?, cancellations = ?
            WHERE id = ?
            "#,
        )
        .bind((new_orders + cancellations) as i64)
        .bind(new_orders as i64)
        .bind(cancellations as i64)
        .bind(batch_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    /// True if this uploader already stored `(order_id, status)`.
    pub async fn order_status_exists(
        &mut self,
        order_id: &OrderId,
        status: OrderStatus,
        uploader: &UploaderId,
    ) -> Result<bool, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM orders
                WHERE order_id = ? AND order_status = ? AND uploaded_by = ?
            ) AS found
            "#,
        )
        .bind(order_id.as_str())
        .bind(status.as_str())
        .bind(uploader.as_str())
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(row.get::<bool, _>("found"))
    }

    // =========================================================================
    // Order lookups
    // =========================================================================

    /// Most recent row of any status for a buyer.
    pub async fn find_latest_order(&mut self, uid: &Uid) -> Result<Option<OrderRecord>, sqlx::Error> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM orders
            WHERE uid = ?
            ORDER BY timestamp_created DESC, id DESC
            LIMIT 1
            "#,
            ORDER_COLUMNS
        ))
        .bind(uid.as_str())
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.as_ref().map(order_from_row))
    }

    /// Latest valid open order of a buyer at or before `at`; its streak feeds the next order's.
    pub async fn find_streak_predecessor(
        &mut self,
        uid: &Uid,
        at: TimeMs,
    ) -> Result<Option<OrderRecord>, sqlx::Error> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM orders
            WHERE uid = ? AND order_status = 'active' AND timestamp_created <= ? AND {}
            ORDER BY timestamp_created DESC, id DESC
            LIMIT 1
            "#,
            ORDER_COLUMNS, NOT_CANCELLED
        ))
        .bind(uid.as_str())
        .bind(at.as_ms())
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.as_ref().map(order_from_row))
    }

    /// Valid open orders of a buyer on `day` placed at or before `at`.
    pub async fn count_same_day_orders(
        &mut self,
        uid: &Uid,
        day: NaiveDate,
        at: TimeMs,
    ) -> Result<i64, sqlx::Error> {
        let row = sqlx::query(&format!(
            r#"
            SELECT COUNT(*) AS n
            FROM orders
            WHERE uid = ? AND order_status = 'active' AND order_day = ?
              AND timestamp_created <= ? AND {}
            "#,
            NOT_CANCELLED
        ))
        .bind(uid.as_str())
        .bind(format_day(day))
        .bind(at.as_ms())
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(row.get("n"))
    }

    /// The open row of an order, if it has one.
    pub async fn find_open_order(
        &mut self,
        order_id: &OrderId,
    ) -> Result<Option<OrderRecord>, sqlx::Error> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM orders
            WHERE order_id = ? AND order_status = 'active'
            ORDER BY timestamp_created DESC, id DESC
            LIMIT 1
            "#,
            ORDER_COLUMNS
        ))
        .bind(order_id.as_str())
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.as_ref().map(order_from_row))
    }

    pub async fn is_cancelled(&mut self, order_id: &OrderId) -> Result<bool, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM orders WHERE order_id = ? AND order_status = 'cancelled'
            ) AS found
            "#,
        )
        .bind(order_id.as_str())
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(row.get::<bool, _>("found"))
    }

    /// Net points an order holds: the sum over all of its rows.
    pub async fn order_net_points(&mut self, order_id: &OrderId) -> Result<i64, sqlx::Error> {
        let row = sqlx::query(
            "SELECT COALESCE(SUM(points), 0) AS total FROM orders WHERE order_id = ?",
        )
        .bind(order_id.as_str())
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(row.get("total"))
    }

    /// Net GMV an order holds in the ledger, summed losslessly.
    pub async fn order_net_gmv(&mut self, order_id: &OrderId) -> Result<Decimal, sqlx::Error> {
        let rows = sqlx::query("SELECT gmv FROM ledger_entries WHERE order_id = ?")
            .bind(order_id.as_str())
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(rows.iter().map(|row| decimal_col(row, "gmv")).sum())
    }

    /// Valid open orders of a buyer on `day` numbered after `same_day_order_count`.
    pub async fn later_same_day_orders(
        &mut self,
        uid: &Uid,
        day: NaiveDate,
        same_day_order_count: i64,
    ) -> Result<Vec<OrderRecord>, sqlx::Error> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM orders
            WHERE uid = ? AND order_status = 'active' AND order_day = ?
              AND same_day_order_count > ? AND {}
            ORDER BY timestamp_created ASC, id ASC
            "#,
            ORDER_COLUMNS, NOT_CANCELLED
        ))
        .bind(uid.as_str())
        .bind(format_day(day))
        .bind(same_day_order_count)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows.iter().map(order_from_row).collect())
    }

    /// True if the buyer still has a valid open order on `day`.
    pub async fn has_valid_order_on_day(
        &mut self,
        uid: &Uid,
        day: NaiveDate,
    ) -> Result<bool, sqlx::Error> {
        let row = sqlx::query(&format!(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM orders
                WHERE uid = ? AND order_status = 'active' AND order_day = ? AND {}
            ) AS found
            "#,
            NOT_CANCELLED
        ))
        .bind(uid.as_str())
        .bind(format_day(day))
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(row.get::<bool, _>("found"))
    }

    /// Valid open orders of a buyer on days after `day`, chronologically.
    pub async fn valid_orders_after_day(
        &mut self,
        uid: &Uid,
        day: NaiveDate,
    ) -> Result<Vec<OrderRecord>, sqlx::Error> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM orders
            WHERE uid = ? AND order_status = 'active' AND order_day > ? AND {}
            ORDER BY timestamp_created ASC, id ASC
            "#,
            ORDER_COLUMNS, NOT_CANCELLED
        ))
        .bind(uid.as_str())
        .bind(format_day(day))
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows.iter().map(order_from_row).collect())
    }

    /// Streak bonus an order still holds: paid bonuses net of earlier deductions.
    pub async fn streak_bonus_held(&mut self, order_id: &OrderId) -> Result<i64, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(points), 0) AS held
            FROM ledger_entries
            WHERE order_id = ? AND reason IN (?, ?)
            "#,
        )
        .bind(order_id.as_str())
        .bind(LedgerReason::StreakBonus.code())
        .bind(LedgerReason::StreakDeduction.code())
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(row.get::<i64, _>("held").max(0))
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Insert one order observation. Returns its row id.
    pub async fn insert_order(
        &mut self,
        batch_id: &str,
        uploader: &UploaderId,
        record: &NewOrderRecord,
    ) -> Result<i64, sqlx::Error> {
        let row = &record.row;
        let result = sqlx::query(
            r#"
            INSERT INTO orders (
                batch_id, order_id, order_status, uid, game_id, name, total_price,
                timestamp_created, timestamp_updated, order_day, points, gmv,
                streak_count, last_streak_date, same_day_order_count, uploaded_by,
                category, buyer_app_id, seller_id, domain, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(batch_id)
        .bind(row.order_id.as_str())
        .bind(row.status.as_str())
        .bind(row.uid.as_str())
        .bind(record.game_id.as_str())
        .bind(row.name.as_deref())
        .bind(row.total_price.to_canonical_string())
        .bind(row.timestamp_created.as_ms())
        .bind(row.timestamp_updated.map(|t| t.as_ms()))
        .bind(format_day(record.order_day))
        .bind(record.points)
        .bind(record.gmv.to_canonical_string())
        .bind(record.streak_count)
        .bind(record.last_streak_date.map(format_day))
        .bind(record.same_day_order_count)
        .bind(uploader.as_str())
        .bind(row.category.as_deref())
        .bind(row.buyer_app_id.as_deref())
        .bind(row.seller_id.as_deref())
        .bind(row.domain.as_deref())
        .bind(self.created_at.as_ms())
        .execute(&mut *self.tx)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Apply an in-place adjustment and flag the row as updated.
    pub async fn apply_patch(&mut self, patch: &OrderPatch) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE orders
            SET points = points + ?,
                streak_count = COALESCE(?, streak_count),
                same_day_order_count = COALESCE(?, same_day_order_count),
                entry_updated = 1
            WHERE id = ?
            "#,
        )
        .bind(patch.points_delta)
        .bind(patch.streak_count)
        .bind(patch.same_day_order_count)
        .bind(patch.id)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    /// Append ledger entries. Entries that move nothing are skipped.
    ///
    /// Returns the number of entries written.
    pub async fn append_ledger_entries(&mut self, entries: &[LedgerEntry]) -> Result<usize, sqlx::Error> {
        let mut written = 0usize;
        for entry in entries.iter().filter(|e| !e.is_noop()) {
            sqlx::query(
                r#"
                INSERT INTO ledger_entries (
                    order_id, game_id, gmv, points, reason, description,
                    effective_at, effective_day, created_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(entry.order_id.as_str())
            .bind(entry.game_id.as_str())
            .bind(entry.gmv.to_canonical_string())
            .bind(entry.points)
            .bind(entry.reason.code())
            .bind(entry.reason.description())
            .bind(entry.effective_at.as_ms())
            .bind(format_day(entry.effective_day))
            .bind(self.created_at.as_ms())
            .execute(&mut *self.tx)
            .await?;
            written += 1;
        }
        Ok(written)
    }

    // =========================================================================
    // Daily highlights
    // =========================================================================

    /// Per-identity GMV and order counts for `day`, over orders never cancelled.
    ///
    /// GMV is the net ledger GMV of each order, so partial cancellations count.
    pub async fn day_order_stats(&mut self, day: NaiveDate) -> Result<Vec<DayOrderStat>, sqlx::Error> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM orders
            WHERE order_status = 'active' AND order_day = ? AND {}
            ORDER BY timestamp_created ASC, id ASC
            "#,
            ORDER_COLUMNS, NOT_CANCELLED
        ))
        .bind(format_day(day))
        .fetch_all(&mut *self.tx)
        .await?;
        let orders: Vec<OrderRecord> = rows.iter().map(order_from_row).collect();

        let gmv_rows = sqlx::query(
            r#"
            SELECT order_id, gmv
            FROM ledger_entries
            WHERE order_id IN (
                SELECT order_id FROM orders WHERE order_status = 'active' AND order_day = ?
            )
            "#,
        )
        .bind(format_day(day))
        .fetch_all(&mut *self.tx)
        .await?;
        let mut gmv_by_order: HashMap<String, Decimal> = HashMap::new();
        for row in &gmv_rows {
            *gmv_by_order.entry(row.get("order_id")).or_default() += decimal_col(row, "gmv");
        }

        let mut stats: Vec<DayOrderStat> = Vec::new();
        for order in orders {
            let gmv = gmv_by_order
                .get(order.order_id.as_str())
                .copied()
                .unwrap_or_default();
            match stats.iter_mut().find(|s| s.game_id == order.game_id) {
                Some(stat) => {
                    stat.gmv += gmv;
                    stat.orders += 1;
                    stat.latest_order = order;
                }
                None => stats.push(DayOrderStat {
                    game_id: order.game_id.clone(),
                    gmv,
                    orders: 1,
                    latest_order: order,
                }),
            }
        }
        Ok(stats)
    }

    /// True if a highlight award with `reason` already exists for `day`.
    pub async fn highlight_awarded(
        &mut self,
        day: NaiveDate,
        reason: LedgerReason,
    ) -> Result<bool, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM ledger_entries WHERE effective_day = ? AND reason = ?
            ) AS found
            "#,
        )
        .bind(format_day(day))
        .bind(reason.code())
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(row.get::<bool, _>("found"))
    }

    /// Set a highlight flag on every order an identity placed on `day`.
    pub async fn mark_highlight(
        &mut self,
        game_id: &GameId,
        day: NaiveDate,
        reason: LedgerReason,
    ) -> Result<(), sqlx::Error> {
        let column = match reason {
            LedgerReason::HighestOrdersForDay => "highest_orders_for_day",
            _ => "highest_gmv_for_day",
        };
        sqlx::query(&format!(
            "UPDATE orders SET {} = 1 WHERE game_id = ? AND order_day = ?",
            column
        ))
        .bind(game_id.as_str())
        .bind(format_day(day))
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    pub async fn commit(self) -> Result<(), sqlx::Error> {
        self.tx.commit().await
    }
}
