//! Cancellation handling and the cascade onto dependent orders.
//!
//! A full cancellation removes an order from its buyer's history, which shifts
//! two things computed at award time:
//! - the repeat-order numbering of later orders on the same day
//! - the streak of every order in the consecutive-day run after it
//!
//! Both are compensated with new ledger entries; rows are adjusted in place so
//! order points keep matching the ledger.

use tracing::debug;

use super::ingest::{award_entries, IngestError};
use crate::db::LedgerTx;
use crate::domain::{
    BusinessTz, Decimal, LedgerEntry, LedgerReason, NewOrderRecord, OrderPatch, OrderRecord,
    OrderRow, OrderStatus, UploaderId,
};
use crate::engine::{PointsRules, REPEAT_ORDER_BONUS};

pub struct ReversalProcessor {
    rules: PointsRules,
    tz: BusinessTz,
}

impl ReversalProcessor {
    pub fn new(rules: PointsRules, tz: BusinessTz) -> Self {
        Self { rules, tz }
    }

    /// Apply one cancellation row. Returns the number of ledger entries written.
    pub async fn apply(
        &self,
        tx: &mut LedgerTx,
        batch_id: &str,
        uploader: &UploaderId,
        row: &OrderRow,
    ) -> Result<usize, IngestError> {
        let referential = |reason: &'static str| IngestError::Referential {
            row: row.row_number,
            order_id: row.order_id.to_string(),
            reason,
        };

        let original = tx
            .find_open_order(&row.order_id)
            .await?
            .ok_or_else(|| referential("no open order to cancel"))?;
        if tx.is_cancelled(&row.order_id).await? {
            return Err(referential("order is already cancelled"));
        }

        match row.status {
            OrderStatus::Cancelled => self.cancel(tx, batch_id, uploader, row, &original).await,
            OrderStatus::PartiallyCancelled => {
                self.cancel_partially(tx, batch_id, uploader, row, &original)
                    .await
            }
            OrderStatus::Active => Err(referential("not a cancellation")),
        }
    }

    async fn cancel(
        &self,
        tx: &mut LedgerTx,
        batch_id: &str,
        uploader: &UploaderId,
        row: &OrderRow,
        original: &OrderRecord,
    ) -> Result<usize, IngestError> {
        let net_points = tx.order_net_points(&row.order_id).await?;
        let net_gmv = tx.order_net_gmv(&row.order_id).await?;
        let award = self.rules.full_cancellation(net_points);

        tx.insert_order(
            batch_id,
            uploader,
            &NewOrderRecord {
                row: row.clone(),
                game_id: original.game_id.clone(),
                order_day: self.tz.local_day(row.timestamp_created),
                points: award.total(),
                gmv: Decimal::zero(),
                streak_count: 0,
                last_streak_date: original.last_streak_date,
                same_day_order_count: 0,
            },
        )
        .await?;

        let mut entries = award_entries(
            &award,
            -net_gmv,
            LedgerReason::OrderCancelled,
            row,
            &original.game_id,
            &self.tz,
        );

        // The cancelled order is now excluded from every "valid order" query.
        let mut patches = Vec::new();
        for sibling in tx
            .later_same_day_orders(&original.uid, original.order_day, original.same_day_order_count)
            .await?
        {
            patches.push(OrderPatch {
                id: sibling.id,
                points_delta: -REPEAT_ORDER_BONUS,
                streak_count: None,
                same_day_order_count: Some((sibling.same_day_order_count - 1).max(0)),
            });
            entries.push(self.compensation(
                &sibling,
                row,
                LedgerReason::RepeatOrderDeduction,
                -REPEAT_ORDER_BONUS,
            ));
        }

        if !tx
            .has_valid_order_on_day(&original.uid, original.order_day)
            .await?
        {
            for later in tx
                .valid_orders_after_day(&original.uid, original.order_day)
                .await?
            {
                if later.streak_count <= 1 {
                    break;
                }
                let new_streak = (later.streak_count - original.streak_count).max(1);
                // Only what was actually paid and not yet taken back.
                let bonus = tx.streak_bonus_held(&later.order_id).await?;
                patches.push(OrderPatch {
                    id: later.id,
                    points_delta: -bonus,
                    streak_count: Some(new_streak),
                    same_day_order_count: None,
                });
                if bonus > 0 {
                    entries.push(self.compensation(
                        &later,
                        row,
                        LedgerReason::StreakDeduction,
                        -bonus,
                    ));
                }
            }
        }

        for patch in &patches {
            tx.apply_patch(patch).await?;
        }

        debug!(
            order_id = %row.order_id,
            reversed_points = -net_points,
            adjusted_orders = patches.len(),
            "Order cancelled"
        );

        Ok(tx.append_ledger_entries(&entries).await?)
    }

    async fn cancel_partially(
        &self,
        tx: &mut LedgerTx,
        batch_id: &str,
        uploader: &UploaderId,
        row: &OrderRow,
        original: &OrderRecord,
    ) -> Result<usize, IngestError> {
        let net_points = tx.order_net_points(&row.order_id).await?;
        let net_gmv = tx.order_net_gmv(&row.order_id).await?;
        let new_gmv = row.gmv();

        let award = self
            .rules
            .partial_cancellation(original.gmv, new_gmv, net_points)
            .map_err(|source| IngestError::Computation {
                row: row.row_number,
                source,
            })?;

        tx.insert_order(
            batch_id,
            uploader,
            &NewOrderRecord {
                row: row.clone(),
                game_id: original.game_id.clone(),
                order_day: self.tz.local_day(row.timestamp_created),
                points: award.total(),
                gmv: new_gmv,
                streak_count: 0,
                last_streak_date: original.last_streak_date,
                same_day_order_count: 0,
            },
        )
        .await?;

        debug!(
            order_id = %row.order_id,
            delta = award.total(),
            "Order partially cancelled"
        );

        let entries = award_entries(
            &award,
            new_gmv - net_gmv,
            LedgerReason::PartialCancellation,
            row,
            &original.game_id,
            &self.tz,
        );
        Ok(tx.append_ledger_entries(&entries).await?)
    }

    /// Compensating entry against another order, caused by cancellation `cause`.
    fn compensation(
        &self,
        affected: &OrderRecord,
        cause: &OrderRow,
        reason: LedgerReason,
        points: i64,
    ) -> LedgerEntry {
        LedgerEntry {
            order_id: affected.order_id.clone(),
            game_id: affected.game_id.clone(),
            gmv: Decimal::zero(),
            points,
            reason,
            effective_at: cause.timestamp_created,
            effective_day: self.tz.local_day(cause.timestamp_created),
        }
    }
}
