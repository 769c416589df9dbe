//! Daily highlight awards: top GMV and top order count of the previous day.

use chrono::NaiveDate;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, info};

use crate::db::{DayOrderStat, Repository};
use crate::domain::{BusinessTz, Decimal, LedgerEntry, LedgerReason, OrderPatch, TimeMs};

pub const HIGHLIGHT_POINTS: i64 = 100;

pub struct DailyHighlights {
    repo: Arc<Repository>,
    tz: BusinessTz,
}

impl DailyHighlights {
    pub fn new(repo: Arc<Repository>, tz: BusinessTz) -> Self {
        Self { repo, tz }
    }

    /// Award the previous local day's highlights. Returns the number of awards made.
    pub async fn award_previous_day(&self, now: TimeMs) -> Result<usize, sqlx::Error> {
        match self.tz.local_day(now).pred_opt() {
            Some(day) => self.award_day(day, now).await,
            None => Ok(0),
        }
    }

    /// Award highlights for `day`. Each award is made at most once per day.
    pub async fn award_day(&self, day: NaiveDate, now: TimeMs) -> Result<usize, sqlx::Error> {
        let mut tx = self.repo.begin_ledger_tx(now).await?;
        let stats = tx.day_order_stats(day).await?;

        let picks = [
            (
                LedgerReason::HighestGmvForDay,
                pick(&stats, |a, b| a.gmv.cmp(&b.gmv)),
            ),
            (
                LedgerReason::HighestOrdersForDay,
                pick(&stats, |a, b| a.orders.cmp(&b.orders)),
            ),
        ];

        let mut awarded = 0usize;
        for (reason, winner) in picks {
            let Some(winner) = winner else {
                continue;
            };
            if tx.highlight_awarded(day, reason).await? {
                debug!(day = %day, reason = reason.code(), "Highlight already awarded");
                continue;
            }

            let order = &winner.latest_order;
            tx.apply_patch(&OrderPatch {
                id: order.id,
                points_delta: HIGHLIGHT_POINTS,
                streak_count: None,
                same_day_order_count: None,
            })
            .await?;
            tx.append_ledger_entries(&[LedgerEntry {
                order_id: order.order_id.clone(),
                game_id: winner.game_id.clone(),
                gmv: Decimal::zero(),
                points: HIGHLIGHT_POINTS,
                reason,
                effective_at: order.timestamp_created,
                effective_day: day,
            }])
            .await?;
            tx.mark_highlight(&winner.game_id, day, reason).await?;

            info!(day = %day, game_id = %winner.game_id, reason = reason.code(), "Highlight awarded");
            awarded += 1;
        }

        tx.commit().await?;
        Ok(awarded)
    }
}

/// Best stat by `cmp`; ties go to the smaller game id.
fn pick<F>(stats: &[DayOrderStat], cmp: F) -> Option<&DayOrderStat>
where
    F: Fn(&DayOrderStat, &DayOrderStat) -> Ordering,
{
    stats
        .iter()
        .max_by(|a, b| cmp(a, b).then_with(|| b.game_id.cmp(&a.game_id)))
}
