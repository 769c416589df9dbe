//! Ranking of ledger rows into leaderboard rows.

use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::domain::{Decimal, GameId, LeaderboardRow, OrderId};

/// Minimal ledger row needed for aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerSlice {
    pub game_id: GameId,
    pub order_id: OrderId,
    pub points: i64,
    pub gmv: Decimal,
    /// The entry records the order being placed, in this order's own day.
    pub places_order: bool,
}

#[derive(Default)]
struct Totals {
    points: i64,
    gmv: Decimal,
    orders: BTreeSet<OrderId>,
}

/// Rank identities by total points.
///
/// Every entry counts toward points and GMV. An order counts toward
/// `total_orders` only through the entry that placed it, and only if it never
/// reached `cancelled`. Ties go to the smaller game id.
pub fn rank(
    entries: &[LedgerSlice],
    cancelled_orders: &HashSet<OrderId>,
    period_start: Option<NaiveDate>,
) -> Vec<LeaderboardRow> {
    let mut totals: BTreeMap<&GameId, Totals> = BTreeMap::new();

    for entry in entries {
        let t = totals.entry(&entry.game_id).or_default();
        t.points = t.points.saturating_add(entry.points);
        t.gmv += entry.gmv;
        if entry.places_order && !cancelled_orders.contains(&entry.order_id) {
            t.orders.insert(entry.order_id.clone());
        }
    }

    let mut rows: Vec<LeaderboardRow> = totals
        .into_iter()
        .map(|(game_id, t)| LeaderboardRow {
            rank: 0,
            game_id: game_id.clone(),
            total_points: t.points,
            total_orders: t.orders.len() as i64,
            total_gmv: t.gmv,
            period_start,
        })
        .collect();

    rows.sort_by(|a, b| {
        b.total_points
            .cmp(&a.total_points)
            .then_with(|| a.game_id.cmp(&b.game_id))
    });

    for (idx, row) in rows.iter_mut().enumerate() {
        row.rank = (idx + 1) as i64;
    }

    rows
}
