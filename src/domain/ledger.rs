//! Reward ledger entries: append-only point and GMV deltas with a reason.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::{Decimal, GameId, OrderId, TimeMs};

/// Why a ledger entry was written. Each points component has its own reason
/// so reversals can target a single component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerReason {
    BasePoints,
    GmvPoints,
    HighValueBonus,
    RepeatOrderBonus,
    StreakBonus,
    PartialCancellation,
    OrderCancelled,
    RepeatOrderDeduction,
    StreakDeduction,
    HighestGmvForDay,
    HighestOrdersForDay,
}

impl LedgerReason {
    /// Stable machine code stored alongside the human-readable reason.
    pub fn code(&self) -> &'static str {
        match self {
            LedgerReason::BasePoints => "base_points",
            LedgerReason::GmvPoints => "gmv_points",
            LedgerReason::HighValueBonus => "high_value_bonus",
            LedgerReason::RepeatOrderBonus => "repeat_order_bonus",
            LedgerReason::StreakBonus => "streak_bonus",
            LedgerReason::PartialCancellation => "partial_cancellation",
            LedgerReason::OrderCancelled => "order_cancelled",
            LedgerReason::RepeatOrderDeduction => "repeat_order_deduction",
            LedgerReason::StreakDeduction => "streak_deduction",
            LedgerReason::HighestGmvForDay => "highest_gmv_for_day",
            LedgerReason::HighestOrdersForDay => "highest_orders_for_day",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            LedgerReason::BasePoints => "base points",
            LedgerReason::GmvPoints => "gmv points",
            LedgerReason::HighValueBonus => "high value bonus",
            LedgerReason::RepeatOrderBonus => "repeat order bonus",
            LedgerReason::StreakBonus => "streak bonus",
            LedgerReason::PartialCancellation => "partial cancellation adjustment",
            LedgerReason::OrderCancelled => "order cancelled",
            LedgerReason::RepeatOrderDeduction => "repeat order deduction",
            LedgerReason::StreakDeduction => "streak deduction",
            LedgerReason::HighestGmvForDay => "highest gmv for day",
            LedgerReason::HighestOrdersForDay => "highest orders for day",
        }
    }

    /// Written once when an order is placed, dated on the order's own day.
    /// Compensations and cancellations are dated on the cancelling row instead.
    pub fn places_order(&self) -> bool {
        matches!(self, LedgerReason::BasePoints)
    }
}

impl FromStr for LedgerReason {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            LedgerReason::BasePoints,
            LedgerReason::GmvPoints,
            LedgerReason::HighValueBonus,
            LedgerReason::RepeatOrderBonus,
            LedgerReason::StreakBonus,
            LedgerReason::PartialCancellation,
            LedgerReason::OrderCancelled,
            LedgerReason::RepeatOrderDeduction,
            LedgerReason::StreakDeduction,
            LedgerReason::HighestGmvForDay,
            LedgerReason::HighestOrdersForDay,
        ]
        .into_iter()
        .find(|r| r.code() == s)
        .ok_or(())
    }
}

/// One append-only ledger row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    pub order_id: OrderId,
    pub game_id: GameId,
    pub gmv: Decimal,
    pub points: i64,
    pub reason: LedgerReason,
    /// Timestamp of the order row that caused this entry; drives period windows.
    pub effective_at: TimeMs,
    pub effective_day: NaiveDate,
}

impl LedgerEntry {
    /// An entry that moves neither points nor GMV is never written.
    pub fn is_noop(&self) -> bool {
        self.points == 0 && self.gmv.is_zero()
    }
}
