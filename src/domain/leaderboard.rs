//! Derived leaderboard rows and archived winners.

use chrono::NaiveDate;
use serde::Serialize;

use super::{Decimal, GameId, PeriodKind, TimeMs};

/// One ranked identity within a period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardRow {
    pub rank: i64,
    pub game_id: GameId,
    pub total_points: i64,
    pub total_orders: i64,
    pub total_gmv: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period_start: Option<NaiveDate>,
}

/// Immutable record of a top-N finish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WinnerSnapshot {
    pub game_id: GameId,
    pub points: i64,
    pub position: i64,
    pub period_type: PeriodKind,
    pub period_start: NaiveDate,
    pub winning_date: TimeMs,
}

/// An archived winner who no longer holds their position once later
/// cancellations are counted. Reported only; the snapshot stays as archived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WinnerDemotion {
    pub game_id: GameId,
    pub period_type: PeriodKind,
    pub period_start: NaiveDate,
    pub archived_position: i64,
    pub archived_points: i64,
    /// `None` when the identity has dropped out of the ranking entirely.
    pub current_position: Option<i64>,
    pub current_points: i64,
}

/// Result of a game id prefix lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub game_id: GameId,
    pub period: PeriodKind,
    pub total_points: i64,
}
