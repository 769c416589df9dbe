//! Order rows as uploaded (validated) and as persisted.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::{Decimal, GameId, OrderId, TimeMs, Uid, UploaderId};

/// Lifecycle status of one order observation.
///
/// Legacy `created` and `active` rows are the same open state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Active,
    PartiallyCancelled,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Active => "active",
            OrderStatus::PartiallyCancelled => "partially_cancelled",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_cancellation(&self) -> bool {
        !matches!(self, OrderStatus::Active)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "active" | "created" | "open" => Ok(OrderStatus::Active),
            "partially_cancelled" | "partially_canceled" => Ok(OrderStatus::PartiallyCancelled),
            "cancelled" | "canceled" => Ok(OrderStatus::Cancelled),
            _ => Err(()),
        }
    }
}

/// One uploaded row after normalization and validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRow {
    /// 1-based position of the row in its batch.
    pub row_number: usize,
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub uid: Uid,
    pub total_price: Decimal,
    pub timestamp_created: TimeMs,
    pub timestamp_updated: Option<TimeMs>,
    pub name: Option<String>,
    pub category: Option<String>,
    pub buyer_app_id: Option<String>,
    pub seller_id: Option<String>,
    pub domain: Option<String>,
}

impl OrderRow {
    /// Order value used for points.
    pub fn gmv(&self) -> Decimal {
        self.total_price
    }
}

/// A persisted order observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderRecord {
    pub id: i64,
    pub batch_id: String,
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub uid: Uid,
    pub game_id: GameId,
    pub total_price: Decimal,
    pub timestamp_created: TimeMs,
    pub timestamp_updated: Option<TimeMs>,
    pub order_day: NaiveDate,
    /// Signed points this row contributed.
    pub points: i64,
    pub gmv: Decimal,
    pub streak_count: i64,
    pub last_streak_date: Option<NaiveDate>,
    pub same_day_order_count: i64,
    pub highest_gmv_for_day: bool,
    pub highest_orders_for_day: bool,
    pub uploaded_by: UploaderId,
    /// Set once a later cancellation has adjusted this row.
    pub entry_updated: bool,
}

/// Insert payload for one order observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderRecord {
    pub row: OrderRow,
    pub game_id: GameId,
    pub order_day: NaiveDate,
    pub points: i64,
    pub gmv: Decimal,
    pub streak_count: i64,
    pub last_streak_date: Option<NaiveDate>,
    pub same_day_order_count: i64,
}

/// In-place adjustment applied to an existing order row by a cascading reversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderPatch {
    pub id: i64,
    pub points_delta: i64,
    pub streak_count: Option<i64>,
    pub same_day_order_count: Option<i64>,
}
