//! Points rules: pure award computation for new orders and cancellations.

use thiserror::Error;

use crate::domain::{Decimal, LedgerReason};

pub const BASE_POINTS: i64 = 10;
pub const GMV_POINTS_DIVISOR: i64 = 10;
pub const HIGH_VALUE_THRESHOLD: i64 = 1000;
pub const HIGH_VALUE_BONUS: i64 = 50;
/// Points per earlier same-day order.
pub const REPEAT_ORDER_BONUS: i64 = 5;

/// Streak length to bonus. Exact match only.
pub const STREAK_BONUSES: [(i64, i64); 6] =
    [(3, 20), (7, 30), (10, 100), (14, 200), (21, 500), (28, 700)];

/// Bonus for a streak of exactly `streak_count` days, or 0.
pub fn streak_bonus(streak_count: i64) -> i64 {
    STREAK_BONUSES
        .iter()
        .find(|(days, _)| *days == streak_count)
        .map(|(_, bonus)| *bonus)
        .unwrap_or(0)
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ComputationError {
    #[error("points for gmv {0} do not fit in an integer")]
    GmvOutOfRange(String),
    #[error("points overflow while adding {0}")]
    Overflow(&'static str),
}

/// One ledger-worthy slice of an award.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointsComponent {
    pub reason: LedgerReason,
    pub points: i64,
}

/// A points award split into its components. Zero components are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PointsAward {
    components: Vec<PointsComponent>,
}

impl PointsAward {
    fn push(&mut self, reason: LedgerReason, points: i64) {
        if points != 0 {
            self.components.push(PointsComponent { reason, points });
        }
    }

    pub fn components(&self) -> &[PointsComponent] {
        &self.components
    }

    pub fn total(&self) -> i64 {
        self.components.iter().map(|c| c.points).sum()
    }

    pub fn points_for(&self, reason: LedgerReason) -> i64 {
        self.components
            .iter()
            .filter(|c| c.reason == reason)
            .map(|c| c.points)
            .sum()
    }
}

/// Rule engine. Stateless apart from the partial-cancellation policy flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointsRules {
    /// Re-add the high value bonus when a partial cancellation drops an order
    /// from above the threshold to at or below it.
    pub preserve_high_value_on_partial: bool,
}

impl Default for PointsRules {
    fn default() -> Self {
        Self {
            preserve_high_value_on_partial: true,
        }
    }
}

impl PointsRules {
    pub fn new(preserve_high_value_on_partial: bool) -> Self {
        Self {
            preserve_high_value_on_partial,
        }
    }

    /// Award for a new open order.
    ///
    /// `same_day_order_count` counts earlier non-cancelled orders of the same
    /// buyer on the same day. The streak bonus is only paid on the first order
    /// of a day so one streak day is never rewarded twice.
    pub fn new_order(
        &self,
        gmv: Decimal,
        streak_count: i64,
        same_day_order_count: i64,
    ) -> Result<PointsAward, ComputationError> {
        let mut award = value_award(gmv)?;

        let repeat = same_day_order_count
            .max(0)
            .checked_mul(REPEAT_ORDER_BONUS)
            .ok_or(ComputationError::Overflow("repeat order bonus"))?;
        award.push(LedgerReason::RepeatOrderBonus, repeat);

        if same_day_order_count == 0 {
            award.push(LedgerReason::StreakBonus, streak_bonus(streak_count));
        }

        Ok(award)
    }

    /// Delta for a partial cancellation.
    ///
    /// The order is re-evaluated at `new_gmv` with no streak and no repeat
    /// component; the result is diffed against `current_points`, the net
    /// points the order holds right now.
    pub fn partial_cancellation(
        &self,
        original_gmv: Decimal,
        new_gmv: Decimal,
        current_points: i64,
    ) -> Result<PointsAward, ComputationError> {
        let reevaluated = value_award(new_gmv)?.total();
        let mut award = PointsAward::default();
        award.push(
            LedgerReason::PartialCancellation,
            reevaluated
                .checked_sub(current_points)
                .ok_or(ComputationError::Overflow("partial cancellation"))?,
        );

        let threshold = Decimal::from_i64(HIGH_VALUE_THRESHOLD);
        if self.preserve_high_value_on_partial
            && original_gmv > threshold
            && new_gmv.non_negative() <= threshold
        {
            award.push(LedgerReason::HighValueBonus, HIGH_VALUE_BONUS);
        }

        Ok(award)
    }

    /// Delta for a full cancellation: everything the order currently holds.
    pub fn full_cancellation(&self, current_points: i64) -> PointsAward {
        let mut award = PointsAward::default();
        award.push(LedgerReason::OrderCancelled, -current_points);
        award
    }
}

/// Base, GMV and high value components. Negative GMV counts as zero.
fn value_award(gmv: Decimal) -> Result<PointsAward, ComputationError> {
    let gmv = gmv.non_negative();
    let gmv_points = gmv
        .floor_div(GMV_POINTS_DIVISOR)
        .ok_or_else(|| ComputationError::GmvOutOfRange(gmv.to_canonical_string()))?;

    let mut award = PointsAward::default();
    award.push(LedgerReason::BasePoints, BASE_POINTS);
    award.push(LedgerReason::GmvPoints, gmv_points);
    if gmv > Decimal::from_i64(HIGH_VALUE_THRESHOLD) {
        award.push(LedgerReason::HighValueBonus, HIGH_VALUE_BONUS);
    }
    Ok(award)
}
