//! Pure computation engines: points rules, streaks, identity, ranking.

pub mod aggregate;
pub mod identity;
pub mod points;
pub mod streak;

pub use aggregate::{rank, LedgerSlice};
pub use identity::{derive_game_id, is_game_id_prefix};
pub use points::{
    streak_bonus, ComputationError, PointsAward, PointsComponent, PointsRules,
    REPEAT_ORDER_BONUS,
};
pub use streak::StreakState;
