//! Consecutive-day streak tracking.

use chrono::NaiveDate;

/// Streak state carried on an order row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreakState {
    pub count: i64,
    pub last_day: NaiveDate,
}

impl StreakState {
    pub fn first(day: NaiveDate) -> Self {
        Self {
            count: 1,
            last_day: day,
        }
    }

    /// Streak after an order placed on `day`.
    ///
    /// Same day keeps the count, the next day extends it, any gap resets to 1.
    /// A predecessor dated after `day` (out-of-order upload) also resets.
    pub fn advance(prev: Option<StreakState>, day: NaiveDate) -> StreakState {
        let Some(prev) = prev else {
            return StreakState::first(day);
        };

        match (day - prev.last_day).num_days() {
            0 => StreakState {
                count: prev.count.max(1),
                last_day: day,
            },
            1 => StreakState {
                count: prev.count.max(1).saturating_add(1),
                last_day: day,
            },
            _ => StreakState::first(day),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_first_order_starts_at_one() {
        let s = StreakState::advance(None, day("2025-03-01"));
        assert_eq!(s.count, 1);
        assert_eq!(s.last_day, day("2025-03-01"));
    }

    #[test]
    fn test_same_day_keeps_count() {
        let prev = StreakState {
            count: 4,
            last_day: day("2025-03-01"),
        };
        assert_eq!(StreakState::advance(Some(prev), day("2025-03-01")).count, 4);
    }

    #[test]
    fn test_next_day_extends() {
        let prev = StreakState {
            count: 6,
            last_day: day("2025-02-28"),
        };
        let s = StreakState::advance(Some(prev), day("2025-03-01"));
        assert_eq!(s.count, 7);
        assert_eq!(s.last_day, day("2025-03-01"));
    }

    #[test]
    fn test_gap_resets() {
        let prev = StreakState {
            count: 9,
            last_day: day("2025-02-26"),
        };
        assert_eq!(StreakState::advance(Some(prev), day("2025-03-01")).count, 1);
    }

    #[test]
    fn test_backdated_order_resets() {
        let prev = StreakState {
            count: 3,
            last_day: day("2025-03-05"),
        };
        assert_eq!(StreakState::advance(Some(prev), day("2025-03-01")).count, 1);
    }
}
