//! Business calendar: the fixed timezone that defines "a day", and leaderboard periods.

use chrono::{
    DateTime, Datelike, Days, FixedOffset, Months, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::TimeMs;

/// Fixed-offset timezone used for calendar-day bucketing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusinessTz {
    offset: FixedOffset,
}

impl BusinessTz {
    /// Build from an offset east of UTC in minutes (e.g. 330 for +05:30).
    pub fn from_offset_minutes(minutes: i32) -> Option<Self> {
        FixedOffset::east_opt(minutes.checked_mul(60)?).map(|offset| Self { offset })
    }

    pub fn utc() -> Self {
        Self {
            offset: Utc.fix(),
        }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn to_local(&self, t: TimeMs) -> DateTime<FixedOffset> {
        t.to_utc().with_timezone(&self.offset)
    }

    /// Calendar day of an instant in this timezone.
    pub fn local_day(&self, t: TimeMs) -> NaiveDate {
        self.to_local(t).date_naive()
    }

    /// Interpret a wall-clock time as local business time.
    pub fn from_local(&self, naive: NaiveDateTime) -> Option<TimeMs> {
        self.offset
            .from_local_datetime(&naive)
            .single()
            .map(|dt| TimeMs::from_datetime(&dt))
    }

    /// Instant at which a local day starts.
    pub fn day_start(&self, day: NaiveDate) -> Option<TimeMs> {
        self.from_local(day.and_hms_opt(0, 0, 0)?)
    }
}

/// Leaderboard aggregation window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PeriodKind {
    Daily,
    Weekly,
    Monthly,
    AllTime,
}

impl PeriodKind {
    /// The periods that are materialized and archived.
    pub const MATERIALIZED: [PeriodKind; 3] =
        [PeriodKind::Daily, PeriodKind::Weekly, PeriodKind::Monthly];

    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodKind::Daily => "daily",
            PeriodKind::Weekly => "weekly",
            PeriodKind::Monthly => "monthly",
            PeriodKind::AllTime => "all-time",
        }
    }

    /// Window containing `day`.
    pub fn window_containing(&self, day: NaiveDate) -> PeriodWindow {
        match self {
            PeriodKind::Daily => PeriodWindow::bounded(*self, day, day + Days::new(1)),
            PeriodKind::Weekly => {
                let start = day - Days::new(u64::from(day.weekday().num_days_from_monday()));
                PeriodWindow::bounded(*self, start, start + Days::new(7))
            }
            PeriodKind::Monthly => {
                let start = day.with_day(1).unwrap_or(day);
                let end = start
                    .checked_add_months(Months::new(1))
                    .unwrap_or(NaiveDate::MAX);
                PeriodWindow::bounded(*self, start, end)
            }
            PeriodKind::AllTime => PeriodWindow::all_time(),
        }
    }

    /// Window that ended most recently before the one containing `day`.
    pub fn previous_window(&self, day: NaiveDate) -> PeriodWindow {
        match self.window_containing(day).start {
            Some(start) => start
                .pred_opt()
                .map(|d| self.window_containing(d))
                .unwrap_or_else(PeriodWindow::all_time),
            None => PeriodWindow::all_time(),
        }
    }
}

impl std::fmt::Display for PeriodKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PeriodKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" | "day" => Ok(PeriodKind::Daily),
            "weekly" | "week" => Ok(PeriodKind::Weekly),
            "monthly" | "month" => Ok(PeriodKind::Monthly),
            "all-time" | "all_time" | "alltime" | "all" => Ok(PeriodKind::AllTime),
            other => Err(format!(
                "period must be one of: daily, weekly, monthly, all-time (got {})",
                other
            )),
        }
    }
}

/// Half-open range of local days `[start, end)`. `None` bounds are open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodWindow {
    pub kind: PeriodKind,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl PeriodWindow {
    pub fn bounded(kind: PeriodKind, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            kind,
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn all_time() -> Self {
        Self {
            kind: PeriodKind::AllTime,
            start: None,
            end: None,
        }
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start.map_or(true, |s| day >= s) && self.end.map_or(true, |e| day < e)
    }

    /// Bounds as `YYYY-MM-DD` strings, the format stored in `effective_day` columns.
    pub fn day_bounds(&self) -> (String, String) {
        let fmt = |d: NaiveDate| d.format("%Y-%m-%d").to_string();
        (
            self.start.map(fmt).unwrap_or_else(|| "0000-01-01".to_string()),
            self.end.map(fmt).unwrap_or_else(|| "9999-12-31".to_string()),
        )
    }
}

pub fn format_day(day: NaiveDate) -> String {
    day.format("%Y-%m-%d").to_string()
}

pub fn parse_day(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        parse_day(s).unwrap()
    }

    #[test]
    fn test_local_day_uses_offset() {
        let tz = BusinessTz::from_offset_minutes(330).unwrap();
        // 2025-02-24T20:00:00Z is 2025-02-25 01:30 in +05:30.
        let t = TimeMs::new(1_740_427_200_000);
        assert_eq!(tz.local_day(t), day("2025-02-25"));
        assert_eq!(BusinessTz::utc().local_day(t), day("2025-02-24"));
    }

    #[test]
    fn test_weekly_window_is_monday_anchored() {
        // 2025-02-26 is a Wednesday.
        let w = PeriodKind::Weekly.window_containing(day("2025-02-26"));
        assert_eq!(w.start, Some(day("2025-02-24")));
        assert_eq!(w.end, Some(day("2025-03-03")));

        // Sunday belongs to the week that started the previous Monday.
        let w = PeriodKind::Weekly.window_containing(day("2025-03-02"));
        assert_eq!(w.start, Some(day("2025-02-24")));
    }

    #[test]
    fn test_monthly_window() {
        let w = PeriodKind::Monthly.window_containing(day("2025-02-26"));
        assert_eq!(w.start, Some(day("2025-02-01")));
        assert_eq!(w.end, Some(day("2025-03-01")));
        assert!(w.contains(day("2025-02-28")));
        assert!(!w.contains(day("2025-03-01")));
    }

    #[test]
    fn test_previous_window() {
        let w = PeriodKind::Daily.previous_window(day("2025-03-01"));
        assert_eq!(w.start, Some(day("2025-02-28")));
        let w = PeriodKind::Monthly.previous_window(day("2025-03-01"));
        assert_eq!(w.start, Some(day("2025-02-01")));
        let w = PeriodKind::Weekly.previous_window(day("2025-03-03"));
        assert_eq!(w.start, Some(day("2025-02-24")));
    }

    #[test]
    fn test_period_kind_parse() {
        assert_eq!("Weekly".parse::<PeriodKind>().unwrap(), PeriodKind::Weekly);
        assert_eq!("all-time".parse::<PeriodKind>().unwrap(), PeriodKind::AllTime);
        assert!("yearly".parse::<PeriodKind>().is_err());
    }

    #[test]
    fn test_all_time_window_contains_everything() {
        let w = PeriodWindow::all_time();
        assert!(w.contains(day("1999-01-01")));
        assert_eq!(w.day_bounds().0, "0000-01-01");
    }
}
