//! Named periodic jobs: leaderboard materialization, winner archiving and
//! daily highlights.
//!
//! Each job runs in its own background task. A failed run is logged and the
//! next tick proceeds; there is no retry.

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Weekday};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::highlights::DailyHighlights;
use super::materialize::LeaderboardMaterializer;
use super::winners::WinnerArchiver;
use crate::config::Config;
use crate::domain::{BusinessTz, PeriodKind, TimeMs};

/// Calendar cadences look at most this many days ahead for their next run.
const CADENCE_HORIZON_DAYS: u32 = 62;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("unknown job: {0}")]
    UnknownJob(String),
}

/// A unit of periodic work. Implementations must be safe to re-run.
#[async_trait]
pub trait Job: Send + Sync {
    async fn run(&self, now: TimeMs) -> Result<(), JobError>;
}

/// When a job fires. Calendar cadences use the business timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    Every(Duration),
    Daily { hour: u32 },
    Weekly { weekday: Weekday, hour: u32 },
    Monthly { day: u32, hour: u32 },
}

impl Cadence {
    /// First firing time strictly after `after`.
    pub fn next_after(&self, after: TimeMs, tz: &BusinessTz) -> Option<TimeMs> {
        if let Cadence::Every(period) = self {
            let step = i64::try_from(period.as_millis()).ok()?;
            return Some(TimeMs::new(after.as_ms().checked_add(step)?));
        }

        let mut day = tz.local_day(after);
        for _ in 0..CADENCE_HORIZON_DAYS {
            if self.fires_on(day) {
                let at = day
                    .and_hms_opt(self.hour(), 0, 0)
                    .and_then(|naive| tz.from_local(naive));
                if let Some(at) = at.filter(|at| *at > after) {
                    return Some(at);
                }
            }
            day = day.succ_opt()?;
        }
        None
    }

    fn fires_on(&self, day: NaiveDate) -> bool {
        match self {
            Cadence::Every(_) | Cadence::Daily { .. } => true,
            Cadence::Weekly { weekday, .. } => day.weekday() == *weekday,
            Cadence::Monthly { day: dom, .. } => day.day() == *dom,
        }
    }

    fn hour(&self) -> u32 {
        match self {
            Cadence::Every(_) => 0,
            Cadence::Daily { hour } | Cadence::Weekly { hour, .. } | Cadence::Monthly { hour, .. } => {
                *hour
            }
        }
    }
}

pub struct ScheduledJob {
    pub id: &'static str,
    pub cadence: Cadence,
    pub job: Arc<dyn Job>,
}

pub struct Scheduler {
    jobs: Vec<ScheduledJob>,
    tz: BusinessTz,
}

impl Scheduler {
    pub fn new(tz: BusinessTz) -> Self {
        Self {
            jobs: Vec::new(),
            tz,
        }
    }

    pub fn register(mut self, id: &'static str, cadence: Cadence, job: Arc<dyn Job>) -> Self {
        self.jobs.push(ScheduledJob { id, cadence, job });
        self
    }

    /// The standard job table of the service.
    pub fn standard(
        config: &Config,
        materializer: Arc<LeaderboardMaterializer>,
        archiver: Arc<WinnerArchiver>,
        highlights: Arc<DailyHighlights>,
    ) -> Self {
        let hour = config.winner_archive_hour;
        let archive = |kind| -> Arc<dyn Job> {
            Arc::new(ArchiveWinnersJob {
                archiver: Arc::clone(&archiver),
                kind,
            })
        };

        Self::new(config.business_tz())
            .register(
                "materialize-leaderboards",
                Cadence::Every(Duration::from_secs(config.materialize_interval_secs.max(1))),
                materializer,
            )
            .register(
                "archive-daily-winners",
                Cadence::Daily { hour },
                archive(PeriodKind::Daily),
            )
            .register(
                "archive-weekly-winners",
                Cadence::Weekly {
                    weekday: Weekday::Mon,
                    hour,
                },
                archive(PeriodKind::Weekly),
            )
            .register(
                "archive-monthly-winners",
                Cadence::Monthly { day: 1, hour },
                archive(PeriodKind::Monthly),
            )
            .register("daily-highlights", Cadence::Daily { hour }, highlights)
    }

    pub fn job_ids(&self) -> Vec<&'static str> {
        self.jobs.iter().map(|j| j.id).collect()
    }

    /// Run one job immediately, outside its cadence.
    pub async fn run_once(&self, id: &str, now: TimeMs) -> Result<(), JobError> {
        let job = self
            .jobs
            .iter()
            .find(|j| j.id == id)
            .ok_or_else(|| JobError::UnknownJob(id.to_string()))?;
        job.job.run(now).await
    }

    /// Spawn one background task per job.
    ///
    /// Returns the handles so callers can abort them.
    pub fn spawn(self) -> Vec<JoinHandle<()>> {
        info!(jobs = ?self.job_ids(), "Starting scheduler");
        let tz = self.tz;
        self.jobs
            .into_iter()
            .map(|scheduled| tokio::spawn(run_forever(scheduled, tz)))
            .collect()
    }
}

async fn run_forever(scheduled: ScheduledJob, tz: BusinessTz) {
    let ScheduledJob { id, cadence, job } = scheduled;

    if let Cadence::Every(period) = cadence {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            run_logged(id, job.as_ref(), TimeMs::now()).await;
        }
    }

    loop {
        let now = TimeMs::now();
        let Some(next) = cadence.next_after(now, &tz) else {
            warn!(job = id, "No upcoming run for cadence, stopping job");
            return;
        };
        let wait = u64::try_from(next.as_ms() - now.as_ms()).unwrap_or(0);
        debug!(job = id, next = %next, "Job scheduled");
        tokio::time::sleep(Duration::from_millis(wait)).await;
        run_logged(id, job.as_ref(), TimeMs::now()).await;
    }
}

async fn run_logged(id: &str, job: &dyn Job, now: TimeMs) {
    debug!(job = id, "Job started");
    match job.run(now).await {
        Ok(()) => debug!(job = id, "Job finished"),
        Err(e) => error!(job = id, error = %e, "Job failed"),
    }
}

// =========================================================================
// Job implementations
// =========================================================================

#[async_trait]
impl Job for LeaderboardMaterializer {
    async fn run(&self, now: TimeMs) -> Result<(), JobError> {
        self.materialize(now).await?;
        Ok(())
    }
}

pub struct ArchiveWinnersJob {
    pub archiver: Arc<WinnerArchiver>,
    pub kind: PeriodKind,
}

#[async_trait]
impl Job for ArchiveWinnersJob {
    async fn run(&self, now: TimeMs) -> Result<(), JobError> {
        self.archiver.archive(self.kind, now).await?;
        Ok(())
    }
}

#[async_trait]
impl Job for DailyHighlights {
    async fn run(&self, now: TimeMs) -> Result<(), JobError> {
        self.award_previous_day(now).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> TimeMs {
        TimeMs::from_datetime(&Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap())
    }

    struct CountingJob {
        runs: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl Job for CountingJob {
        async fn run(&self, _now: TimeMs) -> Result<(), JobError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(JobError::UnknownJob("boom".to_string()));
            }
            Ok(())
        }
    }

    #[test]
    fn test_every_adds_period() {
        let tz = BusinessTz::utc();
        let next = Cadence::Every(Duration::from_secs(60)).next_after(at(2024, 3, 1, 0, 0), &tz);
        assert_eq!(next, Some(at(2024, 3, 1, 0, 1)));
    }

    #[test]
    fn test_daily_before_and_after_hour() {
        let tz = BusinessTz::utc();
        let daily = Cadence::Daily { hour: 8 };
        assert_eq!(daily.next_after(at(2024, 3, 1, 7, 59), &tz), Some(at(2024, 3, 1, 8, 0)));
        assert_eq!(daily.next_after(at(2024, 3, 1, 8, 0), &tz), Some(at(2024, 3, 2, 8, 0)));
    }

    #[test]
    fn test_weekly_fires_on_monday() {
        let tz = BusinessTz::utc();
        let weekly = Cadence::Weekly {
            weekday: Weekday::Mon,
            hour: 8,
        };
        // 2024-03-06 is a Wednesday
        assert_eq!(weekly.next_after(at(2024, 3, 6, 12, 0), &tz), Some(at(2024, 3, 11, 8, 0)));
    }

    #[test]
    fn test_monthly_fires_on_first() {
        let tz = BusinessTz::utc();
        let monthly = Cadence::Monthly { day: 1, hour: 8 };
        assert_eq!(monthly.next_after(at(2024, 1, 15, 0, 0), &tz), Some(at(2024, 2, 1, 8, 0)));
    }

    #[test]
    fn test_daily_uses_business_timezone() {
        let tz = BusinessTz::from_offset_minutes(330).unwrap();
        // 08:00 at +05:30 is 02:30 UTC
        let daily = Cadence::Daily { hour: 8 };
        assert_eq!(daily.next_after(at(2024, 3, 1, 0, 0), &tz), Some(at(2024, 3, 1, 2, 30)));
    }

    #[tokio::test]
    async fn test_run_once_unknown_job() {
        let scheduler = Scheduler::new(BusinessTz::utc());
        let err = scheduler.run_once("nope", TimeMs::now()).await.unwrap_err();
        assert!(matches!(err, JobError::UnknownJob(id) if id == "nope"));
    }

    #[tokio::test]
    async fn test_run_once_runs_registered_job() {
        let job = Arc::new(CountingJob {
            runs: AtomicUsize::new(0),
            fail: false,
        });
        let scheduler = Scheduler::new(BusinessTz::utc()).register(
            "count",
            Cadence::Daily { hour: 0 },
            job.clone(),
        );
        scheduler.run_once("count", TimeMs::now()).await.unwrap();
        assert_eq!(job.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_runs_do_not_stop_interval_job() {
        let job = Arc::new(CountingJob {
            runs: AtomicUsize::new(0),
            fail: true,
        });
        let handles = Scheduler::new(BusinessTz::utc())
            .register("flaky", Cadence::Every(Duration::from_millis(10)), job.clone())
            .spawn();

        tokio::time::sleep(Duration::from_millis(100)).await;
        for handle in handles {
            handle.abort();
        }
        assert!(job.runs.load(Ordering::SeqCst) >= 2);
    }
}
