//! Leaderboard materialization and leaderboard reads.

use chrono::NaiveDate;
use futures::future::try_join_all;
use std::sync::Arc;
use tracing::info;

use crate::db::Repository;
use crate::domain::{BusinessTz, LeaderboardRow, PeriodKind, PeriodWindow, SearchHit, TimeMs};
use crate::engine::{is_game_id_prefix, rank};

pub struct LeaderboardMaterializer {
    repo: Arc<Repository>,
    tz: BusinessTz,
}

impl LeaderboardMaterializer {
    pub fn new(repo: Arc<Repository>, tz: BusinessTz) -> Self {
        Self { repo, tz }
    }

    pub fn tz(&self) -> BusinessTz {
        self.tz
    }

    /// Rebuild the current and previous daily, weekly and monthly rankings.
    ///
    /// Recompute-and-replace: running twice over unchanged data stores the
    /// same rows. Returns the number of rows written.
    pub async fn materialize(&self, now: TimeMs) -> Result<usize, sqlx::Error> {
        let today = self.tz.local_day(now);
        let cancelled = self.repo.cancelled_order_ids().await?;

        let windows: Vec<PeriodWindow> = PeriodKind::MATERIALIZED
            .iter()
            .flat_map(|kind| [kind.window_containing(today), kind.previous_window(today)])
            .collect();
        let slices = try_join_all(windows.iter().map(|w| self.repo.ledger_slices(w))).await?;

        let boards: Vec<_> = windows
            .into_iter()
            .zip(slices)
            .map(|(window, slices)| (window, rank(&slices, &cancelled, window.start)))
            .collect();

        let written = self.repo.replace_leaderboards(&boards, now).await?;
        info!(rows = written, day = %today, "Leaderboards materialized");
        Ok(written)
    }

    /// Ranking for the period containing `date` (today if `None`).
    ///
    /// Served from the materialized rows when that period has been built,
    /// otherwise computed from the ledger.
    pub async fn get_leaderboard(
        &self,
        kind: PeriodKind,
        date: Option<NaiveDate>,
        now: TimeMs,
    ) -> Result<Vec<LeaderboardRow>, sqlx::Error> {
        if kind == PeriodKind::AllTime {
            return self.all_time_leaders().await;
        }
        let day = date.unwrap_or_else(|| self.tz.local_day(now));
        self.ranking(&kind.window_containing(day)).await
    }

    pub async fn all_time_leaders(&self) -> Result<Vec<LeaderboardRow>, sqlx::Error> {
        self.live_ranking(&PeriodWindow::all_time()).await
    }

    /// Ranking of a window, stored if available.
    pub async fn ranking(&self, window: &PeriodWindow) -> Result<Vec<LeaderboardRow>, sqlx::Error> {
        if let Some(start) = window.start {
            if self.repo.leaderboard_materialized(window.kind, start).await? {
                return self.repo.leaderboard_rows(window.kind, start, None).await;
            }
        }
        self.live_ranking(window).await
    }

    /// Ranking of a window computed from the ledger, ignoring stored rows.
    pub async fn live_ranking(&self, window: &PeriodWindow) -> Result<Vec<LeaderboardRow>, sqlx::Error> {
        let cancelled = self.repo.cancelled_order_ids().await?;
        let slices = self.repo.ledger_slices(window).await?;
        Ok(rank(&slices, &cancelled, window.start))
    }

    /// Point totals of identities whose game id starts with `prefix`, for the
    /// current period of `kind`. An invalid prefix matches nothing.
    pub async fn search(
        &self,
        prefix: &str,
        kind: PeriodKind,
        now: TimeMs,
    ) -> Result<Vec<SearchHit>, sqlx::Error> {
        let prefix = prefix.trim();
        if !is_game_id_prefix(prefix) {
            return Ok(Vec::new());
        }
        let window = kind.window_containing(self.tz.local_day(now));
        let slices = self.repo.ledger_slices_for_prefix(prefix, &window).await?;
        let cancelled = self.repo.cancelled_order_ids().await?;

        Ok(rank(&slices, &cancelled, window.start)
            .into_iter()
            .map(|row| SearchHit {
                game_id: row.game_id,
                period: kind,
                total_points: row.total_points,
            })
            .collect())
    }
}
