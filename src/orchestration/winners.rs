//! Winner archiving for closed periods.

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::materialize::LeaderboardMaterializer;
use crate::db::Repository;
use crate::domain::{PeriodKind, TimeMs, WinnerDemotion, WinnerSnapshot};

pub struct WinnerArchiver {
    repo: Arc<Repository>,
    materializer: Arc<LeaderboardMaterializer>,
    winners_per_period: i64,
}

impl WinnerArchiver {
    pub fn new(
        repo: Arc<Repository>,
        materializer: Arc<LeaderboardMaterializer>,
        winners_per_period: i64,
    ) -> Self {
        Self {
            repo,
            materializer,
            winners_per_period,
        }
    }

    /// Snapshot the top finishers of the most recently closed `kind` period.
    ///
    /// A period is archived once. Returns the number of snapshots written.
    pub async fn archive(&self, kind: PeriodKind, now: TimeMs) -> Result<usize, sqlx::Error> {
        let today = self.materializer.tz().local_day(now);
        let window = kind.previous_window(today);
        let Some(period_start) = window.start else {
            return Ok(0);
        };

        if self.repo.winners_archived(kind, period_start).await? {
            debug!(period = %kind, start = %period_start, "Winners already archived");
            return Ok(0);
        }

        let winners: Vec<WinnerSnapshot> = self
            .materializer
            .ranking(&window)
            .await?
            .into_iter()
            .take(self.winners_per_period.max(0) as usize)
            .map(|row| WinnerSnapshot {
                game_id: row.game_id,
                points: row.total_points,
                position: row.rank,
                period_type: kind,
                period_start,
                winning_date: now,
            })
            .collect();

        let inserted = self.repo.insert_winners(&winners).await?;
        info!(period = %kind, start = %period_start, winners = inserted, "Winners archived");
        Ok(inserted)
    }

    pub async fn list_winners(
        &self,
        kind: Option<PeriodKind>,
        limit: i64,
    ) -> Result<Vec<WinnerSnapshot>, sqlx::Error> {
        self.repo.list_winners(kind, limit).await
    }

    /// Archived winners of the most recently closed `kind` period whose
    /// position has since worsened.
    ///
    /// Read-only: the ranking is recomputed from the ledger and compared with
    /// the snapshots, which are left untouched.
    pub async fn demotions(
        &self,
        kind: PeriodKind,
        now: TimeMs,
    ) -> Result<Vec<WinnerDemotion>, sqlx::Error> {
        let today = self.materializer.tz().local_day(now);
        let window = kind.previous_window(today);
        let Some(period_start) = window.start else {
            return Ok(Vec::new());
        };

        let snapshots = self.repo.winners_for_period(kind, period_start).await?;
        if snapshots.is_empty() {
            return Ok(Vec::new());
        }
        let current = self.materializer.live_ranking(&window).await?;

        let demotions: Vec<WinnerDemotion> = snapshots
            .into_iter()
            .filter_map(|snapshot| {
                let now_row = current.iter().find(|r| r.game_id == snapshot.game_id);
                let current_position = now_row.map(|r| r.rank);
                if current_position.is_some_and(|p| p <= snapshot.position) {
                    return None;
                }
                Some(WinnerDemotion {
                    current_points: now_row.map_or(0, |r| r.total_points),
                    current_position,
                    archived_position: snapshot.position,
                    archived_points: snapshot.points,
                    period_type: kind,
                    period_start,
                    game_id: snapshot.game_id,
                })
            })
            .collect();

        for d in &demotions {
            warn!(
                period = %kind,
                start = %period_start,
                game_id = %d.game_id,
                archived_position = d.archived_position,
                current_position = ?d.current_position,
                "Archived winner demoted"
            );
        }
        Ok(demotions)
    }
}
