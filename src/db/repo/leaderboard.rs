//! Materialized leaderboard rows and archived winners.

use chrono::NaiveDate;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::str::FromStr;
use tracing::warn;

use super::{day_col, decimal_col, Repository};
use crate::domain::{
    format_day, GameId, LeaderboardRow, PeriodKind, PeriodWindow, TimeMs, WinnerSnapshot,
};

impl Repository {
    /// Replace the stored rows of each `(kind, period_start)` in one transaction.
    ///
    /// Readers see either the old or the new ranking, never a mix.
    pub async fn replace_leaderboards(
        &self,
        boards: &[(PeriodWindow, Vec<LeaderboardRow>)],
        materialized_at: TimeMs,
    ) -> Result<usize, sqlx::Error> {
        let mut written = 0usize;
        let mut tx = self.pool.begin().await?;

        for (window, rows) in boards {
            let Some(start) = window.start else {
                continue;
            };
            sqlx::query("DELETE FROM leaderboard_rows WHERE period_kind = ? AND period_start = ?")
                .bind(window.kind.as_str())
                .bind(format_day(start))
                .execute(&mut *tx)
                .await?;

            for row in rows {
                sqlx::query(
                    r#"
                    INSERT INTO leaderboard_rows (
                        period_kind, period_start, rank, game_id, total_points,
                        total_orders, total_gmv, materialized_at
                    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(window.kind.as_str())
                .bind(format_day(start))
                .bind(row.rank)
                .bind(row.game_id.as_str())
                .bind(row.total_points)
                .bind(row.total_orders)
                .bind(row.total_gmv.to_canonical_string())
                .bind(materialized_at.as_ms())
                .execute(&mut *tx)
                .await?;
                written += 1;
            }
        }

        tx.commit().await?;
        Ok(written)
    }

    /// Stored ranking for one period, best first. Empty if it was never materialized.
    pub async fn leaderboard_rows(
        &self,
        kind: PeriodKind,
        period_start: NaiveDate,
        limit: Option<i64>,
    ) -> Result<Vec<LeaderboardRow>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT rank, game_id, total_points, total_orders, total_gmv, period_start
            FROM leaderboard_rows
            WHERE period_kind = ? AND period_start = ?
            ORDER BY rank ASC
            LIMIT ?
            "#,
        )
        .bind(kind.as_str())
        .bind(format_day(period_start))
        .bind(limit.unwrap_or(-1))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| LeaderboardRow {
                rank: row.get("rank"),
                game_id: GameId::new(row.get("game_id")),
                total_points: row.get("total_points"),
                total_orders: row.get("total_orders"),
                total_gmv: decimal_col(row, "total_gmv"),
                period_start: day_col(row, "period_start"),
            })
            .collect())
    }

    pub async fn leaderboard_materialized(
        &self,
        kind: PeriodKind,
        period_start: NaiveDate,
    ) -> Result<bool, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM leaderboard_rows WHERE period_kind = ? AND period_start = ?
            ) AS found
            "#,
        )
        .bind(kind.as_str())
        .bind(format_day(period_start))
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get::<bool, _>("found"))
    }

    // =========================================================================
    // Winner snapshots
    // =========================================================================

    pub async fn winners_archived(
        &self,
        kind: PeriodKind,
        period_start: NaiveDate,
    ) -> Result<bool, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM winner_snapshots WHERE period_kind = ? AND period_start = ?
            ) AS found
            "#,
        )
        .bind(kind.as_str())
        .bind(format_day(period_start))
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get::<bool, _>("found"))
    }

    /// Append snapshots. Existing snapshots are never touched.
    pub async fn insert_winners(&self, winners: &[WinnerSnapshot]) -> Result<usize, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0usize;
        for w in winners {
            let result = sqlx::query(
                r#"
                INSERT INTO winner_snapshots (
                    game_id, points, position, period_kind, period_start, winning_date
                ) VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT(period_kind, period_start, position) DO NOTHING
                "#,
            )
            .bind(w.game_id.as_str())
            .bind(w.points)
            .bind(w.position)
            .bind(w.period_type.as_str())
            .bind(format_day(w.period_start))
            .bind(w.winning_date.as_ms())
            .execute(&mut *tx)
            .await?;
            if result.rows_affected() > 0 {
                inserted += 1;
            }
        }
        tx.commit().await?;
        Ok(inserted)
    }

    /// Archived winners, newest period first.
    pub async fn list_winners(
        &self,
        kind: Option<PeriodKind>,
        limit: i64,
    ) -> Result<Vec<WinnerSnapshot>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT game_id, points, position, period_kind, period_start, winning_date
            FROM winner_snapshots
            WHERE (? IS NULL OR period_kind = ?)
            ORDER BY period_start DESC, winning_date DESC, position ASC
            LIMIT ?
            "#,
        )
        .bind(kind.map(|k| k.as_str()))
        .bind(kind.map(|k| k.as_str()))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().filter_map(winner_from_row).collect())
    }

    /// Snapshots of one archived period, by position.
    pub async fn winners_for_period(
        &self,
        kind: PeriodKind,
        period_start: NaiveDate,
    ) -> Result<Vec<WinnerSnapshot>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT game_id, points, position, period_kind, period_start, winning_date
            FROM winner_snapshots
            WHERE period_kind = ? AND period_start = ?
            ORDER BY position ASC
            "#,
        )
        .bind(kind.as_str())
        .bind(format_day(period_start))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().filter_map(winner_from_row).collect())
    }
}

fn winner_from_row(row: &SqliteRow) -> Option<WinnerSnapshot> {
    let kind_raw: String = row.get("period_kind");
    let Ok(period_type) = PeriodKind::from_str(&kind_raw) else {
        warn!(period_kind = %kind_raw, "Skipping winner with unknown period kind");
        return None;
    };
    Some(WinnerSnapshot {
        game_id: GameId::new(row.get("game_id")),
        points: row.get("points"),
        position: row.get("position"),
        period_type,
        period_start: day_col(row, "period_start")?,
        winning_date: TimeMs::new(row.get("winning_date")),
    })
}
