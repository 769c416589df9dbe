use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::AppState;
use crate::domain::{
    parse_day, LeaderboardRow, PeriodKind, SearchHit, TimeMs, WinnerDemotion, WinnerSnapshot,
};
use crate::error::AppError;

const DEFAULT_WINNERS_LIMIT: i64 = 30;
const MAX_WINNERS_LIMIT: i64 = 500;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardQuery {
    pub date: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardResponse {
    pub period: PeriodKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period_start: Option<NaiveDate>,
    pub entries: Vec<LeaderboardRow>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub game_id: Option<String>,
    pub period: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WinnersQuery {
    pub period: Option<String>,
    pub limit: Option<i64>,
}

fn parse_period(s: &str) -> Result<PeriodKind, AppError> {
    PeriodKind::from_str(s).map_err(AppError::BadRequest)
}

pub async fn get_leaderboard(
    Path(period): Path<String>,
    Query(params): Query<LeaderboardQuery>,
    State(state): State<AppState>,
) -> Result<Json<LeaderboardResponse>, AppError> {
    let period = parse_period(&period)?;
    let date = params
        .date
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            parse_day(s).ok_or_else(|| AppError::BadRequest("date must be YYYY-MM-DD".to_string()))
        })
        .transpose()?;

    let now = TimeMs::now();
    let day = date.unwrap_or_else(|| state.materializer.tz().local_day(now));
    let entries = state
        .materializer
        .get_leaderboard(period, Some(day), now)
        .await?;

    Ok(Json(LeaderboardResponse {
        period,
        period_start: period.window_containing(day).start,
        entries,
    }))
}

pub async fn search(
    Query(params): Query<SearchQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<SearchHit>>, AppError> {
    let prefix = params
        .game_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::BadRequest("gameId is required".to_string()))?;
    let period = match params.period.as_deref() {
        Some("") | None => PeriodKind::AllTime,
        Some(p) => parse_period(p)?,
    };

    let hits = state
        .materializer
        .search(prefix, period, TimeMs::now())
        .await?;
    Ok(Json(hits))
}

pub async fn get_winners(
    Query(params): Query<WinnersQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<WinnerSnapshot>>, AppError> {
    let period = match params.period.as_deref() {
        Some("") | None => None,
        Some(p) => Some(parse_period(p)?),
    };
    if period == Some(PeriodKind::AllTime) {
        return Err(AppError::BadRequest(
            "winners are archived for daily, weekly and monthly periods".to_string(),
        ));
    }
    let limit = params
        .limit
        .unwrap_or(DEFAULT_WINNERS_LIMIT)
        .clamp(1, MAX_WINNERS_LIMIT);

    let winners = state.archiver.list_winners(period, limit).await?;
    Ok(Json(winners))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DemotionsQuery {
    pub period: String,
}

/// Winners of the last closed period who have since lost their position.
pub async fn get_winner_demotions(
    Query(params): Query<DemotionsQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<WinnerDemotion>>, AppError> {
    let period = parse_period(&params.period)?;
    if period == PeriodKind::AllTime {
        return Err(AppError::BadRequest(
            "winners are archived for daily, weekly and monthly periods".to_string(),
        ));
    }
    let demotions = state.archiver.demotions(period, TimeMs::now()).await?;
    Ok(Json(demotions))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_period_rejects_unknown() {
        assert!(matches!(parse_period("yearly"), Err(AppError::BadRequest(_))));
        assert_eq!(parse_period("all-time").unwrap(), PeriodKind::AllTime);
    }
}
