use chrono::NaiveDate;
use std::sync::Arc;
use streakboard::config::Config;
use streakboard::db::init_db;
use streakboard::domain::{
    Decimal, GameId, LedgerReason, OrderId, PeriodKind, TimeMs, Uid, UploaderId,
};
use streakboard::engine::derive_game_id;
use streakboard::ingest::RawRow;
use streakboard::orchestration::{
    BatchIngestor, DailyHighlights, LeaderboardMaterializer, WinnerArchiver,
};
use streakboard::Repository;
use tempfile::TempDir;

const BUYER_A: &str = "733XXX1892";
const BUYER_B: &str = "900XXX0002";
const BUYER_C: &str = "900XXX0003";

struct TestEnv {
    ingestor: BatchIngestor,
    uploader: UploaderId,
    repo: Arc<Repository>,
    materializer: Arc<LeaderboardMaterializer>,
    archiver: WinnerArchiver,
    highlights: DailyHighlights,
    _temp: TempDir,
}

fn now() -> TimeMs {
    // 2025-03-01T00:00:00Z, 05:30 on 2025-03-01 local
    TimeMs::new(1_740_787_200_000)
}

fn feb(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 2, day).unwrap()
}

fn game(phone: &str) -> GameId {
    derive_game_id(&Uid::new(phone.to_string()))
}

fn order(phone: &str, order_id: &str, status: &str, price: &str, ts: &str) -> RawRow {
    RawRow::from_pairs(&[
        ("phone_number", phone),
        ("order_id", order_id),
        ("order_status", status),
        ("total_price", price),
        ("timestamp_created", ts),
    ])
}

/// Three buyers on 2025-02-28: A has one high value order, B has three small
/// orders of which the last is cancelled, C has one small order.
async fn setup() -> TestEnv {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");
    let repo = Arc::new(Repository::new(pool));
    let config = Config::with_database_path(db_path);
    let tz = config.business_tz();

    let ingestor = BatchIngestor::new(repo.clone(), &config);
    let uploader = UploaderId::new("seller-1".to_string());
    ingestor
        .ingest(
            &vec![
                order(BUYER_A, "A1", "active", "1500", "2025-02-28 10:00:00"),
                order(BUYER_B, "B1", "active", "100", "2025-02-28 09:00:00"),
                order(BUYER_B, "B2", "active", "100", "2025-02-28 11:00:00"),
                order(BUYER_B, "B3", "active", "100", "2025-02-28 12:00:00"),
                order(BUYER_C, "C1", "active", "100", "2025-02-28 08:00:00"),
            ],
            &uploader,
            now(),
        )
        .await
        .unwrap();
    ingestor
        .ingest(
            &vec![order(BUYER_B, "B3", "cancelled", "100", "2025-02-28 13:00:00")],
            &uploader,
            now(),
        )
        .await
        .unwrap();

    let materializer = Arc::new(LeaderboardMaterializer::new(repo.clone(), tz));
    TestEnv {
        ingestor,
        uploader,
        archiver: WinnerArchiver::new(repo.clone(), materializer.clone(), config.winners_per_period),
        highlights: DailyHighlights::new(repo.clone(), tz),
        materializer,
        repo,
        _temp: temp_dir,
    }
}

impl TestEnv {
    async fn ingest(&self, rows: Vec<RawRow>) {
        self.ingestor
            .ingest(&rows, &self.uploader, now())
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_daily_ranking_excludes_cancelled_orders_from_counts() {
    let env = setup().await;
    let rows = env
        .materializer
        .get_leaderboard(PeriodKind::Daily, Some(feb(28)), now())
        .await
        .unwrap();

    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].game_id, game(BUYER_A));
    assert_eq!(rows[0].total_points, 210);
    assert_eq!(rows[0].total_gmv, Decimal::from_i64(1500));
    assert_eq!(rows[1].game_id, game(BUYER_B));
    assert_eq!(rows[1].total_points, 45);
    assert_eq!(rows[1].total_orders, 2);
    assert_eq!(rows[2].game_id, game(BUYER_C));
    assert_eq!(
        rows.iter().map(|r| r.rank).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
}

#[tokio::test]
async fn test_materialization_is_idempotent() {
    let env = setup().await;

    let written = env.materializer.materialize(now()).await.unwrap();
    assert!(written > 0);
    let first = env
        .repo
        .leaderboard_rows(PeriodKind::Daily, feb(28), None)
        .await
        .unwrap();

    let rewritten = env.materializer.materialize(now()).await.unwrap();
    let second = env
        .repo
        .leaderboard_rows(PeriodKind::Daily, feb(28), None)
        .await
        .unwrap();

    assert_eq!(written, rewritten);
    assert_eq!(first, second);
    assert_eq!(first.len(), 3);
    assert_eq!(first[0].period_start, Some(feb(28)));
}

#[tokio::test]
async fn test_materialized_view_matches_live_ranking() {
    let env = setup().await;
    let live = env
        .materializer
        .get_leaderboard(PeriodKind::Weekly, Some(feb(28)), now())
        .await
        .unwrap();

    env.materializer.materialize(now()).await.unwrap();
    assert!(env
        .repo
        .leaderboard_materialized(PeriodKind::Weekly, feb(24))
        .await
        .unwrap());

    let stored = env
        .materializer
        .get_leaderboard(PeriodKind::Weekly, Some(feb(28)), now())
        .await
        .unwrap();
    assert_eq!(live, stored);
}

#[tokio::test]
async fn test_all_time_leaders() {
    let env = setup().await;
    let rows = env.materializer.all_time_leaders().await.unwrap();
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|r| r.period_start.is_none()));
    assert_eq!(rows[0].total_points, 210);
}

#[tokio::test]
async fn test_search_by_game_id_prefix() {
    let env = setup().await;
    let a = game(BUYER_A);

    let hits = env
        .materializer
        .search(&a.as_str()[..12], PeriodKind::AllTime, now())
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].game_id, a);
    assert_eq!(hits[0].total_points, 210);

    let none = env
        .materializer
        .search("not-hex", PeriodKind::AllTime, now())
        .await
        .unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn test_winners_archived_once_per_period() {
    let env = setup().await;
    env.materializer.materialize(now()).await.unwrap();

    let archived = env.archiver.archive(PeriodKind::Daily, now()).await.unwrap();
    assert_eq!(archived, 3);

    let again = env.archiver.archive(PeriodKind::Daily, now()).await.unwrap();
    assert_eq!(again, 0);

    let winners = env
        .archiver
        .list_winners(Some(PeriodKind::Daily), 10)
        .await
        .unwrap();
    assert_eq!(winners.len(), 3);
    let first = winners.iter().find(|w| w.position == 1).unwrap();
    assert_eq!(first.game_id, game(BUYER_A));
    assert_eq!(first.points, 210);
    assert_eq!(first.period_start, feb(28));
    assert_eq!(first.winning_date, now());
}

#[tokio::test]
async fn test_daily_highlights_awarded_once() {
    let env = setup().await;

    let awarded = env.highlights.award_previous_day(now()).await.unwrap();
    assert_eq!(awarded, 2);

    let a_entries = env
        .repo
        .ledger_entries_for_order(&OrderId::new("A1".to_string()))
        .await
        .unwrap();
    assert!(a_entries
        .iter()
        .any(|e| e.reason == LedgerReason::HighestGmvForDay && e.points == 100));

    let b_entries = env
        .repo
        .ledger_entries_for_order(&OrderId::new("B2".to_string()))
        .await
        .unwrap();
    assert!(b_entries
        .iter()
        .any(|e| e.reason == LedgerReason::HighestOrdersForDay && e.points == 100));

    let again = env.highlights.award_previous_day(now()).await.unwrap();
    assert_eq!(again, 0);

    for phone in [BUYER_A, BUYER_B, BUYER_C] {
        let game_id = game(phone);
        assert_eq!(
            env.repo.ledger_points_for_game(&game_id).await.unwrap(),
            env.repo.order_points_for_game(&game_id).await.unwrap()
        );
    }
    assert_eq!(env.repo.ledger_points_for_game(&game(BUYER_A)).await.unwrap(), 310);
}

#[tokio::test]
async fn test_cancellation_day_does_not_count_orders_placed_earlier() {
    let env = setup().await;
    let buyer = "900XXX0004";
    env.ingest(vec![
        order(buyer, "X1", "active", "100", "2025-02-26 10:00:00"),
        order(buyer, "X2", "active", "100", "2025-02-26 11:00:00"),
    ])
    .await;
    env.ingest(vec![order(buyer, "X1", "cancelled", "100", "2025-02-28 09:00:00")])
        .await;

    let cancel_day = env
        .materializer
        .get_leaderboard(PeriodKind::Daily, Some(feb(28)), now())
        .await
        .unwrap();
    let row = cancel_day.iter().find(|r| r.game_id == game(buyer)).unwrap();
    assert_eq!(row.total_points, -25);
    assert_eq!(row.total_orders, 0);

    let order_day = env
        .materializer
        .get_leaderboard(PeriodKind::Daily, Some(feb(26)), now())
        .await
        .unwrap();
    assert_eq!(order_day.len(), 1);
    assert_eq!(order_day[0].total_points, 45);
    assert_eq!(order_day[0].total_orders, 1);
}

#[tokio::test]
async fn test_winner_demotion_reported_without_touching_snapshots() {
    let env = setup().await;
    env.materializer.materialize(now()).await.unwrap();
    env.archiver.archive(PeriodKind::Daily, now()).await.unwrap();
    assert!(env
        .archiver
        .demotions(PeriodKind::Daily, now())
        .await
        .unwrap()
        .is_empty());

    env.ingest(vec![order(BUYER_A, "A1", "cancelled", "1500", "2025-02-28 20:00:00")])
        .await;

    let demotions = env.archiver.demotions(PeriodKind::Daily, now()).await.unwrap();
    assert_eq!(demotions.len(), 1);
    assert_eq!(demotions[0].game_id, game(BUYER_A));
    assert_eq!(demotions[0].archived_position, 1);
    assert_eq!(demotions[0].archived_points, 210);
    assert_eq!(demotions[0].current_position, Some(3));
    assert_eq!(demotions[0].current_points, 0);

    let winners = env
        .archiver
        .list_winners(Some(PeriodKind::Daily), 10)
        .await
        .unwrap();
    let first = winners.iter().find(|w| w.position == 1).unwrap();
    assert_eq!(first.game_id, game(BUYER_A));
    assert_eq!(first.points, 210);
}
