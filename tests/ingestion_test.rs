use std::sync::Arc;
use streakboard::config::Config;
use streakboard::db::init_db;
use streakboard::domain::{
    GameId, LedgerReason, OrderId, OrderRecord, OrderStatus, TimeMs, Uid, UploaderId,
};
use streakboard::engine::derive_game_id;
use streakboard::ingest::RawRow;
use streakboard::orchestration::{BatchIngestor, IngestError};
use streakboard::{Repository, ValidationError};
use tempfile::TempDir;

struct TestEnv {
    ingestor: BatchIngestor,
    repo: Arc<Repository>,
    uploader: UploaderId,
    _temp: TempDir,
}

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

    TestEnv {
        ingestor: BatchIngestor::new(repo.clone(), &config),
        repo,
        uploader: UploaderId::new("seller-1".to_string()),
        _temp: temp_dir,
    }
}

fn now() -> TimeMs {
    // 2025-03-01T00:00:00Z
    TimeMs::new(1_740_787_200_000)
}

fn order(phone: &str, order_id: &str, status: &str, price: &str, ts: &str) -> RawRow {
    RawRow::from_pairs(&[
        ("Phone Number", phone),
        ("Order ID", order_id),
        ("Order Status", status),
        ("Total Price", price),
        ("Timestamp Created", ts),
    ])
}

fn oid(s: &str) -> OrderId {
    OrderId::new(s.to_string())
}

fn game(phone: &str) -> GameId {
    derive_game_id(&Uid::new(phone.to_string()))
}

impl TestEnv {
    async fn ingest(&self, rows: Vec<RawRow>) -> Result<(), IngestError> {
        self.ingestor
            .ingest(&rows, &self.uploader, now())
            .await
            .map(|_| ())
    }

    async fn net_points(&self, order_id: &str) -> i64 {
        self.repo
            .orders_by_order_id(&oid(order_id))
            .await
            .unwrap()
            .iter()
            .map(|o| o.points)
            .sum()
    }

    async fn open_row(&self, order_id: &str) -> OrderRecord {
        self.repo
            .orders_by_order_id(&oid(order_id))
            .await
            .unwrap()
            .into_iter()
            .find(|o| o.status == OrderStatus::Active)
            .unwrap()
    }

    async fn assert_conserved(&self, phone: &str) {
        let game_id = game(phone);
        assert_eq!(
            self.repo.ledger_points_for_game(&game_id).await.unwrap(),
            self.repo.order_points_for_game(&game_id).await.unwrap(),
            "ledger and order points diverged for {}",
            phone
        );
    }
}

#[tokio::test]
async fn test_high_value_order_then_cancellation_nets_zero() {
    let env = setup().await;
    let phone = "733XXX1892";

    env.ingest(vec![order(phone, "O1", "Active", "1500", "2025-02-28 10:00:00")])
        .await
        .unwrap();
    assert_eq!(env.net_points("O1").await, 210);

    let reasons: Vec<LedgerReason> = env
        .repo
        .ledger_entries_for_order(&oid("O1"))
        .await
        .unwrap()
        .iter()
        .map(|e| e.reason)
        .collect();
    assert_eq!(
        reasons,
        vec![
            LedgerReason::BasePoints,
            LedgerReason::GmvPoints,
            LedgerReason::HighValueBonus
        ]
    );

    env.ingest(vec![order(phone, "O1", "cancelled", "1500", "2025-02-28 18:00:00")])
        .await
        .unwrap();
    assert_eq!(env.net_points("O1").await, 0);
    assert_eq!(env.repo.ledger_points_for_game(&game(phone)).await.unwrap(), 0);
    env.assert_conserved(phone).await;

    let cancelled = env.repo.cancelled_order_ids().await.unwrap();
    assert!(cancelled.contains(&oid("O1")));
}

#[tokio::test]
async fn test_duplicate_rows_reject_whole_batch() {
    let env = setup().await;
    let err = env
        .ingest(vec![
            order("733XXX1892", "O2", "active", "100", "2025-02-28 10:00:00"),
            order("733XXX1892", "O3", "active", "100", "2025-02-28 11:00:00"),
            order("733XXX1892", "O2", "active", "100", "2025-02-28 10:00:00"),
        ])
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        IngestError::Validation(ValidationError::DuplicateInBatch { row: 3, .. })
    ));
    assert!(env.repo.orders_by_order_id(&oid("O3")).await.unwrap().is_empty());
    assert_eq!(env.repo.count_upload_batches().await.unwrap(), 0);
}

#[tokio::test]
async fn test_unmasked_phone_rejected() {
    let env = setup().await;
    let outcome = env
        .ingestor
        .ingest_batch(
            &vec![order("7331231892", "O1", "active", "100", "2025-02-28 10:00:00")],
            &env.uploader,
            now(),
        )
        .await;

    assert!(!outcome.success);
    assert!(outcome.message.contains("999XXX9999"));
}

#[tokio::test]
async fn test_invalid_row_persists_nothing() {
    let env = setup().await;
    let err = env
        .ingest(vec![
            order("733XXX1892", "O1", "active", "100", "2025-02-28 10:00:00"),
            order("733XXX1892", "O2", "active", "-5", "2025-02-28 11:00:00"),
        ])
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        IngestError::Validation(ValidationError::InvalidPrice { row: 2, .. })
    ));
    assert!(env.repo.orders_by_order_id(&oid("O1")).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_cancellation_without_origin_rolls_back_batch() {
    let env = setup().await;
    let err = env
        .ingest(vec![
            order("733XXX1892", "O1", "active", "100", "2025-02-28 10:00:00"),
            order("733XXX1892", "O404", "cancelled", "100", "2025-02-28 12:00:00"),
        ])
        .await
        .unwrap_err();

    assert!(matches!(err, IngestError::Referential { row: 2, .. }));
    assert!(env.repo.orders_by_order_id(&oid("O1")).await.unwrap().is_empty());
    assert_eq!(env.repo.ledger_points_for_game(&game("733XXX1892")).await.unwrap(), 0);
}

#[tokio::test]
async fn test_second_cancellation_is_referential_error() {
    let env = setup().await;
    let phone = "733XXX1892";
    env.ingest(vec![order(phone, "O1", "active", "100", "2025-02-28 10:00:00")])
        .await
        .unwrap();
    env.ingest(vec![order(phone, "O1", "cancelled", "100", "2025-02-28 11:00:00")])
        .await
        .unwrap();

    let other = UploaderId::new("seller-2".to_string());
    let err = env
        .ingestor
        .ingest(
            &vec![order(phone, "O1", "cancelled", "100", "2025-02-28 12:00:00")],
            &other,
            now(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::Referential { row: 1, .. }));
}

#[tokio::test]
async fn test_streak_bonuses_on_consecutive_days() {
    let env = setup().await;
    let phone = "900XXX0001";
    let rows = (1..=7)
        .map(|day| {
            order(
                phone,
                &format!("D{}", day),
                "active",
                "100",
                &format!("2025-02-{:02} 10:00:00", day),
            )
        })
        .collect();
    env.ingest(rows).await.unwrap();

    assert_eq!(env.open_row("D3").await.streak_count, 3);
    assert_eq!(env.net_points("D3").await, 40);
    assert_eq!(env.net_points("D4").await, 20);
    assert_eq!(env.open_row("D7").await.streak_count, 7);
    assert_eq!(env.net_points("D7").await, 50);
    assert_eq!(env.repo.ledger_points_for_game(&game(phone)).await.unwrap(), 190);
}

#[tokio::test]
async fn test_gap_resets_streak() {
    let env = setup().await;
    let phone = "900XXX0002";
    env.ingest(vec![
        order(phone, "G1", "active", "100", "2025-02-01 10:00:00"),
        order(phone, "G2", "active", "100", "2025-02-02 10:00:00"),
        order(phone, "G3", "active", "100", "2025-02-04 10:00:00"),
    ])
    .await
    .unwrap();

    assert_eq!(env.open_row("G2").await.streak_count, 2);
    assert_eq!(env.open_row("G3").await.streak_count, 1);
}

#[tokio::test]
async fn test_cancelling_mid_streak_recomputes_later_days() {
    let env = setup().await;
    let phone = "900XXX0003";
    let rows = (1..=7)
        .map(|day| {
            order(
                phone,
                &format!("S{}", day),
                "active",
                "100",
                &format!("2025-02-{:02} 10:00:00", day),
            )
        })
        .collect();
    env.ingest(rows).await.unwrap();

    env.ingest(vec![order(phone, "S4", "cancelled", "100", "2025-02-10 09:00:00")])
        .await
        .unwrap();

    assert_eq!(env.open_row("S5").await.streak_count, 1);
    assert_eq!(env.open_row("S6").await.streak_count, 2);
    assert_eq!(env.open_row("S7").await.streak_count, 3);
    assert_eq!(env.net_points("S4").await, 0);
    assert_eq!(env.net_points("S7").await, 20);
    assert_eq!(env.open_row("S3").await.streak_count, 3);

    let deductions: Vec<_> = env
        .repo
        .ledger_entries_for_order(&oid("S7"))
        .await
        .unwrap()
        .into_iter()
        .filter(|e| e.reason == LedgerReason::StreakDeduction)
        .collect();
    assert_eq!(deductions.len(), 1);
    assert_eq!(deductions[0].points, -30);

    assert_eq!(env.repo.ledger_points_for_game(&game(phone)).await.unwrap(), 140);
    env.assert_conserved(phone).await;
}

#[tokio::test]
async fn test_cancelling_first_order_of_day_renumbers_repeats() {
    let env = setup().await;
    let phone = "900XXX0004";
    env.ingest(vec![
        order(phone, "R1", "active", "100", "2025-02-20 10:00:00"),
        order(phone, "R2", "active", "100", "2025-02-20 11:00:00"),
        order(phone, "R3", "active", "100", "2025-02-20 12:00:00"),
    ])
    .await
    .unwrap();
    assert_eq!(env.net_points("R1").await, 20);
    assert_eq!(env.net_points("R2").await, 25);
    assert_eq!(env.net_points("R3").await, 30);

    env.ingest(vec![order(phone, "R1", "cancelled", "100", "2025-02-20 13:00:00")])
        .await
        .unwrap();

    assert_eq!(env.net_points("R1").await, 0);
    assert_eq!(env.net_points("R2").await, 20);
    assert_eq!(env.net_points("R3").await, 25);
    assert_eq!(env.open_row("R2").await.same_day_order_count, 0);
    assert_eq!(env.open_row("R3").await.same_day_order_count, 1);
    env.assert_conserved(phone).await;
}

#[tokio::test]
async fn test_partial_cancellation_below_threshold_keeps_bonus() {
    let env = setup().await;
    let phone = "900XXX0005";
    env.ingest(vec![order(phone, "P1", "active", "1500", "2025-02-20 10:00:00")])
        .await
        .unwrap();
    env.ingest(vec![order(
        phone,
        "P1",
        "partially_cancelled",
        "800",
        "2025-02-20 15:00:00",
    )])
    .await
    .unwrap();

    assert_eq!(env.net_points("P1").await, 140);
    env.assert_conserved(phone).await;

    // A later full cancellation reverses whatever is left.
    env.ingest(vec![order(phone, "P1", "cancelled", "800", "2025-02-21 09:00:00")])
        .await
        .unwrap();
    assert_eq!(env.net_points("P1").await, 0);
    env.assert_conserved(phone).await;
}

#[tokio::test]
async fn test_second_cascade_only_deducts_bonus_still_held() {
    let env = setup().await;
    let phone = "900XXX0006";
    let rows = (1..=5)
        .map(|day| {
            order(
                phone,
                &format!("C{}", day),
                "active",
                "50",
                &format!("2025-02-{:02} 10:00:00", day),
            )
        })
        .collect();
    env.ingest(rows).await.unwrap();
    assert_eq!(env.net_points("C3").await, 35);
    assert_eq!(env.net_points("C5").await, 15);

    env.ingest(vec![order(phone, "C2", "cancelled", "50", "2025-02-10 09:00:00")])
        .await
        .unwrap();
    assert_eq!(env.net_points("C3").await, 15);
    assert_eq!(env.open_row("C5").await.streak_count, 3);

    // C5 now sits on a 3-day streak but was never paid for one.
    env.ingest(vec![order(phone, "C4", "cancelled", "50", "2025-02-11 09:00:00")])
        .await
        .unwrap();
    assert_eq!(env.open_row("C5").await.streak_count, 1);
    assert_eq!(env.net_points("C5").await, 15);
    assert!(env
        .repo
        .ledger_entries_for_order(&oid("C5"))
        .await
        .unwrap()
        .iter()
        .all(|e| e.reason != LedgerReason::StreakDeduction));
    env.assert_conserved(phone).await;
}

#[tokio::test]
async fn test_renumbered_repeat_keeps_points_when_streak_breaks() {
    let env = setup().await;
    let phone = "900XXX0007";
    env.ingest(vec![
        order(phone, "K1", "active", "50", "2025-02-01 10:00:00"),
        order(phone, "K2", "active", "50", "2025-02-02 10:00:00"),
        order(phone, "KA", "active", "50", "2025-02-03 10:00:00"),
        order(phone, "KB", "active", "50", "2025-02-03 11:00:00"),
    ])
    .await
    .unwrap();
    assert_eq!(env.net_points("KA").await, 35);
    assert_eq!(env.net_points("KB").await, 20);

    env.ingest(vec![order(phone, "KA", "cancelled", "50", "2025-02-10 09:00:00")])
        .await
        .unwrap();
    assert_eq!(env.net_points("KB").await, 15);
    assert_eq!(env.open_row("KB").await.same_day_order_count, 0);

    // KB was a repeat order when awarded, so there is no streak bonus to take back.
    env.ingest(vec![order(phone, "K2", "cancelled", "50", "2025-02-11 09:00:00")])
        .await
        .unwrap();
    assert_eq!(env.net_points("KB").await, 15);
    env.assert_conserved(phone).await;
}
