pub mod health;
pub mod leaderboard;
pub mod uploads;

use crate::config::Config;
use crate::db::Repository;
use crate::orchestration::{BatchIngestor, LeaderboardMaterializer, UploadHistory, WinnerArchiver};
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Upload bodies are whole CSV files.
const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub config: Config,
    pub ingestor: Arc<BatchIngestor>,
    pub materializer: Arc<LeaderboardMaterializer>,
    pub archiver: Arc<WinnerArchiver>,
    pub uploads: Arc<UploadHistory>,
}

impl AppState {
    pub fn new(repo: Arc<Repository>, config: Config) -> Self {
        let tz = config.business_tz();
        let materializer = Arc::new(LeaderboardMaterializer::new(repo.clone(), tz));
        Self {
            ingestor: Arc::new(BatchIngestor::new(repo.clone(), &config)),
            archiver: Arc::new(WinnerArchiver::new(
                repo.clone(),
                materializer.clone(),
                config.winners_per_period,
            )),
            uploads: Arc::new(UploadHistory::new(repo.clone())),
            materializer,
            repo,
            config,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route(
            "/v1/orders/upload",
            post(uploads::upload_orders).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/v1/uploads", get(uploads::list_uploads))
        .route("/v1/uploads/export", get(uploads::export_uploads))
        .route("/v1/leaderboard/:period", get(leaderboard::get_leaderboard))
        .route("/v1/search", get(leaderboard::search))
        .route("/v1/winners", get(leaderboard::get_winners))
        .route("/v1/winners/demotions", get(leaderboard::get_winner_demotions))
        .layer(cors)
        .with_state(state)
}
