use std::net::SocketAddr;
use std::sync::Arc;
use streakboard::orchestration::DailyHighlights;
use streakboard::{api, config::Config, db::init_db, Repository, Scheduler};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let port = config.port;

    let pool = match init_db(&config.database_path).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to initialize database: {}", e);
            std::process::exit(1);
        }
    };

    let repo = Arc::new(Repository::new(pool));
    let state = api::AppState::new(repo.clone(), config.clone());

    if config.scheduler_enabled {
        let highlights = Arc::new(DailyHighlights::new(repo, config.business_tz()));
        Scheduler::standard(
            &config,
            state.materializer.clone(),
            state.archiver.clone(),
            highlights,
        )
        .spawn();
    } else {
        tracing::info!("Scheduler disabled");
    }

    let app = api::create_router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    tracing::info!("Server listening on {}", addr);

    if let Err(e) = axum::serve(listener, app).await {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }
}
