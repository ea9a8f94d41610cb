use cartola_coach::application::handlers::market_handler::{router, AppState};
use cartola_coach::application::services::market_service::MarketService;
use cartola_coach::config::{BackendKind, MarketConfig};
use cartola_coach::infrastructure::in_memory_backend::{InMemoryBackend, MarketFixture};
use cartola_coach::infrastructure::rest_backend::RestBackendClient;
use cartola_coach::persistence::models::CreatePlayer;
use cartola_coach::persistence::{init_database, DatabaseError};
use cartola_coach::persistence::repository::SqliteMarketRepository;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Load fixture players, balances and the active round into the database
async fn seed_repository(
    repository: &SqliteMarketRepository,
    fixture: &MarketFixture,
) -> Result<(), DatabaseError> {
    for player in &fixture.players {
        if let (Some(team_id), Some(team)) = (player.team_id, &player.team) {
            repository
                .upsert_team(team_id, &team.name, team.crest_url.as_deref())
                .await?;
        }
        repository.upsert_player(CreatePlayer::from(player)).await?;
    }
    for (user_id, balance) in &fixture.budgets {
        repository.register_user(user_id, None).await?;
        repository.set_balance(user_id, *balance).await?;
    }
    if let Some(round) = &fixture.active_round {
        repository.create_round(round.id, round.number).await?;
        if round.is_active() {
            repository.start_round(round.id).await?;
        }
    }
    info!(
        "Seeded database with {} players and {} users",
        fixture.players.len(),
        fixture.budgets.len()
    );
    Ok(())
}

async fn build_service(config: &MarketConfig) -> Result<MarketService, Box<dyn std::error::Error>> {
    let service = match config.backend {
        BackendKind::Sqlite => {
            let pool = init_database(&config.database).await?;
            let repository = SqliteMarketRepository::new(pool, config.initial_budget);
            if let Some(path) = &config.fixture_path {
                let json = tokio::fs::read_to_string(path).await?;
                seed_repository(&repository, &serde_json::from_str::<MarketFixture>(&json)?).await?;
            }
            MarketService::with_backend(Arc::new(repository))
        }
        BackendKind::Rest => {
            let rest = config
                .rest
                .clone()
                .ok_or("REST backend selected without BACKEND_URL")?;
            info!("Using REST backend at {}", rest.base_url);
            MarketService::with_backend(Arc::new(RestBackendClient::new(rest)?))
        }
        BackendKind::Memory => {
            let mut fixture = match &config.fixture_path {
                Some(path) => {
                    let json = tokio::fs::read_to_string(path).await?;
                    serde_json::from_str::<MarketFixture>(&json)?
                }
                None => {
                    warn!("MARKET_FIXTURE not set, starting with an empty market");
                    MarketFixture::default()
                }
            };
            fixture.default_budget.get_or_insert(config.initial_budget);
            MarketService::with_backend(Arc::new(InMemoryBackend::from_fixture(fixture)))
        }
    };
    Ok(service)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cartola_coach=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = MarketConfig::from_env()?;
    info!("Cartola Coach starting with {:?} backend", config.backend);

    let service = build_service(&config).await?;
    let app = router(
        AppState::new(Arc::new(service)).with_idle_timeout(config.session_idle_timeout),
    );

    info!("Listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    let server = axum::serve(listener, app);

    let shutdown_signal = async {
        let ctrl_c = async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Received Ctrl+C signal"),
                Err(e) => error!("Failed to install Ctrl+C handler: {}", e),
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sig) => {
                    sig.recv().await;
                    info!("Received SIGTERM signal");
                }
                Err(e) => error!("Failed to install SIGTERM handler: {}", e),
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
    };

    server.with_graceful_shutdown(shutdown_signal).await?;

    info!("Shutdown complete");
    Ok(())
}
