use badge_gate::{
    AppState,
    clock::{ClockState, SystemClock},
    config::{AppConfig, Env},
    create_router,
    notifier::{BroadcastUnlockNotifier, NotifierState, forward_unlocks},
    repository::{PostgresRepository, RepositoryState},
    spawn_tag_read_worker,
    tag_reads::{TagReadDispatcher, TagReadHandler},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Initializes configuration, logging, the database, the tag-read pipeline and
/// the HTTP server, then serves until Ctrl-C.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Configuration (fail-fast on missing production secrets).
    dotenv::dotenv().ok();
    let config = AppConfig::load()?;

    // 2. Logging: RUST_LOG wins, otherwise sensible development defaults.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "badge_gate=debug,tower_http=info,axum=trace".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            // JSON lines for the log aggregator.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 3. Database.
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.db_url)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    let repo = Arc::new(PostgresRepository::new(pool)) as RepositoryState;

    // 4. Unlock fan-out. The actuator integration subscribes here.
    let notifier = BroadcastUnlockNotifier::new(64);
    tokio::spawn(forward_unlocks(notifier.subscribe(), |_| {
        tracing::info!("door unlock signalled");
    }));
    let notifier = Arc::new(notifier) as NotifierState;

    // 5. Tag-read pipeline: bounded queue + background worker.
    let clock = Arc::new(SystemClock::new(config.timezone)) as ClockState;
    let (tag_reads, receiver) = TagReadDispatcher::channel(config.tag_read_queue_capacity);
    let handler = TagReadHandler::new(repo.clone(), notifier, clock.clone());
    let worker = spawn_tag_read_worker(handler, receiver);

    // 6. HTTP server.
    let bind_addr = config.bind_addr.clone();
    let app = create_router(AppState {
        repo,
        clock,
        tag_reads,
        config,
    });

    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at /swagger-ui");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("failed to listen for shutdown signal: {}", e);
            }
        })
        .await?;

    // The router held the last dispatcher; the worker drains what is queued and exits.
    worker.await?;
    tracing::info!("Shutdown complete");
    Ok(())
}
