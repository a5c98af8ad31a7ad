/// Identity Service Main Entry Point
///
/// Starts the HTTP server with:
/// - PostgreSQL connection pool (users + outbox)
/// - Redis-backed ephemeral store
/// - Outbox processor draining events to Kafka (background task)
use actix_web::{App, HttpServer};
use anyhow::{Context, Result};
use identity_service::{
    config::Settings,
    db::PgUserRepository,
    services::RandomCodeGenerator,
    state::Dependencies,
    AppState,
};
use redis_utils::{RedisPool, RedisStore};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_actix_web::TracingLogger;
use transactional_outbox::{KafkaOutboxPublisher, OutboxProcessor, SqlxOutboxRepository};

#[actix_web::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "identity_service=info,info".into()),
        )
        .with_target(false)
        .json()
        .init();

    info!("Starting Identity Service");

    let settings = Settings::load().context("Failed to load configuration")?;
    let codec = Arc::new(settings.jwt.codec()?);
    info!(issuer = %settings.jwt.issuer, "JWT codec initialized");

    let db_pool = PgPoolOptions::new()
        .max_connections(settings.database.max_connections)
        .acquire_timeout(Duration::from_secs(settings.database.acquire_timeout))
        .connect(&settings.database.url)
        .await
        .context("Failed to connect to PostgreSQL")?;

    info!(
        "Database pool initialized with {} max connections",
        settings.database.max_connections
    );

    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .context("Failed to run database migrations")?;
    info!("Database migrations completed");

    let redis_pool = RedisPool::connect(&settings.redis.url)
        .await
        .context("Failed to connect to Redis")?;
    let store = Arc::new(RedisStore::new(redis_pool.manager()));

    let outbox = Arc::new(SqlxOutboxRepository::new(db_pool.clone()));

    if settings.kafka.brokers.is_empty() {
        info!("Kafka brokers not configured; outbox events stay queued");
    } else {
        let publisher = KafkaOutboxPublisher::connect(&settings.kafka.brokers)
            .context("Failed to create Kafka producer")?;
        let processor = OutboxProcessor::new(
            outbox.clone(),
            Arc::new(publisher),
            settings.kafka.outbox_batch_size,
            Duration::from_millis(settings.kafka.outbox_poll_interval_ms),
            settings.kafka.outbox_max_retries,
        );
        tokio::spawn(async move { processor.start().await });
        info!("Outbox processor started");
    }

    let state = AppState::new(Dependencies {
        users: Arc::new(PgUserRepository::new(db_pool.clone())),
        store,
        outbox,
        codes: Arc::new(RandomCodeGenerator::new()),
        codec,
        registration_ttl: settings.registration.ttl(),
        internal_api_key: settings.server.internal_api_key.clone(),
    });

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    info!("Starting HTTP server on {}", addr);

    let result = HttpServer::new(move || {
        App::new()
            .wrap(state.auth())
            .wrap(TracingLogger::default())
            .configure(|cfg| state.configure(cfg))
    })
    .bind(&addr)
    .with_context(|| format!("Failed to bind {}", addr))?
    .run()
    .await;

    if let Err(e) = &result {
        error!(error = %e, "HTTP server terminated");
    }
    result.context("HTTP server error")
}
