/// Community Service Main Entry Point
///
/// Starts the HTTP server with:
/// - PostgreSQL connection pool (spectors, messages, reactions + outbox)
/// - Redis-backed message cache
/// - Outbox processor draining post/comment/reaction events to Kafka
/// - `user-delete` consumer removing memberships of deleted accounts
use actix_web::{App, HttpServer};
use anyhow::{Context, Result};
use community_service::{
    config::Settings, db::PgCommunityRepository, state::Dependencies, AppState,
};
use directory_client::HttpDirectoryClient;
use event_consumer::spawn_consumers;
use event_schema::Topic;
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
            std::env::var("RUST_LOG").unwrap_or_else(|_| "community_service=info,info".into()),
        )
        .with_target(false)
        .json()
        .init();

    info!("Starting Community Service");

    let settings = Settings::load().context("Failed to load configuration")?;
    let codec = Arc::new(settings.jwt.codec()?);

    let db_pool = PgPoolOptions::new()
        .max_connections(settings.database.max_connections)
        .acquire_timeout(Duration::from_secs(settings.database.acquire_timeout))
        .connect(&settings.database.url)
        .await
        .context("Failed to connect to PostgreSQL")?;

    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .context("Failed to run database migrations")?;
    info!("Database migrations completed");

    let redis_pool = RedisPool::connect(&settings.redis.url)
        .await
        .context("Failed to connect to Redis")?;

    let directory = HttpDirectoryClient::new(settings.directory.client_config())
        .context("Failed to build Directory API client")?;
    info!(base_url = %settings.directory.base_url, "Directory API client initialized");

    let state = AppState::new(Dependencies {
        repo: Arc::new(PgCommunityRepository::new(db_pool.clone())),
        store: Arc::new(RedisStore::new(redis_pool.manager())),
        directory: Arc::new(directory),
        codec,
        message_link_base: settings.content.message_link_base.clone(),
        message_cache_ttl: settings.content.message_cache_ttl(),
    });

    if settings.kafka.brokers.is_empty() {
        info!("Kafka brokers not configured; outbox events stay queued and user-delete is not consumed");
    } else {
        let outbox = Arc::new(SqlxOutboxRepository::new(db_pool.clone()));
        let publisher = KafkaOutboxPublisher::connect(&settings.kafka.brokers)
            .context("Failed to create Kafka producer")?;
        let processor = OutboxProcessor::new(
            outbox,
            Arc::new(publisher),
            settings.kafka.outbox_batch_size,
            Duration::from_millis(settings.kafka.outbox_poll_interval_ms),
            settings.kafka.outbox_max_retries,
        );
        tokio::spawn(async move { processor.start().await });
        info!("Outbox processor started");

        spawn_consumers(
            &settings.kafka.consumer_config(),
            &[Topic::UserDelete],
            state.membership_cleanup.clone(),
        )
        .context("Failed to start user-delete consumer")?;
        info!(group_id = %settings.kafka.group_id, "user-delete consumer started");
    }

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
