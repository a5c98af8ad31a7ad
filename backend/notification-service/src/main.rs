/// Notification Service Main Entry Point
///
/// Starts:
/// - one Kafka consumer per notification topic
/// - the SMTP mailer (no-op when `SMTP_HOST` is empty)
/// - a health probe on `/health`
use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use directory_client::HttpDirectoryClient;
use event_consumer::spawn_consumers;
use event_schema::Topic;
use notification_service::{config::Settings, NotificationDispatcher, SmtpMailer};
use redis_utils::{RedisPool, RedisStore};
use std::sync::Arc;
use tracing::{error, info};

const TOPICS: [Topic; 4] = [
    Topic::RegistrationCode,
    Topic::NewPost,
    Topic::NewComment,
    Topic::NewReaction,
];

#[actix_web::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "notification_service=info,info".into()),
        )
        .with_target(false)
        .json()
        .init();

    info!("Starting Notification Service");

    let settings = Settings::load().context("Failed to load configuration")?;

    let redis_pool = RedisPool::connect(&settings.redis.url)
        .await
        .context("Failed to connect to Redis")?;

    let directory = HttpDirectoryClient::new(settings.directory.client_config())
        .context("Failed to build Directory API client")?;
    let mailer = SmtpMailer::new(&settings.smtp).context("Failed to configure mailer")?;
    info!(enabled = mailer.is_enabled(), "Mailer initialized");

    let dispatcher = Arc::new(
        NotificationDispatcher::new(
            Arc::new(directory),
            Arc::new(mailer),
            Arc::new(RedisStore::new(redis_pool.manager())),
            settings.delivery.receipt_ttl(),
        )
        .with_retry(settings.delivery.retry()),
    );

    let consumers = spawn_consumers(&settings.kafka.consumer_config(), &TOPICS, dispatcher)
        .context("Failed to start Kafka consumers")?;
    info!(
        consumers = consumers.len(),
        group_id = %settings.kafka.group_id,
        "Kafka consumers started"
    );

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    info!("Starting health probe on {}", addr);

    let result = HttpServer::new(|| App::new().route("/health", web::get().to(|| async { "OK" })))
        .bind(&addr)
        .with_context(|| format!("Failed to bind {}", addr))?
        .run()
        .await;

    if let Err(e) = &result {
        error!(error = %e, "Health server terminated");
    }
    result.context("HTTP server error")
}
