#![allow(dead_code)]

use directory_client::InMemoryDirectory;
use notification_service::{MemoryMailer, NotificationDispatcher};
use redis_utils::MemoryStore;
use resilience::RetryConfig;
use std::sync::Arc;
use std::time::Duration;

pub const RECEIPT_TTL: Duration = Duration::from_secs(3600);

/// Quick backoff so failing sends do not slow the suite down
pub fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_retries: 2,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(5),
        backoff_multiplier: 2.0,
        jitter: false,
    }
}

pub struct Harness {
    pub directory: Arc<InMemoryDirectory>,
    pub mailer: Arc<MemoryMailer>,
    pub receipts: Arc<MemoryStore>,
    pub dispatcher: Arc<NotificationDispatcher>,
}

impl Harness {
    pub fn new() -> Self {
        let directory = Arc::new(InMemoryDirectory::new());
        let mailer = Arc::new(MemoryMailer::new());
        let receipts = Arc::new(MemoryStore::new());
        let dispatcher = Arc::new(
            NotificationDispatcher::new(
                directory.clone(),
                mailer.clone(),
                receipts.clone(),
                RECEIPT_TTL,
            )
            .with_retry(fast_retry()),
        );

        Self {
            directory,
            mailer,
            receipts,
            dispatcher,
        }
    }
}
