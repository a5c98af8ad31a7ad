//! Client for the identity service's Directory API
//!
//! Community and notification resolve user ids to names and emails through
//! [`Directory`]. [`HttpDirectoryClient`] talks to the identity service's
//! internal routes; [`InMemoryDirectory`] backs tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

mod memory;

pub use memory::InMemoryDirectory;

/// Header carrying the shared key for `/internal` routes
pub const INTERNAL_API_KEY_HEADER: &str = "x-internal-api-key";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserName {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("directory request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("user {0} not found")]
    NotFound(Uuid),

    #[error("directory responded with status {0}")]
    Status(u16),

    #[error("invalid directory response: {0}")]
    Decode(String),
}

impl DirectoryError {
    /// Transport failures, throttling and 5xx responses may succeed on a later attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            DirectoryError::Transport(_) => true,
            DirectoryError::Status(code) => *code >= 500 || matches!(*code, 408 | 429),
            DirectoryError::NotFound(_) | DirectoryError::Decode(_) => false,
        }
    }
}

/// Synchronous id -> identity resolution.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Names for the given ids; unknown ids are omitted.
    async fn batch_resolve_names(&self, ids: &[Uuid]) -> Result<Vec<UserName>, DirectoryError>;

    /// Emails for the given ids; unknown ids are omitted.
    async fn batch_resolve_emails(&self, ids: &[Uuid]) -> Result<Vec<String>, DirectoryError>;

    async fn resolve(&self, id: Uuid) -> Result<DirectoryUser, DirectoryError>;
}

#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    /// e.g. `http://identity-service:8080`
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl DirectoryConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

pub struct HttpDirectoryClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpDirectoryClient {
    pub fn new(config: DirectoryConfig) -> Result<Self, DirectoryError> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key,
        })
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let request = self.http.post(format!("{}{}", self.base_url, path));
        match &self.api_key {
            Some(key) => request.header(INTERNAL_API_KEY_HEADER, key),
            None => request,
        }
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, DirectoryError> {
        let status = response.status();
        if !status.is_success() {
            return Err(DirectoryError::Status(status.as_u16()));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| DirectoryError::Decode(e.to_string()))
    }
}

#[async_trait]
impl Directory for HttpDirectoryClient {
    async fn batch_resolve_names(&self, ids: &[Uuid]) -> Result<Vec<UserName>, DirectoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let response = self
            .post("/api/users/internal/batch")
            .json(ids)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn batch_resolve_emails(&self, ids: &[Uuid]) -> Result<Vec<String>, DirectoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let response = self
            .post("/api/users/internal/batchEmail")
            .json(ids)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn resolve(&self, id: Uuid) -> Result<DirectoryUser, DirectoryError> {
        let response = self
            .http
            .get(format!("{}/api/users/{}", self.base_url, id))
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(DirectoryError::NotFound(id));
        }
        Self::decode(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer, api_key: Option<&str>) -> HttpDirectoryClient {
        let mut config = DirectoryConfig::new(server.uri());
        config.api_key = api_key.map(str::to_string);
        HttpDirectoryClient::new(config).unwrap()
    }

    #[tokio::test]
    async fn test_batch_resolve_emails_sends_ids_and_key() {
        let server = MockServer::start().await;
        let ids = vec![Uuid::new_v4(), Uuid::new_v4()];

        Mock::given(method("POST"))
            .and(path("/api/users/internal/batchEmail"))
            .and(header(INTERNAL_API_KEY_HEADER, "secret"))
            .and(body_json(&ids))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!(["a@x.com", "b@x.com"])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let emails = client(&server, Some("secret"))
            .batch_resolve_emails(&ids)
            .await
            .unwrap();

        assert_eq!(emails, vec!["a@x.com", "b@x.com"]);
    }

    #[tokio::test]
    async fn test_batch_resolve_names_decodes_pairs() {
        let server = MockServer::start().await;
        let id = Uuid::new_v4();

        Mock::given(method("POST"))
            .and(path("/api/users/internal/batch"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([{ "id": id, "name": "Alice" }])),
            )
            .mount(&server)
            .await;

        let names = client(&server, None).batch_resolve_names(&[id]).await.unwrap();

        assert_eq!(names, vec![UserName { id, name: "Alice".into() }]);
    }

    #[tokio::test]
    async fn test_empty_batch_skips_the_network() {
        let server = MockServer::start().await;

        let emails = client(&server, None).batch_resolve_emails(&[]).await.unwrap();

        assert!(emails.is_empty());
        assert!(server.received_requests().await.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn test_resolve_maps_404_to_not_found() {
        let server = MockServer::start().await;
        let id = Uuid::new_v4();

        Mock::given(method("GET"))
            .and(path(format!("/api/users/{}", id)))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = client(&server, None).resolve(id).await.unwrap_err();

        assert!(matches!(err, DirectoryError::NotFound(found) if found == id));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_server_error_is_retryable() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = client(&server, None)
            .batch_resolve_emails(&[Uuid::new_v4()])
            .await
            .unwrap_err();

        assert!(matches!(err, DirectoryError::Status(503)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_throttling_is_retryable_but_bad_request_is_not() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/users/internal/batchEmail"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/users/internal/batch"))
            .respond_with(ResponseTemplate::new(400))
            .mount(&server)
            .await;

        let directory = client(&server, None);
        let throttled = directory
            .batch_resolve_emails(&[Uuid::new_v4()])
            .await
            .unwrap_err();
        assert!(matches!(throttled, DirectoryError::Status(429)));
        assert!(throttled.is_retryable());

        let rejected = directory
            .batch_resolve_names(&[Uuid::new_v4()])
            .await
            .unwrap_err();
        assert!(matches!(rejected, DirectoryError::Status(400)));
        assert!(!rejected.is_retryable());
    }
}
