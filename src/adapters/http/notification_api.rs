//! REST client for the notification read side.
//!
//! # Endpoints
//!
//! - `GET {base}/notifications/unread-count` - bare number or
//!   `{"count": n}` / `{"unreadCount": n}`
//! - `GET {base}/notifications?limit=n` - array, or a page object with the
//!   array under `content`
//!
//! # Example
//!
//! ```ignore
//! let api = HttpNotificationApi::new(HttpNotificationApiConfig::new("https://lab.example.com/api"))?;
//! let unread = api.unread_count(&credential).await?;
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::domain::foundation::{Credential, DomainError, ErrorCode};
use crate::domain::notification::Notification;
use crate::ports::NotificationApi;

/// Configuration for the REST client.
#[derive(Debug, Clone)]
pub struct HttpNotificationApiConfig {
    /// API base URL, e.g. "https://lab.example.com/api".
    pub base_url: String,

    /// Per-request timeout.
    ///
    /// Default: 10 seconds
    pub timeout: Duration,
}

impl HttpNotificationApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

/// `NotificationApi` over reqwest.
#[derive(Debug, Clone)]
pub struct HttpNotificationApi {
    config: HttpNotificationApiConfig,
    client: Client,
}

impl HttpNotificationApi {
    pub fn new(config: HttpNotificationApiConfig) -> Result<Self, DomainError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                DomainError::new(ErrorCode::InternalError, format!("HTTP client: {}", e))
            })?;
        Ok(Self { config, client })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        credential: &Credential,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, DomainError> {
        let url = self.config.endpoint(path);
        let response = self
            .client
            .get(&url)
            .bearer_auth(credential.expose_token())
            .query(query)
            .send()
            .await
            .map_err(|e| {
                DomainError::new(ErrorCode::ExternalServiceError, e.to_string())
                    .with_detail("url", url.clone())
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(DomainError::new(
                ErrorCode::Unauthorized,
                format!("notification API rejected the credential ({})", status.as_u16()),
            ));
        }
        if !status.is_success() {
            return Err(
                DomainError::new(ErrorCode::ExternalServiceError, "notification API error")
                    .with_detail("status", status.as_u16().to_string())
                    .with_detail("url", url),
            );
        }

        response.json::<T>().await.map_err(|e| {
            DomainError::new(ErrorCode::DecodeFailed, e.to_string()).with_detail("url", url)
        })
    }
}

/// The count endpoint has answered in three shapes over time.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum UnreadCountBody {
    Bare(u64),
    Wrapped {
        #[serde(alias = "unreadCount")]
        count: u64,
    },
}

impl From<UnreadCountBody> for u64 {
    fn from(body: UnreadCountBody) -> Self {
        match body {
            UnreadCountBody::Bare(count) | UnreadCountBody::Wrapped { count } => count,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RecentBody {
    List(Vec<Notification>),
    Page { content: Vec<Notification> },
}

impl From<RecentBody> for Vec<Notification> {
    fn from(body: RecentBody) -> Self {
        match body {
            RecentBody::List(items) | RecentBody::Page { content: items } => items,
        }
    }
}

#[async_trait]
impl NotificationApi for HttpNotificationApi {
    async fn unread_count(&self, credential: &Credential) -> Result<u64, DomainError> {
        let body: UnreadCountBody = self
            .get_json(credential, "notifications/unread-count", &[])
            .await?;
        let count = u64::from(body);
        tracing::debug!(user = %credential.subject(), count, "Fetched unread count");
        Ok(count)
    }

    async fn recent(
        &self,
        credential: &Credential,
        limit: usize,
    ) -> Result<Vec<Notification>, DomainError> {
        let body: RecentBody = self
            .get_json(credential, "notifications", &[("limit", limit.to_string())])
            .await?;
        let mut items = Vec::from(body);
        items.truncate(limit);
        tracing::debug!(user = %credential.subject(), count = items.len(), "Fetched recent notifications");
        Ok(items)
    }
}
