use crate::query::BackendQuery;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ServiceError {
    #[error("HTTP error requesting {url}: {msg}")]
    Http { url: String, msg: String },
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },
    #[error("Decode error for {url}: {msg}")]
    Decode { url: String, msg: String },
    #[error("{0}")]
    Rejected(String),
    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

/// Envelope every analytics endpoint answers with.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn into_result(self) -> Result<T, ServiceError> {
        if !self.success {
            return Err(ServiceError::Rejected(
                self.message
                    .unwrap_or_else(|| "request was not successful".to_string()),
            ));
        }
        self.data
            .ok_or_else(|| ServiceError::Rejected("response contained no data".to_string()))
    }
}

/// Something the dashboard can flush before a forced refresh.
pub trait CacheLayer: Send + Sync {
    fn clear(&self);
}

#[derive(Debug, Clone)]
struct CachedResponse {
    body: serde_json::Value,
    stored_at: Instant,
}

/// Successful response bodies keyed by request URL.
pub struct ResponseCache {
    entries: DashMap<String, CachedResponse>,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        {
            let entry = self.entries.get(key)?;
            if entry.stored_at.elapsed() < self.ttl {
                return Some(entry.body.clone());
            }
        }
        self.entries.remove(key);
        None
    }

    /// Store `body` and sweep every expired entry.
    pub fn insert(&self, key: String, body: serde_json::Value) {
        if self.ttl.is_zero() {
            return;
        }
        let ttl = self.ttl;
        self.entries.retain(|_, entry| entry.stored_at.elapsed() < ttl);
        self.entries.insert(
            key,
            CachedResponse {
                body,
                stored_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CacheLayer for ResponseCache {
    fn clear(&self) {
        let dropped = self.entries.len();
        self.entries.clear();
        tracing::debug!(dropped, "response cache cleared");
    }
}

/// Thin JSON client for the analytics REST API.
#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    cache: Arc<ResponseCache>,
}

impl ApiClient {
    pub fn new(
        base_url: &str,
        token: Option<String>,
        timeout: Option<Duration>,
        cache: Arc<ResponseCache>,
    ) -> Result<Self, ServiceError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ServiceError::Client(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            cache,
        })
    }

    pub fn cache(&self) -> Arc<ResponseCache> {
        self.cache.clone()
    }

    pub fn endpoint_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn cache_key(url: &str, query: &BackendQuery) -> String {
        if query.is_empty() {
            url.to_string()
        } else {
            format!("{}?{}", url, query.to_query_string())
        }
    }

    /// GET `path` and unwrap the `{success, data, message}` envelope.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &BackendQuery,
    ) -> Result<T, ServiceError> {
        let url = self.endpoint_url(path);
        let key = Self::cache_key(&url, query);

        if let Some(body) = self.cache.get(&key) {
            tracing::trace!("cache hit for {}", key);
            return decode(&url, body);
        }

        let mut request = self.client.get(&url).query(query.pairs());
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| ServiceError::Http {
            url: url.clone(),
            msg: e.to_string(),
        })?;

        if !response.status().is_success() {
            return Err(ServiceError::Status {
                url,
                status: response.status().as_u16(),
            });
        }

        let envelope: ApiResponse<serde_json::Value> =
            response.json().await.map_err(|e| ServiceError::Decode {
                url: url.clone(),
                msg: e.to_string(),
            })?;
        let body = envelope.into_result()?;
        self.cache.insert(key, body.clone());
        decode(&url, body)
    }
}

fn decode<T: DeserializeOwned>(url: &str, body: serde_json::Value) -> Result<T, ServiceError> {
    serde_json::from_value(body).map_err(|e| ServiceError::Decode {
        url: url.to_string(),
        msg: e.to_string(),
    })
}
