//! PostgREST client for the Supabase record store.
//!
//! Thin REST client with HTTP client tuning (pooling, timeouts), service-key
//! auth headers, and per-operation metrics. Row filtering uses PostgREST
//! `id=eq.{id}` predicates; partial updates are plain JSON PATCH bodies.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::metrics::record_request;
use crate::retry::RetryConfig;

/// Record-store client configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Supabase project URL (e.g. `https://abc.supabase.co`)
    pub base_url: String,
    /// Service-role key used for both `apikey` and bearer headers
    pub service_key: String,
    /// Request timeout
    pub timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
    /// Retry configuration
    pub retry: RetryConfig,
}

impl StoreConfig {
    /// Create config from environment variables.
    pub fn from_env() -> StoreResult<Self> {
        let base_url = std::env::var("SUPABASE_URL")
            .map_err(|_| StoreError::auth_error("SUPABASE_URL must be set to reach the record store"))?;

        let service_key = std::env::var("SUPABASE_SERVICE_ROLE_KEY")
            .map_err(|_| StoreError::auth_error("SUPABASE_SERVICE_ROLE_KEY must be set"))?;

        if service_key.is_empty() {
            return Err(StoreError::auth_error("SUPABASE_SERVICE_ROLE_KEY cannot be empty"));
        }

        let connect_timeout_secs: u64 = std::env::var("STORE_CONNECT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key,
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(connect_timeout_secs),
            retry: RetryConfig::from_env(),
        })
    }
}

/// PostgREST client.
#[derive(Clone)]
pub struct RestClient {
    http: Client,
    config: StoreConfig,
    rest_url: String,
}

impl RestClient {
    /// Create a new client.
    pub fn new(config: StoreConfig) -> StoreResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .user_agent(concat!("vmatch-store/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(StoreError::Network)?;

        let rest_url = format!("{}/rest/v1", config.base_url);

        Ok(Self {
            http,
            config,
            rest_url,
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> StoreResult<Self> {
        Self::new(StoreConfig::from_env()?)
    }

    /// Client configuration (for retry policy access).
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn row_url(&self, table: &str, id: &str) -> String {
        format!(
            "{}/{}?id=eq.{}",
            self.rest_url,
            table,
            urlencoding::encode(id)
        )
    }

    /// Fetch a single row by ID. `None` when no row matches.
    pub async fn select_by_id(&self, table: &str, id: &str) -> StoreResult<Option<Value>> {
        let url = format!("{}&select=*&limit=1", self.row_url(table, id));

        let result = async {
            let response = self
                .http
                .get(&url)
                .header("apikey", &self.config.service_key)
                .bearer_auth(&self.config.service_key)
                .send()
                .await?;

            let status = response.status();
            if status != StatusCode::OK {
                return Err(Self::error_from_response(status, &url, response).await);
            }

            let rows: Vec<Value> = response.json().await?;
            Ok(rows.into_iter().next())
        }
        .await;

        record_request("select_by_id", result.is_ok());
        result
    }

    /// Apply a partial update to a row by ID, returning the matched row count.
    ///
    /// A count of zero means no row matched the predicate: the record was
    /// never created or has been deleted.
    pub async fn update_by_id(&self, table: &str, id: &str, body: &Value) -> StoreResult<usize> {
        let url = self.row_url(table, id);

        let result = async {
            let response = self
                .http
                .patch(&url)
                .header("apikey", &self.config.service_key)
                .bearer_auth(&self.config.service_key)
                .header("Prefer", "return=representation")
                .json(body)
                .send()
                .await?;

            let status = response.status();
            if status != StatusCode::OK {
                return Err(Self::error_from_response(status, &url, response).await);
            }

            let rows: Vec<Value> = response.json().await?;
            debug!(table, id, rows = rows.len(), "Patched record");
            Ok(rows.len())
        }
        .await;

        record_request("update_by_id", result.is_ok());
        result
    }

    async fn error_from_response(
        status: StatusCode,
        url: &str,
        response: reqwest::Response,
    ) -> StoreError {
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_ms = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .map(|secs| secs * 1000)
                .unwrap_or(1000);
            return StoreError::RateLimited(retry_after_ms);
        }

        let body = response.text().await.unwrap_or_default();
        StoreError::from_http_status(status.as_u16(), format!("{} failed: {}", url, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base_url: &str) -> StoreConfig {
        StoreConfig {
            base_url: base_url.to_string(),
            service_key: "service-key".to_string(),
            timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(2),
            retry: RetryConfig::default(),
        }
    }

    #[tokio::test]
    async fn test_select_by_id_found() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/v1/processing_requests"))
            .and(query_param("id", "eq.req-1"))
            .and(header("apikey", "service-key"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([{"id": "req-1", "status": "pending"}])),
            )
            .mount(&server)
            .await;

        let client = RestClient::new(test_config(&server.uri())).unwrap();
        let row = client
            .select_by_id("processing_requests", "req-1")
            .await
            .unwrap();
        assert_eq!(row.unwrap()["status"], "pending");
    }

    #[tokio::test]
    async fn test_select_by_id_missing() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/v1/processing_requests"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let client = RestClient::new(test_config(&server.uri())).unwrap();
        let row = client
            .select_by_id("processing_requests", "nope")
            .await
            .unwrap();
        assert!(row.is_none());
    }

    #[tokio::test]
    async fn test_update_by_id_counts_matched_rows() {
        let server = MockServer::start().await;

        Mock::given(method("PATCH"))
            .and(path("/rest/v1/processing_requests"))
            .and(query_param("id", "eq.req-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "req-1"}])))
            .mount(&server)
            .await;

        let client = RestClient::new(test_config(&server.uri())).unwrap();
        let rows = client
            .update_by_id("processing_requests", "req-1", &json!({"status": "processing"}))
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn test_update_by_id_deleted_record_is_zero_rows() {
        let server = MockServer::start().await;

        Mock::given(method("PATCH"))
            .and(path("/rest/v1/processing_requests"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let client = RestClient::new(test_config(&server.uri())).unwrap();
        let rows = client
            .update_by_id("processing_requests", "gone", &json!({"status": "completed"}))
            .await
            .unwrap();
        assert_eq!(rows, 0);
    }

    #[tokio::test]
    async fn test_auth_failure_maps_to_auth_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let client = RestClient::new(test_config(&server.uri())).unwrap();
        let err = client
            .select_by_id("processing_requests", "req-1")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AuthError(_)));
    }
}
