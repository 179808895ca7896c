//! Catalog HTTP client.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use tracing::debug;

use crate::error::{CatalogError, CatalogResult};
use crate::token::TokenCache;
use crate::types::{AudioFeatures, AudioFeaturesResponse, SearchResponse, Track};

/// Configuration for the catalog client.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// OAuth client ID
    pub client_id: String,
    /// OAuth client secret
    pub client_secret: String,
    /// Accounts service base URL (token endpoint)
    pub auth_base_url: String,
    /// Web API base URL
    pub api_base_url: String,
    /// Request timeout
    pub timeout: Duration,
}

impl CatalogConfig {
    /// Build config from environment variables.
    ///
    /// Returns `None` when credentials are absent; the catalog is an
    /// optional collaborator, feature-detected by credential presence.
    pub fn from_env() -> Option<Self> {
        let client_id = std::env::var("SPOTIFY_CLIENT_ID")
            .ok()
            .filter(|s| !s.is_empty())?;
        let client_secret = std::env::var("SPOTIFY_CLIENT_SECRET")
            .ok()
            .filter(|s| !s.is_empty())?;

        Some(Self {
            client_id,
            client_secret,
            auth_base_url: std::env::var("SPOTIFY_AUTH_URL")
                .unwrap_or_else(|_| "https://accounts.spotify.com".to_string()),
            api_base_url: std::env::var("SPOTIFY_API_URL")
                .unwrap_or_else(|_| "https://api.spotify.com".to_string()),
            timeout: Duration::from_secs(
                std::env::var("SPOTIFY_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(15),
            ),
        })
    }
}

/// Client for the music catalog (search, audio features).
#[derive(Clone)]
pub struct CatalogClient {
    http: Client,
    api_base_url: String,
    tokens: Arc<TokenCache>,
}

impl CatalogClient {
    /// Create a new catalog client.
    pub fn new(config: CatalogConfig) -> CatalogResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("vmatch-catalog/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(CatalogError::Network)?;

        let tokens = Arc::new(TokenCache::new(
            http.clone(),
            &config.auth_base_url,
            config.client_id,
            config.client_secret,
        ));

        Ok(Self {
            http,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            tokens,
        })
    }

    /// Create from environment variables; `None` without credentials.
    pub fn from_env() -> CatalogResult<Option<Self>> {
        match CatalogConfig::from_env() {
            Some(config) => Ok(Some(Self::new(config)?)),
            None => Ok(None),
        }
    }

    /// Search tracks by free-text query.
    pub async fn search_tracks(&self, query: &str, limit: u32) -> CatalogResult<Vec<Track>> {
        let url = format!(
            "{}/v1/search?q={}&type=track&limit={}&market=US",
            self.api_base_url,
            urlencoding::encode(query),
            limit
        );

        let response = self.get_with_auth(&url).await?;
        let search: SearchResponse = response
            .json()
            .await
            .map_err(|e| CatalogError::invalid_response(format!("bad search response: {}", e)))?;

        let tracks = search.tracks.map(|page| page.items).unwrap_or_default();
        debug!(query, count = tracks.len(), "Catalog search");
        Ok(tracks)
    }

    /// Batched audio-features lookup; entries are `None` for unknown IDs.
    pub async fn audio_features(&self, ids: &[String]) -> CatalogResult<Vec<Option<AudioFeatures>>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!(
            "{}/v1/audio-features?ids={}",
            self.api_base_url,
            ids.join(",")
        );

        let response = self.get_with_auth(&url).await?;
        let features: AudioFeaturesResponse = response.json().await.map_err(|e| {
            CatalogError::invalid_response(format!("bad audio-features response: {}", e))
        })?;

        Ok(features.audio_features)
    }

    /// Issue an authorized GET, refreshing the token once on 401.
    async fn get_with_auth(&self, url: &str) -> CatalogResult<reqwest::Response> {
        let token = self.tokens.get_token().await?;
        let mut response = self.http.get(url).bearer_auth(&token).send().await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            self.tokens.invalidate().await;
            let token = self.tokens.get_token().await?;
            response = self.http.get(url).bearer_auth(&token).send().await?;
        }

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::TOO_MANY_REQUESTS => CatalogError::RateLimited(1000),
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    CatalogError::auth_error(format!("{} returned {}: {}", url, status, body))
                }
                _ => CatalogError::request_failed(format!("{} returned {}: {}", url, status, body)),
            });
        }

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> CatalogClient {
        Mock::given(method("POST"))
            .and(path("/api/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "tok",
                "token_type": "Bearer",
                "expires_in": 3600
            })))
            .mount(server)
            .await;

        CatalogClient::new(CatalogConfig {
            client_id: "id".into(),
            client_secret: "secret".into(),
            auth_base_url: server.uri(),
            api_base_url: server.uri(),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_search_tracks() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/search"))
            .and(query_param("type", "track"))
            .and(query_param("limit", "20"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "tracks": {
                    "items": [{
                        "id": "t1",
                        "name": "Sunrise",
                        "artists": [{"name": "Dawn"}],
                        "popularity": 70,
                        "preview_url": null
                    }]
                }
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let tracks = client.search_tracks("genre:\"ambient\"", 20).await.unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].name, "Sunrise");
        assert_eq!(tracks[0].artist_names(), "Dawn");
    }

    #[tokio::test]
    async fn test_audio_features_batch() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/audio-features"))
            .and(query_param("ids", "t1,t2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "audio_features": [
                    {"id": "t1", "energy": 0.9, "valence": 0.8},
                    null
                ]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let features = client
            .audio_features(&["t1".to_string(), "t2".to_string()])
            .await
            .unwrap();
        assert_eq!(features.len(), 2);
        assert!(features[0].is_some());
        assert!(features[1].is_none());
    }

    #[tokio::test]
    async fn test_empty_ids_short_circuits() {
        let server = MockServer::start().await;
        let client = client_for(&server).await;
        let features = client.audio_features(&[]).await.unwrap();
        assert!(features.is_empty());
    }
}
