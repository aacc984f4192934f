use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::{
    endpoint::{Endpoint, GameDetailEndpoint, GamesEndpoint},
    CatalogSource,
};
use crate::{
    config::AppConfig,
    error::{ApiError, ApiResult},
    models::{Game, GamePage},
};

/// Thin REST client: one request in, one decoded value (or error) out.
#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ApiClient {
    /// Client with the default timeouts.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> ApiResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .connect_timeout(Duration::from_secs(6))
            .build()?;
        Ok(Self::with_client(client, base_url, api_key))
    }

    /// Client for the environment and timeouts selected in `config`.
    pub fn from_config(config: &AppConfig) -> ApiResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .build()?;
        Ok(Self::with_client(
            client,
            config.api_root_url(),
            config.api_key.clone(),
        ))
    }

    /// Wrap an already configured `reqwest` client.
    pub fn with_client(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    /// API root this client sends requests to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolve `endpoint` against the API root, query parameters included.
    pub fn url_for(&self, endpoint: &Endpoint) -> ApiResult<Url> {
        let joined = format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            endpoint.path.trim_start_matches('/')
        );
        Url::parse_with_params(&joined, &endpoint.query).map_err(|err| ApiError::InvalidUrl {
            url: joined.clone(),
            reason: err.to_string(),
        })
    }

    /// Send `endpoint` and decode the JSON body as `T`.
    pub async fn request<T: DeserializeOwned>(&self, endpoint: &Endpoint) -> ApiResult<T> {
        let url = self.url_for(endpoint)?;
        debug!(method = ?endpoint.method, path = %endpoint.path, "sending request");

        let mut request = self.client.request(endpoint.method.into(), url);
        for (name, value) in &endpoint.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(body) = endpoint.body.as_ref() {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status { status, body });
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(ApiError::EmptyBody);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl CatalogSource for ApiClient {
    async fn list_games(
        &self,
        page: u32,
        page_size: u32,
        search: Option<&str>,
    ) -> ApiResult<GamePage> {
        let endpoint = GamesEndpoint {
            page,
            page_size,
            search: search.map(str::to_string),
        }
        .endpoint(&self.api_key);
        self.request(&endpoint).await
    }

    async fn game_details(&self, game_id: i64) -> ApiResult<Game> {
        let endpoint = GameDetailEndpoint { game_id }.endpoint(&self.api_key);
        self.request(&endpoint).await
    }
}
