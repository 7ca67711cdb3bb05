//! HTTP client for the pool status API.

pub mod types;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

use types::{PoolState, ReloadResult, RoundPayout, SessionSummary};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:7786";

pub struct Client {
    http: reqwest::Client,
    base_url: String,
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl Client {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v0{}", self.base_url, path)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        self.http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?
            .error_for_status()?
            .json()
            .await
            .with_context(|| format!("decoding response from {url}"))
    }

    pub async fn get_pool(&self) -> Result<PoolState> {
        self.get("/pool").await
    }

    pub async fn get_sessions(&self) -> Result<Vec<SessionSummary>> {
        self.get("/sessions").await
    }

    pub async fn get_rounds(&self) -> Result<Vec<RoundPayout>> {
        self.get("/rounds").await
    }

    pub async fn reload_credentials(&self) -> Result<ReloadResult> {
        let url = self.url("/credentials/reload");
        self.http
            .post(&url)
            .send()
            .await
            .with_context(|| format!("POST {url}"))?
            .error_for_status()?
            .json()
            .await
            .with_context(|| format!("decoding response from {url}"))
    }
}
