// Grafana HTTP API repository implementation
use crate::application::dashboard_repository::DashboardRepository;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GrafanaError {
    #[error("Dashboard not found. Status code {status}, URL: {url}")]
    NotFound { status: u16, url: String },

    #[error("Dashboard could not be posted to {url}. Status code: {status}")]
    PushFailed { status: u16, url: String },
}

#[derive(Debug, Clone)]
pub struct GrafanaRepository {
    host: String,
    token: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct PushResponse {
    #[serde(default)]
    uid: Option<String>,
}

impl GrafanaRepository {
    pub fn new(host: String, token: String) -> Self {
        Self {
            host: host.trim_end_matches('/').to_string(),
            token,
            client: reqwest::Client::new(),
        }
    }

    fn dashboard_url(&self, uid: &str) -> String {
        format!("{}/api/dashboards/uid/{}", self.host, urlencoding::encode(uid))
    }

    fn push_url(&self) -> String {
        format!("{}/api/dashboards/db", self.host)
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.token))
            .context("Grafana token is not a valid header value")?;
        headers.insert(AUTHORIZATION, bearer);
        Ok(headers)
    }
}

#[async_trait]
impl DashboardRepository for GrafanaRepository {
    async fn fetch(&self, uid: &str) -> Result<String> {
        let url = self.dashboard_url(uid);
        tracing::debug!("Fetching dashboard from {}", url);

        let response = self
            .client
            .get(&url)
            .headers(self.headers()?)
            .send()
            .await
            .context("Failed to send request to Grafana")?;

        if !response.status().is_success() {
            return Err(GrafanaError::NotFound {
                status: response.status().as_u16(),
                url,
            }
            .into());
        }

        response
            .text()
            .await
            .context("Failed to read Grafana response")
    }

    async fn push(&self, document: &Value) -> Result<Option<String>> {
        let url = self.push_url();
        tracing::debug!("Posting dashboard to {}", url);

        let response = self
            .client
            .post(&url)
            .headers(self.headers()?)
            .json(document)
            .send()
            .await
            .context("Failed to send request to Grafana")?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Grafana rejected dashboard ({}): {}", status, body);
            return Err(GrafanaError::PushFailed { status, url }.into());
        }

        let pushed = response
            .json::<PushResponse>()
            .await
            .map(|body| body.uid)
            .unwrap_or_else(|e| {
                tracing::warn!("Could not read uid from Grafana response: {}", e);
                None
            });
        Ok(pushed)
    }
}
