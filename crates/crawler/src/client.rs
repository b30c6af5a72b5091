use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use http::{header, StatusCode};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

/// Gerrit prepends `)]}'` to every JSON body to defeat XSSI.
pub const MAGIC_PREFIX_LEN: usize = 4;

#[derive(Debug, Error)]
pub enum GerritApiError {
    #[error("gerrit api error: {status} for {endpoint}")]
    Http {
        status: StatusCode,
        endpoint: String,
    },
    #[error("response from {endpoint} is shorter than the magic prefix")]
    TruncatedBody { endpoint: String },
    #[error("expected a JSON array from {endpoint}")]
    NotAnArray { endpoint: String },
}

impl GerritApiError {
    pub fn status(status: StatusCode, endpoint: impl Into<String>) -> Self {
        Self::Http {
            status,
            endpoint: endpoint.into(),
        }
    }

    pub fn status_code(&self) -> Option<StatusCode> {
        match *self {
            GerritApiError::Http { status, .. } => Some(status),
            _ => None,
        }
    }
}

/// Fetches one page of the change query. An empty vector means no results.
#[async_trait]
pub trait GerritClient: Send + Sync {
    async fn get_changes(&self, url: &Url) -> Result<Vec<Value>>;
}

pub struct HttpGerritClient {
    client: reqwest::Client,
}

impl HttpGerritClient {
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(60))
            .build()
            .context("building http client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl GerritClient for HttpGerritClient {
    #[instrument(skip(self), fields(url = %url))]
    async fn get_changes(&self, url: &Url) -> Result<Vec<Value>> {
        let endpoint = url.path().to_string();
        debug!(endpoint = %endpoint, "Dispatching Gerrit request");
        let response = self
            .client
            .get(url.clone())
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .with_context(|| format!("requesting {endpoint}"))?;
        let status = response.status();
        if !status.is_success() {
            return Err(GerritApiError::status(status, endpoint).into());
        }
        let body = response
            .bytes()
            .await
            .with_context(|| format!("reading body of {endpoint}"))?;
        decode_changes(&body, &endpoint)
    }
}

/// Drops the magic prefix and decodes the remaining JSON array.
pub fn decode_changes(body: &[u8], endpoint: &str) -> Result<Vec<Value>> {
    let json = body
        .get(MAGIC_PREFIX_LEN..)
        .ok_or_else(|| GerritApiError::TruncatedBody {
            endpoint: endpoint.to_string(),
        })?;
    let value: Value = serde_json::from_slice(json)
        .with_context(|| format!("decoding changes from {endpoint}"))?;
    match value {
        Value::Array(items) => Ok(items),
        Value::Null => Ok(Vec::new()),
        _ => Err(GerritApiError::NotAnArray {
            endpoint: endpoint.to_string(),
        }
        .into()),
    }
}
