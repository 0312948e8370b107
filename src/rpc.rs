use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{Error, Result};

/// Anything that can answer Ethereum JSON-RPC requests.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(&self, method: &str, params: Value) -> Result<Value>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcSettings {
    pub timeout_secs: u64,
    pub retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for RpcSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            retries: 3,
            retry_delay_ms: 500,
        }
    }
}

pub struct HttpTransport {
    api_url: String,
    client: reqwest::Client,
    settings: RpcSettings,
    next_id: AtomicU64,
}

impl HttpTransport {
    pub fn new(api_url: &str, settings: RpcSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        Ok(Self::with_client(api_url, client, settings))
    }

    pub fn with_client(api_url: &str, client: reqwest::Client, settings: RpcSettings) -> Self {
        Self {
            api_url: crate::utils::remove_trailing_slash(api_url),
            client,
            settings,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn build_body(&self, method: &str, params: &Value) -> Value {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        })
    }

    async fn post(&self, body: &Value) -> Result<Value> {
        let response = self.client.post(&self.api_url).json(body).send().await?;
        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::RateLimited);
        }
        let response = response.error_for_status()?;
        let text = response.text().await?;
        let parsed: Value = serde_json::from_str(&text)?;
        Ok(parsed)
    }
}

/// Pull the `result` out of a JSON-RPC response, turning `error` objects into [`Error::Rpc`].
pub fn unwrap_response(response: Value) -> Result<Value> {
    if let Some(error) = response.get("error") {
        let code = error.get("code").and_then(|c| c.as_i64()).unwrap_or(0);
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or_default()
            .to_string();
        return Err(Error::Rpc { code, message });
    }
    match response.get("result") {
        Some(result) => Ok(result.clone()),
        None => Err(Error::invalid_response("neither result nor error in response")),
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        let body = self.build_body(method, &params);
        tracing::debug!(method, url = %self.api_url, "json-rpc request");
        // Only transport failures are retried; a JSON-RPC error is a final answer.
        let response = crate::utils::retry(self.settings.retries, self.settings.retry_delay_ms, || {
            self.post(&body)
        })
        .await?;
        unwrap_response(response)
    }
}
