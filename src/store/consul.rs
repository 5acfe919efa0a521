use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};

use super::{KvStore, StoreError};

const CONSUL_TOKEN_HEADER: &str = "X-Consul-Token";

/// Consul KV client (`/v1/kv`).
#[derive(Debug, Clone)]
pub struct ConsulStore {
    base_url: String,
    client: Client,
    token: Option<String>,
}

impl ConsulStore {
    /// Builds a client for the given Consul agent.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build Consul HTTP client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            token: None,
        })
    }

    pub fn set_token(&mut self, token: String) {
        self.token = Some(token);
    }

    fn endpoint(&self, key: &str) -> String {
        format!("{}/v1/kv/{}", self.base_url, key.trim_start_matches('/'))
    }

    fn request(&self, method: Method, url: String) -> RequestBuilder {
        let mut request = self.client.request(method, url);
        if let Some(token) = &self.token {
            request = request.header(CONSUL_TOKEN_HEADER, token);
        }
        request
    }

    async fn send(&self, key: &str, request: RequestBuilder) -> Result<String, StoreError> {
        let response = request.send().await.map_err(|source| StoreError::Transport {
            key: key.to_string(),
            source,
        })?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| StoreError::Transport {
                key: key.to_string(),
                source,
            })?;
        if !status.is_success() {
            return Err(StoreError::Status {
                key: key.to_string(),
                status,
                body,
            });
        }
        Ok(body)
    }

    fn parse_bool(key: &str, body: &str) -> Result<bool, StoreError> {
        match body.trim() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(StoreError::Malformed {
                key: key.to_string(),
                reason: format!("expected true/false, got {other:?}"),
            }),
        }
    }
}

#[async_trait]
impl KvStore for ConsulStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let url = format!("{}?raw", self.endpoint(key));
        match self.send(key, self.request(Method::GET, url)).await {
            Ok(body) => Ok(Some(body)),
            Err(StoreError::Status { status, .. }) if status == StatusCode::NOT_FOUND => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let request = self
            .request(Method::PUT, self.endpoint(key))
            .body(value.to_string());
        let body = self.send(key, request).await?;
        if Self::parse_bool(key, &body)? {
            Ok(())
        } else {
            Err(StoreError::Malformed {
                key: key.to_string(),
                reason: "Consul rejected the write".to_string(),
            })
        }
    }

    async fn set_if_absent(&self, key: &str, value: &str) -> Result<bool, StoreError> {
        // cas=0 only succeeds when the key does not exist.
        let url = format!("{}?cas=0", self.endpoint(key));
        let request = self.request(Method::PUT, url).body(value.to_string());
        let body = self.send(key, request).await?;
        Self::parse_bool(key, &body)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.send(key, self.request(Method::DELETE, self.endpoint(key)))
            .await?;
        Ok(())
    }
}
