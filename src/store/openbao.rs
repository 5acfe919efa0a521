use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};

use super::{KvStore, StoreError};

const VAULT_TOKEN_HEADER: &str = "X-Vault-Token";
const CAS_MISMATCH: &str = "check-and-set parameter did not match";

/// `OpenBao` KV v2 client. Each entry is stored as `{ "value": <string> }`.
#[derive(Debug, Clone)]
pub struct OpenBaoStore {
    base_url: String,
    kv_mount: String,
    client: Client,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct KvReadResponse {
    data: KvReadData,
}

#[derive(Debug, Deserialize)]
struct KvReadData {
    data: KvValue,
}

#[derive(Debug, Deserialize)]
struct KvValue {
    value: String,
}

#[derive(Debug, Serialize)]
struct KvWriteRequest<'a> {
    data: KvWriteValue<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<KvWriteOptions>,
}

#[derive(Debug, Serialize)]
struct KvWriteValue<'a> {
    value: &'a str,
}

#[derive(Debug, Serialize)]
struct KvWriteOptions {
    cas: u64,
}

impl OpenBaoStore {
    /// Builds a client for the given `OpenBao` server and KV v2 mount.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: &str, kv_mount: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build OpenBao HTTP client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            kv_mount: kv_mount.trim_matches('/').to_string(),
            client,
            token: None,
        })
    }

    pub fn set_token(&mut self, token: String) {
        self.token = Some(token);
    }

    fn endpoint(&self, section: &str, key: &str) -> String {
        format!(
            "{}/v1/{}/{section}/{}",
            self.base_url,
            self.kv_mount,
            key.trim_start_matches('/')
        )
    }

    fn request(&self, method: Method, url: String) -> Result<RequestBuilder, StoreError> {
        let token = self.token.as_ref().ok_or(StoreError::MissingToken)?;
        Ok(self
            .client
            .request(method, url)
            .header(VAULT_TOKEN_HEADER, token))
    }

    async fn send(
        &self,
        key: &str,
        request: RequestBuilder,
    ) -> Result<(StatusCode, String), StoreError> {
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
        Ok((status, body))
    }

    async fn write(&self, key: &str, value: &str, cas: Option<u64>) -> Result<bool, StoreError> {
        let body = KvWriteRequest {
            data: KvWriteValue { value },
            options: cas.map(|cas| KvWriteOptions { cas }),
        };
        let request = self
            .request(Method::POST, self.endpoint("data", key))?
            .json(&body);
        let (status, text) = self.send(key, request).await?;
        if status.is_success() {
            return Ok(true);
        }
        if cas.is_some() && status == StatusCode::BAD_REQUEST && text.contains(CAS_MISMATCH) {
            return Ok(false);
        }
        Err(StoreError::Status {
            key: key.to_string(),
            status,
            body: text,
        })
    }
}

#[async_trait]
impl KvStore for OpenBaoStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let request = self.request(Method::GET, self.endpoint("data", key))?;
        let (status, text) = self.send(key, request).await?;
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(StoreError::Status {
                key: key.to_string(),
                status,
                body: text,
            });
        }
        let parsed: KvReadResponse =
            serde_json::from_str(&text).map_err(|err| StoreError::Malformed {
                key: key.to_string(),
                reason: err.to_string(),
            })?;
        Ok(Some(parsed.data.data.value))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.write(key, value, None).await.map(|_| ())
    }

    async fn set_if_absent(&self, key: &str, value: &str) -> Result<bool, StoreError> {
        // cas=0 only succeeds when no version of the secret exists.
        self.write(key, value, Some(0)).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        // Metadata delete drops every version so a later cas=0 write succeeds.
        let request = self.request(Method::DELETE, self.endpoint("metadata", key))?;
        let (status, text) = self.send(key, request).await?;
        if status.is_success() || status == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Err(StoreError::Status {
            key: key.to_string(),
            status,
            body: text,
        })
    }
}
