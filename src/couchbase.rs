use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};

const USERS_PATH: &str = "/settings/rbac/users/local";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("user {0} already exists")]
    AlreadyExists(String),
    #[error("Couchbase admin request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Couchbase admin API returned {status}: {body}")]
    Status { status: StatusCode, body: String },
}

/// Administrative user management on the database cluster.
#[async_trait]
pub trait UserAdmin: Send + Sync {
    /// Creates a local database user. Not idempotent: a second call for the
    /// same name may fail with [`AdminError::AlreadyExists`].
    async fn create_user(
        &self,
        name: &str,
        password: &str,
        display_name: &str,
        roles: &str,
    ) -> Result<(), AdminError>;
}

/// Couchbase REST admin client (port 18091 by default).
#[derive(Debug, Clone)]
pub struct CouchbaseAdminClient {
    base_url: String,
    client: Client,
    user: String,
    password: String,
}

impl CouchbaseAdminClient {
    /// Builds a client for `base_url` authenticating as `user`.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        user: &str,
        password: &str,
        timeout: Duration,
        verify_tls: bool,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(!verify_tls)
            .build()
            .context("Failed to build Couchbase admin HTTP client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            user: user.to_string(),
            password: password.to_string(),
        })
    }

    /// Admin base URL for the first host of a comma-separated host list.
    #[must_use]
    pub fn admin_url(hosts: &str, scheme: &str, port: u16) -> String {
        let host = hosts.split(',').map(str::trim).next().unwrap_or_default();
        format!("{scheme}://{host}:{port}")
    }
}

#[async_trait]
impl UserAdmin for CouchbaseAdminClient {
    async fn create_user(
        &self,
        name: &str,
        password: &str,
        display_name: &str,
        roles: &str,
    ) -> Result<(), AdminError> {
        let url = format!("{}{USERS_PATH}/{name}", self.base_url);
        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("name", display_name)
            .append_pair("password", password)
            .append_pair("roles", roles)
            .finish();

        let response = self
            .client
            .put(url)
            .basic_auth(&self.user, Some(&self.password))
            .header(reqwest::header::CONTENT_TYPE, FORM_CONTENT_TYPE)
            .body(body)
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::CONFLICT || body.to_ascii_lowercase().contains("already exists") {
            return Err(AdminError::AlreadyExists(name.to_string()));
        }
        Err(AdminError::Status { status, body })
    }
}
