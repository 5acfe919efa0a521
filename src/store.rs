//! Key/value backends holding the shared config and secret entries.
//!
//! Every pipeline step receives its store through [`KvStore`], so the same
//! code runs against Consul, `OpenBao` or the in-memory store used in tests.

use async_trait::async_trait;

mod consul;
mod memory;
mod openbao;

pub use consul::ConsulStore;
pub use memory::MemoryStore;
pub use openbao::OpenBaoStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("backend request failed for {key}: {source}")]
    Transport {
        key: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("backend returned {status} for {key}: {body}")]
    Status {
        key: String,
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("unexpected backend response for {key}: {reason}")]
    Malformed { key: String, reason: String },
    #[error("backend token is not set")]
    MissingToken,
}

#[async_trait]
pub trait KvStore: Send + Sync {
    /// Reads a value; `None` when the key does not exist.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Writes a value, replacing any previous one.
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Writes a value only if the key does not exist yet.
    ///
    /// Returns `true` when this call created the key. Backends must make the
    /// check and the write a single atomic operation.
    async fn set_if_absent(&self, key: &str, value: &str) -> Result<bool, StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}
