//! Named access to the shared config and secret stores.
//!
//! [`ConfigManager`] and [`SecretManager`] put a key prefix in front of a
//! [`KvStore`] and add the file helpers the pipeline uses to move entries
//! between the backend and local artifacts.

use std::path::Path;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::debug;

use crate::cipher::{self, CipherError, CipherScheme};
use crate::fs_util;
use crate::store::{KvStore, StoreError};

/// Secret entry holding the symmetric key for every ciphertext secret.
pub const SALT_KEY: &str = "encoded_salt";

#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    #[error("required key {0} is missing or empty")]
    MissingKey(String),
    #[error("failed to access {0}")]
    Store(String, #[source] StoreError),
    #[error("failed to decode {0}")]
    Cipher(String, #[source] CipherError),
    #[error("{0} is not valid base64")]
    Base64(String, #[source] base64::DecodeError),
    #[error("{0} is not valid UTF-8 text")]
    Utf8(String),
    #[error("failed to write {path} from {name}")]
    Write {
        name: String,
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("failed to read {path} into {name}")]
    Read {
        name: String,
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Prefixed view over a store.
#[derive(Clone)]
struct Namespace {
    store: Arc<dyn KvStore>,
    prefix: String,
}

impl Namespace {
    fn key(&self, name: &str) -> String {
        format!("{}{name}", self.prefix)
    }

    async fn lookup(&self, name: &str) -> Result<Option<String>, AccessError> {
        let value = self
            .store
            .get(&self.key(name))
            .await
            .map_err(|err| AccessError::Store(name.to_string(), err))?;
        Ok(value.filter(|value| !value.is_empty()))
    }

    async fn get(&self, name: &str) -> Result<String, AccessError> {
        self.lookup(name)
            .await?
            .ok_or_else(|| AccessError::MissingKey(name.to_string()))
    }

    async fn set(&self, name: &str, value: &str) -> Result<(), AccessError> {
        debug!("Writing backend entry {}", self.key(name));
        self.store
            .set(&self.key(name), value)
            .await
            .map_err(|err| AccessError::Store(name.to_string(), err))
    }
}

/// Plaintext configuration entries.
#[derive(Clone)]
pub struct ConfigManager {
    ns: Namespace,
}

impl ConfigManager {
    #[must_use]
    pub fn new(store: Arc<dyn KvStore>, prefix: &str) -> Self {
        Self {
            ns: Namespace {
                store,
                prefix: prefix.to_string(),
            },
        }
    }

    /// Reads a required entry.
    ///
    /// # Errors
    /// Returns [`AccessError::MissingKey`] when the entry is absent or empty.
    pub async fn get(&self, name: &str) -> Result<String, AccessError> {
        self.ns.get(name).await
    }

    /// Reads an optional entry.
    ///
    /// # Errors
    /// Returns an error only when the backend itself fails.
    pub async fn get_opt(&self, name: &str) -> Result<Option<String>, AccessError> {
        self.ns.lookup(name).await
    }

    /// Reads an entry, falling back to `default`.
    ///
    /// # Errors
    /// Returns an error only when the backend itself fails.
    pub async fn get_or(&self, name: &str, default: &str) -> Result<String, AccessError> {
        Ok(self
            .ns
            .lookup(name)
            .await?
            .unwrap_or_else(|| default.to_string()))
    }

    /// Reads a boolean flag; anything but a case-insensitive `true` is false.
    ///
    /// # Errors
    /// Returns an error only when the backend itself fails.
    pub async fn get_flag(&self, name: &str) -> Result<bool, AccessError> {
        Ok(self
            .ns
            .lookup(name)
            .await?
            .is_some_and(|value| value.trim().eq_ignore_ascii_case("true")))
    }

    /// # Errors
    /// Returns an error when the backend rejects the write.
    pub async fn set(&self, name: &str, value: &str) -> Result<(), AccessError> {
        self.ns.set(name, value).await
    }

    /// Creates the entry unless it already exists; `true` if this call won.
    ///
    /// # Errors
    /// Returns an error when the backend fails.
    pub async fn set_if_absent(&self, name: &str, value: &str) -> Result<bool, AccessError> {
        self.ns
            .store
            .set_if_absent(&self.ns.key(name), value)
            .await
            .map_err(|err| AccessError::Store(name.to_string(), err))
    }

    /// # Errors
    /// Returns an error when the backend fails.
    pub async fn delete(&self, name: &str) -> Result<(), AccessError> {
        self.ns
            .store
            .delete(&self.ns.key(name))
            .await
            .map_err(|err| AccessError::Store(name.to_string(), err))
    }
}

/// Secret entries: ciphertext under the salt, or base64 binary.
#[derive(Clone)]
pub struct SecretManager {
    ns: Namespace,
    scheme: CipherScheme,
}

impl SecretManager {
    #[must_use]
    pub fn new(store: Arc<dyn KvStore>, prefix: &str, scheme: CipherScheme) -> Self {
        Self {
            ns: Namespace {
                store,
                prefix: prefix.to_string(),
            },
            scheme,
        }
    }

    /// Reads a required entry as stored.
    ///
    /// # Errors
    /// Returns [`AccessError::MissingKey`] when the entry is absent or empty.
    pub async fn get(&self, name: &str) -> Result<String, AccessError> {
        self.ns.get(name).await
    }

    /// # Errors
    /// Returns an error only when the backend itself fails.
    pub async fn get_opt(&self, name: &str) -> Result<Option<String>, AccessError> {
        self.ns.lookup(name).await
    }

    /// # Errors
    /// Returns an error when the backend rejects the write.
    pub async fn set(&self, name: &str, value: &str) -> Result<(), AccessError> {
        self.ns.set(name, value).await
    }

    /// Reads and decrypts a ciphertext entry.
    ///
    /// # Errors
    /// Returns an error if the entry or the salt is missing, or decryption
    /// fails.
    pub async fn decrypt(&self, name: &str) -> Result<Vec<u8>, AccessError> {
        let ciphertext = self.get(name).await?;
        let salt = self.get(SALT_KEY).await?;
        cipher::decrypt(&ciphertext, &salt).map_err(|err| AccessError::Cipher(name.to_string(), err))
    }

    /// Encrypts `plaintext` under the salt without storing it.
    ///
    /// # Errors
    /// Returns an error if the salt is missing or encryption fails.
    pub async fn encrypt(&self, name: &str, plaintext: &[u8]) -> Result<String, AccessError> {
        let salt = self.get(SALT_KEY).await?;
        cipher::encrypt(plaintext, &salt, self.scheme)
            .map_err(|err| AccessError::Cipher(name.to_string(), err))
    }

    /// Resolves an entry to the bytes it represents.
    ///
    /// With `decode` the stored value is ciphertext and the decrypted bytes
    /// are returned as-is; `binary` then only lifts the UTF-8 requirement.
    /// Without `decode`, `binary` means the stored value is base64 of raw
    /// bytes.
    ///
    /// # Errors
    /// Returns an error if the entry is missing or cannot be decoded.
    pub async fn get_bytes(
        &self,
        name: &str,
        decode: bool,
        binary: bool,
    ) -> Result<Vec<u8>, AccessError> {
        if decode {
            return self.decrypt(name).await;
        }
        let text = self.get(name).await?;
        if !binary {
            return Ok(text.into_bytes());
        }
        STANDARD
            .decode(text.trim())
            .map_err(|err| AccessError::Base64(name.to_string(), err))
    }

    /// Writes an entry to `path` atomically, with owner-only permissions.
    ///
    /// Text entries must decode to valid UTF-8.
    ///
    /// # Errors
    /// Returns an error if the entry is missing, cannot be decoded, or the
    /// file cannot be written.
    pub async fn to_file(
        &self,
        name: &str,
        path: &Path,
        decode: bool,
        binary: bool,
    ) -> Result<(), AccessError> {
        let bytes = self.get_bytes(name, decode, binary).await?;
        if !binary && std::str::from_utf8(&bytes).is_err() {
            return Err(AccessError::Utf8(name.to_string()));
        }
        fs_util::write_private(path, &bytes)
            .await
            .map_err(|source| AccessError::Write {
                name: name.to_string(),
                path: path.display().to_string(),
                source: source.into(),
            })?;
        debug!("Wrote {} from secret {name}", path.display());
        Ok(())
    }

    /// Stores the contents of `path` under `name`.
    ///
    /// With `encode` the raw bytes are encrypted under the salt. Otherwise
    /// `binary` stores them base64 encoded and text is stored as-is.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, the salt is missing, or
    /// the backend rejects the write.
    pub async fn from_file(
        &self,
        name: &str,
        path: &Path,
        encode: bool,
        binary: bool,
    ) -> Result<(), AccessError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| AccessError::Read {
                name: name.to_string(),
                path: path.display().to_string(),
                source,
            })?;
        let value = if encode {
            self.encrypt(name, &bytes).await?
        } else if binary {
            STANDARD.encode(&bytes)
        } else {
            String::from_utf8(bytes).map_err(|_| AccessError::Utf8(name.to_string()))?
        };
        self.set(name, &value).await
    }
}
