use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Deserializer};

use crate::cipher::CipherScheme;
use crate::topology::{Partition, PersistenceLayout, Topology};

mod defaults;
mod validation;

const DEFAULT_CONFIG_FILE: &str = "idp-bootstrap.toml";
const ENV_PREFIX: &str = "IDP_BOOTSTRAP";
const ENV_SEPARATOR: &str = "__";

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub topology: Topology,
    pub ldap_mapping: Partition,
    pub ldap_url: String,
    pub couchbase_url: String,
    pub secret_backend: SecretBackend,
    pub consul: ConsulSettings,
    pub openbao: OpenBaoSettings,
    pub paths: Paths,
    pub keygen: KeygenSettings,
    pub keytool: KeytoolSettings,
    pub couchbase: CouchbaseSettings,
    pub sealer: SealerSettings,
    pub retry: RetrySettings,
    pub cipher: CipherSettings,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SecretBackend {
    Consul,
    OpenBao,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ConsulSettings {
    pub url: String,
    #[serde(default)]
    pub token: Option<String>,
    pub config_prefix: String,
    pub secret_prefix: String,
    #[serde(deserialize_with = "deserialize_duration")]
    pub timeout: Duration,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OpenBaoSettings {
    pub url: String,
    #[serde(default)]
    pub token: Option<String>,
    pub kv_mount: String,
    pub secret_prefix: String,
    #[serde(deserialize_with = "deserialize_duration")]
    pub timeout: Duration,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Paths {
    pub certs_dir: PathBuf,
    pub conf_dir: PathBuf,
    pub idp_dir: PathBuf,
    pub templates_dir: PathBuf,
    pub jetty_webdefault: PathBuf,
    pub jetty_config: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KeygenSettings {
    pub program: String,
    pub classpath: PathBuf,
    pub main_class: String,
    #[serde(deserialize_with = "deserialize_duration")]
    pub timeout: Duration,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KeytoolSettings {
    pub program: String,
    #[serde(deserialize_with = "deserialize_duration")]
    pub timeout: Duration,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CouchbaseSettings {
    pub user: String,
    pub password_file: PathBuf,
    pub admin_scheme: String,
    pub admin_port: u16,
    pub verify_tls: bool,
    #[serde(deserialize_with = "deserialize_duration")]
    pub timeout: Duration,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SealerSettings {
    pub wait_attempts: u32,
    #[serde(deserialize_with = "deserialize_duration")]
    pub wait_interval: Duration,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrySettings {
    pub backoff_secs: Vec<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CipherSettings {
    pub scheme: CipherScheme,
}

impl Settings {
    /// Creates a new `Settings` instance.
    ///
    /// # Errors
    /// Returns error if configuration parsing fails (e.g. invalid format).
    pub fn new(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut s = defaults::apply_defaults(Config::builder())?;

        // Missing file is fine; defaults and env cover container deployments.
        let path = config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        s = s.add_source(File::from(path).required(false));

        // e.g. IDP_BOOTSTRAP__CONSUL__URL
        s = s.add_source(Environment::with_prefix(ENV_PREFIX).separator(ENV_SEPARATOR));

        s.build()?.try_deserialize()
    }

    /// Merges CLI arguments into the settings, overriding values if present.
    pub fn merge_with_args(&mut self, args: &crate::Args) {
        if let Some(topology) = args.persistence_type {
            self.topology = topology;
        }
        if let Some(mapping) = args.ldap_mapping {
            self.ldap_mapping = mapping;
        }
        if let Some(ldap_url) = &args.ldap_url {
            ldap_url.clone_into(&mut self.ldap_url);
        }
        if let Some(couchbase_url) = &args.couchbase_url {
            couchbase_url.clone_into(&mut self.couchbase_url);
        }
        if let Some(consul_url) = &args.consul_url {
            consul_url.clone_into(&mut self.consul.url);
        }
        if let Some(token) = &args.consul_token {
            self.consul.token = Some(token.clone());
        }
        if let Some(token) = &args.openbao_token {
            self.openbao.token = Some(token.clone());
        }
    }

    /// Validates configuration values for correctness.
    ///
    /// # Errors
    /// Returns error if any setting is invalid or out of range.
    pub fn validate(&self) -> Result<()> {
        validation::validate_settings(self)
    }

    #[must_use]
    pub fn layout(&self) -> PersistenceLayout {
        PersistenceLayout::new(self.topology, self.ldap_mapping)
    }

    /// Splits `ldap_url` (`host:port`) into its parts.
    ///
    /// # Errors
    /// Returns error if the URL has no port or the port is not numeric.
    pub fn ldap_endpoint(&self) -> Result<(String, u16)> {
        let (host, port) = self
            .ldap_url
            .rsplit_once(':')
            .ok_or_else(|| anyhow::anyhow!("ldap_url must be host:port"))?;
        let port = port
            .parse::<u16>()
            .map_err(|_| anyhow::anyhow!("ldap_url port is not numeric: {port}"))?;
        Ok((host.to_string(), port))
    }
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    humantime::parse_duration(raw.trim()).map_err(serde::de::Error::custom)
}
