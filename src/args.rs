use std::path::PathBuf;

use clap::Args as ClapArgs;

use crate::topology::{Partition, Topology};

/// Settings overrides accepted on the command line or from the container env.
#[derive(ClapArgs, Debug, Clone)]
pub struct Args {
    /// Path to configuration file (default: idp-bootstrap.toml)
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Persistence topology (ldap, couchbase or hybrid)
    #[arg(long, env = "GLUU_PERSISTENCE_TYPE", value_enum, global = true)]
    pub persistence_type: Option<Topology>,

    /// Partition kept on LDAP in hybrid topology
    #[arg(long, env = "GLUU_PERSISTENCE_LDAP_MAPPING", value_enum, global = true)]
    pub ldap_mapping: Option<Partition>,

    /// LDAP endpoint as host:port
    #[arg(long, env = "GLUU_LDAP_URL", global = true)]
    pub ldap_url: Option<String>,

    /// Couchbase host(s)
    #[arg(long, env = "GLUU_COUCHBASE_URL", global = true)]
    pub couchbase_url: Option<String>,

    /// Consul base URL for the config store
    #[arg(long, env = "GLUU_CONSUL_URL", global = true)]
    pub consul_url: Option<String>,

    /// Consul ACL token
    #[arg(long, env = "GLUU_CONSUL_TOKEN", global = true, hide_env_values = true)]
    pub consul_token: Option<String>,

    /// `OpenBao` token for the secret store
    #[arg(long, env = "GLUU_OPENBAO_TOKEN", global = true, hide_env_values = true)]
    pub openbao_token: Option<String>,
}
