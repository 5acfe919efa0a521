use std::path::PathBuf;

use crate::config::Paths;

const IDP_SIGNING_CERT: &str = "idp-signing.crt";
const IDP_SIGNING_KEY: &str = "idp-signing.key";
const IDP_ENCRYPTION_CERT: &str = "idp-encryption.crt";
const IDP_ENCRYPTION_KEY: &str = "idp-encryption.key";
const HTTPS_CERT: &str = "gluu_https.crt";
const HTTPS_KEY: &str = "gluu_https.key";
const IDP_JKS: &str = "shibIDP.jks";
const SEALER_JKS: &str = "sealer.jks";
const SEALER_KVER: &str = "sealer.kver";
const COUCHBASE_CERT: &str = "couchbase.crt";

const SALT_FILE: &str = "salt";
const LDAP_PROPERTIES: &str = "gluu-ldap.properties";
const COUCHBASE_PROPERTIES: &str = "gluu-couchbase.properties";
const HYBRID_PROPERTIES: &str = "gluu-hybrid.properties";

const IDP_CONF_DIR: &str = "conf";
const IDP_METADATA_DIR: &str = "metadata";
const IDP_GLOBAL_XML: &str = "global.xml";

pub(crate) const IDP_TEMPLATE_DIR: &str = "idp3";
pub(crate) const IDP_METADATA_TEMPLATE: &str = "idp-metadata.xml";
pub(crate) const SALT_TEMPLATE: &str = "salt.tmpl";
pub(crate) const LDAP_PROPERTIES_TEMPLATE: &str = "gluu-ldap.properties.tmpl";
pub(crate) const COUCHBASE_PROPERTIES_TEMPLATE: &str = "gluu-couchbase.properties.tmpl";
pub(crate) const COUCHBASE_BEAN_TEMPLATE: &str = "couchbase-bean.xml";

/// Fixed artifact locations derived from the configured directories.
#[derive(Debug, Clone)]
pub struct RuntimePaths {
    paths: Paths,
}

impl RuntimePaths {
    #[must_use]
    pub fn new(paths: &Paths) -> Self {
        Self {
            paths: paths.clone(),
        }
    }

    #[must_use]
    pub fn certs_dir(&self) -> PathBuf {
        self.paths.certs_dir.clone()
    }

    #[must_use]
    pub fn idp_signing_cert(&self) -> PathBuf {
        self.paths.certs_dir.join(IDP_SIGNING_CERT)
    }

    #[must_use]
    pub fn idp_signing_key(&self) -> PathBuf {
        self.paths.certs_dir.join(IDP_SIGNING_KEY)
    }

    #[must_use]
    pub fn idp_encryption_cert(&self) -> PathBuf {
        self.paths.certs_dir.join(IDP_ENCRYPTION_CERT)
    }

    #[must_use]
    pub fn idp_encryption_key(&self) -> PathBuf {
        self.paths.certs_dir.join(IDP_ENCRYPTION_KEY)
    }

    #[must_use]
    pub fn https_cert(&self) -> PathBuf {
        self.paths.certs_dir.join(HTTPS_CERT)
    }

    #[must_use]
    pub fn https_key(&self) -> PathBuf {
        self.paths.certs_dir.join(HTTPS_KEY)
    }

    #[must_use]
    pub fn idp_jks(&self) -> PathBuf {
        self.paths.certs_dir.join(IDP_JKS)
    }

    #[must_use]
    pub fn sealer_jks(&self) -> PathBuf {
        self.paths.certs_dir.join(SEALER_JKS)
    }

    #[must_use]
    pub fn sealer_kver(&self) -> PathBuf {
        self.paths.certs_dir.join(SEALER_KVER)
    }

    #[must_use]
    pub fn ldap_cert(&self, ldap_type: &str) -> PathBuf {
        self.paths.certs_dir.join(format!("{ldap_type}.crt"))
    }

    #[must_use]
    pub fn couchbase_cert(&self) -> PathBuf {
        self.paths.certs_dir.join(COUCHBASE_CERT)
    }

    #[must_use]
    pub fn salt_file(&self) -> PathBuf {
        self.paths.conf_dir.join(SALT_FILE)
    }

    #[must_use]
    pub fn ldap_properties(&self) -> PathBuf {
        self.paths.conf_dir.join(LDAP_PROPERTIES)
    }

    #[must_use]
    pub fn couchbase_properties(&self) -> PathBuf {
        self.paths.conf_dir.join(COUCHBASE_PROPERTIES)
    }

    #[must_use]
    pub fn hybrid_properties(&self) -> PathBuf {
        self.paths.conf_dir.join(HYBRID_PROPERTIES)
    }

    #[must_use]
    pub fn idp_conf_dir(&self) -> PathBuf {
        self.paths.idp_dir.join(IDP_CONF_DIR)
    }

    #[must_use]
    pub fn idp_metadata_dir(&self) -> PathBuf {
        self.paths.idp_dir.join(IDP_METADATA_DIR)
    }

    #[must_use]
    pub fn idp_global_xml(&self) -> PathBuf {
        self.idp_conf_dir().join(IDP_GLOBAL_XML)
    }

    #[must_use]
    pub fn template(&self, name: &str) -> PathBuf {
        self.paths.templates_dir.join(name)
    }

    #[must_use]
    pub fn idp_template_dir(&self) -> PathBuf {
        self.paths.templates_dir.join(IDP_TEMPLATE_DIR)
    }

    #[must_use]
    pub fn jetty_webdefault(&self) -> PathBuf {
        self.paths.jetty_webdefault.clone()
    }

    #[must_use]
    pub fn jetty_config(&self) -> PathBuf {
        self.paths.jetty_config.clone()
    }
}
