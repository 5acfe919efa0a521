use std::path::PathBuf;

use anyhow::Result;
use tracing::{info, warn};

use super::Pipeline;
use super::identity::{IDP_JKS_SECRET, identity_secret_names};
use super::paths::{
    COUCHBASE_BEAN_TEMPLATE, COUCHBASE_PROPERTIES_TEMPLATE, IDP_METADATA_TEMPLATE,
    LDAP_PROPERTIES_TEMPLATE, SALT_TEMPLATE,
};
use super::persistence::{
    COUCHBASE_CERT_SECRET, COUCHBASE_SHIB_PASSWORD_SECRET, COUCHBASE_TRUSTSTORE_FN_KEY,
    COUCHBASE_TRUSTSTORE_PASS_SECRET, LDAP_CERT_SECRET, LDAP_TRUSTSTORE_FN_KEY,
    LDAP_TRUSTSTORE_PASS_SECRET, LDAP_TRUSTSTORE_SECRET,
};
use super::render::{
    HOSTNAME_KEY, INUM_ORG_KEY, LDAP_BINDDN_KEY, LDAP_PASSWORD_SECRET, ORG_NAME_KEY,
};
use super::sealer::{SEALER_FLAG, SEALER_JKS_SECRET, SEALER_KVER_SECRET, SHIB_JKS_PASS_SECRET};
use crate::manager::SALT_KEY;

/// How a secret entry has to decode.
#[derive(Debug, Clone, Copy)]
enum SecretCheck {
    Present,
    Ciphertext,
    /// Ciphertext wrapping raw binary.
    CipherBinary,
    Binary,
}

#[derive(Debug, Default)]
struct Requirements {
    config: Vec<&'static str>,
    secrets: Vec<(&'static str, SecretCheck)>,
    files: Vec<PathBuf>,
}

impl Pipeline {
    fn requirements(&self, sealer_generated: bool) -> Requirements {
        let topology = self.settings.topology;
        let mut req = Requirements {
            config: vec![HOSTNAME_KEY, ORG_NAME_KEY, INUM_ORG_KEY],
            ..Requirements::default()
        };

        req.secrets.push((SALT_KEY, SecretCheck::Present));
        req.secrets.push((SHIB_JKS_PASS_SECRET, SecretCheck::Present));
        for name in identity_secret_names(&self.paths) {
            req.secrets.push((name, SecretCheck::Present));
        }
        req.secrets.push((IDP_JKS_SECRET, SecretCheck::CipherBinary));
        if sealer_generated {
            req.secrets.push((SEALER_JKS_SECRET, SecretCheck::Binary));
            req.secrets.push((SEALER_KVER_SECRET, SecretCheck::Binary));
        }

        req.files.push(self.paths.idp_template_dir());
        req.files.push(self.paths.template(IDP_METADATA_TEMPLATE));
        req.files.push(self.paths.template(SALT_TEMPLATE));
        req.files.push(self.paths.jetty_webdefault());
        req.files.push(self.paths.jetty_config());

        if topology.uses_ldap() {
            req.config.push(LDAP_BINDDN_KEY);
            req.config.push(LDAP_TRUSTSTORE_FN_KEY);
            req.secrets.extend([
                (LDAP_PASSWORD_SECRET, SecretCheck::Ciphertext),
                (LDAP_TRUSTSTORE_PASS_SECRET, SecretCheck::Ciphertext),
                (LDAP_TRUSTSTORE_SECRET, SecretCheck::CipherBinary),
                (LDAP_CERT_SECRET, SecretCheck::Ciphertext),
            ]);
            req.files.push(self.paths.template(LDAP_PROPERTIES_TEMPLATE));
        }
        if topology.uses_couchbase() {
            req.config.push(COUCHBASE_TRUSTSTORE_FN_KEY);
            req.secrets.extend([
                (COUCHBASE_TRUSTSTORE_PASS_SECRET, SecretCheck::Ciphertext),
                (COUCHBASE_CERT_SECRET, SecretCheck::Present),
                (COUCHBASE_SHIB_PASSWORD_SECRET, SecretCheck::Present),
            ]);
            req.files.push(self.paths.template(COUCHBASE_PROPERTIES_TEMPLATE));
            req.files.push(self.settings.couchbase.password_file.clone());
            if self.layout.user_in_couchbase() {
                req.files.push(self.paths.template(COUCHBASE_BEAN_TEMPLATE));
            }
        }

        req
    }

    pub(super) async fn check_inputs(&self) -> Result<()> {
        let mut problems = Vec::new();

        let sealer_generated = match self.config.get_flag(SEALER_FLAG).await {
            Ok(flag) => flag,
            Err(err) => {
                problems.push(error_chain(&err));
                false
            }
        };
        let req = self.requirements(sealer_generated);

        for name in &req.config {
            if let Err(err) = self.config.get(name).await {
                problems.push(error_chain(&err));
            }
        }

        for (name, check) in &req.secrets {
            let (decode, binary) = match check {
                SecretCheck::Present => (false, false),
                SecretCheck::Ciphertext => (true, false),
                SecretCheck::CipherBinary => (true, true),
                SecretCheck::Binary => (false, true),
            };
            let result = self.secrets.get_bytes(name, decode, binary).await;
            if let Err(err) = result {
                problems.push(error_chain(&err));
            }
        }

        for path in &req.files {
            if !tokio::fs::try_exists(path).await.unwrap_or(false) {
                problems.push(format!("{} does not exist", path.display()));
            }
        }

        if self.settings.topology.uses_ldap() {
            if let Err(err) = self.settings.ldap_endpoint() {
                problems.push(err.to_string());
            }
        }

        if problems.is_empty() {
            info!(
                "Preflight passed: {} config keys, {} secrets, {} files checked",
                req.config.len(),
                req.secrets.len(),
                req.files.len()
            );
            return Ok(());
        }
        for problem in &problems {
            warn!("Preflight: {problem}");
        }
        anyhow::bail!(
            "{} problem(s) found: {}",
            problems.len(),
            problems.join("; ")
        )
    }
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
