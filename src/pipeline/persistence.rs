use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use tracing::{debug, info};

use super::Pipeline;
use super::paths::{
    COUCHBASE_BEAN_TEMPLATE, COUCHBASE_PROPERTIES_TEMPLATE, LDAP_PROPERTIES_TEMPLATE,
};
use super::render::{
    DEFAULT_LDAP_TYPE, LDAP_BINDDN_KEY, LDAP_PASSWORD_SECRET, LDAP_TYPE_KEY, LDAP_USE_SSL_KEY,
    render_file,
};
use crate::couchbase::AdminError;
use crate::template::Context;
use crate::topology::DEFAULT_BUCKET;
use crate::utils::retry_with_backoff;
use crate::{fs_util, process};

/// Comment that marks an already spliced persistence bean.
pub const COUCHBASE_BEAN_MARKER: &str = "<!-- idp-bootstrap:couchbase-persistence -->";

pub(super) const LDAP_TRUSTSTORE_FN_KEY: &str = "ldapTrustStoreFn";
pub(super) const LDAP_TRUSTSTORE_SECRET: &str = "ldap_pkcs12_base64";
pub(super) const LDAP_TRUSTSTORE_PASS_SECRET: &str = "encoded_ldapTrustStorePass";
pub(super) const LDAP_CERT_SECRET: &str = "ldap_ssl_cert";

pub(super) const COUCHBASE_TRUSTSTORE_FN_KEY: &str = "couchbaseTrustStoreFn";
pub(super) const COUCHBASE_TRUSTSTORE_PASS_SECRET: &str = "encoded_couchbaseTrustStorePass";
pub(super) const COUCHBASE_CERT_SECRET: &str = "couchbase_cert";
pub(super) const COUCHBASE_SHIB_PASSWORD_SECRET: &str = "couchbase_shib_user_password";

const COUCHBASE_SHIB_USER: &str = "couchbaseShibUser";
const COUCHBASE_SHIB_DISPLAY_NAME: &str = "Shibboleth IDP";
const COUCHBASE_SHIB_ROLES: &str = "query_select[*]";
const COUCHBASE_TRUSTSTORE_ALIAS: &str = "gluu_couchbase";
const COUCHBASE_ENCRYPTION_METHOD: &str = "SSHA-256";
const BEANS_CLOSE: &str = "</beans>";

/// Inserts `bean` before the last `</beans>` of `xml`.
///
/// Returns `None` when the marker shows the bean is already present.
///
/// # Errors
/// Returns an error if `xml` has no closing `</beans>` tag.
pub fn splice_bean(xml: &str, bean: &str) -> Result<Option<String>> {
    if xml.contains(COUCHBASE_BEAN_MARKER) {
        return Ok(None);
    }
    let at = xml
        .rfind(BEANS_CLOSE)
        .ok_or_else(|| anyhow::anyhow!("No closing {BEANS_CLOSE} tag to splice before"))?;
    let mut out = String::with_capacity(xml.len() + bean.len() + COUCHBASE_BEAN_MARKER.len() + 2);
    out.push_str(&xml[..at]);
    out.push_str(COUCHBASE_BEAN_MARKER);
    out.push('\n');
    out.push_str(bean.trim_end());
    out.push('\n');
    out.push_str(&xml[at..]);
    Ok(Some(out))
}

async fn remove_if_exists(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err).with_context(|| format!("Failed to remove {}", path.display())),
    }
}

fn context_of<const N: usize>(pairs: [(&str, String); N]) -> Context {
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

impl Pipeline {
    pub(super) async fn provision_persistence(&self) -> Result<Vec<PathBuf>> {
        let topology = self.settings.topology;
        let mut written = Vec::new();

        if topology.uses_ldap() {
            written.extend(self.provision_ldap().await.context("LDAP branch")?);
        }
        if topology.uses_couchbase() {
            written.extend(
                self.provision_couchbase()
                    .await
                    .context("Couchbase branch")?,
            );
        }
        if topology.uses_ldap() && topology.uses_couchbase() {
            let path = self.paths.hybrid_properties();
            fs_util::write_private(&path, self.layout.hybrid_properties().as_bytes()).await?;
            info!("Wrote hybrid routing to {}", path.display());
            written.push(path);
        }

        Ok(written)
    }

    async fn provision_ldap(&self) -> Result<Vec<PathBuf>> {
        let truststore_fn = self.config.get(LDAP_TRUSTSTORE_FN_KEY).await?;
        let truststore = PathBuf::from(&truststore_fn);
        self.secrets
            .to_file(LDAP_TRUSTSTORE_SECRET, &truststore, true, true)
            .await?;
        info!("Synced LDAP trust store to {}", truststore.display());

        let ldap_type = self
            .config
            .get_or(LDAP_TYPE_KEY, DEFAULT_LDAP_TYPE)
            .await?;
        let cert = self.paths.ldap_cert(&ldap_type);
        self.secrets
            .to_file(LDAP_CERT_SECRET, &cert, true, false)
            .await?;
        info!("Synced LDAP certificate to {}", cert.display());

        let (host, port) = self.settings.ldap_endpoint()?;
        let ctx = context_of([
            ("ldap_hostname", host),
            ("ldaps_port", port.to_string()),
            ("ldap_url", self.settings.ldap_url.clone()),
            (LDAP_BINDDN_KEY, self.config.get(LDAP_BINDDN_KEY).await?),
            (
                LDAP_PASSWORD_SECRET,
                self.secrets.get(LDAP_PASSWORD_SECRET).await?,
            ),
            (
                LDAP_USE_SSL_KEY,
                self.config.get_or(LDAP_USE_SSL_KEY, "true").await?,
            ),
            (LDAP_TRUSTSTORE_FN_KEY, truststore_fn),
            (
                LDAP_TRUSTSTORE_PASS_SECRET,
                self.secrets.get(LDAP_TRUSTSTORE_PASS_SECRET).await?,
            ),
        ]);
        let text = render_file(&self.paths.template(LDAP_PROPERTIES_TEMPLATE), &ctx).await?;
        let properties = self.paths.ldap_properties();
        fs_util::write_private(&properties, text.as_bytes()).await?;
        info!("Rendered {}", properties.display());

        Ok(vec![truststore, cert, properties])
    }

    async fn provision_couchbase(&self) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();
        let truststore_fn = self.config.get(COUCHBASE_TRUSTSTORE_FN_KEY).await?;
        let truststore = PathBuf::from(&truststore_fn);
        let encoded_truststore_pass = self.secrets.get(COUCHBASE_TRUSTSTORE_PASS_SECRET).await?;

        let password_file = &self.settings.couchbase.password_file;
        let server_password = tokio::fs::read_to_string(password_file)
            .await
            .with_context(|| {
                format!(
                    "Failed to read Couchbase password from {}",
                    password_file.display()
                )
            })?;
        let encoded_server_password = self
            .secrets
            .encrypt("couchbase_server_pw", server_password.trim().as_bytes())
            .await?;

        let ctx = context_of([
            ("hostname", self.settings.couchbase_url.clone()),
            ("couchbase_server_user", self.settings.couchbase.user.clone()),
            ("encoded_couchbase_server_pw", encoded_server_password),
            ("couchbase_buckets", self.layout.couchbase_buckets()),
            ("default_bucket", DEFAULT_BUCKET.to_string()),
            ("couchbase_mappings", self.layout.couchbase_mapping_lines()),
            ("encryption_method", COUCHBASE_ENCRYPTION_METHOD.to_string()),
            ("ssl_enabled", "true".to_string()),
            (COUCHBASE_TRUSTSTORE_FN_KEY, truststore_fn),
            (COUCHBASE_TRUSTSTORE_PASS_SECRET, encoded_truststore_pass),
        ]);
        let text = render_file(&self.paths.template(COUCHBASE_PROPERTIES_TEMPLATE), &ctx).await?;
        let properties = self.paths.couchbase_properties();
        fs_util::write_private(&properties, text.as_bytes()).await?;
        info!("Rendered {}", properties.display());
        written.push(properties);

        let cert = self.paths.couchbase_cert();
        self.secrets
            .to_file(COUCHBASE_CERT_SECRET, &cert, false, false)
            .await?;
        info!("Synced Couchbase certificate to {}", cert.display());
        written.push(cert.clone());

        self.import_couchbase_cert(&cert, &truststore).await?;
        written.push(truststore);

        self.create_shib_user().await?;

        if self.layout.user_in_couchbase() {
            written.extend(self.splice_couchbase_bean().await?);
        }

        Ok(written)
    }

    async fn import_couchbase_cert(&self, cert: &Path, truststore: &Path) -> Result<()> {
        let password = self.secrets.decrypt(COUCHBASE_TRUSTSTORE_PASS_SECRET).await?;
        let password = String::from_utf8(password).map_err(|_| {
            anyhow::anyhow!("{COUCHBASE_TRUSTSTORE_PASS_SECRET} is not valid UTF-8")
        })?;
        let args = vec![
            "-importcert".to_string(),
            "-trustcacerts".to_string(),
            "-noprompt".to_string(),
            "-alias".to_string(),
            COUCHBASE_TRUSTSTORE_ALIAS.to_string(),
            "-file".to_string(),
            cert.display().to_string(),
            "-keystore".to_string(),
            truststore.display().to_string(),
            "-storepass".to_string(),
            password,
            "-storetype".to_string(),
            "pkcs12".to_string(),
        ];
        if let Some(parent) = truststore.parent() {
            fs_util::ensure_dir(parent).await?;
        }

        let keytool = &self.settings.keytool;
        retry_with_backoff("keytool import", &self.settings.retry.backoff_secs, |_| {
            let args = args.clone();
            async move {
                // keytool refuses to import over an existing alias
                remove_if_exists(truststore).await?;
                process::run_tool("keytool", &keytool.program, &args, keytool.timeout).await?;
                Ok(())
            }
        })
        .await?;
        info!("Imported Couchbase certificate into {}", truststore.display());
        Ok(())
    }

    async fn create_shib_user(&self) -> Result<()> {
        let admin = self
            .admin
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("Couchbase admin client is not configured"))?;
        let password = self.secrets.get(COUCHBASE_SHIB_PASSWORD_SECRET).await?;
        let password = password.as_str();

        retry_with_backoff(
            "Couchbase user creation",
            &self.settings.retry.backoff_secs,
            |_| async move {
                match admin
                    .create_user(
                        COUCHBASE_SHIB_USER,
                        password,
                        COUCHBASE_SHIB_DISPLAY_NAME,
                        COUCHBASE_SHIB_ROLES,
                    )
                    .await
                {
                    Ok(()) => {
                        info!("Created Couchbase user {COUCHBASE_SHIB_USER}");
                        Ok(())
                    }
                    Err(AdminError::AlreadyExists(name)) => {
                        info!("Couchbase user {name} already exists");
                        Ok(())
                    }
                    Err(err) => Err(err.into()),
                }
            },
        )
        .await
    }

    async fn splice_couchbase_bean(&self) -> Result<Option<PathBuf>> {
        let global = self.paths.idp_global_xml();
        let xml = tokio::fs::read_to_string(&global)
            .await
            .with_context(|| format!("Failed to read {}", global.display()))?;
        let bean_path = self.paths.template(COUCHBASE_BEAN_TEMPLATE);
        let bean = tokio::fs::read_to_string(&bean_path)
            .await
            .with_context(|| format!("Failed to read {}", bean_path.display()))?;

        let Some(spliced) = splice_bean(&xml, &bean)
            .with_context(|| format!("Failed to splice into {}", global.display()))?
        else {
            debug!("Couchbase bean already present in {}", global.display());
            return Ok(None);
        };
        fs_util::write_private(&global, spliced.as_bytes()).await?;
        info!("Spliced Couchbase persistence bean into {}", global.display());
        Ok(Some(global))
    }
}
