use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use tracing::{debug, info};

use super::identity::{ENCRYPTION_CERT_SECRET, SIGNING_CERT_SECRET};
use super::paths::{IDP_METADATA_TEMPLATE, SALT_TEMPLATE};
use super::sealer::SHIB_JKS_PASS_SECRET;
use super::Pipeline;
use crate::fs_util;
use crate::manager::SALT_KEY;
use crate::template::{self, Context};
use crate::topology::PersistenceLayout;

pub(super) const HOSTNAME_KEY: &str = "hostname";
pub(super) const ORG_NAME_KEY: &str = "orgName";
pub(super) const INUM_ORG_KEY: &str = "inumOrg";
pub(super) const LDAP_BINDDN_KEY: &str = "ldap_binddn";
pub(super) const LDAP_USE_SSL_KEY: &str = "ldap_use_ssl";
pub(super) const LDAP_TYPE_KEY: &str = "ldap_type";
pub(super) const DEFAULT_LDAP_TYPE: &str = "opendj";
pub(super) const LDAP_PASSWORD_SECRET: &str = "encoded_ox_ldap_pw";

const PEM_BEGIN: &str = "-----BEGIN CERTIFICATE-----";
const PEM_END: &str = "-----END CERTIFICATE-----";

const LDAP_RESOLVER_FILTER: &str =
    "(|(uid=$requestContext.principalName)(mail=$requestContext.principalName))";
const COUCHBASE_RESOLVER_FILTER: &str = "(&(|(lower(uid)=$requestContext.principalName)(mail=$requestContext.principalName))(objectClass=gluuPerson))";

/// Attribute resolver search filter for wherever user entries live.
#[must_use]
pub fn resolver_filter(layout: &PersistenceLayout) -> &'static str {
    if layout.user_in_couchbase() {
        COUCHBASE_RESOLVER_FILTER
    } else {
        LDAP_RESOLVER_FILTER
    }
}

/// Validates PEM text as an X.509 certificate and returns its base64 body.
pub(super) fn certificate_body(name: &str, pem_text: &str) -> Result<String> {
    let pem = x509_parser::pem::parse_x509_pem(pem_text.as_bytes())
        .map_err(|e| anyhow::anyhow!("{name} is not a PEM certificate: {e}"))?
        .1;
    x509_parser::parse_x509_certificate(&pem.contents)
        .map_err(|e| anyhow::anyhow!("{name} is not a valid X.509 certificate: {e}"))?;
    Ok(pem_text
        .replace(PEM_BEGIN, "")
        .replace(PEM_END, "")
        .trim()
        .to_string())
}

fn is_idp_template(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("properties" | "xml")
    )
}

async fn read_template(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read template {}", path.display()))
}

pub(super) async fn render_file(path: &Path, context: &Context) -> Result<String> {
    let text = read_template(path).await?;
    template::safe_render(&text, context)
        .with_context(|| format!("Failed to render {}", path.display()))
}

/// `*.properties` and `*.xml` files directly under `dir`, sorted by name.
pub(super) async fn list_idp_templates(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("Failed to list templates in {}", dir.display()))?;
    let mut templates = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .with_context(|| format!("Failed to list templates in {}", dir.display()))?
    {
        let path = entry.path();
        if entry.file_type().await?.is_file() && is_idp_template(&path) {
            templates.push(path);
        }
    }
    templates.sort();
    Ok(templates)
}

impl Pipeline {
    pub(super) async fn render_context(&self) -> Result<Context> {
        let mut ctx = Context::new();
        let mut put = |key: &str, value: String| {
            ctx.insert(key.to_string(), value);
        };

        put(HOSTNAME_KEY, self.config.get(HOSTNAME_KEY).await?);
        put(ORG_NAME_KEY, self.config.get(ORG_NAME_KEY).await?);
        put(INUM_ORG_KEY, self.config.get(INUM_ORG_KEY).await?);
        put(
            SHIB_JKS_PASS_SECRET,
            self.secrets.get(SHIB_JKS_PASS_SECRET).await?,
        );
        put("certFolder", self.paths.certs_dir().display().to_string());
        put(
            "persistence_type",
            self.settings.topology.to_string(),
        );
        put(
            "idp3_resolver_filter",
            resolver_filter(&self.layout).to_string(),
        );
        put(
            "sealer_jks_fn",
            self.paths.sealer_jks().display().to_string(),
        );
        put(
            "sealer_kver_fn",
            self.paths.sealer_kver().display().to_string(),
        );

        for (key, path) in [
            (SIGNING_CERT_SECRET, self.paths.idp_signing_cert()),
            (ENCRYPTION_CERT_SECRET, self.paths.idp_encryption_cert()),
        ] {
            let text = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            put(key, certificate_body(key, &text)?);
        }

        if self.settings.topology.uses_ldap() {
            let (host, port) = self.settings.ldap_endpoint()?;
            let password = self.secrets.decrypt(LDAP_PASSWORD_SECRET).await?;
            let password = String::from_utf8(password)
                .map_err(|_| anyhow::anyhow!("{LDAP_PASSWORD_SECRET} is not valid UTF-8"))?;
            let ldap_type = self
                .config
                .get_or(LDAP_TYPE_KEY, DEFAULT_LDAP_TYPE)
                .await?;
            put("ldap_hostname", host);
            put("ldaps_port", port.to_string());
            put(LDAP_BINDDN_KEY, self.config.get(LDAP_BINDDN_KEY).await?);
            put("ldapPass", password);
            put(
                LDAP_USE_SSL_KEY,
                self.config.get_or(LDAP_USE_SSL_KEY, "true").await?,
            );
            put(
                "ldap_ssl_cert_fn",
                self.paths.ldap_cert(&ldap_type).display().to_string(),
            );
        } else {
            // idp3 templates render on every topology; LDAP settings stay blank without LDAP.
            for key in [
                "ldap_hostname",
                "ldaps_port",
                LDAP_BINDDN_KEY,
                "ldapPass",
                LDAP_USE_SSL_KEY,
                "ldap_ssl_cert_fn",
            ] {
                put(key, String::new());
            }
        }

        Ok(ctx)
    }

    pub(super) async fn render_templates(&self) -> Result<Vec<PathBuf>> {
        let ctx = self.render_context().await?;

        // Render everything before writing anything.
        let mut rendered = Vec::new();
        let conf_dir = self.paths.idp_conf_dir();
        for source in list_idp_templates(&self.paths.idp_template_dir()).await? {
            let Some(file_name) = source.file_name() else {
                continue;
            };
            let text = render_file(&source, &ctx).await?;
            rendered.push((conf_dir.join(file_name), text, true));
        }

        let metadata = render_file(&self.paths.template(IDP_METADATA_TEMPLATE), &ctx).await?;
        rendered.push((
            self.paths.idp_metadata_dir().join(IDP_METADATA_TEMPLATE),
            metadata,
            false,
        ));

        let mut salt_ctx = Context::new();
        salt_ctx.insert("encode_salt".to_string(), self.secrets.get(SALT_KEY).await?);
        let salt = render_file(&self.paths.template(SALT_TEMPLATE), &salt_ctx).await?;
        rendered.push((self.paths.salt_file(), salt, true));

        let mut written = Vec::with_capacity(rendered.len());
        for (path, text, private) in rendered {
            if private {
                fs_util::write_private(&path, text.as_bytes()).await?;
            } else {
                fs_util::write_public(&path, text.as_bytes()).await?;
            }
            debug!("Rendered {}", path.display());
            written.push(path);
        }
        info!("Rendered {} IDP configuration files", written.len());
        Ok(written)
    }
}
