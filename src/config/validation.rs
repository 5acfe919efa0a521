use std::path::Path;

use anyhow::Result;

use super::Settings;

pub(crate) fn validate_settings(settings: &Settings) -> Result<()> {
    if settings.ldap_url.trim().is_empty() {
        anyhow::bail!("ldap_url must not be empty");
    }
    if settings.topology.uses_couchbase() && settings.couchbase_url.trim().is_empty() {
        anyhow::bail!("couchbase_url must not be empty for {} topology", settings.topology);
    }
    if settings.consul.url.trim().is_empty() {
        anyhow::bail!("consul.url must not be empty");
    }
    if settings.consul.timeout.is_zero() {
        anyhow::bail!("consul.timeout must be greater than 0");
    }
    if settings.openbao.timeout.is_zero() {
        anyhow::bail!("openbao.timeout must be greater than 0");
    }
    validate_path(&settings.paths.certs_dir, "paths.certs_dir")?;
    validate_path(&settings.paths.conf_dir, "paths.conf_dir")?;
    validate_path(&settings.paths.idp_dir, "paths.idp_dir")?;
    validate_path(&settings.paths.templates_dir, "paths.templates_dir")?;
    validate_path(&settings.paths.jetty_webdefault, "paths.jetty_webdefault")?;
    validate_path(&settings.paths.jetty_config, "paths.jetty_config")?;
    if settings.keygen.program.trim().is_empty() {
        anyhow::bail!("keygen.program must not be empty");
    }
    if settings.keygen.timeout.is_zero() {
        anyhow::bail!("keygen.timeout must be greater than 0");
    }
    if settings.keytool.program.trim().is_empty() {
        anyhow::bail!("keytool.program must not be empty");
    }
    if settings.keytool.timeout.is_zero() {
        anyhow::bail!("keytool.timeout must be greater than 0");
    }
    if settings.couchbase.timeout.is_zero() {
        anyhow::bail!("couchbase.timeout must be greater than 0");
    }
    if !matches!(settings.couchbase.admin_scheme.as_str(), "http" | "https") {
        anyhow::bail!("couchbase.admin_scheme must be http or https");
    }
    if settings.sealer.wait_attempts == 0 {
        anyhow::bail!("sealer.wait_attempts must be greater than 0");
    }
    if settings.sealer.wait_interval.is_zero() {
        anyhow::bail!("sealer.wait_interval must be greater than 0");
    }
    if settings.retry.backoff_secs.is_empty() {
        anyhow::bail!("retry.backoff_secs must not be empty");
    }
    if settings.retry.backoff_secs.contains(&0) {
        anyhow::bail!("retry.backoff_secs values must be greater than 0");
    }
    Ok(())
}

fn validate_path(path: &Path, label: &str) -> Result<()> {
    if path.as_os_str().is_empty() {
        anyhow::bail!("{label} must not be empty");
    }
    Ok(())
}
