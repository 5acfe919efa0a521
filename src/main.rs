use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use idp_bootstrap::config::{SecretBackend, Settings};
use idp_bootstrap::couchbase::{CouchbaseAdminClient, UserAdmin};
use idp_bootstrap::manager::{ConfigManager, SecretManager};
use idp_bootstrap::pipeline::Pipeline;
use idp_bootstrap::store::{ConsulStore, KvStore, OpenBaoStore};
use idp_bootstrap::Args;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    args: Args,

    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum CliCommand {
    /// Materialize the IDP runtime (default)
    Run,
    /// Check that every required key and file is present, without writing
    Check,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("idp-bootstrap error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let settings = load_settings(&cli.args)?;

    let runtime =
        tokio::runtime::Runtime::new().context("Failed to initialize async runtime")?;
    runtime.block_on(async {
        let pipeline = build_pipeline(settings).await?;
        match cli.command.unwrap_or(CliCommand::Run) {
            CliCommand::Run => {
                let report = pipeline.run().await?;
                info!(
                    "Sealer keystore {}; {} Jetty file(s) patched",
                    report.sealer,
                    report.patched.len()
                );
            }
            CliCommand::Check => {
                pipeline.preflight().await?;
                info!("All inputs present");
            }
        }
        Ok(())
    })
}

fn load_settings(args: &Args) -> Result<Settings> {
    let mut settings = Settings::new(args.config.clone())?;
    settings.merge_with_args(args);
    settings.validate()?;
    info!(
        "Loaded settings: topology {}, secrets from {:?}",
        settings.topology, settings.secret_backend
    );
    Ok(settings)
}

async fn build_pipeline(settings: Settings) -> Result<Pipeline> {
    let mut consul = ConsulStore::new(&settings.consul.url, settings.consul.timeout)?;
    if let Some(token) = &settings.consul.token {
        consul.set_token(token.clone());
    }
    let consul: Arc<dyn KvStore> = Arc::new(consul);

    let (secret_store, secret_prefix): (Arc<dyn KvStore>, &str) = match settings.secret_backend {
        SecretBackend::Consul => (Arc::clone(&consul), &settings.consul.secret_prefix),
        SecretBackend::OpenBao => {
            let mut openbao = OpenBaoStore::new(
                &settings.openbao.url,
                &settings.openbao.kv_mount,
                settings.openbao.timeout,
            )?;
            if let Some(token) = &settings.openbao.token {
                openbao.set_token(token.clone());
            }
            (Arc::new(openbao), &settings.openbao.secret_prefix)
        }
    };

    let config = ConfigManager::new(consul, &settings.consul.config_prefix);
    let secrets = SecretManager::new(secret_store, secret_prefix, settings.cipher.scheme);
    let admin = couchbase_admin(&settings).await?;

    Ok(Pipeline::new(settings, config, secrets, admin, replica_id()))
}

async fn couchbase_admin(settings: &Settings) -> Result<Option<Arc<dyn UserAdmin>>> {
    if !settings.topology.uses_couchbase() {
        return Ok(None);
    }
    let couchbase = &settings.couchbase;
    let password = tokio::fs::read_to_string(&couchbase.password_file)
        .await
        .with_context(|| {
            format!(
                "Failed to read Couchbase password from {}",
                couchbase.password_file.display()
            )
        })?;
    let url = CouchbaseAdminClient::admin_url(
        &settings.couchbase_url,
        &couchbase.admin_scheme,
        couchbase.admin_port,
    );
    let client = CouchbaseAdminClient::new(
        &url,
        &couchbase.user,
        password.trim(),
        couchbase.timeout,
        couchbase.verify_tls,
    )?;
    Ok(Some(Arc::new(client)))
}

fn replica_id() -> String {
    let host = std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown-host".to_string());
    format!("{host}/{}", std::process::id())
}

#[cfg(test)]
mod tests {
    use idp_bootstrap::topology::Topology;

    use super::*;

    #[test]
    fn test_cli_defaults_to_run() {
        let cli = Cli::parse_from(["idp-bootstrap"]);
        assert_eq!(cli.command, None);
    }

    #[test]
    fn test_cli_parses_check_with_global_flags() {
        let cli = Cli::parse_from([
            "idp-bootstrap",
            "check",
            "--persistence-type",
            "hybrid",
            "--ldap-url",
            "ldap.internal:1636",
        ]);

        assert_eq!(cli.command, Some(CliCommand::Check));
        assert_eq!(cli.args.persistence_type, Some(Topology::Hybrid));
        assert_eq!(cli.args.ldap_url.as_deref(), Some("ldap.internal:1636"));
    }
}
