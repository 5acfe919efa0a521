//! The bootstrap materialization pipeline.
//!
//! A run is a preflight check followed by five stages in a fixed order:
//! identity sync, sealer keystore, template rendering, persistence
//! provisioning and Jetty hardening. The topology only selects branches
//! inside the render and persistence stages. Any failure aborts the run and
//! the error is prefixed with the name of the failing stage.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use tracing::info;

use crate::config::Settings;
use crate::couchbase::UserAdmin;
use crate::manager::{ConfigManager, SecretManager};
use crate::topology::PersistenceLayout;

mod hardening;
mod identity;
mod paths;
mod persistence;
mod preflight;
mod render;
mod sealer;

pub use hardening::{harden_jetty_config, harden_webdefault};
pub use paths::RuntimePaths;
pub use persistence::{COUCHBASE_BEAN_MARKER, splice_bean};
pub use render::resolver_filter;
pub use sealer::{SEALER_FLAG, SEALER_LOCK, SealerOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Preflight,
    Identity,
    Sealer,
    Render,
    Persistence,
    Hardening,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Preflight => "preflight",
            Stage::Identity => "identity sync",
            Stage::Sealer => "sealer keystore",
            Stage::Render => "template rendering",
            Stage::Persistence => "persistence provisioning",
            Stage::Hardening => "hardening",
        };
        f.write_str(name)
    }
}

/// What a completed run produced.
#[derive(Debug)]
pub struct RunReport {
    pub sealer: SealerOutcome,
    /// Files written from backend state, in write order.
    pub artifacts: Vec<PathBuf>,
    /// Jetty files that needed patching on this run.
    pub patched: Vec<PathBuf>,
}

pub struct Pipeline {
    settings: Settings,
    layout: PersistenceLayout,
    paths: RuntimePaths,
    config: ConfigManager,
    secrets: SecretManager,
    admin: Option<Arc<dyn UserAdmin>>,
    owner: String,
}

impl Pipeline {
    /// Builds a pipeline over the given backends.
    ///
    /// `admin` is only used by the Couchbase persistence branch. `owner`
    /// identifies this replica in the sealer generation lock.
    #[must_use]
    pub fn new(
        settings: Settings,
        config: ConfigManager,
        secrets: SecretManager,
        admin: Option<Arc<dyn UserAdmin>>,
        owner: impl Into<String>,
    ) -> Self {
        let layout = settings.layout();
        let paths = RuntimePaths::new(&settings.paths);
        Self {
            settings,
            layout,
            paths,
            config,
            secrets,
            admin,
            owner: owner.into(),
        }
    }

    #[must_use]
    pub fn paths(&self) -> &RuntimePaths {
        &self.paths
    }

    /// Runs every stage in order.
    ///
    /// # Errors
    /// Returns the first failure, prefixed with the stage that raised it.
    pub async fn run(&self) -> Result<RunReport> {
        info!(
            "Bootstrapping IDP runtime (topology: {}, ldap mapping: {})",
            self.settings.topology, self.settings.ldap_mapping
        );
        self.preflight().await?;

        let mut artifacts = Vec::new();
        artifacts.extend(self.sync_identity().await.context(Stage::Identity)?);

        let (sealer, sealer_files) = self.ensure_sealer().await.context(Stage::Sealer)?;
        artifacts.extend(sealer_files);

        artifacts.extend(self.render_templates().await.context(Stage::Render)?);
        artifacts.extend(
            self.provision_persistence()
                .await
                .context(Stage::Persistence)?,
        );
        let patched = self.harden().await.context(Stage::Hardening)?;

        info!(
            "Bootstrap complete: {} artifacts written, sealer {sealer}",
            artifacts.len()
        );
        Ok(RunReport {
            sealer,
            artifacts,
            patched,
        })
    }

    /// Verifies that every input a run needs is present and decodable.
    ///
    /// Nothing is written, locally or to the backend.
    ///
    /// # Errors
    /// Returns one error listing every problem found.
    pub async fn preflight(&self) -> Result<()> {
        self.check_inputs().await.context(Stage::Preflight)
    }
}
