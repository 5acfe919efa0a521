//! First-boot generation of the sealer keystore.
//!
//! The keystore must be identical on every replica, so exactly one replica
//! generates it and uploads it while the others pull it. Generation happens
//! only while holding a lock taken with a create-if-absent write on the
//! config store.

use std::fmt;
use std::path::PathBuf;

use anyhow::Result;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, info, warn};

use super::Pipeline;
use crate::process;

pub const SEALER_FLAG: &str = "sealer_generated";
pub const SEALER_LOCK: &str = "sealer_generation_lock";
pub(super) const SEALER_JKS_SECRET: &str = "sealer_jks_base64";
pub(super) const SEALER_KVER_SECRET: &str = "sealer_kver_base64";
pub(super) const SHIB_JKS_PASS_SECRET: &str = "shibJksPass";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SealerOutcome {
    /// This replica generated the keystore and uploaded it.
    Generated,
    /// The keystore already existed and was pulled.
    Pulled,
    /// Another replica held the lock; pulled once it finished.
    PulledAfterWait,
}

impl fmt::Display for SealerOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SealerOutcome::Generated => "generated",
            SealerOutcome::Pulled => "pulled",
            SealerOutcome::PulledAfterWait => "pulled after wait",
        };
        f.write_str(text)
    }
}

impl Pipeline {
    pub(super) async fn ensure_sealer(&self) -> Result<(SealerOutcome, Vec<PathBuf>)> {
        if self.config.get_flag(SEALER_FLAG).await? {
            let files = self.pull_sealer().await?;
            return Ok((SealerOutcome::Pulled, files));
        }

        let holder = self.lock_holder_value();
        if !self.config.set_if_absent(SEALER_LOCK, &holder).await? {
            return self.wait_for_sealer().await;
        }
        info!("Acquired sealer generation lock as {}", self.owner);

        let result = self.generate_locked().await;
        if let Err(err) = self.config.delete(SEALER_LOCK).await {
            warn!("Failed to release sealer generation lock: {err}");
        }
        result
    }

    fn lock_holder_value(&self) -> String {
        let now = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| "unknown-time".to_string());
        format!("{} {now}", self.owner)
    }

    async fn generate_locked(&self) -> Result<(SealerOutcome, Vec<PathBuf>)> {
        // Another replica may have finished between our flag read and the lock.
        if self.config.get_flag(SEALER_FLAG).await? {
            let files = self.pull_sealer().await?;
            return Ok((SealerOutcome::Pulled, files));
        }

        let password = self.secrets.get(SHIB_JKS_PASS_SECRET).await?;
        let keygen = &self.settings.keygen;
        let args = vec![
            "-classpath".to_string(),
            keygen.classpath.display().to_string(),
            keygen.main_class.clone(),
            self.paths.certs_dir().display().to_string(),
            password,
        ];
        process::run_tool("sealer key generator", &keygen.program, &args, keygen.timeout).await?;

        let jks = self.paths.sealer_jks();
        let kver = self.paths.sealer_kver();
        self.secrets
            .from_file(SEALER_JKS_SECRET, &jks, false, true)
            .await?;
        self.secrets
            .from_file(SEALER_KVER_SECRET, &kver, false, true)
            .await?;
        // Rewrite the local copies from what was uploaded.
        let files = self.pull_sealer().await?;
        self.config.set(SEALER_FLAG, "true").await?;
        info!("Generated sealer keystore and published it to the backend");

        Ok((SealerOutcome::Generated, files))
    }

    async fn wait_for_sealer(&self) -> Result<(SealerOutcome, Vec<PathBuf>)> {
        let attempts = self.settings.sealer.wait_attempts;
        let interval = self.settings.sealer.wait_interval;
        info!("Sealer keystore is being generated by another replica; waiting");

        for attempt in 1..=attempts {
            tokio::time::sleep(interval).await;
            if self.config.get_flag(SEALER_FLAG).await? {
                let files = self.pull_sealer().await?;
                return Ok((SealerOutcome::PulledAfterWait, files));
            }
            debug!("Sealer keystore not ready (check {attempt}/{attempts})");
        }

        let holder = self
            .config
            .get_opt(SEALER_LOCK)
            .await?
            .unwrap_or_else(|| "nobody".to_string());
        anyhow::bail!(
            "Sealer keystore was not generated after {attempts} checks; lock held by {holder}. \
             Delete config key {SEALER_LOCK} if that replica is gone"
        )
    }

    async fn pull_sealer(&self) -> Result<Vec<PathBuf>> {
        let jks = self.paths.sealer_jks();
        let kver = self.paths.sealer_kver();
        self.secrets
            .to_file(SEALER_JKS_SECRET, &jks, false, true)
            .await?;
        self.secrets
            .to_file(SEALER_KVER_SECRET, &kver, false, true)
            .await?;
        info!("Pulled sealer keystore to {}", jks.display());
        Ok(vec![jks, kver])
    }
}
