use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;

use super::{Pipeline, RuntimePaths};
use crate::fs_util;

pub(super) const IDP_JKS_SECRET: &str = "shibIDP_jks_base64";
pub(super) const SIGNING_CERT_SECRET: &str = "idp3SigningCertificateText";
pub(super) const ENCRYPTION_CERT_SECRET: &str = "idp3EncryptionCertificateText";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Material {
    Certificate,
    PrivateKey,
}

/// Plaintext identity secrets, their target files and their sensitivity.
fn identity_files(paths: &RuntimePaths) -> [(&'static str, PathBuf, Material); 6] {
    [
        (SIGNING_CERT_SECRET, paths.idp_signing_cert(), Material::Certificate),
        ("idp3SigningKeyText", paths.idp_signing_key(), Material::PrivateKey),
        (
            ENCRYPTION_CERT_SECRET,
            paths.idp_encryption_cert(),
            Material::Certificate,
        ),
        (
            "idp3EncryptionKeyText",
            paths.idp_encryption_key(),
            Material::PrivateKey,
        ),
        ("ssl_cert", paths.https_cert(), Material::Certificate),
        ("ssl_key", paths.https_key(), Material::PrivateKey),
    ]
}

pub(super) fn identity_secret_names(paths: &RuntimePaths) -> Vec<&'static str> {
    identity_files(paths).iter().map(|(name, ..)| *name).collect()
}

impl Pipeline {
    pub(super) async fn sync_identity(&self) -> Result<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(7);

        for (name, path, material) in identity_files(&self.paths) {
            if material == Material::PrivateKey {
                self.secrets.to_file(name, &path, false, false).await?;
            } else {
                let bytes = self.secrets.get_bytes(name, false, false).await?;
                fs_util::write_public(&path, &bytes)
                    .await
                    .with_context(|| format!("Failed to write {} from {name}", path.display()))?;
            }
            info!("Synced {name} to {}", path.display());
            written.push(path);
        }

        let jks = self.paths.idp_jks();
        self.secrets.to_file(IDP_JKS_SECRET, &jks, true, true).await?;
        info!("Synced IDP keystore to {}", jks.display());
        written.push(jks);

        Ok(written)
    }
}
