//! In-place patches for the vendored Jetty configuration.
//!
//! Each patch only matches the insecure default, so patched files stay
//! untouched on later runs.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use tracing::{debug, info};

use super::Pipeline;
use crate::fs_util;

static DIR_ALLOWED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(<param-name>dirAllowed</param-name>\s*<param-value>)\s*true\s*(</param-value>)")
        .expect("dirAllowed pattern is valid")
});

static SEND_SERVER_VERSION_DEFAULT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(<Set name="sendServerVersion">\s*<Property\b[^>]*?\bdefault=")true(")"#)
        .expect("sendServerVersion property pattern is valid")
});

static SEND_SERVER_VERSION_PLAIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(<Set name="sendServerVersion">\s*)true(\s*</Set>)"#)
        .expect("sendServerVersion pattern is valid")
});

static DEFAULT_HANDLER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(<New\b[^>]*?\bclass="org\.eclipse\.jetty\.server\.handler\.DefaultHandler"[^>]*?)\s*/>"#,
    )
    .expect("DefaultHandler pattern is valid")
});

/// Disables directory listings in `webdefault.xml`.
#[must_use]
pub fn harden_webdefault(xml: &str) -> String {
    DIR_ALLOWED.replace_all(xml, "${1}false${2}").into_owned()
}

/// Hides the server version and context list in `jetty.xml`.
///
/// `showContexts` is only added to a self-closing `DefaultHandler`
/// element. Once added the element has a body, so a second pass leaves it
/// untouched.
#[must_use]
pub fn harden_jetty_config(xml: &str) -> String {
    let xml = SEND_SERVER_VERSION_DEFAULT.replace_all(xml, "${1}false${2}");
    let xml = SEND_SERVER_VERSION_PLAIN.replace_all(&xml, "${1}false${2}");
    DEFAULT_HANDLER
        .replace_all(&xml, r#"${1}><Set name="showContexts">false</Set></New>"#)
        .into_owned()
}

async fn patch_file(path: &Path, patch: fn(&str) -> String) -> Result<bool> {
    let original = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let patched = patch(&original);
    if patched == original {
        debug!("{} already hardened", path.display());
        return Ok(false);
    }
    fs_util::write_public(path, patched.as_bytes()).await?;
    info!("Hardened {}", path.display());
    Ok(true)
}

impl Pipeline {
    pub(super) async fn harden(&self) -> Result<Vec<PathBuf>> {
        let mut patched = Vec::new();
        let targets: [(PathBuf, fn(&str) -> String); 2] = [
            (self.paths.jetty_webdefault(), harden_webdefault),
            (self.paths.jetty_config(), harden_jetty_config),
        ];
        for (path, patch) in targets {
            if patch_file(&path, patch).await? {
                patched.push(path);
            }
        }
        Ok(patched)
    }
}
