use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs;

pub const KEY_FILE_MODE: u32 = 0o600;
pub const PUBLIC_FILE_MODE: u32 = 0o644;

/// Creates a directory and all of its parents.
///
/// # Errors
/// Returns an error if the directory cannot be created.
pub async fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .await
        .with_context(|| format!("Failed to create directory {}", path.display()))
}

/// Writes a file so readers see either the old contents or the new ones.
///
/// Missing parent directories are created. The data goes to a temporary file
/// in the target directory which is then renamed over `path`.
///
/// # Errors
/// Returns an error if the directory, the temporary file or the rename fails.
pub async fn write_atomic(path: &Path, contents: &[u8], mode: u32) -> Result<()> {
    let target = path.to_path_buf();
    let contents = contents.to_vec();
    tokio::task::spawn_blocking(move || write_atomic_blocking(&target, &contents, mode))
        .await
        .map_err(|e| anyhow::anyhow!("Atomic write task failed: {e}"))?
}

/// Writes a private key or keystore with owner-only permissions.
///
/// # Errors
/// See [`write_atomic`].
pub async fn write_private(path: &Path, contents: &[u8]) -> Result<()> {
    write_atomic(path, contents, KEY_FILE_MODE).await
}

/// Writes a certificate or rendered config file.
///
/// # Errors
/// See [`write_atomic`].
pub async fn write_public(path: &Path, contents: &[u8]) -> Result<()> {
    write_atomic(path, contents, PUBLIC_FILE_MODE).await
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn write_atomic_blocking(path: &Path, contents: &[u8], mode: u32) -> Result<()> {
    let dir = parent_dir(path);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create directory {}", dir.display()))?;

    let mut tmp = tempfile::NamedTempFile::new_in(&dir)
        .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
    tmp.write_all(contents)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    tmp.as_file()
        .set_permissions(std::fs::Permissions::from_mode(mode))
        .with_context(|| format!("Failed to set permissions on {}", path.display()))?;
    tmp.as_file()
        .sync_all()
        .with_context(|| format!("Failed to sync {}", path.display()))?;
    tmp.persist(path)
        .map_err(|e| anyhow::anyhow!("Failed to move file into {}: {}", path.display(), e.error))?;
    Ok(())
}
