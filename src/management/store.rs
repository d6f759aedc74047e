use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use tracing::debug;

use crate::{error::AuthError, types::TokenRecord};

#[cfg(unix)]
const DIR_MODE: u32 = 0o700;
#[cfg(unix)]
const FILE_MODE: u32 = 0o600;

/// On-disk home of the single [`TokenRecord`].
///
/// The containing directory is owner-only (`0700`) and the file owner
/// read/write (`0600`). Saves go through a sibling temp file and a rename, so a
/// reader sees either the previous record or the new one.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `~/.spotify-auth/tokens.json`, falling back to the working directory
    /// when no home directory is known.
    pub fn default_location() -> Self {
        let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(".spotify-auth/tokens.json");
        Self::new(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the stored record. A missing file is `Ok(None)`.
    pub async fn load(&self) -> Result<Option<TokenRecord>, AuthError> {
        let content = match async_fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(AuthError::storage(&self.path, e)),
        };

        let record: TokenRecord = serde_json::from_str(&content)
            .map_err(|e| AuthError::storage(&self.path, std::io::Error::from(e)))?;
        Ok(Some(record))
    }

    /// Replaces the stored record.
    pub async fn save(&self, record: &TokenRecord) -> Result<(), AuthError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            create_private_dir(parent)
                .await
                .map_err(|e| AuthError::storage(parent, e))?;
        }

        let json = serde_json::to_string_pretty(record)
            .map_err(|e| AuthError::storage(&self.path, std::io::Error::from(e)))?;

        let tmp = self.temp_path();
        write_private_file(&tmp, json.as_bytes())
            .await
            .map_err(|e| AuthError::storage(&tmp, e))?;
        if let Err(e) = async_fs::rename(&tmp, &self.path).await {
            let _ = async_fs::remove_file(&tmp).await;
            return Err(AuthError::storage(&self.path, e));
        }

        debug!(path = %self.path.display(), "token record saved");
        Ok(())
    }

    /// Removes the stored record. Removing an absent record is not an error.
    pub async fn clear(&self) -> Result<(), AuthError> {
        match async_fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AuthError::storage(&self.path, e)),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[cfg(unix)]
async fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    use async_fs::unix::DirBuilderExt;
    use std::os::unix::fs::PermissionsExt;

    async_fs::DirBuilder::new()
        .recursive(true)
        .mode(DIR_MODE)
        .create(dir)
        .await?;
    // `create` leaves an existing directory untouched, so tighten it here.
    async_fs::set_permissions(dir, std::fs::Permissions::from_mode(DIR_MODE)).await
}

#[cfg(not(unix))]
async fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    async_fs::create_dir_all(dir).await
}

#[cfg(unix)]
async fn write_private_file(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    use async_fs::unix::OpenOptionsExt;
    use std::os::unix::fs::PermissionsExt;

    // Create with the final mode before any byte is written.
    async_fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(FILE_MODE)
        .open(path)
        .await?;
    async_fs::set_permissions(path, std::fs::Permissions::from_mode(FILE_MODE)).await?;
    async_fs::write(path, contents).await
}

#[cfg(not(unix))]
async fn write_private_file(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    async_fs::write(path, contents).await
}
