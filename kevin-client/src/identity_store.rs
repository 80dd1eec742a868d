use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use kevin_types::{validate_username, Identity};

/// Persists the chosen identity in `~/.kevin/identity.json` with 0600
/// permissions.
///
/// The identity is never verified by the server. A missing or unusable file
/// means nobody has picked a username yet.
#[derive(Debug, Clone)]
pub struct IdentityStore {
    file_path: PathBuf,
}

impl IdentityStore {
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
        }
    }

    /// Loads the identity from the file.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(identity))` if the file exists and holds a valid identity
    /// - `Ok(None)` if the file doesn't exist or is corrupted
    /// - `Err(_)` if the file cannot be read
    pub fn load(&self) -> Result<Option<Identity>> {
        if !self.file_path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.file_path).context("Failed to read identity file")?;

        if content.trim().is_empty() {
            log::warn!("Identity file is empty, treating as no identity");
            return Ok(None);
        }

        let identity: Identity = match serde_json::from_str(&content) {
            Ok(identity) => identity,
            Err(e) => {
                log::warn!("Identity file is corrupted ({}), treating as no identity", e);
                return Ok(None);
            }
        };

        // Hand-edited files may hold a username the server would reject
        if let Err(e) = validate_username(&identity.username) {
            log::warn!("Stored identity is invalid ({}), treating as no identity", e);
            return Ok(None);
        }

        log::debug!("Loaded identity {} from {}", identity.username, self.file_path.display());
        Ok(Some(identity))
    }

    /// Saves the identity atomically: temporary file, then rename.
    pub fn save(&self, identity: &Identity) -> Result<()> {
        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent).context("Failed to create .kevin directory")?;
        }

        let json = serde_json::to_string_pretty(identity).context("Failed to serialize identity")?;

        let temp_path = self.file_path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).context("Failed to create temporary identity file")?;
        file.write_all(json.as_bytes())
            .context("Failed to write identity")?;
        file.sync_all()
            .context("Failed to sync identity file to disk")?;
        drop(file);

        // Set permissions to 0600 (owner read/write only)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = fs::Permissions::from_mode(0o600);
            fs::set_permissions(&temp_path, permissions)
                .context("Failed to set identity file permissions")?;
        }

        fs::rename(&temp_path, &self.file_path).context("Failed to rename temporary identity file")?;

        log::info!("Saved identity {} to {}", identity.username, self.file_path.display());
        Ok(())
    }

    /// Deletes the identity file. Succeeds even if there is none.
    pub fn delete(&self) -> Result<()> {
        if self.file_path.exists() {
            fs::remove_file(&self.file_path).context("Failed to delete identity file")?;
            log::info!("Deleted identity file at {}", self.file_path.display());
        } else {
            log::debug!("Identity file does not exist, nothing to delete");
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }
}
