use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use thiserror::Error;
use uuid::Uuid;

/// Path prefix under which bucket objects are served.
pub const UPLOADS_ROUTE: &str = "/uploads";

const DEFAULT_EXTENSION: &str = "jpg";

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Image upload failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Directory-backed content bucket for sighting images.
///
/// Objects get a random name so uploads never overwrite each other, and are
/// publicly reachable at `{public_base_url}/uploads/{name}`.
#[derive(Debug, Clone)]
pub struct ContentBucket {
    root: PathBuf,
    public_base_url: String,
}

impl ContentBucket {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create upload directory {}", root.display()))?;

        Ok(Self {
            root,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Store the bytes and return the object's public URL
    pub async fn upload(&self, original_name: Option<&str>, bytes: &[u8]) -> Result<String, UploadError> {
        let object_name = format!("{}.{}", Uuid::new_v4(), extension_of(original_name));
        let path = self.root.join(&object_name);

        tokio::fs::write(&path, bytes).await?;
        tracing::debug!("Stored {} bytes at {}", bytes.len(), path.display());

        Ok(self.public_url(&object_name))
    }

    /// Delete an object by its public URL. Unknown URLs are ignored.
    pub async fn remove(&self, public_url: &str) -> Result<(), UploadError> {
        let prefix = format!("{}{}/", self.public_base_url, UPLOADS_ROUTE);
        let Some(object_name) = public_url.strip_prefix(&prefix) else {
            return Ok(());
        };
        let is_plain_name = !object_name.is_empty()
            && !object_name.starts_with('.')
            && !object_name.contains(|c: char| c == '/' || c == '\\');
        if !is_plain_name {
            return Ok(());
        }

        match tokio::fs::remove_file(self.root.join(object_name)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn public_url(&self, object_name: &str) -> String {
        format!("{}{}/{}", self.public_base_url, UPLOADS_ROUTE, object_name)
    }
}

/// Extension taken from the uploaded file name, restricted to short alphanumerics.
fn extension_of(original_name: Option<&str>) -> String {
    original_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}
