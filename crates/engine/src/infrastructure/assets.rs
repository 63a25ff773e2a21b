//! Filesystem asset store for rendered images.

use async_trait::async_trait;
use std::path::PathBuf;

use crate::infrastructure::ports::{AssetError, AssetStorePort};

/// Stores image bytes under a local directory; references are relative paths
/// of the form `assets/{uuid}.{ext}` that the HTTP layer can serve statically.
#[derive(Clone)]
pub struct FsAssetStore {
    root: PathBuf,
}

impl FsAssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl AssetStorePort for FsAssetStore {
    async fn store(&self, data: &[u8], format: &str) -> Result<String, AssetError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| AssetError::Store(e.to_string()))?;

        let filename = format!("{}.{}", uuid::Uuid::new_v4(), format);
        let path = self.root.join(&filename);

        tokio::fs::write(&path, data)
            .await
            .map_err(|e| AssetError::Store(e.to_string()))?;

        Ok(format!("assets/{filename}"))
    }
}
