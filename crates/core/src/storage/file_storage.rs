use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::{Storage, StorageError, StorageResult};

/// File-backed storage; each key maps to one file under the base path
pub struct FileStorage {
    base_path: PathBuf,
}

impl FileStorage {
    /// Create a new file storage instance, creating the base directory if needed
    pub async fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let path = base_path.into();
        if !path.exists() {
            fs::create_dir_all(&path).await?;
        }
        Ok(Self { base_path: path })
    }

    /// Get the full path for a key
    fn get_path(&self, key: &str) -> PathBuf {
        let mut path = self.base_path.clone();
        for part in key.split('/') {
            path.push(part);
        }
        path
    }

    /// Recursively collect keys under a directory
    fn collect_keys<'a>(
        dir: PathBuf,
        rel: String,
        out: &'a mut Vec<String>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = StorageResult<()>> + Send + 'a>> {
        Box::pin(async move {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name().to_string_lossy().to_string();
                let child_rel = if rel.is_empty() {
                    name
                } else {
                    format!("{}/{}", rel, name)
                };
                if entry.file_type().await?.is_dir() {
                    Self::collect_keys(entry.path(), child_rel, out).await?;
                } else {
                    out.push(child_rel);
                }
            }
            Ok(())
        })
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn put(&self, key: &str, data: &[u8]) -> StorageResult<()> {
        let path = self.get_path(key);
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).await?;
            }
        }

        let mut file = fs::File::create(&path).await?;
        file.write_all(data).await?;
        file.sync_all().await?;

        debug!("Stored data at key: {}", key);
        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
        let path = self.get_path(key);
        if !path.exists() {
            return Err(StorageError::KeyNotFound(key.to_string()));
        }
        Ok(fs::read(&path).await?)
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.get_path(key);
        if path.exists() {
            fs::remove_file(path).await?;
            debug!("Deleted key: {}", key);
        }
        Ok(())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self.get_path(key).exists())
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let mut keys = Vec::new();
        if self.base_path.exists() {
            Self::collect_keys(self.base_path.clone(), String::new(), &mut keys).await?;
        }
        let mut matching: Vec<String> = keys
            .into_iter()
            .filter(|k| k.starts_with(prefix))
            .collect();
        matching.sort();
        Ok(matching)
    }

    fn base_path(&self) -> Option<PathBuf> {
        Some(self.base_path.clone())
    }
}

impl std::fmt::Debug for FileStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStorage")
            .field("base_path", &self.base_path)
            .finish()
    }
}
