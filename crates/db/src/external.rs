//! Content-addressed blob store for node outputs that exceed the inline
//! checkpoint threshold (spec §6).
//!
//! Checkpoints store a [`crate::models::NodeResultRef::External`] digest
//! rather than the value itself once the value's serialized size crosses
//! [`INLINE_THRESHOLD_BYTES`]; the value is written here, addressed by the
//! sha256 of its canonical JSON bytes.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::DbError;

/// Outputs at or above this size (bytes, serialized JSON) are externalized
/// rather than stored inline in the checkpoint row.
pub const INLINE_THRESHOLD_BYTES: usize = 2 * 1024 * 1024;

/// Hash a JSON value's canonical serialization to its content digest.
pub fn digest_of(value: &serde_json::Value) -> Result<String, DbError> {
    let bytes = serde_json::to_vec(value).map_err(|e| DbError::Sqlx(sqlx::Error::Decode(Box::new(e))))?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Storage backend for externalized node results, keyed by content digest.
#[async_trait]
pub trait ExternalStore: Send + Sync {
    async fn put(&self, digest: &str, value: &serde_json::Value) -> Result<(), DbError>;
    async fn get(&self, digest: &str) -> Result<serde_json::Value, DbError>;
}

/// Filesystem-backed [`ExternalStore`]: one file per digest under a root
/// directory. Writes go through a temp-file-then-rename to avoid partial
/// reads racing a concurrent writer.
pub struct FsExternalStore {
    root: PathBuf,
}

impl FsExternalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, digest: &str) -> PathBuf {
        self.root.join(format!("{digest}.json"))
    }
}

#[async_trait]
impl ExternalStore for FsExternalStore {
    async fn put(&self, digest: &str, value: &serde_json::Value) -> Result<(), DbError> {
        let root = self.root.clone();
        let path = self.path_for(digest);
        let bytes = serde_json::to_vec(value).map_err(|e| DbError::Sqlx(sqlx::Error::Decode(Box::new(e))))?;
        tokio::task::spawn_blocking(move || write_atomic(&root, &path, &bytes))
            .await
            .map_err(|e| DbError::Sqlx(sqlx::Error::Io(std::io::Error::other(e.to_string()))))??;
        Ok(())
    }

    async fn get(&self, digest: &str) -> Result<serde_json::Value, DbError> {
        let path = self.path_for(digest);
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| DbError::Sqlx(sqlx::Error::Io(Box::new(e))))?;
        serde_json::from_slice(&bytes).map_err(|e| DbError::Sqlx(sqlx::Error::Decode(Box::new(e))))
    }
}

fn write_atomic(root: &Path, path: &Path, bytes: &[u8]) -> Result<(), DbError> {
    std::fs::create_dir_all(root).map_err(|e| DbError::Sqlx(sqlx::Error::Io(Box::new(e))))?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, bytes).map_err(|e| DbError::Sqlx(sqlx::Error::Io(Box::new(e))))?;
    std::fs::rename(&tmp, path).map_err(|e| DbError::Sqlx(sqlx::Error::Io(Box::new(e))))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsExternalStore::new(dir.path());
        let value = json!({"big": "payload"});
        let digest = digest_of(&value).unwrap();
        store.put(&digest, &value).await.unwrap();
        let fetched = store.get(&digest).await.unwrap();
        assert_eq!(fetched, value);
    }

    #[test]
    fn digest_is_stable_for_equal_values() {
        let a = json!({"x": 1, "y": 2});
        let b = json!({"x": 1, "y": 2});
        assert_eq!(digest_of(&a).unwrap(), digest_of(&b).unwrap());
    }
}
