//! Local filesystem backend, served by `ServeDir` at `/uploads`.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use super::{MediaError, MediaStore};

/// URL prefix the router serves the upload directory under.
pub const PUBLIC_PREFIX: &str = "/uploads";

pub struct LocalDiskStore {
    root: PathBuf,
}

impl LocalDiskStore {
    #[must_use]
    pub const fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, MediaError> {
        let relative = Path::new(key);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(MediaError::Storage(format!("refusing unsafe key {key}")));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl MediaStore for LocalDiskStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, _content_type: &str) -> Result<String, MediaError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write then rename so a half-written file is never served
        let tmp = path.with_extension("part");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;

        Ok(format!("{PUBLIC_PREFIX}/{key}"))
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_creates_nested_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalDiskStore::new(dir.path().to_path_buf());

        let url = store
            .put("posts/2026/06/a.gif", b"GIF89a".to_vec(), "image/gif")
            .await
            .unwrap();

        assert_eq!(url, "/uploads/posts/2026/06/a.gif");
        assert!(dir.path().join("posts/2026/06/a.gif").is_file());
        assert!(!dir.path().join("posts/2026/06/a.part").exists());
    }

    #[tokio::test]
    async fn test_put_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalDiskStore::new(dir.path().to_path_buf());

        let err = store
            .put("../escape.png", vec![1], "image/png")
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::Storage(_)));

        let err = store.put("/abs.png", vec![1], "image/png").await.unwrap_err();
        assert!(matches!(err, MediaError::Storage(_)));
    }
}
