use crate::domain::ports::Storage;
use crate::utils::error::Result;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}

impl Storage for LocalStorage {
    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.base_path.join(path);

        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(full_path, data).await?;
        Ok(())
    }

    fn full_path(&self, path: &str) -> String {
        self.base_path.join(path).display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_creates_parent_directories() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path());

        storage.write_file("nested/dir/file.txt", b"hello").await.unwrap();

        let data = tokio::fs::read(temp_dir.path().join("nested/dir/file.txt"))
            .await
            .unwrap();
        assert_eq!(data, b"hello");
        assert!(storage.full_path("nested/dir/file.txt").ends_with("file.txt"));
    }

    #[tokio::test]
    async fn test_write_replaces_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path());

        storage.write_file("data.csv", b"old,rows\n1,2\n").await.unwrap();
        storage.write_file("data.csv", b"new").await.unwrap();

        let data = std::fs::read(temp_dir.path().join("data.csv")).unwrap();
        assert_eq!(data, b"new");
    }
}
