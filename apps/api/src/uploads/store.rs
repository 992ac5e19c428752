use std::path::{Path, PathBuf};

use anyhow::Context;
use tokio::fs::{self, File};
use uuid::Uuid;

use crate::errors::AppError;

const MAX_NAME_LEN: usize = 128;

/// Files live flat in one directory, named `<uuid>-<sanitized original>`.
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
}

/// Keeps the final path component and only `[A-Za-z0-9._-]`; anything else
/// becomes `_`. Hidden or empty names are rejected.
pub fn sanitize_filename(name: &str) -> Option<String> {
    let base = Path::new(name.trim()).file_name()?.to_str()?;
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_NAME_LEN)
        .collect();
    if cleaned.is_empty() || cleaned.starts_with('.') {
        return None;
    }
    Some(cleaned)
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Creates a new, uniquely named file for `original_name`.
    pub async fn create(&self, original_name: &str) -> Result<(String, File), AppError> {
        let name = sanitize_filename(original_name)
            .ok_or_else(|| AppError::Validation("file name is invalid".to_string()))?;
        let stored = format!("{}-{name}", Uuid::new_v4().simple());

        fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create upload directory {:?}", self.dir))?;
        let file = File::create(self.dir.join(&stored))
            .await
            .with_context(|| format!("Failed to create upload file {stored}"))?;
        Ok((stored, file))
    }

    /// Opens a stored file. Names that would not survive sanitizing are
    /// treated as missing, which keeps lookups inside the directory.
    pub async fn open(&self, stored_name: &str) -> Result<(File, u64), AppError> {
        let not_found = || AppError::NotFound("File not found".to_string());
        if sanitize_filename(stored_name).as_deref() != Some(stored_name) {
            return Err(not_found());
        }

        let file = match File::open(self.dir.join(stored_name)).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
            Err(e) => return Err(anyhow::Error::new(e).context("Failed to open upload").into()),
        };
        let len = file
            .metadata()
            .await
            .context("Failed to read upload metadata")?
            .len();
        Ok((file, len))
    }

    /// Removes a partially written file after a failed upload.
    pub async fn discard(&self, stored_name: &str) {
        if let Err(e) = fs::remove_file(self.dir.join(stored_name)).await {
            tracing::warn!("Failed to remove partial upload {stored_name}: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("cv.pdf").as_deref(), Some("cv.pdf"));
        assert_eq!(sanitize_filename("../../etc/passwd").as_deref(), Some("passwd"));
        assert_eq!(sanitize_filename("my cv (final).pdf").as_deref(), Some("my_cv__final_.pdf"));
        assert_eq!(sanitize_filename(".env"), None);
        assert_eq!(sanitize_filename(""), None);
        assert_eq!(sanitize_filename(".."), None);
    }

    #[tokio::test]
    async fn test_create_then_open() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path().join("uploads"));

        let (name, mut file) = store.create("résumé.pdf").await.unwrap();
        assert!(name.ends_with("-r_sum_.pdf"));
        file.write_all(b"%PDF-1.7").await.unwrap();
        file.flush().await.unwrap();

        let (mut opened, len) = store.open(&name).await.unwrap();
        assert_eq!(len, 8);
        let mut contents = String::new();
        opened.read_to_string(&mut contents).await.unwrap();
        assert_eq!(contents, "%PDF-1.7");
    }

    #[tokio::test]
    async fn test_open_rejects_traversal_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path());
        assert!(matches!(store.open("../secret").await, Err(AppError::NotFound(_))));
        assert!(matches!(store.open("missing.pdf").await, Err(AppError::NotFound(_))));
    }
}
