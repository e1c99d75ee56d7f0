//! Local directory implementation for offline development and testing.
use async_trait::async_trait;
use log::*;
use std::path::{Component, Path, PathBuf};
use tokio::{
    fs::{self, OpenOptions},
    io::AsyncWriteExt,
};

use crate::{
    Result,
    config::WriteMode,
    error::ReleaseNotesError,
    storage::traits::{Document, DocumentStore},
};

/// Stores each container as a directory under `root` and each document as
/// a file inside it.
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn container_path(&self, container: &str) -> Result<PathBuf> {
        Ok(self.root.join(single_component(container)?))
    }

    fn document_path(&self, document: &Document) -> Result<PathBuf> {
        Ok(self
            .container_path(&document.container)?
            .join(single_component(&document.name)?))
    }
}

/// Reject names that would escape the store root or create sub-directories.
fn single_component(name: &str) -> Result<&Path> {
    let path = Path::new(name);
    let mut components = path.components();

    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(path),
        _ => Err(ReleaseNotesError::storage(format!(
            "invalid local document name: {name:?}"
        ))),
    }
}

fn io_failure(path: &Path, err: std::io::Error) -> ReleaseNotesError {
    ReleaseNotesError::storage(format!("{}: {err}", path.display()))
}

#[async_trait]
impl DocumentStore for LocalStore {
    async fn ensure_container(&self, container: &str) -> Result<()> {
        let path = self.container_path(container)?;
        if !fs::try_exists(&path).await.unwrap_or(false) {
            info!("creating container directory: {}", path.display());
        }
        fs::create_dir_all(&path)
            .await
            .map_err(|e| io_failure(&path, e))?;
        Ok(())
    }

    async fn write(&self, document: &Document, mode: WriteMode) -> Result<()> {
        let path = self.document_path(document)?;

        match mode {
            WriteMode::Overwrite => {
                fs::write(&path, document.content.as_bytes())
                    .await
                    .map_err(|e| io_failure(&path, e))?;
            }
            WriteMode::Append => {
                let mut file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .await
                    .map_err(|e| io_failure(&path, e))?;
                file.write_all(document.content.as_bytes())
                    .await
                    .map_err(|e| io_failure(&path, e))?;
                file.flush().await.map_err(|e| io_failure(&path, e))?;
            }
        }

        info!(
            "wrote {} bytes to {}",
            document.content.len(),
            path.display()
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn doc(content: &str) -> Document {
        Document::for_release("releases", "v1.2", content)
    }

    #[tokio::test]
    async fn test_overwrite_replaces_content() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());

        store.ensure_container("releases").await.unwrap();
        store.write(&doc("first"), WriteMode::Overwrite).await.unwrap();
        store.write(&doc("second"), WriteMode::Overwrite).await.unwrap();

        let content =
            std::fs::read_to_string(tmp.path().join("releases/v1.2.md"))
                .unwrap();
        assert_eq!(content, "second");
    }

    #[tokio::test]
    async fn test_append_creates_then_appends() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());

        store.ensure_container("releases").await.unwrap();
        store.write(&doc("first"), WriteMode::Append).await.unwrap();
        store.write(&doc("second"), WriteMode::Append).await.unwrap();

        let content =
            std::fs::read_to_string(tmp.path().join("releases/v1.2.md"))
                .unwrap();
        assert_eq!(content, "firstsecond");
    }

    #[tokio::test]
    async fn test_ensure_container_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());

        store.ensure_container("releases").await.unwrap();
        store.ensure_container("releases").await.unwrap();

        assert!(tmp.path().join("releases").is_dir());
    }

    #[tokio::test]
    async fn test_rejects_names_with_path_separators() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());
        store.ensure_container("releases").await.unwrap();

        let escaping = Document::for_release("releases", "../escape", "x");
        let result = store.write(&escaping, WriteMode::Overwrite).await;
        assert!(matches!(result, Err(ReleaseNotesError::StorageError(_))));

        let nested = Document::for_release("releases", "v1/2", "x");
        let result = store.write(&nested, WriteMode::Overwrite).await;
        assert!(matches!(result, Err(ReleaseNotesError::StorageError(_))));
    }
}
