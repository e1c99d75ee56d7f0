//! Traits related to document storage
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::{
    Result,
    config::{DOCUMENT_EXTENSION, WriteMode},
};

/// A named text document inside a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub container: String,
    pub name: String,
    pub content: String,
}

impl Document {
    /// Document keyed by the release name plus the markdown extension.
    pub fn for_release(
        container: impl Into<String>,
        release_name: &str,
        content: impl Into<String>,
    ) -> Self {
        Self {
            container: container.into(),
            name: format!("{release_name}{DOCUMENT_EXTENSION}"),
            content: content.into(),
        }
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create the container when it does not exist yet.
    async fn ensure_container(&self, container: &str) -> Result<()>;

    /// Create the document if absent, then overwrite or append its content.
    async fn write(&self, document: &Document, mode: WriteMode) -> Result<()>;
}
