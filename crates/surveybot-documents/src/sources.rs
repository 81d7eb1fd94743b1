use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Failed to read document {reference}: {source}")]
    Io {
        reference: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to download document {reference}: {message}")]
    Download { reference: String, message: String },

    #[error("Document reference rejected: {0}")]
    InvalidReference(String),
}

/// Something that can turn a document reference into text
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn fetch(&self, reference: &str) -> Result<String, DocumentError>;
}

/// Downloads documents over HTTP(S) and returns the body as text
pub struct HttpSource {
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new(timeout: Duration) -> Result<Self, DocumentError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DocumentError::Download {
                reference: String::new(),
                message: e.to_string(),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl DocumentSource for HttpSource {
    async fn fetch(&self, reference: &str) -> Result<String, DocumentError> {
        let download_err = |message: String| DocumentError::Download {
            reference: reference.to_string(),
            message,
        };

        let response = self
            .client
            .get(reference)
            .send()
            .await
            .map_err(|e| download_err(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(DocumentError::NotFound(reference.to_string()));
        }
        if !status.is_success() {
            return Err(download_err(format!("status {}", status)));
        }

        response.text().await.map_err(|e| download_err(e.to_string()))
    }
}

/// Reads documents from files below a root directory
pub struct FileSource {
    root: PathBuf,
}

impl FileSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, reference: &str) -> Result<PathBuf, DocumentError> {
        let relative = Path::new(reference.trim_start_matches("file://"));
        let escapes = relative
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));
        if escapes {
            return Err(DocumentError::InvalidReference(reference.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl DocumentSource for FileSource {
    async fn fetch(&self, reference: &str) -> Result<String, DocumentError> {
        let path = self.resolve(reference)?;
        tokio::fs::read_to_string(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DocumentError::NotFound(reference.to_string())
            } else {
                DocumentError::Io {
                    reference: reference.to_string(),
                    source: e,
                }
            }
        })
    }
}

/// Sends `http://` and `https://` references to one source and everything else to another
pub struct RoutingSource {
    remote: Box<dyn DocumentSource>,
    local: Box<dyn DocumentSource>,
}

impl RoutingSource {
    pub fn new(remote: Box<dyn DocumentSource>, local: Box<dyn DocumentSource>) -> Self {
        Self { remote, local }
    }
}

#[async_trait]
impl DocumentSource for RoutingSource {
    async fn fetch(&self, reference: &str) -> Result<String, DocumentError> {
        if reference.starts_with("http://") || reference.starts_with("https://") {
            self.remote.fetch(reference).await
        } else {
            self.local.fetch(reference).await
        }
    }
}

/// In-memory documents keyed by reference
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    documents: HashMap<String, String>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, reference: impl Into<String>, text: impl Into<String>) -> Self {
        self.documents.insert(reference.into(), text.into());
        self
    }
}

#[async_trait]
impl DocumentSource for StaticSource {
    async fn fetch(&self, reference: &str) -> Result<String, DocumentError> {
        self.documents
            .get(reference)
            .cloned()
            .ok_or_else(|| DocumentError::NotFound(reference.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_file_source_reads_relative_paths() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("faq.txt"), "Opening hours are 9-5.").unwrap();

        let source = FileSource::new(dir.path());
        assert_eq!(source.fetch("faq.txt").await.unwrap(), "Opening hours are 9-5.");
        assert_eq!(
            source.fetch("file://faq.txt").await.unwrap(),
            "Opening hours are 9-5."
        );
    }

    #[tokio::test]
    async fn test_file_source_rejects_escaping_paths() {
        let dir = TempDir::new().unwrap();
        let source = FileSource::new(dir.path());

        assert!(matches!(
            source.fetch("../secret.txt").await,
            Err(DocumentError::InvalidReference(_))
        ));
        assert!(matches!(
            source.fetch("/etc/passwd").await,
            Err(DocumentError::InvalidReference(_))
        ));
    }

    #[tokio::test]
    async fn test_file_source_missing_is_not_found() {
        let dir = TempDir::new().unwrap();
        let source = FileSource::new(dir.path());
        assert!(matches!(
            source.fetch("missing.txt").await,
            Err(DocumentError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_routing_source_dispatches_by_prefix() {
        let remote = StaticSource::new().with_document("https://example.com/a", "remote");
        let local = StaticSource::new().with_document("a.txt", "local");
        let source = RoutingSource::new(Box::new(remote), Box::new(local));

        assert_eq!(source.fetch("https://example.com/a").await.unwrap(), "remote");
        assert_eq!(source.fetch("a.txt").await.unwrap(), "local");
    }
}
