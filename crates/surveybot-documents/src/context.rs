use tracing::{debug, warn};

use crate::DocumentSource;

/// Concatenated text of a set of documents
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentContext {
    text: String,
    loaded: usize,
    skipped: usize,
}

impl DocumentContext {
    /// Fetch every reference in order and join the texts with blank lines.
    ///
    /// Documents that cannot be fetched are skipped with a warning.
    pub async fn build(source: &dyn DocumentSource, references: &[String]) -> Self {
        let mut context = Self::default();

        for reference in references {
            match source.fetch(reference).await {
                Ok(text) => {
                    let text = text.trim();
                    if text.is_empty() {
                        debug!(reference = %reference, "Document is empty");
                        context.skipped += 1;
                        continue;
                    }
                    if !context.text.is_empty() {
                        context.text.push_str("\n\n");
                    }
                    context.text.push_str(text);
                    context.loaded += 1;
                }
                Err(e) => {
                    warn!(reference = %reference, error = %e, "Skipping document");
                    context.skipped += 1;
                }
            }
        }

        debug!(
            loaded = context.loaded,
            skipped = context.skipped,
            chars = context.text.len(),
            "Built document context"
        );
        context
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn loaded(&self) -> usize {
        self.loaded
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }
}
