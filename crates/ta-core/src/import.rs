//! Text import of incident reports.
//!
//! Upload files carry multiple incidents separated by `###` or `---` lines.
//! Each block becomes one incident and is indexed with duplicate checking;
//! duplicates and per-block failures are counted rather than aborting the
//! import.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::OnceLock;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::incident::Incident;
use crate::vector::{IncidentIndexService, IndexError};

/// Errors rejecting an import before any block is processed.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("unsupported file format: {0} (only plain text is accepted)")]
    UnsupportedFormat(String),

    #[error("invalid structure: incidents must be separated by \"###\" or \"---\" lines")]
    InvalidStructure,
}

/// Outcome counters for one import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportOutcome {
    pub processed: usize,
    pub duplicates: usize,
    pub errors: usize,
    pub incident_ids: Vec<String>,
}

fn separator_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\n*#{3,}\n*|\n*-{3,}\n*").expect("valid separator regex"))
}

fn has_separator() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[-#]{3,}").expect("valid separator probe regex"))
}

/// Splits raw upload content into per-incident text blocks.
pub fn split_incident_texts(content: &str) -> Vec<String> {
    separator_pattern()
        .split(content)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
        .collect()
}

/// Imports separator-delimited incident text into the index.
pub struct TextImporter {
    index: Arc<IncidentIndexService>,
}

impl TextImporter {
    pub fn new(index: Arc<IncidentIndexService>) -> Self {
        Self { index }
    }

    /// Imports a file of the declared type.
    ///
    /// Only plain text is supported.
    pub async fn import_file(
        &self,
        content: &str,
        file_type: &str,
        source: &str,
    ) -> Result<ImportOutcome, ImportError> {
        if !file_type.eq_ignore_ascii_case("txt") {
            return Err(ImportError::UnsupportedFormat(file_type.to_string()));
        }
        self.import_text(content, source).await
    }

    /// Imports `content`, attributing created incidents to `source`.
    ///
    /// Rejects content without any recognizable separator. Individual block
    /// failures are counted and skipped.
    #[instrument(skip(self, content), fields(source = %source))]
    pub async fn import_text(
        &self,
        content: &str,
        source: &str,
    ) -> Result<ImportOutcome, ImportError> {
        if !has_separator().is_match(content) {
            return Err(ImportError::InvalidStructure);
        }

        let mut outcome = ImportOutcome::default();
        for text in split_incident_texts(content) {
            let incident = Incident::new(text, source);
            match self.index.index_incident(&incident, true).await {
                Ok(()) => {
                    outcome.processed += 1;
                    outcome.incident_ids.push(incident.id);
                }
                Err(IndexError::DuplicateContent) => outcome.duplicates += 1,
                Err(e) => {
                    warn!(incident_id = %incident.id, error = %e, "Failed to import incident block");
                    outcome.errors += 1;
                }
            }
        }

        info!(
            processed = outcome.processed,
            duplicates = outcome.duplicates,
            errors = outcome.errors,
            "Import finished"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedupe::ContentHashCache;
    use crate::vector::{InMemoryIncidentStore, MockEmbedder};
    use std::time::Duration;

    fn importer() -> TextImporter {
        let store = Arc::new(InMemoryIncidentStore::new(64));
        let embedder = Arc::new(MockEmbedder::new(64));
        TextImporter::new(Arc::new(IncidentIndexService::new(
            store,
            embedder,
            ContentHashCache::new(Duration::from_secs(60)),
        )))
    }

    #[test]
    fn test_split_on_both_separators() {
        let blocks = split_incident_texts("first incident\n###\nsecond incident\n---\nthird");
        assert_eq!(blocks, vec!["first incident", "second incident", "third"]);
    }

    #[test]
    fn test_split_drops_empty_blocks() {
        let blocks = split_incident_texts("###\n\nonly one\n###\n###");
        assert_eq!(blocks, vec!["only one"]);
    }

    #[tokio::test]
    async fn test_import_counts_processed_and_duplicates() {
        let importer = importer();
        let outcome = importer
            .import_text(
                "ssh scanning from 203.0.113.7\n###\nssh scanning from 203.0.113.7\n###\ndefacement of public site",
                "file-upload",
            )
            .await
            .unwrap();

        assert_eq!(outcome.processed, 2);
        assert_eq!(outcome.duplicates, 1);
        assert_eq!(outcome.errors, 0);
        assert_eq!(outcome.incident_ids.len(), 2);
    }

    #[tokio::test]
    async fn test_import_file_rejects_other_formats() {
        let importer = importer();
        let err = importer
            .import_file("a\n###\nb", "csv", "file-upload")
            .await
            .unwrap_err();
        assert!(matches!(err, ImportError::UnsupportedFormat(_)));
    }

    #[tokio::test]
    async fn test_import_without_separator_is_rejected() {
        let importer = importer();
        let err = importer
            .import_text("one single block of text", "file-upload")
            .await
            .unwrap_err();
        assert!(matches!(err, ImportError::InvalidStructure));
    }
}
