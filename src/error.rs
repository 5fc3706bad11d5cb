//! Error types for the ingestion run.
//!
//! Each component returns its own error so callers can tell an isolated
//! failure (one page, one link, one classifier) from a run-level one.

use std::collections::HashSet;
use std::time::Duration;

use thiserror::Error;

use crate::store::SchemaViolation;

/// Failures while rendering, fetching or parsing upstream pages.
#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("browser error: {0}")]
    Browser(String),

    #[error("extraction error: {0}")]
    Extraction(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

/// Failures talking to the persisted table.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("invalid table name: {0:?}")]
    InvalidTable(String),

    #[error(
        "{} record(s) exceed column limits ({} field(s) too long)",
        distinct_records(.0),
        .0.len()
    )]
    SchemaViolations(Vec<SchemaViolation>),
}

fn distinct_records(violations: &[SchemaViolation]) -> usize {
    violations.iter().map(|v| v.record).collect::<HashSet<_>>().len()
}

/// A language classifier could not decide.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassifyError {
    #[error("no letters to classify")]
    NoLetters,

    #[error("classifier could not determine a language")]
    Undetermined,
}

/// Run-level failures of the per-feed ingest step.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("error reading existing rows: {0}")]
    StoreRead(#[source] StoreError),

    #[error("error inserting rows: {0}")]
    StoreWrite(#[source] StoreError),
}

/// Configuration could not be loaded.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_formatting_is_readable() {
        let err = ScrapeError::Extraction("missing #section".to_string());
        assert_eq!(err.to_string(), "extraction error: missing #section");

        let err = StoreError::InvalidTable("news; drop".to_string());
        assert_eq!(err.to_string(), "invalid table name: \"news; drop\"");
    }

    #[test]
    fn test_ingest_error_keeps_source() {
        use std::error::Error as _;
        let err = IngestError::StoreRead(StoreError::InvalidTable("x-y".to_string()));
        assert!(err.to_string().starts_with("error reading existing rows"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_schema_violation_count_in_message() {
        let err = StoreError::SchemaViolations(vec![SchemaViolation {
            record: 0,
            field: "Title",
            limit: 255,
            actual: 300,
        }]);
        assert_eq!(err.to_string(), "1 record(s) exceed column limits (1 field(s) too long)");
    }

    #[test]
    fn test_schema_violation_message_counts_records_not_fields() {
        let violation = |record, field| SchemaViolation {
            record,
            field,
            limit: 255,
            actual: 300,
        };
        let err = StoreError::SchemaViolations(vec![
            violation(2, "Title"),
            violation(2, "Link"),
            violation(5, "RelatedStocks"),
        ]);
        assert_eq!(err.to_string(), "2 record(s) exceed column limits (3 field(s) too long)");
    }
}
