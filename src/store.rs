//! Persisted news table.
//!
//! [`Store`] is the seam the ingest step talks to. [`SqliteStore`] backs it
//! with a single SQLite file; the table is created on first insert with the
//! four columns the pipeline writes.
//!
//! Column limits are checked for the whole batch before anything is written,
//! and each batch goes in under one transaction: a call either lands every
//! row or none.

use std::path::Path;

use rusqlite::{Connection, params};
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::error::StoreError;
use crate::models::{NewsItem, StoredRow};

pub const TITLE_MAX: usize = 255;
pub const LINK_MAX: usize = 255;
pub const PUBLISHED_MAX: usize = 50;
pub const STOCKS_MAX: usize = 255;

/// Read and bulk-insert access to a news table.
pub trait Store {
    /// Every row of `table`. An error is never reported as an empty table.
    fn read_all(&self, table: &str) -> Result<Vec<StoredRow>, StoreError>;

    /// Insert all `items` or none of them. Returns the number of rows written.
    fn insert_many(&mut self, table: &str, items: &[NewsItem]) -> Result<usize, StoreError>;
}

/// One field of one record that would not fit its column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaViolation {
    /// Index of the record in the batch.
    pub record: usize,
    /// Column name.
    pub field: &'static str,
    pub limit: usize,
    /// Length in characters.
    pub actual: usize,
}

/// Check every item against the column limits.
///
/// Lengths are counted in characters, matching `NVARCHAR`-style columns.
///
/// # Arguments
///
/// * `items` - The batch about to be inserted
///
/// # Returns
///
/// One [`SchemaViolation`] per oversized field, in batch order. An empty
/// vector means the whole batch fits.
pub fn validate_batch(items: &[NewsItem]) -> Vec<SchemaViolation> {
    let mut violations = Vec::new();
    for (record, item) in items.iter().enumerate() {
        let stocks = item.stocks_column();
        let fields = [
            ("Title", item.title.as_str(), TITLE_MAX),
            ("Link", item.link.as_str(), LINK_MAX),
            ("PublishedDate", item.published_at.as_str(), PUBLISHED_MAX),
            ("RelatedStocks", stocks.as_deref().unwrap_or(""), STOCKS_MAX),
        ];
        for (field, value, limit) in fields {
            let actual = value.chars().count();
            if actual > limit {
                violations.push(SchemaViolation {
                    record,
                    field,
                    limit,
                    actual,
                });
            }
        }
    }
    violations
}

/// Table names are interpolated into SQL, so only `[A-Za-z0-9_]` is allowed.
pub fn check_table_name(table: &str) -> Result<&str, StoreError> {
    let valid = !table.is_empty()
        && table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !table.starts_with(|c: char| c.is_ascii_digit());
    if valid {
        Ok(table)
    } else {
        Err(StoreError::InvalidTable(table.to_string()))
    }
}

/// [`Store`] over a SQLite database.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) the database file at `path`.
    ///
    /// # Arguments
    ///
    /// * `path` - SQLite file location; created when missing
    ///
    /// # Returns
    ///
    /// The store, or [`StoreError::Sqlite`] when the file cannot be opened.
    /// Tables are not created here; see [`SqliteStore::ensure_table`].
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref())?;
        info!(path = %path.as_ref().display(), "Opened news database");
        Ok(Self { conn })
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    /// Create `table` if it does not exist yet.
    pub fn ensure_table(&self, table: &str) -> Result<(), StoreError> {
        let table = check_table_name(table)?;
        self.conn.execute_batch(&create_table_sql(table))?;
        Ok(())
    }
}

fn create_table_sql(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS \"{table}\" (
            \"Title\" TEXT NOT NULL CHECK (length(\"Title\") <= {TITLE_MAX}),
            \"Link\" TEXT NOT NULL CHECK (length(\"Link\") <= {LINK_MAX}),
            \"PublishedDate\" TEXT NOT NULL CHECK (length(\"PublishedDate\") <= {PUBLISHED_MAX}),
            \"RelatedStocks\" TEXT NULL CHECK (length(\"RelatedStocks\") <= {STOCKS_MAX})
        );"
    )
}

impl Store for SqliteStore {
    #[instrument(level = "info", skip(self))]
    fn read_all(&self, table: &str) -> Result<Vec<StoredRow>, StoreError> {
        let table = check_table_name(table)?;
        let mut stmt = self.conn.prepare(&format!(
            "SELECT \"Title\", \"Link\", \"PublishedDate\", \"RelatedStocks\" FROM \"{table}\" ORDER BY rowid"
        ))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(StoredRow {
                    title: row.get(0)?,
                    link: row.get(1)?,
                    published_date: row.get(2)?,
                    related_stocks: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        debug!(count = rows.len(), "Read existing rows");
        Ok(rows)
    }

    #[instrument(level = "info", skip(self, items), fields(count = items.len()))]
    fn insert_many(&mut self, table: &str, items: &[NewsItem]) -> Result<usize, StoreError> {
        let table = check_table_name(table)?;
        let violations = validate_batch(items);
        if !violations.is_empty() {
            return Err(StoreError::SchemaViolations(violations));
        }

        let tx = self.conn.transaction()?;
        tx.execute_batch(&create_table_sql(table))?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO \"{table}\" (\"Title\", \"Link\", \"PublishedDate\", \"RelatedStocks\")
                 VALUES (?1, ?2, ?3, ?4)"
            ))?;
            for item in items {
                stmt.execute(params![
                    item.title,
                    item.link,
                    item.published_at,
                    item.stocks_column()
                ])?;
            }
        }
        tx.commit()?;

        info!(inserted = items.len(), "Inserted rows");
        Ok(items.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(title: &str, link: &str) -> NewsItem {
        NewsItem::new(title, link, "2025-03-10 09:00:00")
    }

    #[test]
    fn test_insert_then_read_round_trip_keeps_null_vs_empty() {
        let mut store = SqliteStore::in_memory().unwrap();
        let mut a = item("Fed Raises Rates", "https://x/a");
        a.related_stocks = Some(vec!["AAPL".into(), "MSFT".into()]);
        let mut b = item("Oil Prices Surge", "https://x/b");
        b.related_stocks = Some(vec![]);
        let c = item("Gold steady", "https://x/c");

        assert_eq!(store.insert_many("Market_News", &[a, b, c]).unwrap(), 3);

        let rows = store.read_all("Market_News").unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].related_stocks.as_deref(), Some("AAPL, MSFT"));
        assert_eq!(rows[1].related_stocks.as_deref(), Some(""));
        assert_eq!(rows[2].related_stocks, None);
        assert_eq!(rows[2].published_date, "2025-03-10 09:00:00");
    }

    #[test]
    fn test_read_missing_table_is_an_error_not_empty() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(matches!(store.read_all("Market_News"), Err(StoreError::Sqlite(_))));
    }

    #[test]
    fn test_ensure_table_then_read_is_empty() {
        let store = SqliteStore::in_memory().unwrap();
        store.ensure_table("Market_News").unwrap();
        assert!(store.read_all("Market_News").unwrap().is_empty());
    }

    #[test]
    fn test_invalid_table_name_rejected() {
        let mut store = SqliteStore::in_memory().unwrap();
        for bad in ["", "news; DROP TABLE x", "my-table", "1news", "news\""] {
            assert!(matches!(
                store.insert_many(bad, &[item("t", "l")]),
                Err(StoreError::InvalidTable(_))
            ));
            assert!(matches!(store.read_all(bad), Err(StoreError::InvalidTable(_))));
        }
    }

    #[test]
    fn test_validate_batch_reports_each_violation() {
        let mut long = item(&"t".repeat(256), "https://x/ok");
        long.published_at = "d".repeat(51);
        let mut stocks = item("fine", &format!("https://x/{}", "l".repeat(300)));
        stocks.related_stocks = Some(vec!["S".repeat(200), "T".repeat(200)]);

        let violations = validate_batch(&[item("ok", "https://x/1"), long, stocks]);
        assert_eq!(
            violations,
            vec![
                SchemaViolation { record: 1, field: "Title", limit: 255, actual: 256 },
                SchemaViolation { record: 1, field: "PublishedDate", limit: 50, actual: 51 },
                SchemaViolation { record: 2, field: "Link", limit: 255, actual: 310 },
                SchemaViolation { record: 2, field: "RelatedStocks", limit: 255, actual: 402 },
            ]
        );
    }

    #[test]
    fn test_validate_counts_characters_not_bytes() {
        let title = "股".repeat(255);
        assert!(validate_batch(&[item(&title, "https://x/a")]).is_empty());
    }

    #[test]
    fn test_overflowing_batch_writes_nothing() {
        let mut store = SqliteStore::in_memory().unwrap();
        store.ensure_table("Market_News").unwrap();
        let batch = vec![item("good", "https://x/1"), item(&"x".repeat(300), "https://x/2")];

        let err = store.insert_many("Market_News", &batch).unwrap_err();
        match err {
            StoreError::SchemaViolations(v) => assert_eq!(v[0].record, 1),
            other => panic!("unexpected error: {other}"),
        }
        assert!(store.read_all("Market_News").unwrap().is_empty());
    }

    #[test]
    fn test_failed_statement_rolls_back_batch() {
        let mut store = SqliteStore::in_memory().unwrap();
        // a stricter pre-existing table makes the second row fail inside the transaction
        store
            .conn
            .execute_batch(
                "CREATE TABLE \"Strict\" (\"Title\" TEXT NOT NULL UNIQUE, \"Link\" TEXT NOT NULL,
                 \"PublishedDate\" TEXT NOT NULL, \"RelatedStocks\" TEXT NULL);",
            )
            .unwrap();
        let batch = vec![item("same", "https://x/1"), item("same", "https://x/2")];

        assert!(matches!(
            store.insert_many("Strict", &batch),
            Err(StoreError::Sqlite(_))
        ));
        assert!(store.read_all("Strict").unwrap().is_empty());
    }
}
