//! Title normalization and deduplication against the persisted store.
//!
//! Two headlines are the same story when their normalized titles match.
//! The same [`normalize_title`] runs on scraped titles and on stored titles;
//! any drift between the two sides would let duplicates through silently.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, instrument};

use crate::models::{NewsItem, StoredRow};
use crate::utils::truncate_for_log;

static NON_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\s]").expect("static regex is valid"));

/// Reduce a title to its deduplication key.
///
/// Trims, lowercases, then removes every character that is neither a Unicode
/// word character nor whitespace. Inner whitespace is left as is. The result
/// is trimmed once more so that normalizing twice is a no-op.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(normalize_title("  Fed Raises Rates!! "), "fed raises rates");
/// assert_eq!(normalize_title("S&P 500 hits record"), "sp 500 hits record");
/// ```
pub fn normalize_title(title: &str) -> String {
    let lowered = title.trim().to_lowercase();
    NON_WORD.replace_all(&lowered, "").trim().to_string()
}

/// Normalized titles of everything already stored.
pub fn existing_titles(rows: &[StoredRow]) -> HashSet<String> {
    rows.iter().map(|row| normalize_title(&row.title)).collect()
}

/// Outcome of [`reconcile`].
#[derive(Debug, Default)]
pub struct Reconciled {
    /// Items to insert, in input order.
    pub fresh: Vec<NewsItem>,
    /// Dropped because an earlier item in the same batch had the same key.
    pub duplicates_in_batch: usize,
    /// Dropped because the key is already in the store.
    pub already_stored: usize,
}

/// Keep the first item per normalized title, then drop titles already stored.
///
/// # Arguments
///
/// * `new_items` - This run's items, in collection order
/// * `existing` - Normalized titles already in the store, see [`existing_titles`]
///
/// # Returns
///
/// The items to insert, in input order, plus how many were dropped as
/// duplicates within the batch and how many were already stored.
#[instrument(level = "debug", skip_all, fields(new = new_items.len(), existing = existing.len()))]
pub fn reconcile(new_items: Vec<NewsItem>, existing: &HashSet<String>) -> Reconciled {
    let mut seen = HashSet::with_capacity(new_items.len());
    let mut out = Reconciled::default();

    for item in new_items {
        let key = item.normalized_title();
        if !seen.insert(key.clone()) {
            debug!(title = %truncate_for_log(&item.title, 80), "Duplicate within batch");
            out.duplicates_in_batch += 1;
            continue;
        }
        if existing.contains(&key) {
            debug!(title = %truncate_for_log(&item.title, 80), "Already stored");
            out.already_stored += 1;
            continue;
        }
        out.fresh.push(item);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(title: &str, link: &str) -> NewsItem {
        NewsItem::new(title, link, "2025-03-10 09:00:00")
    }

    fn stored(title: &str) -> StoredRow {
        StoredRow {
            title: title.to_string(),
            link: String::new(),
            published_date: String::new(),
            related_stocks: None,
        }
    }

    #[test]
    fn test_normalize_title_basic() {
        assert_eq!(normalize_title("  Fed Raises Rates!! "), "fed raises rates");
        assert_eq!(normalize_title("S&P 500: hits record"), "sp 500 hits record");
        assert_eq!(normalize_title("Q3 earnings_beat"), "q3 earnings_beat");
    }

    #[test]
    fn test_normalize_title_keeps_inner_whitespace() {
        assert_eq!(normalize_title("Oil  -  Gas"), "oil    gas");
    }

    #[test]
    fn test_normalize_title_unicode_word_chars() {
        assert_eq!(normalize_title("Café Déjà-Vu"), "café déjàvu");
        assert_eq!(normalize_title("马股上涨！"), "马股上涨");
    }

    #[test]
    fn test_normalize_title_is_idempotent() {
        let samples = [
            "",
            "   ",
            "!!!",
            "Hello !",
            "  Fed Raises Rates!! ",
            "Oil  -  Gas",
            "ÀÉÎ Õü — “quoted” ‘text’",
            "马股上涨！ KLCI 涨 1.2%",
            "tab\tseparated\ttitle.",
        ];
        for s in samples {
            let once = normalize_title(s);
            assert_eq!(normalize_title(&once), once, "not idempotent for {s:?}");
        }
    }

    #[test]
    fn test_reconcile_drops_stored_title_scenario() {
        let existing = existing_titles(&[stored("Fed Raises Rates")]);
        let batch = vec![
            item("Fed Raises Rates!!", "https://example.com/1"),
            item("Oil Prices Surge", "https://example.com/2"),
        ];

        let out = reconcile(batch, &existing);
        assert_eq!(out.fresh.len(), 1);
        assert_eq!(out.fresh[0].title, "Oil Prices Surge");
        assert_eq!(out.already_stored, 1);
        assert_eq!(out.duplicates_in_batch, 0);
    }

    #[test]
    fn test_reconcile_keeps_first_occurrence_in_batch() {
        let batch = vec![
            item("Oil Prices Surge", "https://example.com/first"),
            item("Gold steady", "https://example.com/gold"),
            item("oil prices surge.", "https://example.com/second"),
        ];

        let out = reconcile(batch, &HashSet::new());
        assert_eq!(out.fresh.len(), 2);
        assert_eq!(out.fresh[0].link, "https://example.com/first");
        assert_eq!(out.fresh[1].link, "https://example.com/gold");
        assert_eq!(out.duplicates_in_batch, 1);
    }

    #[test]
    fn test_reconcile_is_sound() {
        let existing = existing_titles(&[stored("A"), stored("b!"), stored("C c")]);
        let batch: Vec<NewsItem> = ["a", "B", "b", "c c", "C C?", "d", "D", "e"]
            .iter()
            .enumerate()
            .map(|(i, t)| item(t, &format!("https://example.com/{i}")))
            .collect();

        let out = reconcile(batch.clone(), &existing);
        let mut keys = HashSet::new();
        for fresh in &out.fresh {
            let key = fresh.normalized_title();
            assert!(!existing.contains(&key));
            assert!(keys.insert(key), "two items share a key");
        }
        assert_eq!(
            out.fresh.iter().map(|i| i.title.as_str()).collect::<Vec<_>>(),
            vec!["d", "e"]
        );
        assert_eq!(
            out.fresh.len() + out.duplicates_in_batch + out.already_stored,
            batch.len()
        );
    }

    #[test]
    fn test_existing_titles_are_normalized() {
        let set = existing_titles(&[stored("  Fed Raises Rates! "), stored("OIL")]);
        assert!(set.contains("fed raises rates"));
        assert!(set.contains("oil"));
        assert_eq!(set.len(), 2);
    }
}
