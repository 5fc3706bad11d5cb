//! English detection for headlines.
//!
//! Two independent classifiers vote and the title is kept when either one says
//! English. Dropping a real English headline is the failure we care about, so
//! an English vote from one side always wins over the other side's doubt.
//!
//! - [`WhatlangClassifier`]: trigram/script model from the `whatlang` crate
//! - [`StopwordClassifier`]: Latin-script share plus English vs. Malay function words;
//!   abstains when it recognises none

use std::collections::HashSet;

use once_cell::sync::Lazy;
use tracing::{debug, warn};

use crate::error::ClassifyError;
use crate::utils::truncate_for_log;

/// A language classifier that answers "is this English?".
pub trait LanguageClassifier: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Ok(true)` when the text is English. Errors mean "could not decide".
    fn is_english(&self, text: &str) -> Result<bool, ClassifyError>;
}

/// Classifier backed by `whatlang::detect`.
#[derive(Debug, Default, Clone, Copy)]
pub struct WhatlangClassifier;

impl LanguageClassifier for WhatlangClassifier {
    fn name(&self) -> &'static str {
        "whatlang"
    }

    fn is_english(&self, text: &str) -> Result<bool, ClassifyError> {
        if !text.chars().any(char::is_alphabetic) {
            return Err(ClassifyError::NoLetters);
        }
        let info = whatlang::detect(text).ok_or(ClassifyError::Undetermined)?;
        Ok(info.lang() == whatlang::Lang::Eng)
    }
}

static ENGLISH_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "the", "a", "an", "of", "to", "in", "on", "for", "and", "or", "with", "at", "by",
        "from", "as", "is", "are", "was", "were", "be", "has", "have", "had", "will",
        "its", "it", "this", "that", "after", "over", "into", "amid", "than", "new",
        "says", "said", "up", "down", "higher", "lower", "more", "less", "not", "no",
    ]
    .into_iter()
    .collect()
});

// Malay/Indonesian function words; the listing mixes English and Malay headlines.
static MALAY_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "dan", "yang", "untuk", "di", "ke", "dari", "pada", "akan", "ini", "itu",
        "dengan", "oleh", "dalam", "bagi", "tidak", "telah", "lebih", "kepada",
        "juga", "sebagai", "kerana", "tahun", "syarikat", "saham", "naik", "turun",
    ]
    .into_iter()
    .collect()
});

/// Heuristic classifier: Latin script and more English than Malay function words.
///
/// Abstains with [`ClassifyError::Undetermined`] when no listed word occurs, so
/// it never accepts a title it knows nothing about. Upper-case tokens of two or
/// more letters (`AS`, `KLCI`, `US`) are tickers and acronyms and are not counted.
#[derive(Debug, Clone, Copy)]
pub struct StopwordClassifier {
    /// Minimum share of ASCII letters among all letters.
    pub min_latin_share: f32,
}

impl Default for StopwordClassifier {
    fn default() -> Self {
        Self {
            min_latin_share: 0.85,
        }
    }
}

impl LanguageClassifier for StopwordClassifier {
    fn name(&self) -> &'static str {
        "stopwords"
    }

    fn is_english(&self, text: &str) -> Result<bool, ClassifyError> {
        let letters = text.chars().filter(|c| c.is_alphabetic()).count();
        if letters == 0 {
            return Err(ClassifyError::NoLetters);
        }
        let ascii = text.chars().filter(|c| c.is_ascii_alphabetic()).count();
        if (ascii as f32) / (letters as f32) < self.min_latin_share {
            return Ok(false);
        }

        let (mut english, mut malay) = (0usize, 0usize);
        for word in text
            .split(|c: char| !c.is_alphanumeric() && c != '\'')
            .filter(|w| !w.is_empty())
        {
            if word.len() > 1 && word.chars().all(|c| !c.is_lowercase()) {
                continue;
            }
            let word = word.to_lowercase();
            if ENGLISH_WORDS.contains(word.as_str()) {
                english += 1;
            }
            if MALAY_WORDS.contains(word.as_str()) {
                malay += 1;
            }
        }
        if english == 0 && malay == 0 {
            return Err(ClassifyError::Undetermined);
        }
        Ok(english > malay)
    }
}

/// OR-vote over two classifiers.
pub struct LanguageFilter {
    primary: Box<dyn LanguageClassifier>,
    secondary: Box<dyn LanguageClassifier>,
}

impl Default for LanguageFilter {
    fn default() -> Self {
        Self::new(
            Box::new(WhatlangClassifier),
            Box::new(StopwordClassifier::default()),
        )
    }
}

impl LanguageFilter {
    pub fn new(
        primary: Box<dyn LanguageClassifier>,
        secondary: Box<dyn LanguageClassifier>,
    ) -> Self {
        Self { primary, secondary }
    }

    /// `true` when either classifier reports English.
    ///
    /// A classifier that errors counts as a "not English" vote; errors never
    /// escape this function.
    pub fn is_english(&self, text: &str) -> bool {
        let first = self.vote(self.primary.as_ref(), text);
        let second = self.vote(self.secondary.as_ref(), text);
        debug!(text = %truncate_for_log(text, 80), first, second, "Language vote");
        first || second
    }

    fn vote(&self, classifier: &dyn LanguageClassifier, text: &str) -> bool {
        match classifier.is_english(text) {
            Ok(english) => english,
            Err(e) => {
                warn!(
                    classifier = classifier.name(),
                    text = %truncate_for_log(text, 80),
                    error = %e,
                    "Language detection failed; counting as not English"
                );
                false
            }
        }
    }
}
