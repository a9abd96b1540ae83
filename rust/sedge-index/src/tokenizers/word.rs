//! Word tokenizer built on Unicode text segmentation.

use unicode_segmentation::{UnicodeSegmentation, UnicodeWords};

use super::{DEFAULT_MAX_TERM_LENGTH, DEFAULT_MIN_TERM_LENGTH, Tokenizer, truncate_str};
use crate::tokenizers::TokenizerKind;

/// Splits text into words at Unicode word boundaries (UAX #29).
///
/// Punctuation and whitespace never appear in terms; sequences that
/// contain no alphanumeric characters are skipped entirely. Terms longer
/// than the maximum length are truncated at a character boundary, terms
/// shorter than the minimum length are dropped. No case folding or
/// stemming is applied.
pub struct WordTokenizer {
    max_term_length: usize,
    min_term_length: usize,
}

impl WordTokenizer {
    pub fn new() -> Self {
        Self {
            max_term_length: DEFAULT_MAX_TERM_LENGTH,
            min_term_length: DEFAULT_MIN_TERM_LENGTH,
        }
    }

    pub fn with_lengths(max_term_length: usize, min_term_length: usize) -> Self {
        Self {
            max_term_length,
            min_term_length,
        }
    }
}

impl Default for WordTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over the words of one input string.
pub struct WordTokenIterator<'a> {
    words: UnicodeWords<'a>,
    max_term_length: usize,
    min_term_length: usize,
}

impl<'a> Iterator for WordTokenIterator<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        for word in self.words.by_ref() {
            if word.len() >= self.min_term_length {
                return Some(truncate_str(word, self.max_term_length));
            }
        }
        None
    }
}

impl Tokenizer for WordTokenizer {
    type TokenIter<'a> = WordTokenIterator<'a>;

    fn tokenize<'a>(&'a self, input: &'a str) -> Self::TokenIter<'a> {
        WordTokenIterator {
            words: input.unicode_words(),
            max_term_length: self.max_term_length,
            min_term_length: self.min_term_length,
        }
    }

    fn kind(&self) -> TokenizerKind {
        TokenizerKind::Word
    }

    fn max_term_length(&self) -> usize {
        self.max_term_length
    }

    fn min_term_length(&self) -> usize {
        self.min_term_length
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_word_extraction() {
        let tokenizer = WordTokenizer::new();
        let terms: Vec<&str> = tokenizer.tokenize("if (branch) { take_it(); }").collect();
        assert_eq!(terms, vec!["if", "branch", "take_it"]);

        let terms: Vec<&str> = tokenizer.tokenize("").collect();
        assert!(terms.is_empty());

        let terms: Vec<&str> = tokenizer.tokenize("!@#$%").collect();
        assert!(terms.is_empty());
    }

    #[test]
    fn test_case_is_preserved() {
        let tokenizer = WordTokenizer::new();
        let terms: Vec<&str> = tokenizer.tokenize("Chapter ONE begins").collect();
        assert_eq!(terms, vec!["Chapter", "ONE", "begins"]);
    }

    #[test]
    fn test_unicode_words() {
        let tokenizer = WordTokenizer::new();
        let terms: Vec<&str> = tokenizer.tokenize("café, naïve; résumé").collect();
        assert_eq!(terms, vec!["café", "naïve", "résumé"]);

        let terms: Vec<&str> = tokenizer.tokenize("Grüße aus München").collect();
        assert_eq!(terms, vec!["Grüße", "aus", "München"]);
    }

    #[test]
    fn test_length_limits() {
        let tokenizer = WordTokenizer::with_lengths(3, 2);
        let terms: Vec<&str> = tokenizer.tokenize("a bb cat elephant").collect();
        assert_eq!(terms, vec!["bb", "cat", "ele"]);
    }

    #[test]
    fn test_truncation_keeps_valid_utf8() {
        let tokenizer = WordTokenizer::with_lengths(3, 1);
        let terms: Vec<&str> = tokenizer.tokenize("café").collect();
        assert_eq!(terms, vec!["caf"]);
    }
}
