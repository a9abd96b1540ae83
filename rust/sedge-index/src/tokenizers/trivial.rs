//! Whole-value tokenizer.

use std::iter;

use super::{DEFAULT_MAX_TERM_LENGTH, DEFAULT_MIN_TERM_LENGTH, Tokenizer, truncate_str};
use crate::tokenizers::TokenizerKind;

/// Emits the raw input as a single term, truncated to the maximum length.
///
/// No term extraction happens at all, which makes this tokenizer suitable
/// for label-like fields matched on full-value equality: identifiers,
/// category tags, file paths. Inputs shorter than the minimum length yield
/// nothing.
pub struct TrivialTokenizer {
    max_term_length: usize,
    min_term_length: usize,
}

impl TrivialTokenizer {
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

impl Default for TrivialTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tokenizer for TrivialTokenizer {
    type TokenIter<'a> = iter::Take<iter::Once<&'a str>>;

    fn tokenize<'a>(&'a self, input: &'a str) -> Self::TokenIter<'a> {
        if input.len() < self.min_term_length.max(1) {
            iter::once("").take(0)
        } else {
            iter::once(truncate_str(input, self.max_term_length)).take(1)
        }
    }

    fn kind(&self) -> TokenizerKind {
        TokenizerKind::Trivial
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
    fn test_passes_input_through() {
        let tokenizer = TrivialTokenizer::new();
        let terms: Vec<&str> = tokenizer.tokenize("news/sports").collect();
        assert_eq!(terms, vec!["news/sports"]);

        let terms: Vec<&str> = tokenizer.tokenize("two words stay joined").collect();
        assert_eq!(terms, vec!["two words stay joined"]);
    }

    #[test]
    fn test_empty_input_yields_nothing() {
        let tokenizer = TrivialTokenizer::new();
        assert_eq!(tokenizer.tokenize("").count(), 0);
    }

    #[test]
    fn test_truncates_long_values() {
        let tokenizer = TrivialTokenizer::with_lengths(8, 1);
        let terms: Vec<&str> = tokenizer.tokenize("abcdefghijkl").collect();
        assert_eq!(terms, vec!["abcdefgh"]);
    }

    #[test]
    fn test_min_length_excludes_short_values() {
        let tokenizer = TrivialTokenizer::with_lengths(128, 4);
        assert_eq!(tokenizer.tokenize("abc").count(), 0);
        assert_eq!(tokenizer.tokenize("abcd").count(), 1);
    }
}
