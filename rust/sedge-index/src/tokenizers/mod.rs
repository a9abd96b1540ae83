//! Tokenizers for turning document text into indexable terms.
//!
//! The same tokenizer must be used when building an index and when
//! processing queries against it, otherwise the extracted terms will not
//! line up. Tokenizers yield borrowed subslices of the input and allocate
//! nothing.

pub mod trivial;
pub mod word;

use sedge_common::{Result, error::Error};
pub use trivial::TrivialTokenizer;
pub use word::WordTokenizer;

/// Default maximum term length in bytes; longer terms are truncated.
pub const DEFAULT_MAX_TERM_LENGTH: usize = 128;

/// Default minimum term length in bytes; shorter terms are dropped.
pub const DEFAULT_MIN_TERM_LENGTH: usize = 1;

/// Extracts terms from raw text as an iterator of borrowed slices.
///
/// Terms longer than [`max_term_length`](Tokenizer::max_term_length) are
/// truncated at a UTF-8 character boundary; terms shorter than
/// [`min_term_length`](Tokenizer::min_term_length) are excluded.
pub trait Tokenizer: Send + Sync {
    type TokenIter<'a>: Iterator<Item = &'a str>
    where
        Self: 'a;

    fn tokenize<'a>(&'a self, input: &'a str) -> Self::TokenIter<'a>;

    fn kind(&self) -> TokenizerKind;

    fn name(&self) -> &'static str {
        self.kind().name()
    }

    fn max_term_length(&self) -> usize;

    fn min_term_length(&self) -> usize;
}

/// Creates a tokenizer by its registered name.
///
/// Returns [`Error::invalid_arg`] for an unrecognized name. Useful for
/// configuration-driven selection; see [`TokenizerKind`] for the names.
pub fn create_tokenizer(name: &str) -> Result<TokenizerType> {
    match name.try_into()? {
        TokenizerKind::Trivial => Ok(TokenizerType::Trivial(TrivialTokenizer::new())),
        TokenizerKind::Word => Ok(TokenizerType::Word(WordTokenizer::new())),
    }
}

/// Truncates `input` to at most `max_term_length` bytes, backing off to the
/// nearest UTF-8 character boundary so the result is always valid.
pub(crate) fn truncate_str(input: &str, max_term_length: usize) -> &str {
    if input.len() <= max_term_length {
        return input;
    }
    let mut boundary = max_term_length;
    while boundary > 0 && !input.is_char_boundary(boundary) {
        boundary -= 1;
    }
    &input[..boundary]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenizerKind {
    /// Passes the whole input through as a single term.
    Trivial,
    /// Splits the input into words at Unicode word boundaries.
    Word,
}

impl TryFrom<&str> for TokenizerKind {
    type Error = sedge_common::error::Error;

    fn try_from(name: &str) -> Result<Self> {
        match name {
            "trivial" => Ok(TokenizerKind::Trivial),
            "word" => Ok(TokenizerKind::Word),
            _ => Err(Error::invalid_arg(
                "name",
                format!("unrecognized tokenizer: {name}"),
            )),
        }
    }
}

impl TokenizerKind {
    const fn name(&self) -> &'static str {
        match self {
            TokenizerKind::Trivial => "trivial",
            TokenizerKind::Word => "word",
        }
    }
}

/// Holds any of the available tokenizers behind one type while keeping the
/// iterator-based API.
pub enum TokenizerType {
    Trivial(TrivialTokenizer),
    Word(WordTokenizer),
}

impl Tokenizer for TokenizerType {
    type TokenIter<'a> = Box<dyn Iterator<Item = &'a str> + 'a>;

    fn tokenize<'a>(&'a self, input: &'a str) -> Self::TokenIter<'a> {
        match self {
            TokenizerType::Trivial(tokenizer) => Box::new(tokenizer.tokenize(input)),
            TokenizerType::Word(tokenizer) => Box::new(tokenizer.tokenize(input)),
        }
    }

    fn kind(&self) -> TokenizerKind {
        match self {
            TokenizerType::Trivial(tokenizer) => tokenizer.kind(),
            TokenizerType::Word(tokenizer) => tokenizer.kind(),
        }
    }

    fn max_term_length(&self) -> usize {
        match self {
            TokenizerType::Trivial(tokenizer) => tokenizer.max_term_length(),
            TokenizerType::Word(tokenizer) => tokenizer.max_term_length(),
        }
    }

    fn min_term_length(&self) -> usize {
        match self {
            TokenizerType::Trivial(tokenizer) => tokenizer.min_term_length(),
            TokenizerType::Word(tokenizer) => tokenizer.min_term_length(),
        }
    }
}
