use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use unicode_normalization::UnicodeNormalization;
use std::collections::HashSet;

lazy_static! {
    // A non-word character survives only when both neighbours are word characters.
    static ref LOOSE_PUNCT: Regex = Regex::new(r"\B\W|\W\B").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
}

pub const DEFAULT_STOPWORDS: &[&str] = &[
    "the","it","in","a","and","to","of","is","for","as","on","his","was","i","they",
    "are","that","you","at","he","with","be","had","have","what","or","this","but",
];

/// Maps raw text to normalized tokens. Must be deterministic and never emit
/// empty tokens.
pub trait Tokenizer {
    fn tokenize(&self, text: &str) -> Vec<String>;
}

impl<F> Tokenizer for F
where
    F: Fn(&str) -> Vec<String>,
{
    fn tokenize(&self, text: &str) -> Vec<String> { self(text) }
}

#[derive(Debug, Clone)]
pub struct TextTokenizer {
    stopwords: HashSet<String>,
    stem: bool,
}

impl Default for TextTokenizer {
    fn default() -> Self {
        Self::with_stopwords(DEFAULT_STOPWORDS.iter().copied())
    }
}

impl TextTokenizer {
    pub fn new() -> Self { Self::default() }

    pub fn with_stopwords<'a, I>(words: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        Self { stopwords: words.into_iter().map(str::to_lowercase).collect(), stem: false }
    }

    /// Enables English stemming of every kept token.
    pub fn stemmed(mut self, stem: bool) -> Self {
        self.stem = stem;
        self
    }

    fn is_stopword(&self, token: &str) -> bool { self.stopwords.contains(token) }
}

impl Tokenizer for TextTokenizer {
    fn tokenize(&self, text: &str) -> Vec<String> {
        let normalized = text.nfkc().collect::<String>().to_lowercase();
        let spaced = LOOSE_PUNCT.replace_all(&normalized, " ");
        spaced
            .split_whitespace()
            .filter(|t| !self.is_stopword(t))
            .map(|t| if self.stem { STEMMER.stem(t).into_owned() } else { t.to_string() })
            .collect()
    }
}

/// Tokenize text with the default policy: NFKC normalization, lowercase,
/// loose punctuation stripped, stopwords removed, no stemming.
pub fn tokenize(text: &str) -> Vec<String> {
    lazy_static! {
        static ref DEFAULT: TextTokenizer = TextTokenizer::default();
    }
    DEFAULT.tokenize(text)
}
