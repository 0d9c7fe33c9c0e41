//! # Token Sources
//!
//! The tagger consumes plain token lists, but documents usually come with
//! their own tokenization. `TokenSource` is the one question the tagger asks
//! of such a document: which token starts at this offset? `sentence_tokens`
//! walks a sentence span with it.
//!
//! `Tokenizer` is a small regex splitter producing a `TokenizedText`, enough
//! to tag raw text when no upstream tokenization is available.

use regex::Regex;

use crate::error::Result;

/// A half-open byte range `[start, end)` in a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// A token with its byte range in the original text.
///
/// `end` includes any whitespace trailing the token, so it is the offset
/// at which the next token starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSpan {
    /// The token text content
    pub text: String,
    /// Start position in the original string
    pub start: usize,
    /// End position in the original string
    pub end: usize,
}

/// Anything that can answer "which token starts at this offset?".
pub trait TokenSource {
    /// The token starting exactly at `posn`, if any.
    fn token_at(&self, posn: usize) -> Option<TokenSpan>;
}

/// Collect the trimmed token texts of one sentence span.
///
/// Starts at `span.start` and hops from token to token until `span.end`,
/// stopping early at the first offset where no token starts.
pub fn sentence_tokens<T: TokenSource + ?Sized>(source: &T, span: Span) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut posn = span.start;

    while posn < span.end {
        let Some(token) = source.token_at(posn) else {
            break;
        };
        tokens.push(token.text.trim().to_string());
        if token.end <= posn {
            break;
        }
        posn = token.end;
    }

    tokens
}

/// Splits text into word runs and single punctuation marks.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    re_token: Regex,
}

impl Tokenizer {
    /// Create a new tokenizer instance.
    pub fn new() -> Result<Self> {
        Ok(Self {
            re_token: Regex::new(r"\w+|[^\w\s]")?,
        })
    }

    /// Tokenize `text`, keeping byte offsets.
    ///
    /// # Examples
    /// ```
    /// use evtag_core::Tokenizer;
    ///
    /// let tokens = Tokenizer::new().unwrap().tokenize("This morning, an American");
    /// let texts: Vec<_> = tokens.tokens().iter().map(|t| t.text.as_str()).collect();
    /// assert_eq!(texts, ["This", "morning", ",", "an", "American"]);
    /// ```
    pub fn tokenize(&self, text: &str) -> TokenizedText {
        let matches: Vec<_> = self.re_token.find_iter(text).collect();
        let mut tokens = Vec::with_capacity(matches.len());

        for (i, m) in matches.iter().enumerate() {
            let end = matches.get(i + 1).map_or(text.len(), |next| next.start());
            tokens.push(TokenSpan {
                text: m.as_str().to_string(),
                start: m.start(),
                end,
            });
        }

        TokenizedText {
            text: text.to_string(),
            tokens,
        }
    }
}

/// Raw text together with its tokens, sorted by start offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenizedText {
    text: String,
    tokens: Vec<TokenSpan>,
}

impl TokenizedText {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn tokens(&self) -> &[TokenSpan] {
        &self.tokens
    }

    /// Span covering the whole text.
    pub fn full_span(&self) -> Span {
        Span::new(0, self.text.len())
    }

    /// Token texts in order.
    pub fn texts(&self) -> Vec<String> {
        self.tokens.iter().map(|t| t.text.clone()).collect()
    }
}

impl TokenSource for TokenizedText {
    fn token_at(&self, posn: usize) -> Option<TokenSpan> {
        self.tokens
            .binary_search_by_key(&posn, |t| t.start)
            .ok()
            .map(|idx| self.tokens[idx].clone())
    }
}
