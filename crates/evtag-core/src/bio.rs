//! # BIO Tags
//!
//! The paired model labels tokens with BIO strings (`B-Attack`, `I-Attack`,
//! `O`). This module reads those strings and groups labelled runs of tokens
//! into mentions.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, TaggerError};

/// A parsed BIO tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BioTag {
    /// First token of a mention.
    Begin(String),
    /// Continuation of a mention.
    Inside(String),
    /// Not part of any mention.
    Outside,
}

impl BioTag {
    /// Label of the mention this tag belongs to.
    pub fn label(&self) -> Option<&str> {
        match self {
            BioTag::Begin(label) | BioTag::Inside(label) => Some(label.as_str()),
            BioTag::Outside => None,
        }
    }

    /// Check if this is a "Begin" tag.
    pub fn is_begin(&self) -> bool {
        matches!(self, BioTag::Begin(_))
    }

    /// Check if this is an "Inside" tag.
    pub fn is_inside(&self) -> bool {
        matches!(self, BioTag::Inside(_))
    }

    /// Check if `to` may follow `from` in a well-formed sequence.
    ///
    /// `I-X` is only valid after `B-X` or `I-X`; everything else is unrestricted.
    pub fn is_valid_transition(from: &BioTag, to: &BioTag) -> bool {
        match to {
            BioTag::Inside(label) => match from {
                BioTag::Begin(prev) | BioTag::Inside(prev) => prev == label,
                BioTag::Outside => false,
            },
            _ => true,
        }
    }
}

impl FromStr for BioTag {
    type Err = Infallible;

    /// Anything without a `B-` or `I-` prefix reads as `Outside`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(if let Some(label) = s.strip_prefix("B-") {
            BioTag::Begin(label.to_string())
        } else if let Some(label) = s.strip_prefix("I-") {
            BioTag::Inside(label.to_string())
        } else {
            BioTag::Outside
        })
    }
}

impl fmt::Display for BioTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BioTag::Begin(label) => write!(f, "B-{label}"),
            BioTag::Inside(label) => write!(f, "I-{label}"),
            BioTag::Outside => write!(f, "O"),
        }
    }
}

/// A labelled run of tokens `[start_token, end_token)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mention {
    pub label: String,
    pub start_token: usize,
    pub end_token: usize,
    /// Covered tokens joined by single spaces.
    pub text: String,
}

/// Group tagged tokens into mentions.
///
/// A mention starts at `B-X`, or at an `I-X` that cannot continue the
/// previous tag, and extends over following `I-X` tags.
///
/// # Errors
///
/// Returns `TaggerError::DecodeLength` if `tokens` and `tags` differ in length.
pub fn extract_mentions<S, T>(tokens: &[S], tags: &[T]) -> Result<Vec<Mention>>
where
    S: AsRef<str>,
    T: AsRef<str>,
{
    if tokens.len() != tags.len() {
        return Err(TaggerError::DecodeLength {
            expected: tokens.len(),
            actual: tags.len(),
        });
    }

    let mut mentions = Vec::new();
    let mut open: Option<(String, usize)> = None;
    let mut prev = BioTag::Outside;

    let mut close = |open: &mut Option<(String, usize)>, end: usize| {
        if let Some((label, start)) = open.take() {
            let text = tokens[start..end]
                .iter()
                .map(|t| t.as_ref())
                .collect::<Vec<&str>>()
                .join(" ");
            mentions.push(Mention {
                label,
                start_token: start,
                end_token: end,
                text,
            });
        }
    };

    for (i, raw) in tags.iter().enumerate() {
        let Ok(tag) = raw.as_ref().parse::<BioTag>();

        let continues = tag.is_inside() && BioTag::is_valid_transition(&prev, &tag);
        if !continues {
            close(&mut open, i);
            if let Some(label) = tag.label() {
                open = Some((label.to_string(), i));
            }
        }
        prev = tag;
    }
    close(&mut open, tokens.len());

    Ok(mentions)
}
