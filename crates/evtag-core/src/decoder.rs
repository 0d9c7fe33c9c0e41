//! # Tag Decoder
//!
//! Maps the model's raw id sequence back onto the input tokens. The model
//! emits one boundary position before and one after the real tokens, so the
//! raw sequence holds `N + 2` ids. With the encoder's word count `w = N - 1`
//! the tokens sit at positions `1 ..= w + 1`; keep this offset exactly, it
//! is the contract with the paired model.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::encoder::EncodedFeatures;
use crate::error::{Result, TaggerError};
use crate::vocab::Vocabulary;

/// Converts raw predictions into tag strings.
#[derive(Debug, Clone)]
pub struct TagDecoder {
    vocab: Arc<Vocabulary>,
}

impl TagDecoder {
    pub fn new(vocab: Arc<Vocabulary>) -> Self {
        Self { vocab }
    }

    /// Decode `raw` given the encoder's word count (`N - 1`).
    ///
    /// # Errors
    ///
    /// - `TaggerError::EmptySentence` if `word_count` is negative.
    /// - `TaggerError::DecodeLength` if `raw` does not hold exactly
    ///   `word_count + 2` ids.
    /// - `TaggerError::UnknownTagId` if any token position holds an id the
    ///   tag vocabulary does not know.
    pub fn decode(&self, raw: &[i64], word_count: i64) -> Result<Vec<String>> {
        let Ok(last) = usize::try_from(word_count) else {
            return Err(TaggerError::EmptySentence);
        };
        let num_tokens = last + 1;

        if raw.len() != num_tokens + 2 {
            warn!(
                expected = num_tokens + 2,
                actual = raw.len(),
                "raw prediction length does not match word count"
            );
            return Err(TaggerError::DecodeLength {
                expected: num_tokens + 2,
                actual: raw.len(),
            });
        }

        let tags = raw[1..=num_tokens]
            .iter()
            .map(|&id| self.vocab.tag_for(id).map(str::to_string))
            .collect::<Result<Vec<_>>>()?;

        debug!(tokens = tags.len(), "decoded tags");
        Ok(tags)
    }

    /// Decode `raw` for the sentence that produced `features`, checking the
    /// result has exactly one tag per input token.
    pub fn decode_features(&self, raw: &[i64], features: &EncodedFeatures) -> Result<Vec<String>> {
        let tags = self.decode(raw, features.word_count)?;
        if tags.len() != features.num_tokens() {
            return Err(TaggerError::DecodeLength {
                expected: features.num_tokens(),
                actual: tags.len(),
            });
        }
        Ok(tags)
    }
}
