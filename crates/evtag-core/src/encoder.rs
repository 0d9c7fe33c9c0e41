//! # Feature Encoder
//!
//! Turns one sentence of tokens into the five id structures the tagging
//! model consumes: word ids, the word-count scalar, forward and reversed
//! character id matrices, and per-token character positions.
//!
//! Token length is measured in `char`s. Character rows are right-padded
//! with `PAD_CHAR_ID` up to the longest token in the sentence.

use std::sync::Arc;

use serde::Serialize;
use serde::ser::Serializer;
use tracing::debug;

use crate::vocab::{PAD_CHAR_ID, Vocabulary};

/// A dense row-major `rows × cols` matrix of ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharMatrix {
    rows: usize,
    cols: usize,
    data: Vec<i64>,
}

impl CharMatrix {
    fn padded(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![i64::from(PAD_CHAR_ID); rows * cols],
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Row `i`, including padding.
    ///
    /// # Panics
    ///
    /// Panics if `i >= self.rows()`.
    pub fn row(&self, i: usize) -> &[i64] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    fn row_mut(&mut self, i: usize) -> &mut [i64] {
        &mut self.data[i * self.cols..(i + 1) * self.cols]
    }

    /// Flat row-major view, suitable for building a tensor.
    pub fn as_slice(&self) -> &[i64] {
        &self.data
    }
}

impl Serialize for CharMatrix {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq((0..self.rows).map(|i| self.row(i)))
    }
}

/// Model inputs derived from one sentence.
///
/// All structures share the same first dimension (the token count `N`);
/// both character matrices share the same width `M`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EncodedFeatures {
    /// One word id per token.
    pub word_ids: Vec<i64>,
    /// `N - 1`, the index of the last token. `-1` for an empty sentence.
    pub word_count: i64,
    /// `N × M` character ids in reading order.
    pub char_for_ids: CharMatrix,
    /// `N × M` character ids in reverse order.
    pub char_rev_ids: CharMatrix,
    /// `(i, len(token_i) - 1)` for every token; `-1` for an empty token.
    pub char_pos_ids: Vec<[i64; 2]>,
}

impl EncodedFeatures {
    /// Number of tokens `N`.
    pub fn num_tokens(&self) -> usize {
        self.word_ids.len()
    }

    /// Width `M` of the character matrices.
    pub fn max_token_len(&self) -> usize {
        self.char_for_ids.cols()
    }

    /// Returns `true` if the sentence had no tokens.
    pub fn is_empty(&self) -> bool {
        self.word_ids.is_empty()
    }
}

/// Encodes token sequences against a shared vocabulary.
#[derive(Debug, Clone)]
pub struct FeatureEncoder {
    vocab: Arc<Vocabulary>,
}

impl FeatureEncoder {
    pub fn new(vocab: Arc<Vocabulary>) -> Self {
        Self { vocab }
    }

    /// Encode one sentence.
    ///
    /// Never fails: unknown words map to the sentinel id and unknown
    /// characters to `PAD_CHAR_ID`. An empty sentence yields `N = 0` and a
    /// word count of `-1`.
    ///
    /// # Examples
    /// ```
    /// use std::sync::Arc;
    /// use evtag_core::{FeatureEncoder, Vocabulary};
    ///
    /// let json = r#"{
    ///     "id_to_word": {"0": "<UNK>", "1": "bomb"},
    ///     "id_to_char": {"0": "<PAD>", "1": "b", "2": "o", "3": "m"},
    ///     "id_to_tag": {"0": "O", "1": "B-EVENT"}
    /// }"#;
    /// let vocab = Arc::new(Vocabulary::from_json_str(json, "<UNK>").unwrap());
    /// let features = FeatureEncoder::new(vocab).encode(&["a", "bomb"]);
    ///
    /// assert_eq!(features.word_ids, vec![0, 1]);
    /// assert_eq!(features.word_count, 1);
    /// assert_eq!(features.char_for_ids.row(1), &[1, 2, 3, 1]);
    /// assert_eq!(features.char_rev_ids.row(1), &[1, 3, 2, 1]);
    /// assert_eq!(features.char_pos_ids, vec![[0, 0], [1, 3]]);
    /// ```
    pub fn encode<S: AsRef<str>>(&self, tokens: &[S]) -> EncodedFeatures {
        let n = tokens.len();
        let max_len = tokens
            .iter()
            .map(|t| t.as_ref().chars().count())
            .max()
            .unwrap_or(0);

        let mut word_ids = Vec::with_capacity(n);
        let mut char_for_ids = CharMatrix::padded(n, max_len);
        let mut char_rev_ids = CharMatrix::padded(n, max_len);
        let mut char_pos_ids = Vec::with_capacity(n);

        for (i, token) in tokens.iter().enumerate() {
            let token = token.as_ref();
            word_ids.push(i64::from(self.vocab.word_id(token)));

            let char_ids: Vec<i64> = token
                .chars()
                .map(|c| i64::from(self.vocab.char_id(c)))
                .collect();
            let len = char_ids.len();

            char_for_ids.row_mut(i)[..len].copy_from_slice(&char_ids);
            for (dst, &src) in char_rev_ids.row_mut(i).iter_mut().zip(char_ids.iter().rev()) {
                *dst = src;
            }

            // An empty token keeps -1 here; the model's packing relies on it.
            char_pos_ids.push([i as i64, len as i64 - 1]);
        }

        debug!(tokens = n, max_token_len = max_len, "encoded sentence");

        EncodedFeatures {
            word_ids,
            word_count: n as i64 - 1,
            char_for_ids,
            char_rev_ids,
            char_pos_ids,
        }
    }

    pub fn vocabulary(&self) -> &Arc<Vocabulary> {
        &self.vocab
    }
}
