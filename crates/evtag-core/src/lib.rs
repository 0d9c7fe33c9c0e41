//! # evtag Core
//!
//! The encode/decode boundary around a pretrained event-trigger tagging
//! model. Tokens are encoded into the model's word and character id
//! tensors, an external inference engine runs the model, and the raw tag
//! ids it returns are decoded back into one tag per token.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use evtag_core::{FeatureEncoder, TagDecoder, Vocabulary};
//!
//! let json = r#"{
//!     "id_to_word": {"0": "<UNK>", "1": "bomb", "2": "destroyed"},
//!     "id_to_char": {"0": "<PAD>", "1": "b", "2": "o", "3": "m"},
//!     "id_to_tag": {"0": "O", "1": "B-Attack"}
//! }"#;
//! let vocab = Arc::new(Vocabulary::from_json_str(json, "<UNK>").unwrap());
//!
//! let features = FeatureEncoder::new(vocab.clone()).encode(&["bomb", "destroyed"]);
//! assert_eq!(features.word_count, 1);
//!
//! // The model frames its output with one boundary id on each side.
//! let tags = TagDecoder::new(vocab).decode(&[0, 0, 1, 0], features.word_count).unwrap();
//! assert_eq!(tags, ["O", "B-Attack"]);
//! ```
pub mod bio;
pub mod config;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod inference;
pub mod tagger;
pub mod tokens;
pub mod vocab;

// Re-export primary API
pub use bio::{BioTag, Mention, extract_mentions};
pub use config::TaggerConfig;
pub use decoder::TagDecoder;
pub use encoder::{CharMatrix, EncodedFeatures, FeatureEncoder};
pub use error::{Result, TaggerError};
pub use inference::{
    FeedTensors, InferenceEngine, InferenceInvoker, InferenceSession, ModelGraph, RawPrediction,
};
pub use tagger::Tagger;
pub use tokens::{Span, TokenSource, TokenSpan, TokenizedText, Tokenizer, sentence_tokens};
pub use vocab::{DEFAULT_UNKNOWN_WORD, IdTable, PAD_CHAR_ID, Vocabulary};
