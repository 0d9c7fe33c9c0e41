use thiserror::Error;

/// Errors that can occur while encoding, running, or decoding a tagging request.
#[derive(Debug, Error)]
pub enum TaggerError {
    /// The mapping source could not be read or does not match the expected schema.
    #[error("failed to load vocabulary: {0}")]
    VocabularyLoad(String),

    /// The model graph could not be read into memory.
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    /// The tagger configuration could not be read or parsed.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The inference engine failed or produced an output of the wrong shape.
    #[error("inference error: {0}")]
    Inference(String),

    /// The model predicted a tag id that the tag vocabulary does not contain.
    #[error("predicted tag id {id} is not present in the tag vocabulary")]
    UnknownTagId {
        /// The offending id.
        id: i64,
    },

    /// The number of decoded tags does not match the number of positions expected.
    #[error("decoded length mismatch: expected {expected}, got {actual}")]
    DecodeLength {
        /// Number of positions the caller expected.
        expected: usize,
        /// Number of positions actually available or produced.
        actual: usize,
    },

    /// Decoding was requested for a sentence with no tokens.
    #[error("cannot decode tags for an empty sentence")]
    EmptySentence,

    /// A regex pattern failed to compile (should not happen with static patterns).
    #[error("regex compilation error: {0}")]
    Regex(#[from] regex::Error),
}

/// Result type alias for tagger operations.
pub type Result<T> = std::result::Result<T, TaggerError>;
