//! # Vocabulary Store
//!
//! Word, character and tag id tables loaded from the model's mapping file.
//! Each table is stored in both directions; the inverse direction is derived
//! at load time and must be an exact inverse of the forward direction.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::error::{Result, TaggerError};

/// Default sentinel used for words absent from the word vocabulary.
pub const DEFAULT_UNKNOWN_WORD: &str = "<UNK>";

/// Id reserved for padding and for characters absent from the character vocabulary.
pub const PAD_CHAR_ID: u32 = 0;

/// On-disk layout of the mapping file. Extra top-level keys are ignored.
#[derive(Debug, Deserialize)]
struct MappingFile {
    id_to_word: BTreeMap<String, String>,
    id_to_char: BTreeMap<String, String>,
    id_to_tag: BTreeMap<String, String>,
}

/// A dense, invertible id ↔ string table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdTable {
    id_to_token: Vec<String>,
    token_to_id: HashMap<String, u32>,
}

impl IdTable {
    /// Builds a table from `(string-encoded id, value)` pairs.
    ///
    /// Ids must parse as non-negative integers and cover `0..len` exactly once.
    /// Values must be unique unless `shared_values` is set, in which case the
    /// inverse lookup keeps the lowest id.
    fn from_raw(name: &str, raw: BTreeMap<String, String>, shared_values: bool) -> Result<Self> {
        let len = raw.len();
        let mut slots: Vec<Option<String>> = vec![None; len];

        for (key, value) in raw {
            let well_formed = !key.is_empty() && key.bytes().all(|b| b.is_ascii_digit());
            let id: usize = key
                .parse()
                .ok()
                .filter(|_| well_formed)
                .ok_or_else(|| {
                    TaggerError::VocabularyLoad(format!("`{name}` has a non-integer id {key:?}"))
                })?;
            let slot = slots.get_mut(id).ok_or_else(|| {
                TaggerError::VocabularyLoad(format!(
                    "`{name}` ids are not dense: id {id} with only {len} entries"
                ))
            })?;
            if slot.is_some() {
                return Err(TaggerError::VocabularyLoad(format!(
                    "`{name}` defines id {id} more than once"
                )));
            }
            *slot = Some(value);
        }

        let id_to_token: Vec<String> = slots.into_iter().collect::<Option<_>>().ok_or_else(|| {
            TaggerError::VocabularyLoad(format!("`{name}` ids are not dense"))
        })?;

        let mut token_to_id = HashMap::with_capacity(id_to_token.len());
        for (id, token) in id_to_token.iter().enumerate() {
            if token_to_id.contains_key(token) {
                if shared_values {
                    continue;
                }
                return Err(TaggerError::VocabularyLoad(format!(
                    "`{name}` maps {token:?} to more than one id"
                )));
            }
            token_to_id.insert(token.clone(), id as u32);
        }

        Ok(Self {
            id_to_token,
            token_to_id,
        })
    }

    /// Id of `token`, if present.
    pub fn id(&self, token: &str) -> Option<u32> {
        self.token_to_id.get(token).copied()
    }

    /// String stored under `id`, if present.
    pub fn token(&self, id: usize) -> Option<&str> {
        self.id_to_token.get(id).map(String::as_str)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.id_to_token.len()
    }

    /// Returns `true` if the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.id_to_token.is_empty()
    }
}

/// Immutable word, character and tag vocabularies paired with a trained model.
///
/// Built once at startup and shared read-only (typically behind an `Arc`)
/// between the encoder and the decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    words: IdTable,
    chars: IdTable,
    tags: IdTable,
    unknown_word: String,
    unknown_word_id: u32,
}

impl Vocabulary {
    /// Loads the vocabulary from a JSON mapping file.
    ///
    /// # Errors
    ///
    /// Returns `TaggerError::VocabularyLoad` if the file cannot be read, is not
    /// valid JSON, misses one of `id_to_word`, `id_to_char`, `id_to_tag`, or
    /// violates the table invariants.
    pub fn from_file(path: impl AsRef<Path>, unknown_word: &str) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            TaggerError::VocabularyLoad(format!("failed to read {}: {e}", path.display()))
        })?;
        let vocab = Self::from_json_str(&json, unknown_word)?;

        info!(
            path = %path.display(),
            words = vocab.words.len(),
            chars = vocab.chars.len(),
            tags = vocab.tags.len(),
            "loaded vocabulary"
        );
        Ok(vocab)
    }

    /// Parses the vocabulary from an in-memory JSON mapping object.
    pub fn from_json_str(json: &str, unknown_word: &str) -> Result<Self> {
        let mapping: MappingFile = serde_json::from_str(json)
            .map_err(|e| TaggerError::VocabularyLoad(format!("malformed mapping file: {e}")))?;

        let words = IdTable::from_raw("id_to_word", mapping.id_to_word, false)?;
        let chars = IdTable::from_raw("id_to_char", mapping.id_to_char, false)?;
        // Several tag ids may spell the same label; decoding only reads id -> tag.
        let tags = IdTable::from_raw("id_to_tag", mapping.id_to_tag, true)?;

        let unknown_word_id = words.id(unknown_word).ok_or_else(|| {
            TaggerError::VocabularyLoad(format!(
                "word vocabulary has no unknown-word sentinel {unknown_word:?}"
            ))
        })?;

        Ok(Self {
            words,
            chars,
            tags,
            unknown_word: unknown_word.to_string(),
            unknown_word_id,
        })
    }

    /// Id of `token`, or the unknown-word sentinel id when absent.
    pub fn word_id(&self, token: &str) -> u32 {
        self.words.id(token).unwrap_or(self.unknown_word_id)
    }

    /// Id of a single character, or `PAD_CHAR_ID` when absent.
    pub fn char_id(&self, c: char) -> u32 {
        let mut buf = [0u8; 4];
        self.chars.id(c.encode_utf8(&mut buf)).unwrap_or(PAD_CHAR_ID)
    }

    /// Tag string stored under `id`.
    ///
    /// # Errors
    ///
    /// Returns `TaggerError::UnknownTagId` if `id` is negative or not in the tag table.
    pub fn tag_for(&self, id: i64) -> Result<&str> {
        usize::try_from(id)
            .ok()
            .and_then(|idx| self.tags.token(idx))
            .ok_or(TaggerError::UnknownTagId { id })
    }

    /// Id of a tag string, if present.
    pub fn tag_id(&self, tag: &str) -> Option<u32> {
        self.tags.id(tag)
    }

    /// Word stored under `id`, if present.
    pub fn word_for(&self, id: u32) -> Option<&str> {
        self.words.token(id as usize)
    }

    /// Character string stored under `id`, if present.
    pub fn char_for(&self, id: u32) -> Option<&str> {
        self.chars.token(id as usize)
    }

    /// Id of the unknown-word sentinel.
    pub fn unknown_word_id(&self) -> u32 {
        self.unknown_word_id
    }

    /// The unknown-word sentinel string.
    pub fn unknown_word(&self) -> &str {
        &self.unknown_word
    }

    /// Word table.
    pub fn words(&self) -> &IdTable {
        &self.words
    }

    /// Character table.
    pub fn chars(&self) -> &IdTable {
        &self.chars
    }

    /// Tag table.
    pub fn tags(&self) -> &IdTable {
        &self.tags
    }
}

/// Small mapping shared by unit tests across modules.
#[cfg(test)]
pub(crate) fn test_vocabulary() -> Vocabulary {
    let mapping = serde_json::json!({
        "id_to_word": {
            "0": "<UNK>", "1": "This", "2": "morning", "3": ",", "4": "an", "5": "American"
        },
        "id_to_char": {
            "0": "<PAD>", "1": "T", "2": "h", "3": "i", "4": "s", "5": "m", "6": "o",
            "7": "r", "8": "n", "9": "g", "10": ",", "11": "a", "12": "A", "13": "e",
            "14": "c", "15": "Z"
        },
        "id_to_tag": {
            "0": "O", "1": "B-EVENT", "2": "I-EVENT"
        }
    });
    Vocabulary::from_json_str(&mapping.to_string(), DEFAULT_UNKNOWN_WORD).unwrap()
}
