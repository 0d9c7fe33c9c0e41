//! # Tagger
//!
//! One call per sentence: encode the tokens, run the paired model through
//! the inference engine, decode the raw ids back into one tag per token.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use crate::bio::{Mention, extract_mentions};
use crate::config::TaggerConfig;
use crate::decoder::TagDecoder;
use crate::encoder::{EncodedFeatures, FeatureEncoder};
use crate::error::{Result, TaggerError};
use crate::inference::{InferenceEngine, InferenceInvoker, ModelGraph};
use crate::tokens::{Span, TokenSource, sentence_tokens};
use crate::vocab::Vocabulary;

/// Sequence tagger pairing a vocabulary, a model graph and an engine.
pub struct Tagger<E> {
    vocab: Arc<Vocabulary>,
    encoder: FeatureEncoder,
    invoker: InferenceInvoker<E>,
    decoder: TagDecoder,
}

impl<E: InferenceEngine> Tagger<E> {
    pub fn new(vocab: Arc<Vocabulary>, graph: ModelGraph, engine: E) -> Self {
        Self {
            encoder: FeatureEncoder::new(Arc::clone(&vocab)),
            decoder: TagDecoder::new(Arc::clone(&vocab)),
            invoker: InferenceInvoker::new(engine, graph),
            vocab,
        }
    }

    /// Load the mapping file and the model graph named by `config`.
    ///
    /// # Errors
    ///
    /// Returns `TaggerError::VocabularyLoad` or `TaggerError::ModelLoad`; a
    /// tagger is never built from a partially loaded model.
    pub fn from_config(config: &TaggerConfig, engine: E) -> Result<Self> {
        let vocab = Vocabulary::from_file(&config.mappings, &config.unknown_word)?;
        let graph = ModelGraph::from_file(config.model_path())?;
        info!(
            model = %config.model_path().display(),
            tags = vocab.tags().len(),
            "tagger ready"
        );
        Ok(Self::new(Arc::new(vocab), graph, engine))
    }

    /// Tag one sentence.
    ///
    /// Returns exactly one tag per token, in token order.
    ///
    /// # Errors
    ///
    /// - `TaggerError::EmptySentence` for an empty token list; the engine is
    ///   not invoked.
    /// - `TaggerError::Inference` if the engine fails.
    /// - `TaggerError::UnknownTagId` or `TaggerError::DecodeLength` if the
    ///   model output does not fit the vocabulary or the sentence.
    pub fn predict<S: AsRef<str>>(&self, tokens: &[S]) -> Result<Vec<String>> {
        let features = self.encoder.encode(tokens);
        self.predict_features(&features)
    }

    /// Run and decode already encoded features.
    pub fn predict_features(&self, features: &EncodedFeatures) -> Result<Vec<String>> {
        if features.is_empty() {
            return Err(TaggerError::EmptySentence);
        }
        let raw = self.invoker.run(features)?;
        let tags = self.decoder.decode_features(raw.as_slice(), features)?;
        debug!(tokens = tags.len(), "tagged sentence");
        Ok(tags)
    }

    /// Tag the sentence covering `span` in a tokenized document.
    ///
    /// Returns the sentence tokens alongside their tags.
    pub fn predict_span<T: TokenSource + ?Sized>(
        &self,
        source: &T,
        span: Span,
    ) -> Result<(Vec<String>, Vec<String>)> {
        let tokens = sentence_tokens(source, span);
        let tags = self.predict(&tokens)?;
        Ok((tokens, tags))
    }

    /// Tag one sentence and group the tags into mentions.
    pub fn predict_mentions<S: AsRef<str>>(&self, tokens: &[S]) -> Result<Vec<Mention>> {
        let tags = self.predict(tokens)?;
        extract_mentions(tokens, &tags)
    }

    pub fn vocabulary(&self) -> &Arc<Vocabulary> {
        &self.vocab
    }

    pub fn encoder(&self) -> &FeatureEncoder {
        &self.encoder
    }

    pub fn decoder(&self) -> &TagDecoder {
        &self.decoder
    }

    pub fn invoker(&self) -> &InferenceInvoker<E> {
        &self.invoker
    }
}

impl<E> fmt::Debug for Tagger<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tagger")
            .field("words", &self.vocab.words().len())
            .field("tags", &self.vocab.tags().len())
            .field("invoker", &self.invoker)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use candle_core::{Device, Tensor};

    use super::*;
    use crate::inference::slots;
    use crate::inference::testing::ScriptedEngine;
    use crate::tokens::Tokenizer;
    use crate::vocab::test_vocabulary;

    /// Engine tagging each word with `word_id % 3`, framed by boundary ids.
    fn modulo_engine() -> ScriptedEngine {
        ScriptedEngine::new(|feeds| {
            let to_err = |e: candle_core::Error| TaggerError::Inference(e.to_string());
            let words = feeds[slots::WORD_IDS]
                .flatten_all()
                .and_then(|t| t.to_vec1::<i64>())
                .map_err(to_err)?;

            let mut out = vec![0];
            out.extend(words.iter().map(|w| w % 3));
            out.push(0);
            Tensor::from_slice(out.as_slice(), (1, out.len()), &Device::Cpu).map_err(to_err)
        })
    }

    fn tagger(engine: ScriptedEngine) -> Tagger<ScriptedEngine> {
        Tagger::new(
            Arc::new(test_vocabulary()),
            ModelGraph::from_bytes(vec![1u8, 2, 3]),
            engine,
        )
    }

    #[test]
    fn test_predict_sentence() {
        let tagger = tagger(modulo_engine());
        let tags = tagger
            .predict(&["This", "morning", ",", "an", "American"])
            .unwrap();

        assert_eq!(tags, vec!["B-EVENT", "I-EVENT", "O", "B-EVENT", "I-EVENT"]);
        assert_eq!(tagger.invoker().engine().opened(), 1);
        assert_eq!(tagger.invoker().engine().released(), 1);
    }

    #[test]
    fn test_predict_unknown_words() {
        let tagger = tagger(modulo_engine());
        // Unknown words share the sentinel id 0 -> "O".
        let tags = tagger.predict(&["Zzqx", "qqq"]).unwrap();
        assert_eq!(tags, vec!["O", "O"]);
    }

    #[test]
    fn test_predict_empty_does_not_run_engine() {
        let tagger = tagger(modulo_engine());
        let tokens: Vec<String> = Vec::new();

        assert!(matches!(
            tagger.predict(&tokens),
            Err(TaggerError::EmptySentence)
        ));
        assert_eq!(tagger.invoker().engine().opened(), 0);
    }

    #[test]
    fn test_unknown_tag_id_from_model() {
        let tagger = tagger(ScriptedEngine::returning(vec![0, 1, 9, 0]));
        let err = tagger.predict(&["This", "morning"]).unwrap_err();
        assert!(matches!(err, TaggerError::UnknownTagId { id: 9 }));
        assert_eq!(tagger.invoker().engine().released(), 1);
    }

    #[test]
    fn test_short_output_is_inference_error() {
        let tagger = tagger(ScriptedEngine::returning(vec![0, 1, 0]));
        let err = tagger.predict(&["This", "morning"]).unwrap_err();
        assert!(matches!(err, TaggerError::Inference(_)));
    }

    #[test]
    fn test_predict_mentions() {
        let tagger = tagger(modulo_engine());
        let mentions = tagger
            .predict_mentions(&["This", "morning", ",", "an", "American"])
            .unwrap();

        let texts: Vec<_> = mentions.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["This morning", "an American"]);
        assert!(mentions.iter().all(|m| m.label == "EVENT"));
    }

    #[test]
    fn test_predict_span() {
        let tagger = tagger(modulo_engine());
        let text = "Troops left. This morning, an American convoy";
        let doc = Tokenizer::new().unwrap().tokenize(text);
        let start = text.find("This").unwrap();

        let (tokens, tags) = tagger
            .predict_span(&doc, Span::new(start, start + "This morning, an American".len()))
            .unwrap();
        assert_eq!(tokens, vec!["This", "morning", ",", "an", "American"]);
        assert_eq!(tags.len(), tokens.len());
    }

    #[test]
    fn test_parallel_sentences() {
        let tagger = Arc::new(tagger(modulo_engine()));
        let sentences: Vec<Vec<&str>> = vec![
            vec!["This", "morning"],
            vec![",", "an", "American"],
            vec!["Zzqx"],
            vec!["American", "This", "an", "morning"],
        ];

        let handles: Vec<_> = sentences
            .iter()
            .cloned()
            .map(|sentence| {
                let tagger = Arc::clone(&tagger);
                thread::spawn(move || tagger.predict(&sentence).unwrap())
            })
            .collect();

        for (sentence, handle) in sentences.iter().zip(handles) {
            let tags = handle.join().unwrap();
            assert_eq!(tags, tagger.predict(sentence).unwrap());
        }
        let engine = tagger.invoker().engine();
        assert_eq!(engine.opened(), engine.released());
    }

    const MAPPINGS: &str = r#"{
        "id_to_word": {"0": "<UNK>", "1": "bomb"},
        "id_to_char": {"0": "<PAD>", "1": "b"},
        "id_to_tag": {"0": "O", "1": "B-Attack"}
    }"#;

    #[test]
    fn test_from_config() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("mappings.json"), MAPPINGS).unwrap();
        std::fs::write(dir.path().join("model.pb"), [7u8; 32]).unwrap();

        let config = TaggerConfig::new(dir.path(), "model.pb", dir.path().join("mappings.json"));
        let tagger = Tagger::from_config(&config, ScriptedEngine::returning(vec![0, 1, 0])).unwrap();

        assert_eq!(tagger.invoker().graph().len(), 32);
        assert_eq!(tagger.predict(&["bomb"]).unwrap(), vec!["B-Attack"]);
    }

    #[test]
    fn test_from_config_missing_model() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("mappings.json"), MAPPINGS).unwrap();

        let config = TaggerConfig::new(dir.path(), "absent.pb", dir.path().join("mappings.json"));
        let err = Tagger::from_config(&config, ScriptedEngine::returning(vec![])).unwrap_err();
        assert!(matches!(err, TaggerError::ModelLoad(_)));
    }

    #[test]
    fn test_from_config_bad_mappings() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("mappings.json"), r#"{"id_to_word": {}}"#).unwrap();
        std::fs::write(dir.path().join("model.pb"), [0u8]).unwrap();

        let config = TaggerConfig::new(dir.path(), "model.pb", dir.path().join("mappings.json"));
        let err = Tagger::from_config(&config, ScriptedEngine::returning(vec![])).unwrap_err();
        assert!(matches!(err, TaggerError::VocabularyLoad(_)));
    }
}
