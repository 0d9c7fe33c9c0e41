//! # Inference Boundary
//!
//! Binds encoded features to the paired model's named input slots, runs the
//! external inference engine for exactly one session, and validates the
//! single raw prediction it returns.
//!
//! The engine is an external collaborator; this module only fixes the
//! named-tensor contract and the session lifetime. A session is opened right
//! before the run and dropped right after it, whether the run succeeds or not.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use candle_core::{DType, Device, Tensor};
use tracing::{info, warn};

use crate::encoder::EncodedFeatures;
use crate::error::{Result, TaggerError};

/// Names of the model's input and output slots.
pub mod slots {
    /// Word ids, shape `[1, N]`.
    pub const WORD_IDS: &str = "word_ids";
    /// Word count (`N - 1`), shape `[1]`.
    pub const WORD_POS_IDS: &str = "word_pos_ids";
    /// Forward character ids, shape `[1, N, M]`.
    pub const CHAR_FOR_IDS: &str = "char_for_ids";
    /// Reversed character ids, shape `[1, N, M]`.
    pub const CHAR_REV_IDS: &str = "char_rev_ids";
    /// Per-token `(index, last char index)`, shape `[N, 2]`.
    pub const CHAR_POS_IDS: &str = "char_pos_ids";
    /// Raw predicted tag ids, shape `[1, N + 2]`.
    pub const OUTPUT: &str = "output/TensorArrayStack/TensorArrayGatherV3";
}

/// The pretrained model graph as an opaque, in-memory byte payload.
#[derive(Clone)]
pub struct ModelGraph {
    bytes: Arc<[u8]>,
}

impl ModelGraph {
    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    /// Reads the whole graph file into memory.
    ///
    /// # Errors
    ///
    /// Returns `TaggerError::ModelLoad` if the file cannot be read.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            TaggerError::ModelLoad(format!("failed to read {}: {e}", path.display()))
        })?;
        info!(path = %path.display(), bytes = bytes.len(), "loaded model graph");
        Ok(Self::from_bytes(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for ModelGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelGraph")
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// One live execution context of the engine.
///
/// Implementations release whatever native resources they hold in `Drop`.
pub trait InferenceSession {
    /// Feed the named inputs and fetch the named output.
    fn run(&mut self, feeds: &[(&str, &Tensor)], fetch: &str) -> Result<Tensor>;
}

/// An external engine able to execute the paired model graph.
pub trait InferenceEngine: Send + Sync {
    /// Import `graph` and open a session on it.
    fn open_session<'a>(&'a self, graph: &'a ModelGraph)
    -> Result<Box<dyn InferenceSession + 'a>>;
}

/// The five input tensors bound to their slots.
#[derive(Debug, Clone)]
pub struct FeedTensors {
    pub word_ids: Tensor,
    pub word_pos_ids: Tensor,
    pub char_for_ids: Tensor,
    pub char_rev_ids: Tensor,
    pub char_pos_ids: Tensor,
}

impl FeedTensors {
    /// Build `I64` tensors from encoded features on `device`.
    pub fn from_features(features: &EncodedFeatures, device: &Device) -> Result<Self> {
        let n = features.num_tokens();
        let m = features.max_token_len();

        Ok(Self {
            word_ids: Tensor::from_slice(features.word_ids.as_slice(), (1, n), device)
                .map_err(candle_error)?,
            word_pos_ids: Tensor::from_slice(&[features.word_count], 1, device)
                .map_err(candle_error)?,
            char_for_ids: Tensor::from_slice(features.char_for_ids.as_slice(), (1, n, m), device)
                .map_err(candle_error)?,
            char_rev_ids: Tensor::from_slice(features.char_rev_ids.as_slice(), (1, n, m), device)
                .map_err(candle_error)?,
            char_pos_ids: Tensor::from_slice(features.char_pos_ids.as_flattened(), (n, 2), device)
                .map_err(candle_error)?,
        })
    }

    /// The feeds in slot order, paired with their slot names.
    pub fn named(&self) -> [(&'static str, &Tensor); 5] {
        [
            (slots::WORD_IDS, &self.word_ids),
            (slots::WORD_POS_IDS, &self.word_pos_ids),
            (slots::CHAR_FOR_IDS, &self.char_for_ids),
            (slots::CHAR_REV_IDS, &self.char_rev_ids),
            (slots::CHAR_POS_IDS, &self.char_pos_ids),
        ]
    }
}

/// Raw tag ids returned by the model: `N + 2` entries, the first and last
/// being boundary markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPrediction {
    ids: Vec<i64>,
}

impl RawPrediction {
    pub fn new(ids: Vec<i64>) -> Self {
        Self { ids }
    }

    pub fn as_slice(&self) -> &[i64] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl From<Vec<i64>> for RawPrediction {
    fn from(ids: Vec<i64>) -> Self {
        Self::new(ids)
    }
}

/// Runs the model once per sentence through an `InferenceEngine`.
pub struct InferenceInvoker<E> {
    engine: E,
    graph: ModelGraph,
    device: Device,
}

impl<E: InferenceEngine> InferenceInvoker<E> {
    pub fn new(engine: E, graph: ModelGraph) -> Self {
        Self {
            engine,
            graph,
            device: Device::Cpu,
        }
    }

    /// Run the model on one sentence.
    ///
    /// # Errors
    ///
    /// Returns `TaggerError::EmptySentence` for features with no tokens, and
    /// `TaggerError::Inference` if the engine fails to open a session or run
    /// the graph, or if its output is not a single integer sequence of
    /// length `N + 2`.
    pub fn run(&self, features: &EncodedFeatures) -> Result<RawPrediction> {
        if features.is_empty() {
            return Err(TaggerError::EmptySentence);
        }
        let feeds = FeedTensors::from_features(features, &self.device)?;

        let output = self
            .engine
            .open_session(&self.graph)
            .and_then(|mut session| session.run(&feeds.named(), slots::OUTPUT))
            .map_err(engine_error)
            .inspect_err(|e| warn!(error = %e, "inference failed"))?;

        extract_prediction(&output, features.num_tokens())
    }

    pub fn graph(&self) -> &ModelGraph {
        &self.graph
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }
}

impl<E> fmt::Debug for InferenceInvoker<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InferenceInvoker")
            .field("graph", &self.graph)
            .field("device", &self.device)
            .finish_non_exhaustive()
    }
}

/// Checks the output shape against the token count and copies the ids out.
fn extract_prediction(output: &Tensor, num_tokens: usize) -> Result<RawPrediction> {
    let expected = num_tokens + 2;

    match output.dims() {
        [1, len] | [len] if *len == expected => {}
        dims => {
            return Err(TaggerError::Inference(format!(
                "expected output shape [1, {expected}], got {dims:?}"
            )));
        }
    }

    let output = match output.dtype() {
        DType::I64 => output.clone(),
        DType::U32 | DType::U8 => output.to_dtype(DType::I64).map_err(candle_error)?,
        other => {
            return Err(TaggerError::Inference(format!(
                "expected integer tag ids, got {other:?}"
            )));
        }
    };

    let ids = output
        .flatten_all()
        .and_then(|t| t.to_vec1::<i64>())
        .map_err(candle_error)?;
    Ok(RawPrediction::new(ids))
}

fn candle_error(e: candle_core::Error) -> TaggerError {
    TaggerError::Inference(e.to_string())
}

/// Folds whatever the engine reported into `TaggerError::Inference`.
fn engine_error(e: TaggerError) -> TaggerError {
    match e {
        TaggerError::Inference(_) => e,
        other => TaggerError::Inference(other.to_string()),
    }
}

/// In-process engine used by tests across the crate.
#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    type Script = dyn Fn(&HashMap<String, Tensor>) -> Result<Tensor> + Send + Sync;

    /// Answers each run with a closure over the named feeds and counts
    /// opened and released sessions.
    pub struct ScriptedEngine {
        script: Box<Script>,
        pub opened: AtomicUsize,
        pub released: AtomicUsize,
        pub last_feeds: Mutex<HashMap<String, Vec<usize>>>,
    }

    impl ScriptedEngine {
        pub fn new(
            script: impl Fn(&HashMap<String, Tensor>) -> Result<Tensor> + Send + Sync + 'static,
        ) -> Self {
            Self {
                script: Box::new(script),
                opened: AtomicUsize::new(0),
                released: AtomicUsize::new(0),
                last_feeds: Mutex::new(HashMap::new()),
            }
        }

        /// Engine that returns `ids` as a `[1, len]` tensor.
        pub fn returning(ids: Vec<i64>) -> Self {
            Self::new(move |_| {
                Tensor::from_slice(ids.as_slice(), (1, ids.len()), &Device::Cpu).map_err(candle_error)
            })
        }

        pub fn opened(&self) -> usize {
            self.opened.load(Ordering::SeqCst)
        }

        pub fn released(&self) -> usize {
            self.released.load(Ordering::SeqCst)
        }
    }

    struct ScriptedSession<'a> {
        engine: &'a ScriptedEngine,
    }

    impl InferenceSession for ScriptedSession<'_> {
        fn run(&mut self, feeds: &[(&str, &Tensor)], fetch: &str) -> Result<Tensor> {
            if fetch != slots::OUTPUT {
                return Err(TaggerError::Inference(format!("unknown fetch {fetch:?}")));
            }
            let feeds: HashMap<String, Tensor> = feeds
                .iter()
                .map(|(name, t)| (name.to_string(), (*t).clone()))
                .collect();
            *self.engine.last_feeds.lock().unwrap() = feeds
                .iter()
                .map(|(name, t)| (name.clone(), t.dims().to_vec()))
                .collect();
            (self.engine.script)(&feeds)
        }
    }

    impl Drop for ScriptedSession<'_> {
        fn drop(&mut self) {
            self.engine.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl InferenceEngine for ScriptedEngine {
        fn open_session<'a>(
            &'a self,
            _graph: &'a ModelGraph,
        ) -> Result<Box<dyn InferenceSession + 'a>> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(ScriptedSession { engine: self }))
        }
    }
}
