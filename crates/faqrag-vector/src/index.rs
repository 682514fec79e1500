use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use faqrag_core::traits::Embedder;
use faqrag_core::types::ScoredChunk;
use faqrag_core::{Error, Result};

use crate::search::{normalize, top_k};
use crate::snapshot;

#[derive(Debug, Clone)]
pub struct IndexOptions {
    /// Directory holding the snapshot generations.
    pub dir: PathBuf,
    /// Upper bound on a single embedding call.
    pub embed_timeout: Duration,
    /// Most texts sent to the embedder in one call.
    pub batch_size: usize,
}

#[derive(Default)]
struct IndexState {
    /// Row-major, `dim` floats per document, every row unit length.
    vectors: Vec<f32>,
    texts: Vec<String>,
}

/// Append-only, persisted, exact cosine-similarity index.
///
/// Invariant: `vectors.len() == dim * texts.len()`; row `i` belongs to text `i`.
///
/// Concurrency: the contents are an immutable `Arc<IndexState>`. `search`
/// clones the `Arc` under a brief read lock and scans without holding it.
/// `append` calls are serialized end to end (embed → build → persist → swap)
/// by `ingest`; the new state is persisted on a blocking thread and only then
/// swapped in, so a reader sees either the old or the new index, never a
/// partially applied batch.
pub struct VectorIndex {
    embedder: Arc<dyn Embedder>,
    dir: PathBuf,
    embed_timeout: Duration,
    batch_size: usize,
    state: RwLock<Arc<IndexState>>,
    ingest: tokio::sync::Mutex<()>,
    restored: AtomicBool,
}

impl VectorIndex {
    /// Empty index; nothing is read from disk.
    pub fn new(embedder: Arc<dyn Embedder>, options: IndexOptions) -> Self {
        Self {
            embedder,
            dir: options.dir,
            embed_timeout: options.embed_timeout,
            batch_size: options.batch_size.max(1),
            state: RwLock::new(Arc::new(IndexState::default())),
            ingest: tokio::sync::Mutex::new(()),
            restored: AtomicBool::new(false),
        }
    }

    /// Index backed by `options.dir`, restored from its snapshot when one is
    /// present and valid.
    pub fn open(embedder: Arc<dyn Embedder>, options: IndexOptions) -> Self {
        let index = Self::new(embedder, options);
        if index.restore() {
            tracing::info!(documents = index.size(), dir = %index.dir.display(), "loaded existing index");
        } else {
            tracing::info!(dir = %index.dir.display(), "starting with empty index");
        }
        index
    }

    /// Load the persisted snapshot. Returns whether one was loaded; on a
    /// missing or unusable snapshot the index is left empty.
    pub fn restore(&self) -> bool {
        let loaded = match snapshot::read(&self.dir, self.embedder.model_id(), self.embedder.dim()) {
            Ok(Some(snap)) => Some(snap),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, dir = %self.dir.display(), "ignoring unusable index snapshot");
                None
            }
        };
        let restored = loaded.is_some();
        let next = match loaded {
            Some(snap) => IndexState { vectors: snap.vectors, texts: snap.texts },
            None => IndexState::default(),
        };
        let Ok(mut state) = self.state.write() else {
            return false;
        };
        *state = Arc::new(next);
        self.restored.store(restored, Ordering::SeqCst);
        restored
    }

    /// Embed, normalize and append `chunks` in order, then persist the whole
    /// index. All or nothing: on any failure the index is unchanged.
    pub async fn append(&self, chunks: &[String]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }
        if let Some(pos) = chunks.iter().position(|c| c.trim().is_empty()) {
            return Err(Error::InvalidInput(format!("chunk {} is empty", pos)));
        }

        let _serial = self.ingest.lock().await;
        let vectors = self.embed(chunks).await?;

        // only appends replace the state, and they hold `ingest`
        let current = self.current()?;
        let mut next = IndexState {
            vectors: Vec::with_capacity(current.vectors.len() + vectors.len() * self.dim()),
            texts: Vec::with_capacity(current.texts.len() + chunks.len()),
        };
        next.vectors.extend_from_slice(&current.vectors);
        next.vectors.extend(vectors.into_iter().flatten());
        next.texts.extend_from_slice(&current.texts);
        next.texts.extend(chunks.iter().cloned());
        drop(current);
        let next = Arc::new(next);

        let to_write = Arc::clone(&next);
        let dir = self.dir.clone();
        let model_id = self.embedder.model_id().to_string();
        let dim = self.dim();
        let written = tokio::task::spawn_blocking(move || {
            snapshot::write(&dir, &model_id, dim, &to_write.vectors, &to_write.texts)
        })
        .await
        .map_err(|e| Error::Persistence(format!("snapshot task failed: {}", e)))?;
        if let Err(e) = written {
            tracing::error!(error = %e, "index snapshot write failed, batch discarded");
            return Err(e);
        }

        let size = next.texts.len();
        *self.state.write().map_err(|_| poisoned())? = next;
        tracing::info!(added = chunks.len(), total = size, "index now contains {} vectors", size);
        Ok(chunks.len())
    }

    /// Top `min(k, size)` documents by cosine similarity to `query`.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        if k == 0 {
            return Err(Error::InvalidInput("k must be positive".to_string()));
        }
        if query.trim().is_empty() {
            return Err(Error::InvalidInput("query is empty".to_string()));
        }
        if self.size() == 0 {
            return Ok(Vec::new());
        }

        let query_vec = self
            .embed(&[query.to_string()])
            .await?
            .pop()
            .ok_or_else(|| Error::Embedding("no vector returned for query".to_string()))?;

        let state = self.current()?;
        let hits = top_k(&query_vec, &state.vectors, self.embedder.dim(), k)
            .into_iter()
            .map(|(position, score)| ScoredChunk {
                text: state.texts[position].clone(),
                score,
                position,
            })
            .collect();
        Ok(hits)
    }

    pub fn size(&self) -> usize {
        self.current().map(|s| s.texts.len()).unwrap_or(0)
    }

    pub fn dim(&self) -> usize {
        self.embedder.dim()
    }

    pub fn embedding_model_id(&self) -> &str {
        self.embedder.model_id()
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Whether the current contents came from a snapshot on disk.
    pub fn restored(&self) -> bool {
        self.restored.load(Ordering::SeqCst)
    }

    /// Embed in calls of at most `batch_size` texts, each under its own
    /// timeout. Nothing is returned unless every call succeeds.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let out = tokio::time::timeout(self.embed_timeout, self.embedder.embed_batch(batch))
                .await
                .map_err(|_| Error::Embedding(format!("embedding timed out after {:?}", self.embed_timeout)))??;
            if out.len() != batch.len() {
                return Err(Error::Embedding(format!(
                    "embedder returned {} vectors for {} texts",
                    out.len(),
                    batch.len()
                )));
            }
            vectors.extend(out);
        }

        let dim = self.embedder.dim();
        for (i, v) in vectors.iter_mut().enumerate() {
            if v.len() != dim {
                return Err(Error::Embedding(format!("vector {} has dimension {}, expected {}", i, v.len(), dim)));
            }
            if !normalize(v) {
                return Err(Error::Embedding(format!("vector {} has no direction (zero norm)", i)));
            }
        }
        Ok(vectors)
    }

    fn current(&self) -> Result<Arc<IndexState>> {
        self.state.read().map(|s| Arc::clone(&s)).map_err(|_| poisoned())
    }
}

fn poisoned() -> Error {
    Error::Persistence("index lock poisoned".to_string())
}
