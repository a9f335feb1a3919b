//! crates/tutor_core/src/knowledge.rs
//!
//! The course knowledge base: turns raw documents into chunks, embeds them,
//! rebuilds the vector index, and answers top-k similarity queries.

use crate::chunking::Chunker;
use crate::domain::{DocumentChunk, EmbeddingEntry, RetrievedChunk};
use crate::ports::{CorpusSource, EmbeddingService, PortError, VectorIndex};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

pub const DEFAULT_TOP_K: usize = 3;
const EMBED_BATCH_SIZE: usize = 64;
const DIMENSION_CHECK_TEXT: &str = "course";

/// Why an ingestion run produced no index.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IngestError {
    #[error("No course documents were found")]
    NoDocuments,
    #[error("No chunks to embed")]
    NoChunks,
    #[error("No chunk could be embedded")]
    NoEntries,
    #[error("Course content could not be read: {0}")]
    Source(PortError),
    #[error("Vector index write failed: {0}")]
    Index(PortError),
    #[error("Chunking task failed: {0}")]
    Chunking(String),
}

/// Counts from a successful ingestion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestReport {
    pub documents: usize,
    pub chunks: usize,
    pub entries: usize,
}

pub struct KnowledgeBase {
    corpus: Arc<dyn CorpusSource>,
    embedder: Arc<dyn EmbeddingService>,
    index: Arc<dyn VectorIndex>,
    chunker: Chunker,
    rebuild_lock: Mutex<()>,
}

impl KnowledgeBase {
    pub fn new(
        corpus: Arc<dyn CorpusSource>,
        embedder: Arc<dyn EmbeddingService>,
        index: Arc<dyn VectorIndex>,
        chunker: Chunker,
    ) -> Self {
        Self {
            corpus,
            embedder,
            index,
            chunker,
            rebuild_lock: Mutex::new(()),
        }
    }

    pub fn chunker(&self) -> &Chunker {
        &self.chunker
    }

    /// Reloads the whole corpus and replaces the index. Only one rebuild runs at a time.
    pub async fn rebuild(&self) -> Result<IngestReport, IngestError> {
        let _guard = self.rebuild_lock.lock().await;
        self.rebuild_locked().await
    }

    /// Builds the index if it is empty or was written by an embedder with a
    /// different vector size. Returns `None` when there was nothing to do.
    pub async fn ensure_built(&self) -> Option<Result<IngestReport, IngestError>> {
        let _guard = self.rebuild_lock.lock().await;
        match self.index.count().await {
            Ok(0) => Some(self.rebuild_locked().await),
            Ok(count) if !self.index_matches_embedder().await => {
                warn!(
                    "Vector index holds {} entries from a different embedding model, rebuilding",
                    count
                );
                Some(self.rebuild_locked().await)
            }
            Ok(_) => None,
            Err(e) => {
                warn!("Could not inspect vector index, rebuilding: {}", e);
                Some(self.rebuild_locked().await)
            }
        }
    }

    /// Whether a vector from the current embedder can be compared with the
    /// stored entries. Undecidable cases count as a match.
    async fn index_matches_embedder(&self) -> bool {
        let vector = match self.embedder.embed(DIMENSION_CHECK_TEXT).await {
            Ok(vector) => vector,
            Err(e) => {
                warn!("Could not check the index embedding size: {}", e);
                return true;
            }
        };
        match self.index.search(&vector, 1).await {
            Ok(hits) => !hits.is_empty(),
            Err(e) => {
                warn!("Could not check the index embedding size: {}", e);
                true
            }
        }
    }

    async fn rebuild_locked(&self) -> Result<IngestReport, IngestError> {
        let documents = self.corpus.load_all().await.map_err(IngestError::Source)?;
        if documents.is_empty() {
            warn!("No usable course documents found");
            return Err(IngestError::NoDocuments);
        }
        let document_count = documents.len();
        let chunker = self.chunker.clone();
        // Large documents take a while to split; keep that off the async workers.
        let chunks = tokio::task::spawn_blocking(move || chunker.chunk_documents(&documents))
            .await
            .map_err(|e| IngestError::Chunking(e.to_string()))?;
        let entries = self.embed_and_store(&chunks).await?;
        let report = IngestReport {
            documents: document_count,
            chunks: chunks.len(),
            entries,
        };
        info!(
            "Course content indexed: {} documents, {} chunks, {} entries",
            report.documents, report.chunks, report.entries
        );
        Ok(report)
    }

    /// Embeds every chunk and replaces the index contents with the results.
    ///
    /// Chunks whose embedding fails are dropped; the run fails only when no
    /// entry survives.
    pub async fn embed_and_store(&self, chunks: &[DocumentChunk]) -> Result<usize, IngestError> {
        if chunks.is_empty() {
            return Err(IngestError::NoChunks);
        }

        let mut entries = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(EMBED_BATCH_SIZE) {
            let inputs: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            match self.embedder.embed_batch(&inputs).await {
                Ok(vectors) if vectors.len() == batch.len() => {
                    entries.extend(batch.iter().zip(vectors).map(|(c, v)| to_entry(c, v)));
                }
                Ok(vectors) => {
                    warn!(
                        "Embedding batch returned {} vectors for {} inputs, retrying one by one",
                        vectors.len(),
                        batch.len()
                    );
                    entries.extend(self.embed_individually(batch).await);
                }
                Err(e) => {
                    warn!("Embedding batch failed, retrying one by one: {}", e);
                    entries.extend(self.embed_individually(batch).await);
                }
            }
        }

        if entries.is_empty() {
            error!("Every chunk failed to embed; keeping the previous index");
            return Err(IngestError::NoEntries);
        }

        self.index.replace_all(entries).await.map_err(|e| {
            error!("Vector index rebuild failed: {}", e);
            IngestError::Index(e)
        })
    }

    async fn embed_individually(&self, batch: &[DocumentChunk]) -> Vec<EmbeddingEntry> {
        let mut entries = Vec::new();
        for chunk in batch {
            match self.embedder.embed(&chunk.text).await {
                Ok(vector) => entries.push(to_entry(chunk, vector)),
                Err(e) => warn!(
                    "Dropping chunk {} of {}: {}",
                    chunk.metadata.chunk_index,
                    chunk.metadata.source.display(),
                    e
                ),
            }
        }
        entries
    }

    /// Returns the `k` most similar chunks, best first.
    ///
    /// Never fails: an unbuilt index or a provider error yields an empty list.
    pub async fn query(&self, text: &str, k: usize) -> Vec<RetrievedChunk> {
        if k == 0 {
            return Vec::new();
        }
        let vector = match self.embedder.embed(text).await {
            Ok(vector) => vector,
            Err(e) => {
                error!("Query embedding failed: {}", e);
                return Vec::new();
            }
        };
        match self.index.search(&vector, k).await {
            Ok(hits) => {
                if hits.is_empty() {
                    if let Ok(stored) = self.index.count().await {
                        if stored > 0 {
                            warn!(
                                "Vector index holds {} entries but none match the query's {} dimensions; run /reload",
                                stored,
                                vector.len()
                            );
                        }
                    }
                }
                hits
            }
            Err(e) => {
                error!("Vector search failed: {}", e);
                Vec::new()
            }
        }
    }
}

fn to_entry(chunk: &DocumentChunk, vector: Vec<f32>) -> EmbeddingEntry {
    EmbeddingEntry {
        id: chunk_id(chunk),
        vector,
        text: chunk.text.clone(),
        metadata: chunk.metadata.clone(),
    }
}

/// Stable identity of a chunk: hex SHA-256 over source, page, offset and text.
pub fn chunk_id(chunk: &DocumentChunk) -> String {
    let mut hasher = Sha256::new();
    hasher.update(chunk.metadata.source.to_string_lossy().as_bytes());
    hasher.update(b"|");
    hasher.update(chunk.metadata.page.map(|p| p.to_string()).unwrap_or_default().as_bytes());
    hasher.update(b"|");
    hasher.update(chunk.metadata.offset.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(chunk.text.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut a_norm = 0.0f32;
    let mut b_norm = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        a_norm += x * x;
        b_norm += y * y;
    }
    if a_norm == 0.0 || b_norm == 0.0 {
        return 0.0;
    }
    dot / (a_norm.sqrt() * b_norm.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChunkMetadata, RawDocument};
    use crate::embedding::{HashEmbedder, HashEmbedderConfig};
    use crate::memory::{InMemoryVectorIndex, StaticCorpus};
    use crate::ports::{PortResult, VectorIndex};
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn raw(source: &str, text: &str) -> RawDocument {
        RawDocument {
            text: text.to_string(),
            source: PathBuf::from(source),
            page: None,
        }
    }

    fn chunk(text: &str, offset: usize) -> DocumentChunk {
        DocumentChunk {
            text: text.to_string(),
            metadata: ChunkMetadata {
                source: PathBuf::from("notes.txt"),
                page: None,
                chunk_index: 0,
                offset,
            },
        }
    }

    fn knowledge(docs: Vec<RawDocument>, embedder: Arc<dyn EmbeddingService>) -> (KnowledgeBase, Arc<InMemoryVectorIndex>) {
        let index = Arc::new(InMemoryVectorIndex::default());
        let kb = KnowledgeBase::new(
            Arc::new(StaticCorpus::new(docs)),
            embedder,
            index.clone(),
            Chunker::default(),
        );
        (kb, index)
    }

    /// Fails for any input containing "poison".
    struct PickyEmbedder(HashEmbedder);

    #[async_trait]
    impl EmbeddingService for PickyEmbedder {
        async fn embed_batch(&self, inputs: &[String]) -> PortResult<Vec<Vec<f32>>> {
            if inputs.iter().any(|i| i.contains("poison")) {
                return Err(PortError::Unexpected("rate limited".to_string()));
            }
            self.0.embed_batch(inputs).await
        }
    }

    /// Tracks how many rebuilds are between loading the corpus and writing the index.
    #[derive(Default)]
    struct RebuildTracker {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        loads: AtomicUsize,
    }

    struct TrackedCorpus(Arc<RebuildTracker>);

    #[async_trait]
    impl CorpusSource for TrackedCorpus {
        async fn load_all(&self) -> PortResult<Vec<RawDocument>> {
            let now = self.0.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.0.peak.fetch_max(now, Ordering::SeqCst);
            self.0.loads.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(vec![raw("a.txt", "Rebuilds queue up behind each other.")])
        }
    }

    struct TrackedIndex {
        inner: InMemoryVectorIndex,
        tracker: Arc<RebuildTracker>,
    }

    #[async_trait]
    impl VectorIndex for TrackedIndex {
        async fn replace_all(&self, entries: Vec<EmbeddingEntry>) -> PortResult<usize> {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let stored = self.inner.replace_all(entries).await;
            self.tracker.in_flight.fetch_sub(1, Ordering::SeqCst);
            stored
        }

        async fn search(&self, vector: &[f32], k: usize) -> PortResult<Vec<RetrievedChunk>> {
            self.inner.search(vector, k).await
        }

        async fn count(&self) -> PortResult<usize> {
            self.inner.count().await
        }
    }

    #[tokio::test]
    async fn marker_chunk_is_retrieved() {
        let docs = vec![
            raw("a.txt", "Photosynthesis converts light into chemical energy."),
            raw("b.txt", "The zebrafish marker XQ17 appears only in this chunk."),
            raw("c.txt", "Rust ownership rules prevent data races."),
            raw("d.txt", "Mitochondria are the powerhouse of the cell."),
        ];
        let (kb, _) = knowledge(docs, Arc::new(HashEmbedder::default()));
        let report = kb.rebuild().await.unwrap();
        assert_eq!(report, IngestReport { documents: 4, chunks: 4, entries: 4 });

        let hits = kb.query("XQ17 zebrafish marker", DEFAULT_TOP_K).await;
        assert_eq!(hits.len(), 3);
        assert!(hits.iter().any(|h| h.text.contains("XQ17")));
        assert!(hits[0].text.contains("XQ17"));
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[tokio::test]
    async fn empty_index_returns_nothing() {
        let (kb, _) = knowledge(Vec::new(), Arc::new(HashEmbedder::default()));
        assert!(kb.query("anything", 3).await.is_empty());
        assert!(kb.query("anything", 0).await.is_empty());
    }

    #[tokio::test]
    async fn empty_input_is_rejected() {
        let (kb, _) = knowledge(Vec::new(), Arc::new(HashEmbedder::default()));
        assert_eq!(kb.embed_and_store(&[]).await, Err(IngestError::NoChunks));
        assert_eq!(kb.rebuild().await, Err(IngestError::NoDocuments));
    }

    #[tokio::test]
    async fn failing_chunks_are_dropped() {
        let (kb, index) = knowledge(Vec::new(), Arc::new(PickyEmbedder(HashEmbedder::default())));
        let chunks = vec![chunk("good text", 0), chunk("poison pill", 10), chunk("more good text", 20)];
        assert_eq!(kb.embed_and_store(&chunks).await, Ok(2));
        assert_eq!(index.count().await.unwrap(), 2);

        let all_bad = vec![chunk("poison", 0)];
        assert_eq!(kb.embed_and_store(&all_bad).await, Err(IngestError::NoEntries));
        assert_eq!(index.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn rebuild_replaces_previous_entries() {
        let (kb, index) = knowledge(Vec::new(), Arc::new(HashEmbedder::default()));
        kb.embed_and_store(&[chunk("old one", 0), chunk("old two", 8)]).await.unwrap();
        kb.embed_and_store(&[chunk("fresh", 0)]).await.unwrap();
        assert_eq!(index.count().await.unwrap(), 1);
        let hits = kb.query("old", 5).await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "fresh");
    }

    #[tokio::test]
    async fn ensure_built_runs_only_when_empty() {
        let (kb, _) = knowledge(vec![raw("a.txt", "hello world")], Arc::new(HashEmbedder::default()));
        assert!(matches!(kb.ensure_built().await, Some(Ok(_))));
        assert!(kb.ensure_built().await.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_rebuilds_do_not_interleave() {
        let tracker = Arc::new(RebuildTracker::default());
        let kb = Arc::new(KnowledgeBase::new(
            Arc::new(TrackedCorpus(tracker.clone())),
            Arc::new(HashEmbedder::default()),
            Arc::new(TrackedIndex {
                inner: InMemoryVectorIndex::default(),
                tracker: tracker.clone(),
            }),
            Chunker::default(),
        ));

        let rebuilds: Vec<_> = (0..4)
            .map(|_| {
                let kb = kb.clone();
                tokio::spawn(async move { kb.rebuild().await })
            })
            .collect();
        let opening = {
            let kb = kb.clone();
            tokio::spawn(async move { kb.ensure_built().await })
        };

        for rebuild in rebuilds {
            assert!(rebuild.await.unwrap().is_ok());
        }
        assert!(!matches!(opening.await.unwrap(), Some(Err(_))));
        assert_eq!(tracker.peak.load(Ordering::SeqCst), 1);
        assert!(tracker.loads.load(Ordering::SeqCst) >= 4);
        assert_eq!(tracker.in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn embedder_change_forces_a_rebuild() {
        let index = Arc::new(InMemoryVectorIndex::default());
        let docs = vec![raw("a.txt", "Enzymes speed up chemical reactions.")];
        let wide = KnowledgeBase::new(
            Arc::new(StaticCorpus::new(docs.clone())),
            Arc::new(HashEmbedder::default()),
            index.clone(),
            Chunker::default(),
        );
        assert!(matches!(wide.ensure_built().await, Some(Ok(_))));
        assert!(wide.ensure_built().await.is_none());

        let narrow = KnowledgeBase::new(
            Arc::new(StaticCorpus::new(docs)),
            Arc::new(HashEmbedder::new(HashEmbedderConfig {
                dimensions: 64,
                ..HashEmbedderConfig::default()
            })),
            index.clone(),
            Chunker::default(),
        );
        assert!(narrow.query("enzymes", 3).await.is_empty());
        assert!(matches!(narrow.ensure_built().await, Some(Ok(_))));
        assert_eq!(narrow.query("enzymes", 3).await.len(), 1);
        assert!(narrow.ensure_built().await.is_none());
    }

    #[test]
    fn chunk_ids_depend_on_position_and_text() {
        assert_eq!(chunk_id(&chunk("same", 0)), chunk_id(&chunk("same", 0)));
        assert_ne!(chunk_id(&chunk("same", 0)), chunk_id(&chunk("same", 5)));
        assert_ne!(chunk_id(&chunk("same", 0)), chunk_id(&chunk("other", 0)));
    }

    #[test]
    fn cosine_handles_zero_vectors() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 1.0], &[2.0, 2.0]) - 1.0).abs() < 1e-6);
    }
}
