//! Per-patient index store.
//!
//! [`PatientIndex::index`] embeds a patient's documents and installs them as
//! that patient's [`Collection`], replacing any previous one. Re-indexing is
//! a full replace, never an append: after a successful call the collection
//! holds exactly the documents of that call.
//!
//! # Replacement
//!
//! The new collection is built completely (every document embedded) before
//! it is swapped in with a single [`CollectionStore::put_collection`], so a
//! reader never observes a half-built or mixed collection. Calls for the same
//! patient are serialized by a per-key async mutex held for the whole
//! build-and-swap; calls for different patients proceed independently.
//!
//! If embedding or storage fails, the patient's previous collection (if any)
//! is left untouched and no new collection is created.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::embedding::EmbeddingProvider;
use crate::error::CoreError;
use crate::models::{collection_name, document_id, Collection, SegmentMetadata, SegmentRecord};
use crate::store::CollectionStore;

/// Default number of documents sent to the embedding provider per request.
pub const DEFAULT_BATCH_SIZE: usize = 64;

pub struct PatientIndex {
    store: Arc<dyn CollectionStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl PatientIndex {
    pub fn new(store: Arc<dyn CollectionStore>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            store,
            embedder,
            batch_size: DEFAULT_BATCH_SIZE,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Override the embedding batch size (values below 1 are clamped to 1).
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn store(&self) -> &Arc<dyn CollectionStore> {
        &self.store
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    /// Index `documents` as the complete collection of `patient_id`.
    ///
    /// Each document becomes one record with id `doc_<patient_id>_<position>`
    /// and metadata recording its position. Returns the number of indexed
    /// documents, which always equals `documents.len()`.
    ///
    /// # Errors
    ///
    /// [`CoreError::Indexing`] when `documents` is empty, when the embedding
    /// provider or the store fails, or when the stored count does not match.
    pub async fn index(&self, patient_id: &str, documents: &[String]) -> Result<usize, CoreError> {
        if documents.is_empty() {
            return Err(CoreError::indexing(
                patient_id,
                "no clinical text entries to index",
            ));
        }

        let name = collection_name(patient_id);
        let key_lock = self
            .key_lock(&name)
            .map_err(|e| CoreError::indexing(patient_id, e))?;
        let _guard = key_lock.lock().await;

        let vectors = self
            .embed_all(documents)
            .await
            .map_err(|e| CoreError::indexing(patient_id, format!("{:#}", e)))?;
        if vectors.len() != documents.len() {
            return Err(CoreError::indexing(
                patient_id,
                format!(
                    "embedding provider returned {} vectors for {} documents",
                    vectors.len(),
                    documents.len()
                ),
            ));
        }

        let source = format!("clinical_record_{}", patient_id);
        let records: Vec<SegmentRecord> = documents
            .iter()
            .zip(vectors)
            .enumerate()
            .map(|(i, (text, vector))| SegmentRecord {
                id: document_id(patient_id, i),
                text: text.clone(),
                metadata: SegmentMetadata {
                    source: source.clone(),
                    doc_idx: i,
                },
                vector,
            })
            .collect();

        let existed = self
            .store
            .get_collection(&name)
            .await
            .map_err(|e| CoreError::indexing(patient_id, format!("{:#}", e)))?
            .is_some();
        if existed {
            tracing::debug!(collection = %name, "replacing existing collection");
        } else {
            tracing::debug!(collection = %name, "collection did not exist and will be created");
        }

        self.store
            .put_collection(Collection {
                name: name.clone(),
                patient_id: patient_id.to_string(),
                records,
            })
            .await
            .map_err(|e| CoreError::indexing(patient_id, format!("{:#}", e)))?;

        let count = self
            .store
            .count(&name)
            .await
            .map_err(|e| CoreError::indexing(patient_id, format!("{:#}", e)))?
            .unwrap_or(0);
        if count != documents.len() {
            return Err(CoreError::indexing(
                patient_id,
                format!(
                    "collection '{}' holds {} documents after indexing {}",
                    name,
                    count,
                    documents.len()
                ),
            ));
        }

        tracing::info!(patient_id, collection = %name, documents = count, "indexed patient texts");
        Ok(count)
    }

    async fn embed_all(&self, documents: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(documents.len());
        for batch in documents.chunks(self.batch_size) {
            vectors.extend(self.embedder.embed(batch).await?);
        }
        Ok(vectors)
    }

    fn key_lock(&self, name: &str) -> anyhow::Result<Arc<tokio::sync::Mutex<()>>> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| anyhow::anyhow!("index lock table poisoned"))?;
        Ok(locks
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryStore;
    use crate::testing::{FailingEmbedder, LetterEmbedder};

    fn docs(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn index_with(embedder: Arc<dyn EmbeddingProvider>) -> (PatientIndex, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        (PatientIndex::new(store.clone(), embedder), store)
    }

    #[tokio::test]
    async fn test_index_assigns_stable_ids() {
        let (index, store) = index_with(Arc::new(LetterEmbedder));
        let n = index.index("1001", &docs(&["febre", "tos"])).await.unwrap();
        assert_eq!(n, 2);

        let c = store.get_collection("patient_1001").await.unwrap().unwrap();
        let ids: Vec<&str> = c.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["doc_1001_0", "doc_1001_1"]);
        assert_eq!(c.records[1].metadata.doc_idx, 1);
        assert_eq!(c.records[1].metadata.source, "clinical_record_1001");
    }

    #[tokio::test]
    async fn test_reindex_replaces_instead_of_appending() {
        let (index, store) = index_with(Arc::new(LetterEmbedder));
        index.index("1001", &docs(&["d1", "d2"])).await.unwrap();
        index.index("1001", &docs(&["d1"])).await.unwrap();
        assert_eq!(store.count("patient_1001").await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_empty_documents_rejected_without_collection() {
        let (index, store) = index_with(Arc::new(LetterEmbedder));
        let err = index.index("1001", &[]).await.unwrap_err();
        assert!(matches!(err, CoreError::Indexing { .. }));
        assert_eq!(store.count("patient_1001").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_backend_failure_creates_nothing() {
        let (index, store) = index_with(Arc::new(FailingEmbedder));
        let err = index.index("1001", &docs(&["a"])).await.unwrap_err();
        assert!(matches!(err, CoreError::Indexing { .. }));
        assert_eq!(store.count("patient_1001").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_patients_are_isolated() {
        let (index, store) = index_with(Arc::new(LetterEmbedder));
        index.index("1", &docs(&["a", "b", "c"])).await.unwrap();
        index.index("2", &docs(&["x"])).await.unwrap();
        assert_eq!(store.count("patient_1").await.unwrap(), Some(3));
        assert_eq!(store.count("patient_2").await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_batches_preserve_order() {
        let store = Arc::new(InMemoryStore::new());
        let index = PatientIndex::new(store.clone(), Arc::new(LetterEmbedder)).with_batch_size(2);
        let input = docs(&["aaa", "bbb", "ccc", "ddd", "eee"]);
        index.index("7", &input).await.unwrap();
        let c = store.get_collection("patient_7").await.unwrap().unwrap();
        let texts: Vec<&str> = c.records.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["aaa", "bbb", "ccc", "ddd", "eee"]);
    }

    #[tokio::test]
    async fn test_concurrent_reindex_same_patient_never_mixes() {
        let (index, store) = index_with(Arc::new(LetterEmbedder));
        let index = Arc::new(index);

        let mut handles = Vec::new();
        for round in 0..8usize {
            let index = index.clone();
            handles.push(tokio::spawn(async move {
                let n = round % 3 + 1;
                let batch: Vec<String> = (0..n).map(|i| format!("r{} d{}", round, i)).collect();
                index.index("42", &batch).await.unwrap()
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let c = store.get_collection("patient_42").await.unwrap().unwrap();
        let round_prefix = c.records[0].text.split(' ').next().unwrap().to_string();
        assert!(c.count() >= 1 && c.count() <= 3);
        assert!(c.records.iter().all(|r| r.text.starts_with(&round_prefix)));
    }
}
