//! Top-k relevance retrieval over a patient's collection.
//!
//! The retriever embeds the query with the same provider used for indexing
//! and asks the [`CollectionStore`] for the closest segments.
//!
//! A missing or empty collection is a normal "no context" outcome and
//! yields `Ok(vec![])`; only backend failures produce
//! [`CoreError::Retrieval`]. Callers must keep the two apart.

use std::sync::Arc;

use crate::embedding::{embed_one, EmbeddingProvider};
use crate::error::CoreError;
use crate::index::PatientIndex;
use crate::models::collection_name;
use crate::store::CollectionStore;

pub struct Retriever {
    store: Arc<dyn CollectionStore>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl Retriever {
    pub fn new(store: Arc<dyn CollectionStore>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { store, embedder }
    }

    /// A retriever reading the collections written by `index`.
    pub fn for_index(index: &PatientIndex) -> Self {
        Self::new(index.store().clone(), index.embedder().clone())
    }

    /// Return at most `k` segment texts of `patient_id`, most relevant to
    /// `query` first.
    ///
    /// The effective limit is `min(k, collection size)`. `k <= 0` returns an
    /// empty result without touching the backend.
    pub async fn retrieve(
        &self,
        patient_id: &str,
        query: &str,
        k: i64,
    ) -> Result<Vec<String>, CoreError> {
        if k <= 0 {
            return Ok(Vec::new());
        }

        let name = collection_name(patient_id);
        let size = self
            .store
            .count(&name)
            .await
            .map_err(|e| CoreError::retrieval(patient_id, format!("{:#}", e)))?;

        let size = match size {
            Some(n) if n > 0 => n,
            Some(_) => {
                tracing::debug!(collection = %name, "collection is empty");
                return Ok(Vec::new());
            }
            None => {
                tracing::debug!(collection = %name, "collection not found");
                return Ok(Vec::new());
            }
        };

        let effective_k = (k as usize).min(size);

        let query_vec = embed_one(self.embedder.as_ref(), query)
            .await
            .map_err(|e| CoreError::retrieval(patient_id, format!("{:#}", e)))?;

        let candidates = self
            .store
            .query(&name, &query_vec, effective_k)
            .await
            .map_err(|e| CoreError::retrieval(patient_id, format!("{:#}", e)))?;

        tracing::info!(patient_id, retrieved = candidates.len(), "retrieved documents");
        Ok(candidates.into_iter().map(|c| c.text).collect())
    }
}
