//! In-memory [`CollectionStore`] implementation.
//!
//! Collections live behind a `std::sync::RwLock` as immutable
//! `Arc<Collection>` snapshots. Replacing a collection swaps the `Arc` under
//! the write lock, so a concurrent reader holds either the previous snapshot
//! or the new one. Queries are brute-force cosine similarity over every
//! record of the collection.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::Collection;

use super::{CollectionStore, SegmentCandidate};

/// Process-local collection store. Nothing survives a restart.
pub struct InMemoryStore {
    collections: RwLock<HashMap<String, Arc<Collection>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }

    fn snapshot(&self, name: &str) -> Result<Option<Arc<Collection>>> {
        let collections = self
            .collections
            .read()
            .map_err(|_| anyhow!("collection store lock poisoned"))?;
        Ok(collections.get(name).cloned())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CollectionStore for InMemoryStore {
    async fn get_collection(&self, name: &str) -> Result<Option<Arc<Collection>>> {
        self.snapshot(name)
    }

    async fn put_collection(&self, collection: Collection) -> Result<()> {
        let mut collections = self
            .collections
            .write()
            .map_err(|_| anyhow!("collection store lock poisoned"))?;
        collections.insert(collection.name.clone(), Arc::new(collection));
        Ok(())
    }

    async fn count(&self, name: &str) -> Result<Option<usize>> {
        Ok(self.snapshot(name)?.map(|c| c.count()))
    }

    async fn query(
        &self,
        name: &str,
        query_vec: &[f32],
        limit: usize,
    ) -> Result<Vec<SegmentCandidate>> {
        let collection = match self.snapshot(name)? {
            Some(c) => c,
            None => return Err(anyhow!("collection '{}' not found", name)),
        };

        let mut candidates: Vec<SegmentCandidate> = collection
            .records
            .iter()
            .map(|r| SegmentCandidate {
                id: r.id.clone(),
                text: r.text.clone(),
                metadata: r.metadata.clone(),
                score: cosine_similarity(query_vec, &r.vector),
            })
            .collect();
        // Stable sort: equal scores keep insertion (position) order.
        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates.truncate(limit);
        Ok(candidates)
    }
}
