//! Storage abstraction for per-patient collections.
//!
//! The [`CollectionStore`] trait is the vector backend seam: the
//! [`PatientIndex`](crate::index::PatientIndex) and the
//! [`Retriever`](crate::retrieve::Retriever) receive a store at
//! construction instead of reaching for a process-wide client, so tests
//! and alternative backends can be plugged in.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::models::{Collection, SegmentMetadata};

/// A segment returned from a relevance query, with its cosine score.
#[derive(Debug, Clone, Serialize)]
pub struct SegmentCandidate {
    pub id: String,
    pub text: String,
    pub metadata: SegmentMetadata,
    pub score: f32,
}

/// Abstract collection backend.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`get_collection`](CollectionStore::get_collection) | Fetch a collection snapshot by name |
/// | [`put_collection`](CollectionStore::put_collection) | Insert a collection, replacing any existing one atomically |
/// | [`count`](CollectionStore::count) | Element count, `None` when the collection is absent |
/// | [`query`](CollectionStore::query) | Top-`limit` segments by descending cosine similarity |
#[async_trait]
pub trait CollectionStore: Send + Sync {
    async fn get_collection(&self, name: &str) -> Result<Option<Arc<Collection>>>;

    async fn put_collection(&self, collection: Collection) -> Result<()>;

    async fn count(&self, name: &str) -> Result<Option<usize>>;

    async fn query(
        &self,
        name: &str,
        query_vec: &[f32],
        limit: usize,
    ) -> Result<Vec<SegmentCandidate>>;
}
