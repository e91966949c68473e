//! # Clinical Summary Core
//!
//! Backend-agnostic retrieval logic for Clinical Summary: text segments,
//! sentence chunking, per-patient collections with replace-on-write
//! semantics, top-k retrieval, and whole-patient similarity search.
//!
//! This crate does no file or network I/O. Embedding backends and vector
//! stores are injected through the [`embedding::EmbeddingProvider`] and
//! [`store::CollectionStore`] traits.

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod index;
pub mod models;
pub mod retrieve;
pub mod similarity;
pub mod store;

#[cfg(test)]
mod testing;

pub use error::CoreError;
