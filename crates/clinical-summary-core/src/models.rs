//! Data models shared by the chunker, the per-patient index, and the retriever.
//!
//! A [`TextSegment`] is the unit of text a patient's notes are split into.
//! Once embedded, each segment becomes a [`SegmentRecord`] inside the
//! patient's [`Collection`].

use serde::Serialize;

/// A bounded-length piece of a patient's clinical text.
///
/// Segments are derived, never persisted on their own: they come either
/// straight from the patient's notes (one per note) or from
/// [`chunk_text`](crate::chunk::chunk_text).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextSegment {
    /// Zero-based position within the patient's segment sequence.
    pub position: usize,
    /// Owning patient identifier.
    pub patient_id: String,
    pub text: String,
}

impl TextSegment {
    pub fn new(patient_id: &str, position: usize, text: impl Into<String>) -> Self {
        Self {
            position,
            patient_id: patient_id.to_string(),
            text: text.into(),
        }
    }
}

/// Metadata stored alongside every indexed document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentMetadata {
    /// `clinical_record_<patient_id>`.
    pub source: String,
    /// Position of the document in the sequence passed to the indexer.
    pub doc_idx: usize,
}

/// One retrievable unit of a patient collection.
#[derive(Debug, Clone)]
pub struct SegmentRecord {
    /// Stable id of the form `doc_<patient_id>_<position>`.
    pub id: String,
    pub text: String,
    pub metadata: SegmentMetadata,
    pub vector: Vec<f32>,
}

/// The namespaced set of segments indexed for one patient.
///
/// A collection is immutable once built. Re-indexing a patient builds a new
/// collection and swaps it in whole, so readers observe either the old or the
/// new snapshot and never a mix of both.
#[derive(Debug, Clone)]
pub struct Collection {
    pub name: String,
    pub patient_id: String,
    pub records: Vec<SegmentRecord>,
}

impl Collection {
    /// Number of documents in the collection.
    pub fn count(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Collection name for a patient: `patient_<id>` with `-` replaced by `_`.
pub fn collection_name(patient_id: &str) -> String {
    format!("patient_{}", patient_id.replace('-', "_"))
}

/// Stable document id for the `position`-th document of a patient.
pub fn document_id(patient_id: &str, position: usize) -> String {
    format!("doc_{}_{}", patient_id, position)
}
