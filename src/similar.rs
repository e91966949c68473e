//! Most similar patient lookup.
//!
//! Independent of the summary pipeline: aggregates every patient's text,
//! embeds it and scans for the closest other patient.

use anyhow::Result;
use chrono::NaiveDate;
use clinical_summary_core::similarity::{build_index, nearest_neighbor, Neighbor};

use crate::dataset::Dataset;
use crate::embedding::EmbeddingProvider;
use crate::patient_text::build_patient_texts;

#[derive(Debug, Clone, PartialEq)]
pub struct SimilarPatient {
    pub neighbor: Neighbor,
    pub query_text: String,
    pub neighbor_text: String,
}

impl SimilarPatient {
    /// Cosine score as a percentage. May be negative.
    pub fn score_percent(&self) -> f32 {
        self.neighbor.score * 100.0
    }
}

/// `Ok(None)` when the patient has no aggregated text or no other patient
/// has one.
pub async fn find_similar(
    dataset: &Dataset,
    provider: &dyn EmbeddingProvider,
    patient_id: &str,
    batch_size: usize,
    today: NaiveDate,
) -> Result<Option<SimilarPatient>> {
    let texts = build_patient_texts(dataset, today);
    if !texts.contains_key(patient_id) {
        tracing::warn!(patient_id, "patient has no clinical text for similarity");
        return Ok(None);
    }

    let embeddings = build_index(provider, &texts, batch_size).await?;
    let Some(neighbor) = nearest_neighbor(patient_id, &embeddings) else {
        return Ok(None);
    };

    let text_of = |id: &str| texts.get(id).cloned().unwrap_or_default();
    Ok(Some(SimilarPatient {
        query_text: text_of(patient_id),
        neighbor_text: text_of(&neighbor.patient_id),
        neighbor,
    }))
}

/// The first `max_chars` characters of `text`.
pub fn preview(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
