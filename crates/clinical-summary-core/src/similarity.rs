//! Whole-patient similarity search.
//!
//! Each patient is represented by one embedding of their aggregated text
//! (demographics, diagnoses, episode types, services, notes). The nearest
//! neighbour of a patient is found by a brute-force cosine scan over every
//! other patient.
//!
//! # Ordering contract
//!
//! [`PatientEmbeddings`] keeps insertion order, and the scan uses a strict
//! greater-than comparison, so among candidates with equal scores the one
//! inserted first wins. [`build_index`] inserts patients in
//! [`compare_patient_ids`] order, which makes ties resolve to the smallest
//! patient id: `9` before `10`, all-digit ids before any other id.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use anyhow::Result;
use serde::Serialize;

use crate::embedding::{cosine_similarity, EmbeddingProvider};

/// Patient id → embedding, iterated in insertion order.
#[derive(Debug, Clone, Default)]
pub struct PatientEmbeddings {
    entries: Vec<(String, Vec<f32>)>,
}

impl PatientEmbeddings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an embedding. Re-inserting an id replaces its vector in place
    /// without changing its position.
    pub fn insert(&mut self, patient_id: impl Into<String>, embedding: Vec<f32>) {
        let patient_id = patient_id.into();
        match self.entries.iter_mut().find(|(id, _)| *id == patient_id) {
            Some(entry) => entry.1 = embedding,
            None => self.entries.push((patient_id, embedding)),
        }
    }

    pub fn get(&self, patient_id: &str) -> Option<&[f32]> {
        self.entries
            .iter()
            .find(|(id, _)| id == patient_id)
            .map(|(_, v)| v.as_slice())
    }

    pub fn contains(&self, patient_id: &str) -> bool {
        self.get(patient_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f32])> {
        self.entries
            .iter()
            .map(|(id, v)| (id.as_str(), v.as_slice()))
    }
}

/// Order patient ids by numeric value when both are all digits (leading
/// zeros ignored), otherwise lexically, with all-digit ids first.
pub fn compare_patient_ids(a: &str, b: &str) -> Ordering {
    fn key(id: &str) -> (bool, usize, &str) {
        if !id.is_empty() && id.bytes().all(|c| c.is_ascii_digit()) {
            let digits = id.trim_start_matches('0');
            (false, digits.len(), digits)
        } else {
            (true, 0, id)
        }
    }
    key(a).cmp(&key(b)).then_with(|| a.cmp(b))
}

/// The most similar patient and its cosine score in `[-1, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Neighbor {
    pub patient_id: String,
    pub score: f32,
}

/// Embed every patient's aggregated text.
///
/// Patients whose text is empty or whitespace-only get no embedding and are
/// therefore excluded from neighbour search (they are not represented by a
/// zero vector). Texts are embedded in batches of `batch_size`, and
/// patients are inserted in [`compare_patient_ids`] order.
pub async fn build_index(
    provider: &dyn EmbeddingProvider,
    patient_texts: &BTreeMap<String, String>,
    batch_size: usize,
) -> Result<PatientEmbeddings> {
    let mut candidates: Vec<(&String, &String)> = patient_texts
        .iter()
        .filter(|(_, text)| !text.trim().is_empty())
        .collect();
    candidates.sort_by(|(a, _), (b, _)| compare_patient_ids(a, b));

    let mut embeddings = PatientEmbeddings::new();
    for batch in candidates.chunks(batch_size.max(1)) {
        let texts: Vec<String> = batch.iter().map(|(_, t)| (*t).clone()).collect();
        let vectors = provider.embed(&texts).await?;
        if vectors.len() != batch.len() {
            anyhow::bail!(
                "embedding provider returned {} vectors for {} patients",
                vectors.len(),
                batch.len()
            );
        }
        for ((id, _), vector) in batch.iter().zip(vectors) {
            embeddings.insert((*id).clone(), vector);
        }
    }

    tracing::info!(
        patients = embeddings.len(),
        skipped = patient_texts.len() - embeddings.len(),
        "built patient similarity index"
    );
    Ok(embeddings)
}

/// Find the patient most similar to `query_id`.
///
/// Every other patient is scored; `query_id` itself is never returned.
/// Returns `None` when `query_id` has no embedding or when there is no
/// other patient to compare against.
pub fn nearest_neighbor(query_id: &str, embeddings: &PatientEmbeddings) -> Option<Neighbor> {
    let query = embeddings.get(query_id)?;

    let mut best: Option<Neighbor> = None;
    for (id, vector) in embeddings.iter() {
        if id == query_id {
            continue;
        }
        let score = cosine_similarity(query, vector);
        let better = match &best {
            Some(b) => score > b.score,
            None => true,
        };
        if better {
            best = Some(Neighbor {
                patient_id: id.to_string(),
                score,
            });
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingEmbedder, LetterEmbedder};

    fn embeddings(items: &[(&str, Vec<f32>)]) -> PatientEmbeddings {
        let mut e = PatientEmbeddings::new();
        for (id, v) in items {
            e.insert(*id, v.clone());
        }
        e
    }

    #[test]
    fn test_nearest_neighbor_picks_highest_cosine() {
        let e = embeddings(&[
            ("P1", vec![1.0, 0.0]),
            ("P2", vec![0.0, 1.0]),
            ("P3", vec![0.9, 0.1]),
        ]);
        let n = nearest_neighbor("P1", &e).unwrap();
        assert_eq!(n.patient_id, "P3");
        assert!((n.score - 0.9939).abs() < 1e-3);
        assert!(n.score > cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]));
    }

    #[test]
    fn test_self_never_returned() {
        let e = embeddings(&[("P1", vec![1.0, 0.0]), ("P2", vec![-1.0, 0.0])]);
        let n = nearest_neighbor("P1", &e).unwrap();
        assert_eq!(n.patient_id, "P2");
        assert!((n.score + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_tie_goes_to_first_inserted() {
        let e = embeddings(&[
            ("P1", vec![1.0, 0.0]),
            ("P9", vec![0.5, 0.5]),
            ("P2", vec![0.5, 0.5]),
        ]);
        assert_eq!(nearest_neighbor("P1", &e).unwrap().patient_id, "P9");
    }

    #[test]
    fn test_not_found_cases() {
        let e = embeddings(&[("P1", vec![1.0, 0.0])]);
        assert_eq!(nearest_neighbor("P1", &e), None);
        assert_eq!(nearest_neighbor("P7", &e), None);
        assert_eq!(nearest_neighbor("P1", &PatientEmbeddings::new()), None);
    }

    #[test]
    fn test_reinsert_keeps_position() {
        let mut e = embeddings(&[("A", vec![1.0]), ("B", vec![2.0])]);
        e.insert("A", vec![3.0]);
        let ids: Vec<&str> = e.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["A", "B"]);
        assert_eq!(e.get("A"), Some(&[3.0f32][..]));
    }

    #[tokio::test]
    async fn test_build_index_skips_blank_texts_in_id_order() {
        let mut texts = BTreeMap::new();
        texts.insert("30".to_string(), "asma bronquial".to_string());
        texts.insert("10".to_string(), "   ".to_string());
        texts.insert("20".to_string(), "diabetis".to_string());

        let e = build_index(&LetterEmbedder, &texts, 1).await.unwrap();
        let ids: Vec<&str> = e.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["20", "30"]);
        assert!(!e.contains("10"));
    }

    #[test]
    fn test_patient_ids_compare_by_value() {
        assert_eq!(compare_patient_ids("9", "10"), Ordering::Less);
        assert_eq!(compare_patient_ids("0010", "9"), Ordering::Greater);
        assert_eq!(compare_patient_ids("1002", "A1"), Ordering::Less);
        assert_eq!(compare_patient_ids("P2", "P10"), Ordering::Greater);
        assert_eq!(compare_patient_ids("7", "7"), Ordering::Equal);
    }

    #[tokio::test]
    async fn test_build_index_ties_resolve_to_numerically_smallest_id() {
        let mut texts = BTreeMap::new();
        texts.insert("1".to_string(), "aaa".to_string());
        texts.insert("10".to_string(), "aab".to_string());
        texts.insert("9".to_string(), "aab".to_string());

        let e = build_index(&LetterEmbedder, &texts, 2).await.unwrap();
        let ids: Vec<&str> = e.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["1", "9", "10"]);
        assert_eq!(nearest_neighbor("1", &e).unwrap().patient_id, "9");
    }

    #[tokio::test]
    async fn test_build_index_propagates_backend_failure() {
        let mut texts = BTreeMap::new();
        texts.insert("1".to_string(), "text".to_string());
        assert!(build_index(&FailingEmbedder, &texts, 8).await.is_err());
    }
}
