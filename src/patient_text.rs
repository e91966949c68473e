//! Aggregated per-patient text for whole-patient similarity.
//!
//! One string per patient combining demographics, diagnosis labels,
//! episode types, services, treatment units and the clinical free text.
//! Only patients that have at least one row in the notes table are
//! represented. The map is keyed by id; the similarity index applies its
//! own numeric-aware order when it embeds them.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::dataset::Dataset;
use crate::models::Diagnosis;
use crate::structure::{age_on, parse_date};

/// Aggregated texts of every patient with notes, keyed by patient id.
pub fn build_patient_texts(dataset: &Dataset, today: NaiveDate) -> BTreeMap<String, String> {
    let mut ids: Vec<&str> = dataset.notes.iter().map(|n| n.patient_id.as_str()).collect();
    ids.sort_unstable();
    ids.dedup();

    ids.into_iter()
        .map(|id| (id.to_string(), patient_text(dataset, id, today)))
        .filter(|(_, text)| !text.is_empty())
        .collect()
}

/// Aggregated text of one patient. Sections with no content are left out.
pub fn patient_text(dataset: &Dataset, patient_id: &str, today: NaiveDate) -> String {
    let mut parts: Vec<String> = Vec::new();

    if let Some(p) = dataset.patient(patient_id) {
        let age = p
            .birth_date
            .as_deref()
            .and_then(parse_date)
            .map(|b| age_on(b, today).to_string())
            .unwrap_or_else(|| "No disponible".to_string());
        parts.push(format!(
            "Informació demogràfica: Edat {} anys, Sexe {}, Nacionalitat {}.",
            age,
            p.sex.as_deref().unwrap_or(""),
            p.nationality.as_deref().unwrap_or("")
        ));
    }

    let episodes: Vec<_> = dataset.episodes_of(patient_id).collect();
    let diagnoses: Vec<&Diagnosis> = dataset
        .diagnoses
        .iter()
        .filter(|d| episodes.iter().any(|e| e.id == d.episode_id))
        .collect();

    let principal = unique(diagnoses.iter().filter(|d| d.principal).map(|d| d.label.as_deref()));
    let reasons = unique(
        diagnoses
            .iter()
            .filter(|d| d.consultation_reason)
            .map(|d| d.label.as_deref()),
    );
    let others = unique(
        diagnoses
            .iter()
            .filter(|d| !d.principal && !d.consultation_reason)
            .map(|d| d.label.as_deref()),
    );
    let types = unique(episodes.iter().map(|e| e.episode_type.as_deref()));

    let movements: Vec<_> = dataset
        .movements
        .iter()
        .filter(|m| episodes.iter().any(|e| e.id == m.episode_id))
        .collect();
    let services = unique(movements.iter().map(|m| m.service.as_deref()));
    let units = unique(movements.iter().map(|m| m.unit.as_deref()));

    push_list(&mut parts, "Diagnòstics principals", &principal);
    push_list(&mut parts, "Motius de consulta", &reasons);
    push_list(&mut parts, "Altres diagnòstics", &others);
    push_list(&mut parts, "Tipus d'episodi", &types);
    push_list(&mut parts, "Serveis mèdics", &services);
    push_list(&mut parts, "Unitats de tractament", &units);

    let texts: Vec<&str> = dataset
        .notes
        .iter()
        .filter(|n| n.patient_id == patient_id)
        .filter_map(|n| n.clinical_text.as_deref())
        .collect();
    let texts = texts.join(" ");
    if !texts.trim().is_empty() {
        parts.push(format!("Textos clínics: {}", texts));
    }

    parts.join(" ").trim().to_string()
}

/// Distinct non-empty values in first-seen order.
fn unique<'a>(values: impl Iterator<Item = Option<&'a str>>) -> Vec<&'a str> {
    let mut out: Vec<&str> = Vec::new();
    for v in values.flatten() {
        if !out.contains(&v) {
            out.push(v);
        }
    }
    out
}

fn push_list(parts: &mut Vec<String>, label: &str, values: &[&str]) {
    if !values.is_empty() {
        parts.push(format!("{}: {}.", label, values.join(", ")));
    }
}
