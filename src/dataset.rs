//! Loading of the canonical tabular dataset.
//!
//! The preprocessing collaborator writes five CSV tables into one
//! directory. [`Dataset::load`] reads all of them; any read or parse
//! failure is a [`PipelineError::DatasetLoad`]. The dataset is read-only
//! afterwards and can be shared between concurrent pipeline runs.

use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::PipelineError;
use crate::models::{ClinicalEpisode, ClinicalNote, Diagnosis, Movement, PatientRecord};

pub const PATIENTS_FILE: &str = "Pacientes.csv";
pub const EPISODES_FILE: &str = "Episodios.csv";
pub const MOVEMENTS_FILE: &str = "Movimientos.csv";
pub const DIAGNOSES_FILE: &str = "Diagnosticos.csv";
pub const NOTES_FILE: &str = "Textos.csv";

/// The five tables, rows in file order.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub patients: Vec<PatientRecord>,
    pub episodes: Vec<ClinicalEpisode>,
    pub movements: Vec<Movement>,
    pub diagnoses: Vec<Diagnosis>,
    pub notes: Vec<ClinicalNote>,
}

/// A patient with their episodes, each episode carrying the movements,
/// diagnoses and notes that reference it.
#[derive(Debug, Clone)]
pub struct ClinicalRecord {
    pub patient: PatientRecord,
    pub episodes: Vec<ClinicalEpisode>,
}

impl ClinicalRecord {
    /// All episode free text (`texto_clinico`) joined by newlines, in
    /// episode order.
    pub fn free_text(&self) -> String {
        self.episodes
            .iter()
            .flat_map(|ep| ep.notes.iter())
            .filter_map(|n| n.clinical_text.as_deref())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Dataset {
    pub fn load(dir: &Path) -> Result<Self, PipelineError> {
        let dataset = Self {
            patients: read_table(dir, PATIENTS_FILE)?,
            episodes: read_table(dir, EPISODES_FILE)?,
            movements: read_table(dir, MOVEMENTS_FILE)?,
            diagnoses: read_table(dir, DIAGNOSES_FILE)?,
            notes: read_table(dir, NOTES_FILE)?,
        };
        tracing::debug!(
            patients = dataset.patients.len(),
            episodes = dataset.episodes.len(),
            movements = dataset.movements.len(),
            diagnoses = dataset.diagnoses.len(),
            notes = dataset.notes.len(),
            "loaded dataset"
        );
        Ok(dataset)
    }

    pub fn patient(&self, patient_id: &str) -> Option<&PatientRecord> {
        self.patients.iter().find(|p| p.id == patient_id)
    }

    /// The patient's episodes in table order.
    pub fn episodes_of<'a>(
        &'a self,
        patient_id: &'a str,
    ) -> impl Iterator<Item = &'a ClinicalEpisode> + 'a {
        self.episodes.iter().filter(move |e| e.patient_id == patient_id)
    }

    /// Individual notes (`texto_nota`) of the patient, in table order.
    pub fn patient_notes(&self, patient_id: &str) -> Vec<String> {
        self.notes
            .iter()
            .filter(|n| n.patient_id == patient_id)
            .filter_map(|n| n.note.clone())
            .collect()
    }

    /// Assemble the full clinical record of a patient, or `None` when the
    /// patient is not in the patient table.
    pub fn clinical_record(&self, patient_id: &str) -> Option<ClinicalRecord> {
        let patient = self.patient(patient_id)?.clone();

        let episodes = self
            .episodes_of(patient_id)
            .map(|ep| {
                let mut ep = ep.clone();
                ep.movements = self
                    .movements
                    .iter()
                    .filter(|m| m.episode_id == ep.id)
                    .cloned()
                    .collect();
                ep.diagnoses = self
                    .diagnoses
                    .iter()
                    .filter(|d| d.episode_id == ep.id)
                    .cloned()
                    .collect();
                ep.notes = self
                    .notes
                    .iter()
                    .filter(|n| n.episode_id == ep.id)
                    .cloned()
                    .collect();
                ep
            })
            .collect();

        Some(ClinicalRecord { patient, episodes })
    }
}

fn read_table<T: DeserializeOwned>(dir: &Path, file: &str) -> Result<Vec<T>, PipelineError> {
    let path = dir.join(file);
    let load_err = |reason: String| PipelineError::DatasetLoad {
        table: file.to_string(),
        reason,
    };

    let mut reader = csv::Reader::from_path(&path)
        .map_err(|e| load_err(format!("{}: {}", path.display(), e)))?;

    let mut rows = Vec::new();
    for row in reader.deserialize::<T>() {
        rows.push(row.map_err(|e: csv::Error| load_err(e.to_string()))?);
    }
    Ok(rows)
}
