//! Tabular clinical data as produced by the preprocessing collaborator.
//!
//! Each struct deserializes straight from one row of the corresponding CSV
//! table. Column names are the preprocessed (Spanish) ones; unknown columns
//! are ignored and absent optional columns read as `None`. Identifiers are
//! canonicalised on load, see [`canonical_id`].

use serde::{Deserialize, Deserializer, Serialize};

/// Demographic row of `Pacientes.csv`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PatientRecord {
    #[serde(rename = "id_paciente", deserialize_with = "id")]
    pub id: String,
    #[serde(rename = "sexo", default, deserialize_with = "opt_text")]
    pub sex: Option<String>,
    #[serde(rename = "fecha_nacimiento", default, deserialize_with = "opt_text")]
    pub birth_date: Option<String>,
    #[serde(rename = "fecha_fallecimiento", default, deserialize_with = "opt_text")]
    pub death_date: Option<String>,
    #[serde(rename = "nacionalidad", default, deserialize_with = "opt_text")]
    pub nationality: Option<String>,
}

/// Row of `Episodios.csv`, plus the movements, diagnoses and notes that
/// reference it once assembled into a
/// [`ClinicalRecord`](crate::dataset::ClinicalRecord).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ClinicalEpisode {
    #[serde(rename = "id_episodio", deserialize_with = "id")]
    pub id: String,
    #[serde(rename = "id_paciente", deserialize_with = "id")]
    pub patient_id: String,
    #[serde(rename = "fecha_inicio_episodio", default, deserialize_with = "opt_text")]
    pub start: Option<String>,
    /// `None` means the episode is still ongoing.
    #[serde(rename = "fecha_fin_episodio", default, deserialize_with = "opt_text")]
    pub end: Option<String>,
    #[serde(rename = "tipo_episodio", default, deserialize_with = "opt_text")]
    pub episode_type: Option<String>,
    #[serde(skip)]
    pub movements: Vec<Movement>,
    #[serde(skip)]
    pub diagnoses: Vec<Diagnosis>,
    #[serde(skip)]
    pub notes: Vec<ClinicalNote>,
}

/// Row of `Movimientos.csv`: a transfer between services or units.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Movement {
    #[serde(rename = "id_episodio", deserialize_with = "id")]
    pub episode_id: String,
    #[serde(rename = "servicio_medico", default, deserialize_with = "opt_text")]
    pub service: Option<String>,
    #[serde(rename = "unidad_tratamiento", default, deserialize_with = "opt_text")]
    pub unit: Option<String>,
}

/// Row of `Diagnosticos.csv`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Diagnosis {
    #[serde(rename = "id_episodio", deserialize_with = "id")]
    pub episode_id: String,
    /// Diagnosis description (already mapped from its code upstream).
    #[serde(rename = "diagnostico", default, deserialize_with = "opt_text")]
    pub label: Option<String>,
    #[serde(rename = "indica_diag_principal", default, deserialize_with = "flag")]
    pub principal: bool,
    #[serde(rename = "indica_motivo_consulta", default, deserialize_with = "flag")]
    pub consultation_reason: bool,
}

/// Row of `Textos.csv`.
///
/// `clinical_text` is the free text attached to an episode; `note` is an
/// individual clinical note. Either may be absent.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ClinicalNote {
    #[serde(rename = "id_paciente", deserialize_with = "id")]
    pub patient_id: String,
    #[serde(rename = "id_episodio", default, deserialize_with = "id")]
    pub episode_id: String,
    #[serde(rename = "texto_clinico", default, deserialize_with = "opt_text")]
    pub clinical_text: Option<String>,
    #[serde(rename = "texto_nota", default, deserialize_with = "opt_text")]
    pub note: Option<String>,
}

/// Canonical form of an identifier.
///
/// Numeric ids exported through a float column come back as `"1234.0"`;
/// the decimal part is stripped so they match their integer spelling.
/// Anything else is returned trimmed.
///
/// ```rust
/// use clinical_summary::models::canonical_id;
///
/// assert_eq!(canonical_id("1234.0"), "1234");
/// assert_eq!(canonical_id(" 77 "), "77");
/// assert_eq!(canonical_id("12.5"), "12.5");
/// ```
pub fn canonical_id(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.split_once('.') {
        Some((int, frac))
            if !int.is_empty()
                && int.chars().all(|c| c.is_ascii_digit())
                && frac.chars().all(|c| c == '0') =>
        {
            int.to_string()
        }
        _ => trimmed.to_string(),
    }
}

fn id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.map(|s| canonical_id(&s)).unwrap_or_default())
}

fn opt_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && s != "NaN" && s != "NaT"))
}

/// `Si` (or the raw `X` marker) means set.
fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(matches!(raw.as_deref().map(str::trim), Some("Si") | Some("X")))
}
