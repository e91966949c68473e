//! Structured report blocks built directly from the tables.
//!
//! [`identification_block`] renders the patient's demographic data and
//! [`episode_timeline`] lists their episodes chronologically. Both are plain
//! text, one fact per line, in Catalan as they appear in the report.

use chrono::{Datelike, NaiveDate};

use crate::models::{ClinicalEpisode, PatientRecord};

const UNKNOWN_AGE: &str = "Desconeguda";
const NOT_AVAILABLE: &str = "No disponible";
const ONGOING: &str = "en curs";
const UNKNOWN_TYPE: &str = "Desconegut";

/// Parse the date part of a `YYYY-MM-DD[ HH:MM:SS]` value.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let date_part = value.trim().get(..10)?;
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

/// Whole years between `birth` and `today`.
pub fn age_on(birth: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - birth.year();
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        age -= 1;
    }
    age
}

/// `1`/`Home` is male, `2`/`Dona` is female; other values pass through.
pub fn sex_label(raw: Option<&str>) -> String {
    match raw.map(str::trim) {
        Some("1") | Some("Home") => "Home".to_string(),
        Some("2") | Some("Dona") => "Dona".to_string(),
        Some(other) if !other.is_empty() => other.to_string(),
        _ => NOT_AVAILABLE.to_string(),
    }
}

/// The `DADES IDENTIFICATIVES` block. The death date line only appears
/// when a death date is recorded.
pub fn identification_block(patient: &PatientRecord, today: NaiveDate) -> String {
    let age = patient
        .birth_date
        .as_deref()
        .and_then(parse_date)
        .map(|birth| age_on(birth, today).to_string())
        .unwrap_or_else(|| UNKNOWN_AGE.to_string());

    let mut lines = vec![
        format!("ID pacient: {}", patient.id),
        format!("Edat: {}", age),
        format!("Sexe: {}", sex_label(patient.sex.as_deref())),
        format!(
            "Data de naixement: {}",
            patient.birth_date.as_deref().unwrap_or(NOT_AVAILABLE)
        ),
    ];
    if let Some(death) = &patient.death_date {
        lines.push(format!("Data de defunció: {}", death));
    }
    lines.join("\n")
}

/// The `LÍNIA TEMPORAL D'EPISODIS` block: one line per episode, ascending
/// by start date. Episodes with an unreadable start date follow the dated
/// ones, then those with no start date at all, each group in table order.
pub fn episode_timeline<'a, I>(episodes: I) -> String
where
    I: IntoIterator<Item = &'a ClinicalEpisode>,
{
    let mut episodes: Vec<&ClinicalEpisode> = episodes.into_iter().collect();
    episodes.sort_by(|a, b| {
        let key = |e: &ClinicalEpisode| {
            let date = e.start.as_deref().and_then(parse_date);
            (date.is_none(), date, e.start.is_none())
        };
        key(*a).cmp(&key(*b))
    });

    episodes
        .iter()
        .map(|ep| {
            format!(
                "- {} -> {} | Tipus: {} | ID Episodi: {}",
                ep.start.as_deref().unwrap_or(NOT_AVAILABLE),
                ep.end.as_deref().unwrap_or(ONGOING),
                ep.episode_type.as_deref().unwrap_or(UNKNOWN_TYPE),
                ep.id
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patient(birth: Option<&str>, death: Option<&str>) -> PatientRecord {
        PatientRecord {
            id: "1001".to_string(),
            sex: Some("1".to_string()),
            birth_date: birth.map(str::to_string),
            death_date: death.map(str::to_string),
            nationality: None,
        }
    }

    fn episode(id: &str, start: Option<&str>, end: Option<&str>) -> ClinicalEpisode {
        ClinicalEpisode {
            id: id.to_string(),
            patient_id: "1001".to_string(),
            start: start.map(str::to_string),
            end: end.map(str::to_string),
            episode_type: Some("Urgències".to_string()),
            movements: Vec::new(),
            diagnoses: Vec::new(),
            notes: Vec::new(),
        }
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_age_before_and_after_birthday() {
        let birth = date("1950-06-15");
        assert_eq!(age_on(birth, date("2024-06-14")), 73);
        assert_eq!(age_on(birth, date("2024-06-15")), 74);
    }

    #[test]
    fn test_parse_date_accepts_timestamps() {
        assert_eq!(parse_date("2020-01-10 08:30:00"), Some(date("2020-01-10")));
        assert_eq!(parse_date("not a date"), None);
        assert_eq!(parse_date("2020"), None);
    }

    #[test]
    fn test_identification_block_lines() {
        let block = identification_block(&patient(Some("1950-06-15"), None), date("2024-06-15"));
        assert_eq!(
            block,
            "ID pacient: 1001\nEdat: 74\nSexe: Home\nData de naixement: 1950-06-15"
        );
    }

    #[test]
    fn test_identification_block_death_and_unknown_age() {
        let block = identification_block(&patient(None, Some("2023-01-05")), date("2024-01-01"));
        assert!(block.contains("Edat: Desconeguda"));
        assert!(block.contains("Data de naixement: No disponible"));
        assert!(block.ends_with("Data de defunció: 2023-01-05"));
    }

    #[test]
    fn test_timeline_sorted_with_ongoing_marker() {
        let episodes = vec![
            episode("E3", None, None),
            episode("E2", Some("2021-05-01"), None),
            episode("E1", Some("2020-01-10"), Some("2020-01-15")),
        ];
        let timeline = episode_timeline(&episodes);
        let lines: Vec<&str> = timeline.lines().collect();
        assert_eq!(
            lines[0],
            "- 2020-01-10 -> 2020-01-15 | Tipus: Urgències | ID Episodi: E1"
        );
        assert_eq!(lines[1], "- 2021-05-01 -> en curs | Tipus: Urgències | ID Episodi: E2");
        assert!(lines[2].ends_with("ID Episodi: E3"));
    }

    #[test]
    fn test_timeline_puts_unreadable_dates_after_dated_episodes() {
        let episodes = vec![
            episode("E9", None, None),
            episode("E8", Some("pendent"), None),
            episode("E7", Some("2022-03-01"), None),
            episode("E6", Some("2019-12-31"), None),
        ];
        let timeline = episode_timeline(&episodes);
        let ids: Vec<&str> = timeline
            .lines()
            .map(|l| l.rsplit(": ").next().unwrap())
            .collect();
        assert_eq!(ids, vec!["E6", "E7", "E8", "E9"]);
    }

    #[test]
    fn test_sex_label_mapping() {
        assert_eq!(sex_label(Some("2")), "Dona");
        assert_eq!(sex_label(Some("Home")), "Home");
        assert_eq!(sex_label(None), "No disponible");
    }
}
