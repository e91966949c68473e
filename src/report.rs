//! The persisted report artifact.
//!
//! One plain-text file per patient, `output_informe_{id}.txt`, with three
//! fixed section headers followed by the segments the narrative was
//! generated from. [`parse_report`] reads the sections back for the
//! reporting layer.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::error::PipelineError;

pub const IDENTIFICATION_HEADER: &str = "DADES IDENTIFICATIVES";
pub const TIMELINE_HEADER: &str = "LÍNIA TEMPORAL D'EPISODIS";
pub const SUMMARY_HEADER: &str = "RESUM CLÍNIC ESTRUCTURAT";
pub const SEGMENTS_MARKER: &str = "--- CHUNKS UTILITZATS PER GENERAR EL RESUM ---";

/// Content of one report, in render order.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub identification: String,
    pub timeline: String,
    pub narrative: String,
    /// Retrieved segments shown under the narrative. Omitted when empty.
    pub segments: Vec<String>,
}

impl Report {
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "\n\n\n\n{}\n{}\n\n\n\n",
            IDENTIFICATION_HEADER, self.identification
        ));
        out.push_str(&format!("\n\n\n\n{}\n{}\n\n\n\n", TIMELINE_HEADER, self.timeline));
        out.push_str(&format!("{}{}\n", SUMMARY_HEADER, self.narrative));

        if !self.segments.is_empty() {
            out.push_str(&format!("\n\n{}\n", SEGMENTS_MARKER));
            for (i, segment) in self.segments.iter().enumerate() {
                out.push_str(&format!("\nCHUNK {}:\n{}\n", i + 1, segment));
            }
        }
        out
    }
}

pub fn report_path(dir: &Path, patient_id: &str) -> PathBuf {
    dir.join(format!("output_informe_{}.txt", patient_id))
}

/// Write (or overwrite) the patient's report and return its path.
pub fn write_report(dir: &Path, patient_id: &str, report: &Report) -> Result<PathBuf, PipelineError> {
    let path = report_path(dir, patient_id);
    let persist_err = |source| PipelineError::Persistence {
        path: path.clone(),
        source,
    };

    std::fs::create_dir_all(dir).map_err(persist_err)?;
    std::fs::write(&path, report.render()).map_err(persist_err)?;
    Ok(path)
}

/// The three sections of a report as read back from disk, plus the
/// segments listed under them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportSections {
    pub identification: String,
    pub timeline: String,
    pub summary: String,
    pub segments: Vec<String>,
}

fn header_patterns() -> &'static [Regex; 3] {
    static PATTERNS: OnceLock<[Regex; 3]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            Regex::new(r"(?m)^DADES IDENTIFICATIVES").expect("valid regex"),
            Regex::new(r"(?m)^LÍNIA TEMPORAL D['’]EPISODIS").expect("valid regex"),
            Regex::new(r"(?m)^RESUM CL[ÍI]NIC(?: ESTRUCTURAT)?").expect("valid regex"),
        ]
    })
}

fn segments_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?m)^--- CHUNKS UTILITZATS").expect("valid regex"))
}

fn segment_header() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?m)^CHUNK \d+:[ \t]*$").expect("valid regex"))
}

fn bullet_break() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\*\s*\n").expect("valid regex"))
}

/// Split report text into its sections.
///
/// A section starts after its header and runs up to the next later header,
/// the segment listing, or the end of the text. A missing header gives an
/// empty section. Bullets broken across lines (`*` then a newline) are
/// rejoined. Segments are read from the `CHUNK n:` listing, in order.
pub fn parse_report(text: &str) -> ReportSections {
    let patterns = header_patterns();
    let mut blocks: [String; 3] = Default::default();

    for (i, pattern) in patterns.iter().enumerate() {
        let Some(found) = pattern.find(text) else {
            continue;
        };
        let start = found.end();
        let rest = &text[start..];

        let end = patterns[i + 1..]
            .iter()
            .chain(std::iter::once(segments_pattern()))
            .filter_map(|p| p.find(rest).map(|m| m.start()))
            .min()
            .unwrap_or(rest.len());

        let block = rest[..end].trim();
        blocks[i] = bullet_break().replace_all(block, "* ").into_owned();
    }

    let [identification, timeline, summary] = blocks;
    ReportSections {
        identification,
        timeline,
        summary,
        segments: parse_segments(text),
    }
}

fn parse_segments(text: &str) -> Vec<String> {
    let Some(marker) = segments_pattern().find(text) else {
        return Vec::new();
    };
    let listing = &text[marker.end()..];

    let headers: Vec<_> = segment_header().find_iter(listing).collect();
    headers
        .iter()
        .enumerate()
        .map(|(i, header)| {
            let end = headers.get(i + 1).map_or(listing.len(), |next| next.start());
            listing[header.end()..end].trim().to_string()
        })
        .collect()
}

/// Read a persisted report back. `Ok(None)` when the patient has none.
pub fn read_report(dir: &Path, patient_id: &str) -> Result<Option<ReportSections>, PipelineError> {
    let path = report_path(dir, patient_id);
    match std::fs::read_to_string(&path) {
        Ok(text) => Ok(Some(parse_report(&text))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(PipelineError::Persistence { path, source }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn report() -> Report {
        Report {
            identification: "ID pacient: 1001\nEdat: 74".to_string(),
            timeline: "- 2020-01-10 -> en curs | Tipus: Urgències | ID Episodi: E1".to_string(),
            narrative: " Pacient estable.".to_string(),
            segments: vec!["Nota u.".to_string(), "Nota dos.".to_string()],
        }
    }

    #[test]
    fn test_render_layout() {
        let text = report().render();
        assert!(text.starts_with("\n\n\n\nDADES IDENTIFICATIVES\nID pacient: 1001"));
        assert!(text.contains("\n\n\n\n\n\n\n\nLÍNIA TEMPORAL D'EPISODIS\n"));
        assert!(text.contains("RESUM CLÍNIC ESTRUCTURAT Pacient estable.\n"));
        assert!(text.ends_with(
            "\n\n--- CHUNKS UTILITZATS PER GENERAR EL RESUM ---\n\nCHUNK 1:\nNota u.\n\nCHUNK 2:\nNota dos.\n"
        ));

        let id = text.find(IDENTIFICATION_HEADER).unwrap();
        let tl = text.find(TIMELINE_HEADER).unwrap();
        let sm = text.find(SUMMARY_HEADER).unwrap();
        assert!(id < tl && tl < sm);
    }

    #[test]
    fn test_render_without_segments_has_no_listing() {
        let mut r = report();
        r.segments.clear();
        assert!(!r.render().contains(SEGMENTS_MARKER));
    }

    #[test]
    fn test_parse_rendered_report() {
        let sections = parse_report(&report().render());
        assert_eq!(sections.identification, "ID pacient: 1001\nEdat: 74");
        assert_eq!(
            sections.timeline,
            "- 2020-01-10 -> en curs | Tipus: Urgències | ID Episodi: E1"
        );
        assert_eq!(sections.summary, "Pacient estable.");
        assert_eq!(sections.segments, vec!["Nota u.", "Nota dos."]);
    }

    #[test]
    fn test_parse_multiline_segments() {
        let mut r = report();
        r.segments = vec!["Línia u.\nLínia dos.".to_string(), "Final.".to_string()];
        let sections = parse_report(&r.render());
        assert_eq!(sections.segments, vec!["Línia u.\nLínia dos.", "Final."]);
    }

    #[test]
    fn test_parse_report_without_listing_has_no_segments() {
        let mut r = report();
        r.segments.clear();
        assert!(parse_report(&r.render()).segments.is_empty());
    }

    #[test]
    fn test_parse_accepts_heading_variants_and_fixes_bullets() {
        let text = "DADES IDENTIFICATIVES\nID pacient: 7\n\
                    LÍNIA TEMPORAL D’EPISODIS\n- cap\n\
                    RESUM CLINIC\n*\nAsma controlada";
        let sections = parse_report(text);
        assert_eq!(sections.identification, "ID pacient: 7");
        assert_eq!(sections.timeline, "- cap");
        assert_eq!(sections.summary, "* Asma controlada");
    }

    #[test]
    fn test_parse_missing_header_gives_empty_section() {
        let sections = parse_report("DADES IDENTIFICATIVES\nID pacient: 7\n");
        assert_eq!(sections.identification, "ID pacient: 7");
        assert!(sections.timeline.is_empty());
        assert!(sections.summary.is_empty());
    }

    #[test]
    fn test_write_then_read_and_overwrite() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("informes");

        assert!(read_report(&out, "1001").unwrap().is_none());

        let path = write_report(&out, "1001", &report()).unwrap();
        assert_eq!(path, out.join("output_informe_1001.txt"));

        let mut second = report();
        second.narrative = " Alta.".to_string();
        write_report(&out, "1001", &second).unwrap();

        let sections = read_report(&out, "1001").unwrap().unwrap();
        assert_eq!(sections.summary, "Alta.");
    }
}
