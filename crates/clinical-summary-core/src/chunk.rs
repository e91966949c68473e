//! Sentence-boundary text chunker.
//!
//! Splits a patient's aggregated free text into [`TextSegment`]s whose
//! length stays under a configurable `max_length` (in characters). It is
//! the fallback path of text preparation, used when a patient has no
//! individual notes to index one by one.
//!
//! # Algorithm
//!
//! 1. Split the text on the literal sentence delimiter `". "`.
//! 2. Append sentences (with the delimiter that followed them in the input)
//!    to an accumulator while `len(accumulator) + len(sentence) < max_length`.
//! 3. Otherwise flush the trimmed accumulator as a segment and start a new
//!    accumulator with the current sentence.
//! 4. Flush whatever remains once the input is exhausted.
//!
//! A single sentence longer than `max_length` is kept whole; the length is a
//! heuristic bound, not a hard cap, and nothing is guaranteed about token or
//! word boundaries.
//!
//! # Example
//!
//! ```rust
//! use clinical_summary_core::chunk::chunk_text;
//!
//! let segments = chunk_text("1001", "A. B. C.", 5).unwrap();
//! let texts: Vec<&str> = segments.iter().map(|s| s.text.as_str()).collect();
//! assert_eq!(texts, vec!["A. B.", "C."]);
//! ```

use crate::error::CoreError;
use crate::models::TextSegment;

/// Approximation of a sentence boundary.
const SENTENCE_DELIMITER: &str = ". ";

/// Split `text` into ordered segments for `patient_id`.
///
/// Positions are contiguous starting at 0. Empty or whitespace-only input
/// yields no segments; input without a delimiter yields exactly one segment
/// equal to the trimmed input.
///
/// # Errors
///
/// [`CoreError::InvalidArgument`] when `max_length` is 0.
pub fn chunk_text(
    patient_id: &str,
    text: &str,
    max_length: usize,
) -> Result<Vec<TextSegment>, CoreError> {
    if max_length == 0 {
        return Err(CoreError::InvalidArgument(
            "max_length must be > 0".to_string(),
        ));
    }

    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let sentences: Vec<&str> = text.split(SENTENCE_DELIMITER).collect();
    let last = sentences.len() - 1;

    let mut segments = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for (i, sentence) in sentences.iter().enumerate() {
        let sentence_len = sentence.chars().count();

        if current_len + sentence_len >= max_length && !current.trim().is_empty() {
            push_segment(&mut segments, patient_id, &current);
            current.clear();
            current_len = 0;
        }

        current.push_str(sentence);
        current_len += sentence_len;
        if i < last {
            current.push_str(SENTENCE_DELIMITER);
            current_len += SENTENCE_DELIMITER.len();
        }
    }

    if !current.trim().is_empty() {
        push_segment(&mut segments, patient_id, &current);
    }

    Ok(segments)
}

fn push_segment(segments: &mut Vec<TextSegment>, patient_id: &str, text: &str) {
    let position = segments.len();
    segments.push(TextSegment::new(patient_id, position, text.trim()));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(segments: &[TextSegment]) -> Vec<&str> {
        segments.iter().map(|s| s.text.as_str()).collect()
    }

    #[test]
    fn test_sentences_grouped_under_limit() {
        let segments = chunk_text("p1", "A. B. C.", 5).unwrap();
        assert_eq!(texts(&segments), vec!["A. B.", "C."]);
    }

    #[test]
    fn test_empty_text() {
        assert!(chunk_text("p1", "", 512).unwrap().is_empty());
        assert!(chunk_text("p1", "   \n ", 512).unwrap().is_empty());
    }

    #[test]
    fn test_no_delimiter_single_trimmed_segment() {
        let segments = chunk_text("p1", "  Pacient estable sense incidències  ", 512).unwrap();
        assert_eq!(texts(&segments), vec!["Pacient estable sense incidències"]);
        assert_eq!(segments[0].position, 0);
        assert_eq!(segments[0].patient_id, "p1");
    }

    #[test]
    fn test_zero_max_length_rejected() {
        let err = chunk_text("p1", "A. B.", 0).unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument(_)));
    }

    #[test]
    fn test_oversized_sentence_kept_whole() {
        let segments = chunk_text("p1", "Short. A much longer sentence here. End", 10).unwrap();
        assert_eq!(
            texts(&segments),
            vec!["Short.", "A much longer sentence here.", "End"]
        );
    }

    #[test]
    fn test_positions_contiguous() {
        let text = (0..40)
            .map(|i| format!("Sentence number {}", i))
            .collect::<Vec<_>>()
            .join(". ");
        let segments = chunk_text("p1", &text, 40).unwrap();
        assert!(segments.len() > 1);
        for (i, s) in segments.iter().enumerate() {
            assert_eq!(s.position, i, "Position mismatch at {}", i);
            assert!(!s.text.is_empty());
        }
    }

    #[test]
    fn test_length_counted_in_characters() {
        // Each sentence is 4 chars but 8 bytes; a byte count would split here.
        let segments = chunk_text("p1", "àèìò. àèìò", 12).unwrap();
        assert_eq!(texts(&segments), vec!["àèìò. àèìò"]);
    }

    #[test]
    fn test_no_text_lost() {
        let text = "Dolor toràcic. ECG normal. Troponines negatives. Alta a domicili.";
        let segments = chunk_text("p1", text, 20).unwrap();
        let rejoined = texts(&segments).join(" ");
        assert_eq!(rejoined, text);
    }
}
