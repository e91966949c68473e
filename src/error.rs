use std::path::PathBuf;

use clinical_summary_core::CoreError;

/// Errors surfaced by the pipeline stages.
///
/// [`PatientNotFound`](PipelineError::PatientNotFound) and
/// [`NoTextAvailable`](PipelineError::NoTextAvailable) describe inputs with
/// nothing to summarize; every other variant is a backend or internal
/// failure. See [`PipelineError::is_expected_input`].
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("generation service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("failed to load dataset table {table}: {reason}")]
    DatasetLoad { table: String, reason: String },
    #[error("patient '{0}' not found")]
    PatientNotFound(String),
    #[error("no clinical text available for patient '{0}'")]
    NoTextAvailable(String),
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("generation failed: {0}")]
    Generation(String),
    #[error("failed to write report {path}: {source}", path = path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    /// True for outcomes caused by the input having nothing to summarize,
    /// as opposed to a failing backend.
    pub fn is_expected_input(&self) -> bool {
        matches!(
            self,
            PipelineError::PatientNotFound(_) | PipelineError::NoTextAvailable(_)
        )
    }
}
