/// Errors raised by the core chunking, indexing and retrieval operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("indexing failed for patient {patient_id}: {reason}")]
    Indexing { patient_id: String, reason: String },
    #[error("retrieval failed for patient {patient_id}: {reason}")]
    Retrieval { patient_id: String, reason: String },
}

impl CoreError {
    pub(crate) fn indexing(patient_id: &str, reason: impl std::fmt::Display) -> Self {
        CoreError::Indexing {
            patient_id: patient_id.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn retrieval(patient_id: &str, reason: impl std::fmt::Display) -> Self {
        CoreError::Retrieval {
            patient_id: patient_id.to_string(),
            reason: reason.to_string(),
        }
    }
}
