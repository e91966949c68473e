//! The per-patient summary pipeline.
//!
//! One run moves through a fixed sequence of stages:
//!
//! ```text
//! ServiceCheck → DataLoad → Structure → PrepareText → Index → Retrieve → Generate → Persist
//! ```
//!
//! Failures up to and including Index abort the run without writing a
//! report. From Retrieve on, failures degrade: an unusable retrieval counts
//! as no context, and a failed or skipped generation puts a placeholder in
//! place of the narrative. The report is then written all the same, so the
//! identification block and the timeline are always delivered once the
//! patient has been indexed.
//!
//! A patient missing from the patient table ends the run as
//! [`RunOutcome::PatientNotFound`], distinct from an abort.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::NaiveDate;
use clinical_summary_core::chunk::chunk_text;
use clinical_summary_core::index::PatientIndex;
use clinical_summary_core::retrieve::Retriever;
use clinical_summary_core::store::memory::InMemoryStore;
use clinical_summary_core::store::CollectionStore;
use clinical_summary_core::CoreError;

use crate::config::Config;
use crate::dataset::Dataset;
use crate::embedding::{create_provider, EmbeddingProvider};
use crate::error::PipelineError;
use crate::generation::{ensure_running, GenerationService, OllamaGenerator};
use crate::models::canonical_id;
use crate::narrative::{generate_narrative, Narrative};
use crate::report::{report_path, write_report, Report};
use crate::structure::{episode_timeline, identification_block};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ServiceCheck,
    DataLoad,
    Structure,
    PrepareText,
    Index,
    Retrieve,
    Generate,
    Persist,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::ServiceCheck => "service-check",
            Stage::DataLoad => "data-load",
            Stage::Structure => "structure",
            Stage::PrepareText => "prepare-text",
            Stage::Index => "index",
            Stage::Retrieve => "retrieve",
            Stage::Generate => "generate",
            Stage::Persist => "persist",
        };
        f.write_str(name)
    }
}

/// Terminal outcome of one run.
#[derive(Debug)]
pub enum RunOutcome {
    /// The run reached Persist. `report_path` is where the report was
    /// written (see [`PipelineRun::persist_error`] for a failed write).
    Success { report_path: PathBuf },
    PatientNotFound,
    /// The run stopped at `stage`; no report was written.
    Aborted { stage: Stage, error: PipelineError },
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Success { .. })
    }
}

/// Where the source segments came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextSource {
    /// One segment per clinical note.
    Notes,
    /// Episode free text split by the chunker.
    Chunked,
}

/// Result of the Retrieve stage.
#[derive(Debug)]
pub enum Retrieval {
    Found(Vec<String>),
    Empty,
    Failed(CoreError),
}

impl Retrieval {
    fn from_result(result: Result<Vec<String>, CoreError>) -> Self {
        match result {
            Ok(chunks) if chunks.is_empty() => Retrieval::Empty,
            Ok(chunks) => Retrieval::Found(chunks),
            Err(e) => Retrieval::Failed(e),
        }
    }

    /// Segments usable as context; empty unless `Found`.
    pub fn chunks(&self) -> &[String] {
        match self {
            Retrieval::Found(chunks) => chunks,
            Retrieval::Empty | Retrieval::Failed(_) => &[],
        }
    }
}

/// Everything one run produced, up to the stage it stopped at.
#[derive(Debug)]
pub struct PipelineRun {
    pub patient_id: String,
    /// Last stage entered.
    pub stage: Stage,
    pub identification: Option<String>,
    pub timeline: Option<String>,
    pub text_source: Option<TextSource>,
    pub indexed: Option<usize>,
    pub retrieval: Option<Retrieval>,
    pub narrative: Option<Narrative>,
    /// A failed report write. Does not change the outcome.
    pub persist_error: Option<PipelineError>,
    pub outcome: RunOutcome,
}

/// Fixed query used to select the context for the narrative.
pub fn summary_query(patient_id: &str) -> String {
    format!(
        "General clinical summary of patient {}, including clinical course, relevant history, and active problems.",
        patient_id
    )
}

pub struct Pipeline {
    config: Config,
    generator: Arc<dyn GenerationService>,
    index: PatientIndex,
    retriever: Retriever,
}

impl Pipeline {
    pub fn new(
        config: Config,
        store: Arc<dyn CollectionStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn GenerationService>,
    ) -> Self {
        let index = PatientIndex::new(store, embedder).with_batch_size(config.embedding.batch_size);
        let retriever = Retriever::for_index(&index);
        Self {
            config,
            generator,
            index,
            retriever,
        }
    }

    /// Pipeline backed by an in-memory store and the configured Ollama
    /// services.
    pub fn from_config(config: Config) -> Result<Self> {
        let embedder = create_provider(&config.embedding)?;
        let generator = Arc::new(OllamaGenerator::new(&config.generation)?);
        Ok(Self::new(
            config,
            Arc::new(InMemoryStore::new()),
            embedder,
            generator,
        ))
    }

    /// Run the pipeline and return only its outcome.
    pub async fn run_pipeline(&self, patient_id: &str) -> RunOutcome {
        self.run(patient_id).await.outcome
    }

    pub async fn run(&self, patient_id: &str) -> PipelineRun {
        let today = chrono::Local::now().date_naive();
        self.run_on(patient_id, today).await
    }

    /// Run with a fixed reference date for age computation.
    ///
    /// `patient_id` is canonicalised like the dataset ids, so `1001.0`
    /// and `1001` name the same patient.
    pub async fn run_on(&self, patient_id: &str, today: NaiveDate) -> PipelineRun {
        let patient_id = canonical_id(patient_id);
        let patient_id = patient_id.as_str();
        let mut run = PipelineRun {
            patient_id: patient_id.to_string(),
            stage: Stage::ServiceCheck,
            identification: None,
            timeline: None,
            text_source: None,
            indexed: None,
            retrieval: None,
            narrative: None,
            persist_error: None,
            outcome: RunOutcome::PatientNotFound,
        };

        match self.execute(&mut run, today).await {
            Ok(outcome) => run.outcome = outcome,
            Err(error) => {
                if error.is_expected_input() {
                    tracing::warn!(patient_id, stage = %run.stage, %error, "nothing to summarize");
                } else {
                    tracing::error!(patient_id, stage = %run.stage, %error, "pipeline aborted");
                }
                run.outcome = match error {
                    PipelineError::PatientNotFound(_) => RunOutcome::PatientNotFound,
                    error => RunOutcome::Aborted {
                        stage: run.stage,
                        error,
                    },
                };
            }
        }
        run
    }

    async fn execute(
        &self,
        run: &mut PipelineRun,
        today: NaiveDate,
    ) -> Result<RunOutcome, PipelineError> {
        let patient_id = run.patient_id.clone();
        let patient_id = patient_id.as_str();

        enter(run, Stage::ServiceCheck);
        let wait = Duration::from_secs(self.config.generation.startup_wait_secs);
        ensure_running(self.generator.as_ref(), wait).await?;

        enter(run, Stage::DataLoad);
        let dataset = Dataset::load(&self.config.data.dir)?;

        enter(run, Stage::Structure);
        let record = dataset
            .clinical_record(patient_id)
            .ok_or_else(|| PipelineError::PatientNotFound(patient_id.to_string()))?;
        let identification = identification_block(&record.patient, today);
        let timeline = episode_timeline(&record.episodes);
        run.identification = Some(identification.clone());
        run.timeline = Some(timeline.clone());

        enter(run, Stage::PrepareText);
        let (source, documents) = self.prepare_text(&dataset, patient_id)?;
        tracing::info!(patient_id, source = ?source, segments = documents.len(), "prepared text");
        run.text_source = Some(source);

        enter(run, Stage::Index);
        let indexed = self.index.index(patient_id, &documents).await?;
        run.indexed = Some(indexed);

        enter(run, Stage::Retrieve);
        let retrieval = Retrieval::from_result(
            self.retriever
                .retrieve(patient_id, &summary_query(patient_id), self.config.retrieval.top_k)
                .await,
        );
        match &retrieval {
            Retrieval::Found(chunks) => tracing::info!(patient_id, retrieved = chunks.len(), "retrieved context"),
            Retrieval::Empty => tracing::warn!(patient_id, "no context retrieved"),
            Retrieval::Failed(e) => tracing::warn!(patient_id, error = %e, "retrieval failed, continuing without context"),
        }

        enter(run, Stage::Generate);
        let narrative = generate_narrative(self.generator.as_ref(), retrieval.chunks()).await;

        enter(run, Stage::Persist);
        let report = Report {
            identification,
            timeline,
            narrative: narrative.text().to_string(),
            segments: retrieval.chunks().to_vec(),
        };
        let output_dir = &self.config.output.dir;
        let report_path = match write_report(output_dir, patient_id, &report) {
            Ok(path) => {
                tracing::info!(patient_id, path = %path.display(), "report written");
                path
            }
            Err(e) => {
                tracing::warn!(patient_id, error = %e, "failed to write report");
                run.persist_error = Some(e);
                report_path(output_dir, patient_id)
            }
        };

        run.retrieval = Some(retrieval);
        run.narrative = Some(narrative);
        Ok(RunOutcome::Success { report_path })
    }

    /// One document per clinical note when the patient has notes, else the
    /// episodes' free text through the chunker.
    fn prepare_text(
        &self,
        dataset: &Dataset,
        patient_id: &str,
    ) -> Result<(TextSource, Vec<String>), PipelineError> {
        let notes = dataset.patient_notes(patient_id);
        if !notes.is_empty() {
            return Ok((TextSource::Notes, notes));
        }

        let free_text = dataset
            .clinical_record(patient_id)
            .map(|r| r.free_text())
            .unwrap_or_default();
        let segments = chunk_text(patient_id, &free_text, self.config.chunking.max_length)?;
        if segments.is_empty() {
            return Err(PipelineError::NoTextAvailable(patient_id.to_string()));
        }
        Ok((
            TextSource::Chunked,
            segments.into_iter().map(|s| s.text).collect(),
        ))
    }
}

fn enter(run: &mut PipelineRun, stage: Stage) {
    run.stage = stage;
    tracing::info!(patient_id = %run.patient_id, %stage, "entering stage");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_query_names_patient() {
        assert_eq!(
            summary_query("1001"),
            "General clinical summary of patient 1001, including clinical course, relevant history, and active problems."
        );
    }

    #[test]
    fn test_retrieval_classification() {
        assert!(matches!(Retrieval::from_result(Ok(vec![])), Retrieval::Empty));
        let found = Retrieval::from_result(Ok(vec!["a".to_string()]));
        assert_eq!(found.chunks(), ["a".to_string()]);
        let failed = Retrieval::from_result(Err(CoreError::Retrieval {
            patient_id: "1".into(),
            reason: "down".into(),
        }));
        assert!(failed.chunks().is_empty());
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::PrepareText.to_string(), "prepare-text");
        assert_eq!(Stage::ServiceCheck.to_string(), "service-check");
    }
}
