//! # Clinical Summary
//!
//! Per-patient clinical summaries from tabular hospital records and
//! clinical notes, generated with retrieval-augmented generation.
//!
//! For one patient the pipeline loads the preprocessed CSV dataset, builds
//! a structured identification block and an episode timeline, indexes the
//! patient's clinical text as an isolated collection, retrieves the most
//! relevant segments and asks a local language model for a narrative
//! summary. Everything is written to a plain-text report.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌─────────────┐   ┌──────────────┐   ┌─────────────┐
//! │  Dataset   │──▶│  Structure  │──▶│ Index (core) │──▶│  Retrieve   │
//! │  5 × CSV   │   │  + Prepare  │   │ per patient  │   │   top-k     │
//! └────────────┘   └─────────────┘   └──────────────┘   └──────┬──────┘
//!                                                              │
//!                          ┌──────────────┐   ┌──────────────┐ │
//!                          │    Report    │◀──│  Generation  │◀┘
//!                          │ output_*.txt │   │   (Ollama)   │
//!                          └──────────────┘   └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! csum run 1001                 # summary report for patient 1001
//! csum report 1001              # print the sections of the saved report
//! csum similar 1001             # most similar patient
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Dataset row types |
//! | [`dataset`] | CSV table loading and per-patient assembly |
//! | [`structure`] | Identification block and episode timeline |
//! | [`embedding`] | Embedding providers |
//! | [`generation`] | Generation service client |
//! | [`narrative`] | Prompt building and output cleaning |
//! | [`report`] | Report rendering, writing and parsing |
//! | [`pipeline`] | Stage sequencing and outcomes |
//! | [`patient_text`] | Aggregated text for similarity |
//! | [`similar`] | Most similar patient lookup |

pub mod config;
pub mod dataset;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod models;
pub mod narrative;
pub mod patient_text;
pub mod pipeline;
pub mod report;
pub mod similar;
pub mod structure;

pub use error::PipelineError;
pub use pipeline::{Pipeline, RunOutcome};
