//! Video Insight - A Rust CLI tool for analyzing video content
//!
//! This library extracts a transcript from a video (YouTube URL or local file),
//! derives sentiment and tone, and distills three key points using external
//! speech-to-text and chat-completion services.

pub mod acquisition;
pub mod cli;
pub mod config;
pub mod llm;
pub mod output;
pub mod pipeline;
pub mod transcription;
pub mod utils;

pub use cli::{Cli, Commands, ReportFormat};
pub use config::Config;
pub use pipeline::{AnalysisPipeline, AnalysisReport, RunState, RunStatus, VideoLocator};
pub use transcription::{TranscriptSource, TranscriptionResult, TranscriptionService};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Error types specific to the analyzer
#[derive(thiserror::Error, Debug)]
pub enum AnalyzerError {
    #[error("Invalid video reference: {0}")]
    Validation(String),

    #[error("DownloadError while downloading audio: {0}")]
    DownloadFailed(String),

    #[error("Error while acquiring audio: {0}")]
    Acquisition(String),

    #[error("Error while transcribing audio: {0}")]
    Transcription(String),

    #[error("Error during analysis: {0}")]
    Analysis(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("No transcript available")]
    NoTranscript,
}

/// Coarse failure classification the embedding layer maps to status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Bad input reference, rejected before the pipeline ran
    Validation,
    /// A pipeline stage failed or was deliberately skipped
    Processing,
    /// Anything that escaped the stage boundaries
    Internal,
}

impl AnalyzerError {
    pub fn failure_class(&self) -> FailureClass {
        match self {
            AnalyzerError::Validation(_) => FailureClass::Validation,
            AnalyzerError::DownloadFailed(_)
            | AnalyzerError::Acquisition(_)
            | AnalyzerError::Transcription(_)
            | AnalyzerError::Analysis(_)
            | AnalyzerError::Timeout(_)
            | AnalyzerError::NoTranscript => FailureClass::Processing,
        }
    }
}
