use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::config::Config;
use crate::llm::{CompletionClient, OpenAiCompletionClient, Sentiment};
use crate::transcription::{language::UNKNOWN_LANGUAGE, TranscriptSource, TranscriptionService};
use crate::utils::validate_remote_url;
use crate::{AnalyzerError, FailureClass};

pub mod prompts;
pub mod stages;

/// Bounded transcript prefix sent to the completion service
pub const TRANSCRIPT_CHAR_CAP: usize = 5000;

/// Every successful report carries exactly this many key points
pub const KEY_POINT_COUNT: usize = 3;

/// Placeholder for key points the source text could not supply
pub const KEY_POINT_SENTINEL: &str = "N/A";

/// The identifying reference to a video: a remote URL or a local file path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoLocator {
    Remote(String),
    Local(PathBuf),
}

impl VideoLocator {
    /// Build a locator from the raw request fields
    ///
    /// Exactly one of the two must be set. Remote URLs must be HTTP(S) with the
    /// YouTube host marker; local paths must exist and reference an MP4 file.
    /// All rejections happen here, before the pipeline runs.
    pub fn resolve(url: Option<String>, path: Option<PathBuf>) -> Result<Self, AnalyzerError> {
        match (url, path) {
            (Some(url), None) => Ok(VideoLocator::Remote(validate_remote_url(&url)?)),
            (None, Some(path)) => {
                if !path.is_file() {
                    return Err(AnalyzerError::Validation(format!(
                        "video file does not exist: {}",
                        path.display()
                    )));
                }
                let is_mp4 = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(|e| e.eq_ignore_ascii_case("mp4"))
                    .unwrap_or(false);
                if !is_mp4 {
                    return Err(AnalyzerError::Validation(format!(
                        "video file must have .mp4 extension: {}",
                        path.display()
                    )));
                }
                Ok(VideoLocator::Local(path))
            }
            _ => Err(AnalyzerError::Validation(
                "exactly one of video URL or video file must be provided".to_string(),
            )),
        }
    }
}

impl std::fmt::Display for VideoLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VideoLocator::Remote(url) => write!(f, "{}", url),
            VideoLocator::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

impl Serialize for VideoLocator {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Lifecycle of one run; advances monotonically or terminates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Start,
    Extracted,
    Analyzed,
    Success,
    Failed,
    Skipped,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RunStatus::Start => "start",
            RunStatus::Extracted => "extracted",
            RunStatus::Analyzed => "analyzed",
            RunStatus::Success => "success",
            RunStatus::Failed => "failed",
            RunStatus::Skipped => "skipped",
        };
        write!(f, "{}", name)
    }
}

/// Mutable state owned by exactly one pipeline run
///
/// Serializes to the flat record the result sink consumes; the nested report
/// for callers lives in [`AnalysisReport`].
#[derive(Debug, Serialize)]
pub struct RunState {
    #[serde(rename = "video_locator")]
    pub locator: VideoLocator,
    pub transcript: Option<String>,
    pub title: Option<String>,
    pub duration_seconds: Option<u64>,
    pub language_code: Option<String>,
    pub sentiment: Option<Sentiment>,
    pub sentiment_score: Option<f64>,
    pub tone: Option<String>,
    pub key_points: Option<Vec<String>>,
    #[serde(skip)]
    pub report: Option<AnalysisReport>,
    pub errors: Vec<String>,
    pub status: RunStatus,
}

impl RunState {
    pub fn new(locator: VideoLocator) -> Self {
        Self {
            locator,
            transcript: None,
            title: None,
            duration_seconds: None,
            language_code: None,
            sentiment: None,
            sentiment_score: None,
            tone: None,
            key_points: None,
            report: None,
            errors: Vec::new(),
            status: RunStatus::Start,
        }
    }

    /// A halted run accepts no further mutation
    pub fn is_halted(&self) -> bool {
        !self.errors.is_empty() || matches!(self.status, RunStatus::Failed | RunStatus::Skipped)
    }

    /// Merge a stage's partial update into the run
    ///
    /// Once the run is halted the whole patch is ignored; the frozen-state
    /// invariant is enforced here rather than trusted to each stage.
    pub fn apply(&mut self, patch: StagePatch) {
        if self.is_halted() {
            return;
        }

        if let Some(transcript) = patch.transcript {
            self.transcript = Some(transcript);
        }
        if let Some(title) = patch.title {
            self.title = Some(title);
        }
        if let Some(duration) = patch.duration_seconds {
            self.duration_seconds = Some(duration);
        }
        if let Some(language) = patch.language_code {
            self.language_code = Some(language);
        }
        if let Some(sentiment) = patch.sentiment {
            self.sentiment = Some(sentiment);
        }
        if let Some(score) = patch.sentiment_score {
            self.sentiment_score = Some(score);
        }
        if let Some(tone) = patch.tone {
            self.tone = Some(tone);
        }
        if let Some(key_points) = patch.key_points {
            self.key_points = Some(key_points);
        }
        if let Some(report) = patch.report {
            self.report = Some(report);
        }
        self.errors.extend(patch.errors);
        if let Some(status) = patch.status {
            self.status = status;
        }
    }

    /// How the embedding layer should classify this run, if it failed
    pub fn failure_class(&self) -> Option<FailureClass> {
        if self.is_halted() {
            Some(FailureClass::Processing)
        } else {
            None
        }
    }
}

/// Partial update produced by one stage and merged into the run-state
#[derive(Debug, Default, Clone, PartialEq)]
pub struct StagePatch {
    pub transcript: Option<String>,
    pub title: Option<String>,
    pub duration_seconds: Option<u64>,
    pub language_code: Option<String>,
    pub sentiment: Option<Sentiment>,
    pub sentiment_score: Option<f64>,
    pub tone: Option<String>,
    pub key_points: Option<Vec<String>>,
    pub report: Option<AnalysisReport>,
    pub errors: Vec<String>,
    pub status: Option<RunStatus>,
}

/// Final nested payload returned to the caller on success
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub video_metadata: VideoMetadataBlock,
    pub analysis: AnalysisBlock,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadataBlock {
    pub title: String,
    pub duration_seconds: u64,
    pub language_code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisBlock {
    pub sentiment: Sentiment,
    pub sentiment_score: f64,
    pub tone: String,
    pub key_points: Vec<String>,
}

impl AnalysisReport {
    pub(crate) fn assemble(state: &RunState, key_points: Vec<String>) -> Self {
        Self {
            video_metadata: VideoMetadataBlock {
                title: state.title.clone().unwrap_or_default(),
                duration_seconds: state.duration_seconds.unwrap_or(0),
                language_code: state
                    .language_code
                    .clone()
                    .unwrap_or_else(|| UNKNOWN_LANGUAGE.to_string()),
            },
            analysis: AnalysisBlock {
                sentiment: state.sentiment.unwrap_or(Sentiment::Neutral),
                sentiment_score: state.sentiment_score.unwrap_or(0.0),
                tone: state.tone.clone().unwrap_or_default(),
                key_points,
            },
        }
    }
}

/// Decides whether the run proceeds to the next stage
///
/// Applied after extraction and again after sentiment analysis. The two call
/// sites share this one predicate on purpose: the halting rule is identical at
/// both transition points.
pub fn should_continue(state: &RunState) -> bool {
    !state.is_halted()
}

/// Orchestrates the three analysis stages over one run-state
pub struct AnalysisPipeline {
    transcripts: Box<dyn TranscriptSource>,
    llm: Box<dyn CompletionClient>,
}

impl AnalysisPipeline {
    pub fn new(transcripts: Box<dyn TranscriptSource>, llm: Box<dyn CompletionClient>) -> Self {
        Self { transcripts, llm }
    }

    pub fn from_config(config: &Config) -> crate::Result<Self> {
        Ok(Self::new(
            Box::new(TranscriptionService::from_config(config)?),
            Box::new(OpenAiCompletionClient::from_config(config)?),
        ))
    }

    /// Run extraction, sentiment analysis, and structuring in strict order
    ///
    /// Every stage is its own error boundary; failures surface as `errors` and
    /// `status` mutations, so this function never returns an error itself.
    pub async fn invoke(&self, locator: VideoLocator) -> RunState {
        let mut state = RunState::new(locator);
        tracing::info!(locator = %state.locator, "Pipeline run started");

        let patch = stages::extraction(self.transcripts.as_ref(), &state).await;
        state.apply(patch);
        if !should_continue(&state) {
            tracing::warn!(status = %state.status, "Pipeline halted after extraction");
            return state;
        }

        let patch = stages::sentiment(self.llm.as_ref(), &state).await;
        state.apply(patch);
        if !should_continue(&state) {
            tracing::warn!(status = %state.status, "Pipeline halted after sentiment analysis");
            return state;
        }

        let patch = stages::structuring(self.llm.as_ref(), &state).await;
        state.apply(patch);

        tracing::info!(status = %state.status, "Pipeline run finished");
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::MediaMetadata;
    use crate::llm::MockCompletionClient;
    use crate::transcription::{MockTranscriptSource, TranscriptionResult};

    fn remote_locator() -> VideoLocator {
        VideoLocator::Remote("https://www.youtube.com/watch?v=abc123".to_string())
    }

    fn source_returning(
        transcript: Option<&str>,
        metadata: Option<MediaMetadata>,
        error: Option<AnalyzerError>,
    ) -> MockTranscriptSource {
        let transcript = transcript.map(|t| t.to_string());
        let mut source = MockTranscriptSource::new();
        source.expect_fetch().returning(move |_| TranscriptionResult {
            transcript: transcript.clone(),
            metadata: metadata.clone(),
            error: error.as_ref().map(|e| match e {
                AnalyzerError::DownloadFailed(m) => AnalyzerError::DownloadFailed(m.clone()),
                other => AnalyzerError::Transcription(other.to_string()),
            }),
        });
        source
    }

    #[test]
    fn locator_requires_exactly_one_reference() {
        assert!(VideoLocator::resolve(None, None).is_err());
        assert!(VideoLocator::resolve(
            Some("https://www.youtube.com/watch?v=x".into()),
            Some("clip.mp4".into())
        )
        .is_err());
    }

    #[test]
    fn locator_rejects_non_youtube_urls() {
        let err = VideoLocator::resolve(Some("https://vimeo.com/123".into()), None).unwrap_err();
        assert!(matches!(err, AnalyzerError::Validation(_)));
    }

    #[test]
    fn locator_rejects_non_mp4_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.avi");
        fs_err::write(&path, b"x").unwrap();

        let err = VideoLocator::resolve(None, Some(path)).unwrap_err();
        assert!(err.to_string().contains(".mp4"));
    }

    #[test]
    fn locator_accepts_existing_mp4() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        fs_err::write(&path, b"x").unwrap();

        assert!(VideoLocator::resolve(None, Some(path)).is_ok());
    }

    #[test]
    fn halted_state_ignores_further_patches() {
        let mut state = RunState::new(remote_locator());
        state.apply(StagePatch {
            errors: vec!["boom".to_string()],
            status: Some(RunStatus::Failed),
            ..Default::default()
        });

        state.apply(StagePatch {
            transcript: Some("late transcript".to_string()),
            sentiment: Some(Sentiment::Positive),
            key_points: Some(vec!["x".to_string()]),
            status: Some(RunStatus::Success),
            ..Default::default()
        });

        assert_eq!(state.status, RunStatus::Failed);
        assert!(state.transcript.is_none());
        assert!(state.sentiment.is_none());
        assert!(state.key_points.is_none());
        assert_eq!(state.errors, vec!["boom".to_string()]);
    }

    #[test]
    fn skipped_state_is_frozen_too() {
        let mut state = RunState::new(remote_locator());
        state.status = RunStatus::Skipped;

        state.apply(StagePatch {
            tone: Some("formal".to_string()),
            ..Default::default()
        });

        assert!(state.tone.is_none());
    }

    #[test]
    fn should_continue_is_symmetric_over_error_and_status() {
        let mut state = RunState::new(remote_locator());
        assert!(should_continue(&state));

        state.errors.push("any error".to_string());
        assert!(!should_continue(&state));

        let mut state = RunState::new(remote_locator());
        state.status = RunStatus::Failed;
        assert!(!should_continue(&state));

        let mut state = RunState::new(remote_locator());
        state.status = RunStatus::Skipped;
        assert!(!should_continue(&state));
    }

    #[test]
    fn sink_record_is_flat_with_lowercase_status() {
        let mut state = RunState::new(remote_locator());
        state.status = RunStatus::Extracted;
        state.title = Some("Demo".to_string());

        let record = serde_json::to_value(&state).unwrap();
        assert_eq!(record["status"], "extracted");
        assert_eq!(record["title"], "Demo");
        assert_eq!(
            record["video_locator"],
            "https://www.youtube.com/watch?v=abc123"
        );
        assert!(record.get("report").is_none());
    }

    // Scenario: transcript absent -> sentiment skips, structuring never invoked
    #[tokio::test]
    async fn run_without_transcript_is_skipped_before_any_completion_call() {
        let source = source_returning(None, Some(MediaMetadata::default()), None);
        // No expectations: any completion call fails the test
        let llm = MockCompletionClient::new();

        let pipeline = AnalysisPipeline::new(Box::new(source), Box::new(llm));
        let state = pipeline.invoke(remote_locator()).await;

        assert_eq!(state.status, RunStatus::Skipped);
        assert_eq!(state.errors, vec!["No transcript available".to_string()]);
        assert!(state.sentiment.is_none());
        assert!(state.key_points.is_none());
    }

    // Scenario: acquisition fails with a download error
    #[tokio::test]
    async fn download_failure_halts_the_run_as_failed() {
        let source = source_returning(
            None,
            None,
            Some(AnalyzerError::DownloadFailed("HTTP 403".to_string())),
        );
        let llm = MockCompletionClient::new();

        let pipeline = AnalysisPipeline::new(Box::new(source), Box::new(llm));
        let state = pipeline.invoke(remote_locator()).await;

        assert_eq!(state.status, RunStatus::Failed);
        assert_eq!(state.errors.len(), 1);
        assert!(state.errors[0].starts_with("DownloadError while downloading audio:"));
        assert!(state.transcript.is_none());
        assert_eq!(state.failure_class(), Some(FailureClass::Processing));
    }

    // Scenario: full success path
    #[tokio::test]
    async fn full_success_path_produces_nested_report() {
        let metadata = MediaMetadata {
            title: Some("Product demo".to_string()),
            duration_seconds: Some(93),
            language_code: Some("en".to_string()),
        };
        let source = source_returning(
            Some("This product is amazing and intuitive."),
            Some(metadata),
            None,
        );

        let mut llm = MockCompletionClient::new();
        llm.expect_complete()
            .withf(|system, _| system.contains("sentiment"))
            .times(1)
            .returning(|_, _| {
                Ok(r#"{"sentiment": "positive", "sentiment_score": 0.9, "tone": "enthusiastic"}"#
                    .to_string())
            });
        llm.expect_complete()
            .withf(|system, _| system.contains("key ideas"))
            .times(1)
            .returning(|_, _| {
                Ok(r#"{"key_points": ["The product is praised as amazing.", "The product is described as intuitive.", "N/A"]}"#
                    .to_string())
            });

        let pipeline = AnalysisPipeline::new(Box::new(source), Box::new(llm));
        let state = pipeline.invoke(remote_locator()).await;

        assert_eq!(state.status, RunStatus::Success);
        assert!(state.errors.is_empty());
        assert_eq!(state.sentiment, Some(Sentiment::Positive));
        assert!(state.sentiment_score.unwrap() > 0.5);
        assert_eq!(state.key_points.as_ref().unwrap().len(), KEY_POINT_COUNT);

        let report = state.report.expect("success run must carry a report");
        assert_eq!(report.video_metadata.title, "Product demo");
        assert_eq!(report.video_metadata.duration_seconds, 93);
        assert_eq!(report.video_metadata.language_code, "en");
        assert_eq!(report.analysis.sentiment, Sentiment::Positive);
        assert_eq!(report.analysis.key_points.len(), KEY_POINT_COUNT);
    }

    #[tokio::test]
    async fn sentiment_failure_prevents_structuring() {
        let source = source_returning(Some("some transcript"), Some(MediaMetadata::default()), None);

        let mut llm = MockCompletionClient::new();
        // Only the sentiment call may happen
        llm.expect_complete()
            .times(1)
            .returning(|_, _| Err(AnalyzerError::Analysis("completion request failed".into())));

        let pipeline = AnalysisPipeline::new(Box::new(source), Box::new(llm));
        let state = pipeline.invoke(remote_locator()).await;

        assert_eq!(state.status, RunStatus::Failed);
        assert!(state.errors[0].starts_with("Error analyzing sentiment:"));
        assert!(state.key_points.is_none());
        assert!(state.report.is_none());
    }
}
