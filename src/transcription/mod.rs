use async_trait::async_trait;
use reqwest::multipart;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::acquisition::{AcquiredAudio, AudioAcquirer, AudioArtifact, MediaMetadata};
use crate::config::Config;
use crate::pipeline::VideoLocator;
use crate::AnalyzerError;

pub mod language;

use language::language_name_to_code;

/// Transcript plus metadata for one run, handed whole to the orchestrator
#[derive(Debug, Default)]
pub struct TranscriptionResult {
    pub transcript: Option<String>,
    pub metadata: Option<MediaMetadata>,
    pub error: Option<AnalyzerError>,
}

/// Outcome of a single speech-to-text call
#[derive(Debug, Default)]
pub struct TranscriptOutcome {
    pub transcript: Option<String>,
    /// Raw detected-language tag, a full language name like "english"
    pub detected_language: Option<String>,
    pub error: Option<AnalyzerError>,
}

/// Anything that can turn a video locator into a transcript
///
/// The pipeline only sees this seam, which keeps the stages testable without
/// network access or external tools.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TranscriptSource: Send + Sync {
    async fn fetch(&self, locator: &VideoLocator) -> TranscriptionResult;
}

/// Verbose response body of the speech-to-text endpoint
#[derive(Debug, Deserialize)]
struct VerboseTranscription {
    text: String,
    #[serde(default)]
    language: Option<String>,
}

/// Service that acquires audio and turns it into text via a Whisper-style API
pub struct TranscriptionService {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    acquirer: AudioAcquirer,
}

impl TranscriptionService {
    pub fn new(
        api_key: String,
        base_url: String,
        model: String,
        timeout: Duration,
        acquirer: AudioAcquirer,
    ) -> crate::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_key,
            base_url,
            model,
            acquirer,
        })
    }

    pub fn from_config(config: &Config) -> crate::Result<Self> {
        Self::new(
            config.resolve_api_key()?,
            config.llm.base_url.clone(),
            config.llm.whisper_model.clone(),
            Duration::from_secs(config.app.request_timeout_secs),
            AudioAcquirer::new(config.app.temp_dir.clone()),
        )
    }

    /// Transcribe one audio artifact
    ///
    /// The artifact is consumed: whatever happens inside the call, it is dropped
    /// (and its file deleted) exactly once before this function returns. All
    /// failures become an error outcome; nothing propagates to the orchestrator.
    pub async fn transcribe(&self, artifact: AudioArtifact) -> TranscriptOutcome {
        tracing::info!(path = %artifact.path().display(), "Starting transcription");

        let outcome = match self.request_transcript(artifact.path()).await {
            Ok(parsed) => {
                tracing::info!(chars = parsed.text.len(), "Transcription finished");
                TranscriptOutcome {
                    transcript: Some(parsed.text),
                    detected_language: parsed.language,
                    error: None,
                }
            }
            Err(error) => {
                tracing::error!(%error, "Transcription failed");
                TranscriptOutcome {
                    error: Some(error),
                    ..Default::default()
                }
            }
        };

        // Scoped-resource contract: the temp file dies with the artifact
        drop(artifact);
        outcome
    }

    async fn request_transcript(
        &self,
        audio_path: &Path,
    ) -> Result<VerboseTranscription, AnalyzerError> {
        let audio_data = fs_err::read(audio_path)
            .map_err(|e| AnalyzerError::Transcription(format!("cannot read audio file: {}", e)))?;

        let file_name = audio_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio.mp3")
            .to_string();

        let file_part = multipart::Part::bytes(audio_data)
            .file_name(file_name)
            .mime_str("audio/mpeg")
            .map_err(|e| AnalyzerError::Transcription(format!("mime: {}", e)))?;

        let form = multipart::Form::new()
            .text("model", self.model.clone())
            // Verbose response carries the detected-language tag
            .text("response_format", "verbose_json")
            .part("file", file_part);

        let url = format!("{}/audio/transcriptions", self.base_url);
        tracing::debug!(model = %self.model, "Sending audio to speech-to-text API");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AnalyzerError::Timeout(format!("speech-to-text request: {}", e))
                } else {
                    AnalyzerError::Transcription(format!("request failed: {}", e))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(AnalyzerError::Transcription(format!(
                "status {}: {}",
                status, body
            )));
        }

        response
            .json::<VerboseTranscription>()
            .await
            .map_err(|e| AnalyzerError::Transcription(format!("invalid response body: {}", e)))
    }

    /// Full remote path: acquire audio from the provider, then transcribe it
    ///
    /// Provider-supplied language metadata wins; the transcription-detected tag
    /// (normalized) only fills the gap when the provider had none.
    pub async fn get_transcript_from_remote(&self, url: &str) -> TranscriptionResult {
        tracing::info!(url, "Getting transcript from remote video");

        let AcquiredAudio {
            artifact,
            mut metadata,
        } = match self.acquirer.fetch_remote(url).await {
            Ok(acquired) => acquired,
            Err(error) => {
                tracing::error!(%error, "Audio acquisition failed");
                return TranscriptionResult {
                    error: Some(error),
                    ..Default::default()
                };
            }
        };

        let outcome = self.transcribe(artifact).await;
        fill_language_gap(&mut metadata, outcome.detected_language.as_deref());

        TranscriptionResult {
            transcript: outcome.transcript,
            metadata: Some(metadata),
            error: outcome.error,
        }
    }

    /// Full local path: re-encode the file's audio track, then transcribe it
    ///
    /// The language always comes from the normalized transcription-detected tag
    /// (local acquisition cannot supply one); the duration always comes from
    /// probing the container directly.
    pub async fn get_transcript_from_local(&self, path: &Path) -> TranscriptionResult {
        tracing::info!(path = %path.display(), "Getting transcript from local video");

        let AcquiredAudio {
            artifact,
            mut metadata,
        } = match self.acquirer.fetch_local(path).await {
            Ok(acquired) => acquired,
            Err(error) => {
                tracing::error!(%error, "Audio acquisition failed");
                return TranscriptionResult {
                    error: Some(error),
                    ..Default::default()
                };
            }
        };

        let outcome = self.transcribe(artifact).await;
        adopt_detected_language(&mut metadata, outcome.detected_language.as_deref());

        TranscriptionResult {
            transcript: outcome.transcript,
            metadata: Some(metadata),
            error: outcome.error,
        }
    }
}

/// Remote merge policy: provider metadata wins, detection fills the gap
fn fill_language_gap(metadata: &mut MediaMetadata, detected: Option<&str>) {
    if metadata.language_code.is_none() {
        metadata.language_code = detected.map(language_name_to_code);
    }
}

/// Local merge policy: the normalized detected tag is the only language source
fn adopt_detected_language(metadata: &mut MediaMetadata, detected: Option<&str>) {
    metadata.language_code = detected.map(language_name_to_code);
}

#[async_trait]
impl TranscriptSource for TranscriptionService {
    async fn fetch(&self, locator: &VideoLocator) -> TranscriptionResult {
        match locator {
            VideoLocator::Remote(url) => self.get_transcript_from_remote(url).await,
            VideoLocator::Local(path) => self.get_transcript_from_local(path).await,
        }
    }
}
