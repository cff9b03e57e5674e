//! The three stage implementations
//!
//! Each stage is an error boundary: it converts every failure reachable inside
//! it into a [`StagePatch`] carrying `errors` and `status`, so the orchestrator
//! never needs to guard its stage calls.

use super::{
    prompts, AnalysisReport, RunState, RunStatus, StagePatch, KEY_POINT_COUNT, KEY_POINT_SENTINEL,
    TRANSCRIPT_CHAR_CAP,
};
use crate::llm::{CompletionClient, KeyPointsExtraction, SentimentAnalysis};
use crate::transcription::language::UNKNOWN_LANGUAGE;
use crate::transcription::TranscriptSource;
use crate::AnalyzerError;

/// Stage 1: obtain the transcript and video metadata
pub(crate) async fn extraction(source: &dyn TranscriptSource, state: &RunState) -> StagePatch {
    tracing::info!("Extraction stage started");

    let result = source.fetch(&state.locator).await;

    if let Some(error) = result.error {
        return failed(error.to_string());
    }

    let metadata = result.metadata.unwrap_or_default();
    StagePatch {
        transcript: result.transcript,
        title: Some(metadata.title.unwrap_or_default()),
        duration_seconds: Some(metadata.duration_seconds.unwrap_or(0)),
        language_code: Some(
            metadata
                .language_code
                .unwrap_or_else(|| UNKNOWN_LANGUAGE.to_string()),
        ),
        status: Some(RunStatus::Extracted),
        ..Default::default()
    }
}

/// Stage 2: derive sentiment, score, and tone from the transcript
pub(crate) async fn sentiment(llm: &dyn CompletionClient, state: &RunState) -> StagePatch {
    tracing::info!("Sentiment analysis stage started");

    let Some(transcript) = state.transcript.as_deref().filter(|t| !t.is_empty()) else {
        tracing::warn!("Sentiment analysis skipped: no transcript");
        return skipped();
    };

    let excerpt = truncate_transcript(transcript);
    tracing::debug!(chars = excerpt.chars().count(), "Invoking sentiment analysis completion");

    let outcome = llm
        .complete(prompts::SENTIMENT_SYSTEM, &prompts::sentiment_user(&excerpt))
        .await
        .and_then(|raw| SentimentAnalysis::parse(&raw));

    match outcome {
        Ok(analysis) => {
            tracing::info!(sentiment = %analysis.sentiment, "Sentiment analysis completed");
            StagePatch {
                sentiment: Some(analysis.sentiment),
                sentiment_score: Some(analysis.sentiment_score),
                tone: Some(analysis.tone),
                status: Some(RunStatus::Analyzed),
                ..Default::default()
            }
        }
        Err(error) => {
            tracing::error!(%error, "Sentiment analysis failed");
            failed(format!("Error analyzing sentiment: {}", error))
        }
    }
}

/// Stage 3: extract the three key points and assemble the final report
pub(crate) async fn structuring(llm: &dyn CompletionClient, state: &RunState) -> StagePatch {
    tracing::info!("Structuring stage started");

    let Some(transcript) = state.transcript.as_deref().filter(|t| !t.is_empty()) else {
        tracing::warn!("Structuring skipped: no transcript");
        return skipped();
    };

    let excerpt = truncate_transcript(transcript);
    tracing::debug!(chars = excerpt.chars().count(), "Invoking structuring completion");

    let outcome = llm
        .complete(
            prompts::STRUCTURING_SYSTEM,
            &prompts::structuring_user(&excerpt),
        )
        .await
        .and_then(|raw| KeyPointsExtraction::parse(&raw));

    match outcome {
        Ok(extraction) => {
            let key_points = pad_key_points(extraction.key_points);
            let report = AnalysisReport::assemble(state, key_points.clone());
            tracing::info!("Structuring completed");
            StagePatch {
                key_points: Some(key_points),
                report: Some(report),
                status: Some(RunStatus::Success),
                ..Default::default()
            }
        }
        Err(error) => {
            tracing::error!(%error, "Structuring failed");
            failed(format!("Error analyzing structuring: {}", error))
        }
    }
}

fn skipped() -> StagePatch {
    StagePatch {
        errors: vec![AnalyzerError::NoTranscript.to_string()],
        status: Some(RunStatus::Skipped),
        ..Default::default()
    }
}

fn failed(message: String) -> StagePatch {
    StagePatch {
        errors: vec![message],
        status: Some(RunStatus::Failed),
        ..Default::default()
    }
}

/// Bound the transcript to its first [`TRANSCRIPT_CHAR_CAP`] characters
pub(crate) fn truncate_transcript(transcript: &str) -> String {
    if transcript.chars().count() <= TRANSCRIPT_CHAR_CAP {
        transcript.to_string()
    } else {
        transcript.chars().take(TRANSCRIPT_CHAR_CAP).collect()
    }
}

/// Normalize the key point list to exactly [`KEY_POINT_COUNT`] entries
fn pad_key_points(mut key_points: Vec<String>) -> Vec<String> {
    key_points.truncate(KEY_POINT_COUNT);
    while key_points.len() < KEY_POINT_COUNT {
        key_points.push(KEY_POINT_SENTINEL.to_string());
    }
    key_points
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::MediaMetadata;
    use crate::llm::MockCompletionClient;
    use crate::pipeline::VideoLocator;
    use crate::transcription::{MockTranscriptSource, TranscriptionResult};

    fn state_with_transcript(transcript: Option<&str>) -> RunState {
        let mut state = RunState::new(VideoLocator::Remote(
            "https://www.youtube.com/watch?v=abc".to_string(),
        ));
        state.transcript = transcript.map(|t| t.to_string());
        state
    }

    #[test]
    fn short_transcripts_pass_through_unmodified() {
        let transcript = "a".repeat(TRANSCRIPT_CHAR_CAP);
        assert_eq!(truncate_transcript(&transcript), transcript);
        assert_eq!(truncate_transcript("short"), "short");
    }

    #[test]
    fn long_transcripts_keep_exactly_the_first_cap_characters() {
        // Multibyte characters make sure the cap counts chars, not bytes
        let transcript = "é".repeat(TRANSCRIPT_CHAR_CAP + 100);
        let truncated = truncate_transcript(&transcript);

        assert_eq!(truncated.chars().count(), TRANSCRIPT_CHAR_CAP);
        assert_eq!(truncated, "é".repeat(TRANSCRIPT_CHAR_CAP));
    }

    #[test]
    fn key_points_are_padded_with_the_sentinel() {
        let padded = pad_key_points(vec!["Only point.".to_string()]);
        assert_eq!(
            padded,
            vec![
                "Only point.".to_string(),
                KEY_POINT_SENTINEL.to_string(),
                KEY_POINT_SENTINEL.to_string(),
            ]
        );
    }

    #[test]
    fn surplus_key_points_are_dropped() {
        let points: Vec<String> = (1..=5).map(|i| format!("Point {}.", i)).collect();
        let padded = pad_key_points(points);

        assert_eq!(padded.len(), KEY_POINT_COUNT);
        assert_eq!(padded[2], "Point 3.");
    }

    #[tokio::test]
    async fn extraction_is_idempotent_for_a_stable_source() {
        let mut source = MockTranscriptSource::new();
        source.expect_fetch().times(2).returning(|_| TranscriptionResult {
            transcript: Some("same transcript".to_string()),
            metadata: Some(MediaMetadata {
                title: Some("Same title".to_string()),
                duration_seconds: Some(120),
                language_code: Some("en".to_string()),
            }),
            error: None,
        });

        let state = state_with_transcript(None);
        let first = extraction(&source, &state).await;
        let second = extraction(&source, &state).await;

        assert_eq!(first, second);
        assert_eq!(first.transcript.as_deref(), Some("same transcript"));
        assert_eq!(first.title.as_deref(), Some("Same title"));
        assert_eq!(first.duration_seconds, Some(120));
        assert_eq!(first.language_code.as_deref(), Some("en"));
    }

    #[tokio::test]
    async fn extraction_defaults_absent_metadata() {
        let mut source = MockTranscriptSource::new();
        source.expect_fetch().returning(|_| TranscriptionResult {
            transcript: Some("words".to_string()),
            metadata: None,
            error: None,
        });

        let state = state_with_transcript(None);
        let patch = extraction(&source, &state).await;

        assert_eq!(patch.title.as_deref(), Some(""));
        assert_eq!(patch.duration_seconds, Some(0));
        assert_eq!(patch.language_code.as_deref(), Some(UNKNOWN_LANGUAGE));
        assert_eq!(patch.status, Some(RunStatus::Extracted));
    }

    #[tokio::test]
    async fn sentiment_skips_on_empty_transcript() {
        let llm = MockCompletionClient::new();
        let state = state_with_transcript(Some(""));

        let patch = sentiment(&llm, &state).await;

        assert_eq!(patch.status, Some(RunStatus::Skipped));
        assert_eq!(patch.errors, vec!["No transcript available".to_string()]);
    }

    #[tokio::test]
    async fn sentiment_sends_the_truncated_prefix() {
        let long_transcript = "x".repeat(TRANSCRIPT_CHAR_CAP + 500);
        let expected_excerpt = "x".repeat(TRANSCRIPT_CHAR_CAP);

        let mut llm = MockCompletionClient::new();
        llm.expect_complete()
            .withf(move |_, user| {
                user.contains(&expected_excerpt) && !user.contains(&"x".repeat(TRANSCRIPT_CHAR_CAP + 1))
            })
            .times(1)
            .returning(|_, _| {
                Ok(r#"{"sentiment": "neutral", "sentiment_score": 0.5, "tone": "flat"}"#.to_string())
            });

        let state = state_with_transcript(Some(&long_transcript));
        let patch = sentiment(&llm, &state).await;

        assert_eq!(patch.status, Some(RunStatus::Analyzed));
    }

    #[tokio::test]
    async fn structuring_fails_closed_on_malformed_response() {
        let mut llm = MockCompletionClient::new();
        llm.expect_complete()
            .returning(|_, _| Ok("here are your key points: 1) ...".to_string()));

        let state = state_with_transcript(Some("a transcript"));
        let patch = structuring(&llm, &state).await;

        assert_eq!(patch.status, Some(RunStatus::Failed));
        assert!(patch.errors[0].starts_with("Error analyzing structuring:"));
        assert!(patch.key_points.is_none());
        assert!(patch.report.is_none());
    }
}
