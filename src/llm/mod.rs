use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::Config;
use crate::AnalyzerError;

/// General sentiment of the analyzed content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
        }
    }
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Schema for the sentiment analysis response
#[derive(Debug, Clone, Deserialize)]
pub struct SentimentAnalysis {
    pub sentiment: Sentiment,
    /// 0.0 is very negative, 1.0 is very positive
    pub sentiment_score: f64,
    /// Free-text tone descriptor (e.g. formal, technical, motivational)
    pub tone: String,
}

impl SentimentAnalysis {
    /// Strict, fail-closed parse: unparseable or missing fields are an error,
    /// never a partially populated result
    pub fn parse(raw: &str) -> Result<Self, AnalyzerError> {
        let parsed: SentimentAnalysis = parse_schema(raw)?;

        if !(0.0..=1.0).contains(&parsed.sentiment_score) {
            return Err(AnalyzerError::Analysis(format!(
                "sentiment_score {} outside [0.0, 1.0]",
                parsed.sentiment_score
            )));
        }

        Ok(parsed)
    }
}

/// Schema for the key points extraction response
#[derive(Debug, Clone, Deserialize)]
pub struct KeyPointsExtraction {
    pub key_points: Vec<String>,
}

impl KeyPointsExtraction {
    pub fn parse(raw: &str) -> Result<Self, AnalyzerError> {
        parse_schema(raw)
    }
}

fn parse_schema<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T, AnalyzerError> {
    serde_json::from_str(strip_code_fences(raw)).map_err(|e| {
        AnalyzerError::Analysis(format!("completion response did not match schema: {}", e))
    })
}

/// Some models wrap JSON answers in a markdown code fence despite instructions
fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}

/// Seam over the external text-completion capability
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Send one system + user message pair, returning the raw completion text
    async fn complete(&self, system: &str, user: &str) -> Result<String, AnalyzerError>;
}

#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Serialize, Deserialize, Clone)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// OpenAI-style chat-completions client with JSON-constrained output
pub struct OpenAiCompletionClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
}

impl OpenAiCompletionClient {
    pub fn new(
        api_key: String,
        base_url: String,
        model: String,
        temperature: f32,
        timeout: Duration,
    ) -> crate::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_key,
            base_url,
            model,
            temperature,
        })
    }

    pub fn from_config(config: &Config) -> crate::Result<Self> {
        Self::new(
            config.resolve_api_key()?,
            config.llm.base_url.clone(),
            config.llm.chat_model.clone(),
            config.llm.temperature,
            Duration::from_secs(config.app.request_timeout_secs),
        )
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompletionClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, AnalyzerError> {
        let request_body = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            temperature: self.temperature,
            response_format: ResponseFormat {
                format_type: "json_object".to_string(),
            },
        };

        tracing::debug!(model = %self.model, "Invoking chat completion");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AnalyzerError::Timeout(format!("chat completion request: {}", e))
                } else {
                    AnalyzerError::Analysis(format!("completion request failed: {}", e))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AnalyzerError::Analysis(format!(
                "completion request returned HTTP {}: {}",
                status, body
            )));
        }

        let completion: ChatCompletionResponse = response.json().await.map_err(|e| {
            AnalyzerError::Analysis(format!("invalid completion response body: {}", e))
        })?;

        completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| AnalyzerError::Analysis("completion response had no choices".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentiment_schema_parses_valid_response() {
        let raw = r#"{"sentiment": "positive", "sentiment_score": 0.85, "tone": "motivational"}"#;
        let parsed = SentimentAnalysis::parse(raw).unwrap();

        assert_eq!(parsed.sentiment, Sentiment::Positive);
        assert!((parsed.sentiment_score - 0.85).abs() < f64::EPSILON);
        assert_eq!(parsed.tone, "motivational");
    }

    #[test]
    fn sentiment_schema_rejects_unknown_label() {
        let raw = r#"{"sentiment": "ecstatic", "sentiment_score": 0.9, "tone": "excited"}"#;
        assert!(SentimentAnalysis::parse(raw).is_err());
    }

    #[test]
    fn sentiment_schema_rejects_missing_fields() {
        assert!(SentimentAnalysis::parse(r#"{"sentiment": "neutral"}"#).is_err());
        assert!(SentimentAnalysis::parse("not json at all").is_err());
    }

    #[test]
    fn sentiment_schema_rejects_out_of_range_score() {
        let raw = r#"{"sentiment": "positive", "sentiment_score": 1.5, "tone": "formal"}"#;
        let err = SentimentAnalysis::parse(raw).unwrap_err();
        assert!(err.to_string().contains("outside"));
    }

    #[test]
    fn key_points_schema_parses() {
        let raw = r#"{"key_points": ["First.", "Second.", "Third."]}"#;
        let parsed = KeyPointsExtraction::parse(raw).unwrap();
        assert_eq!(parsed.key_points.len(), 3);
    }

    #[test]
    fn code_fenced_json_is_accepted() {
        let raw = "```json\n{\"key_points\": [\"Only one.\"]}\n```";
        let parsed = KeyPointsExtraction::parse(raw).unwrap();
        assert_eq!(parsed.key_points, vec!["Only one.".to_string()]);
    }
}
