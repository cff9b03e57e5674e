use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Settings for the external speech-to-text and completion services
    pub llm: LlmConfig,

    /// Application settings
    pub app: AppConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// API key; falls back to the OPENAI_API_KEY environment variable
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible API
    pub base_url: String,

    /// Chat model used for sentiment and structuring
    pub chat_model: String,

    /// Speech-to-text model
    pub whisper_model: String,

    /// Sampling temperature for completions
    pub temperature: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Temporary directory for audio artifacts (system temp dir if unset)
    pub temp_dir: Option<PathBuf>,

    /// Per-request timeout for network calls, in seconds
    pub request_timeout_secs: u64,

    /// Default report format
    pub default_report_format: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm: LlmConfig {
                api_key: None,
                base_url: "https://api.openai.com/v1".to_string(),
                chat_model: "gpt-4o-mini".to_string(),
                whisper_model: "whisper-1".to_string(),
                temperature: 0.0,
            },
            app: AppConfig {
                temp_dir: None,
                request_timeout_secs: 120,
                default_report_format: "text".to_string(),
            },
        }
    }
}

impl Config {
    /// Load configuration from file or create default
    pub async fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content =
                fs_err::read_to_string(&config_path).context("Failed to read config file")?;

            let config: Config =
                serde_yaml::from_str(&content).context("Failed to parse config file")?;

            config.validate()?;
            Ok(config)
        } else {
            let config = Self::default();
            config.save().await?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub async fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;

        fs_err::write(&config_path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir().context("Could not determine config directory")?;

        Ok(config_dir.join("video-insight").join("config.yaml"))
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.llm.base_url.is_empty() {
            anyhow::bail!("LLM base URL must be configured");
        }

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            anyhow::bail!("Temperature must be between 0.0 and 2.0");
        }

        if self.app.request_timeout_secs == 0 {
            anyhow::bail!("Request timeout must be greater than zero");
        }

        Ok(())
    }

    /// Resolve the API key from the config file or the environment
    pub fn resolve_api_key(&self) -> Result<String> {
        if let Some(key) = self.llm.api_key.as_ref().filter(|k| !k.is_empty()) {
            return Ok(key.clone());
        }

        std::env::var("OPENAI_API_KEY").context(
            "No API key found. Set llm.api_key in the config file or the OPENAI_API_KEY environment variable",
        )
    }

    /// Interactive configuration setup
    pub async fn interactive_setup(&self) -> Result<()> {
        println!("Interactive configuration setup coming soon!");
        println!("For now, please edit the config file manually:");
        println!("  {}", Self::config_path()?.display());
        Ok(())
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Base URL: {}", self.llm.base_url);
        println!("  Chat Model: {}", self.llm.chat_model);
        println!("  Whisper Model: {}", self.llm.whisper_model);
        println!("  Temperature: {}", self.llm.temperature);
        println!("  Request Timeout: {}s", self.app.request_timeout_secs);
        println!("  Default Format: {}", self.app.default_report_format);
        if let Some(temp_dir) = &self.app.temp_dir {
            println!("  Temp Dir: {}", temp_dir.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut config = Config::default();
        config.llm.temperature = 3.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.app.request_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_round_trips_through_yaml() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();

        assert_eq!(parsed.llm.chat_model, config.llm.chat_model);
        assert_eq!(
            parsed.app.request_timeout_secs,
            config.app.request_timeout_secs
        );
    }

    #[test]
    fn explicit_api_key_wins_over_environment() {
        let mut config = Config::default();
        config.llm.api_key = Some("from-config".to_string());
        assert_eq!(config.resolve_api_key().unwrap(), "from-config");
    }
}
