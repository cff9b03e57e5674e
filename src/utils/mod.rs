use anyhow::Result;
use std::path::Path;
use url::Url;

use crate::AnalyzerError;

/// Validate a remote video URL and return the normalized version
///
/// The URL must be HTTP(S) and carry the YouTube host marker; anything else is
/// rejected before the pipeline runs.
pub fn validate_remote_url(url: &str) -> Result<String, AnalyzerError> {
    let parsed = Url::parse(url)
        .map_err(|_| AnalyzerError::Validation(format!("Invalid URL format: {}", url)))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(AnalyzerError::Validation(
            "URL must use HTTP or HTTPS protocol".to_string(),
        ));
    }

    let host = parsed.host_str().unwrap_or_default();
    if !host.contains("youtube.") && !host.contains("youtu.be") {
        return Err(AnalyzerError::Validation(format!(
            "URL must be from YouTube: {}",
            url
        )));
    }

    Ok(parsed.to_string())
}

/// Check if input is a local file path rather than a URL
pub fn is_local_file(input: &str) -> bool {
    // First, check if it's clearly a URL
    if input.starts_with("http://") || input.starts_with("https://") {
        return false;
    }

    // Check if the file exists (handles both absolute and relative paths)
    let path = Path::new(input);
    if path.exists() {
        return true;
    }

    // Check if it looks like a file path (has file extension or path separators)
    let has_extension = path.extension().is_some();
    let has_path_separators = input.contains('/') || input.contains('\\');
    let starts_with_dot = input.starts_with("./") || input.starts_with(".\\");

    has_extension || has_path_separators || starts_with_dot
}

/// Format duration in human-readable format
pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Sanitize filename for safe filesystem usage
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| {
            match c {
                // Keep alphanumeric characters, spaces, hyphens, underscores, and dots
                c if c.is_alphanumeric() || c == ' ' || c == '-' || c == '_' || c == '.' => c,
                // Replace everything else with underscore
                _ => '_',
            }
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Generate a collision-resistant audio filename for one acquisition call
pub fn unique_audio_filename(extension: &str) -> String {
    let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    let random_suffix = uuid::Uuid::new_v4().to_string()[..8].to_string();

    format!("vinsight_audio_{}_{}.{}", timestamp, random_suffix, extension)
}

/// Reduce a provider language tag to its lowercase primary subtag
///
/// e.g. `en-US` -> `en`, `PT-br` -> `pt`
pub fn primary_subtag(lang: &str) -> String {
    lang.to_lowercase()
        .split('-')
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}

/// Check if the current environment has required tools
pub async fn check_dependencies() -> Vec<String> {
    let mut missing = Vec::new();

    // Check for yt-dlp
    if !check_command_available("yt-dlp").await {
        missing.push("yt-dlp - required for YouTube audio extraction".to_string());
    }

    // Check for ffmpeg
    if !check_command_available("ffmpeg").await {
        missing.push("ffmpeg - required for local file audio extraction".to_string());
    }

    // Check for ffprobe
    if !check_command_available("ffprobe").await {
        missing.push("ffprobe - required for probing local media files".to_string());
    }

    missing
}

/// Check if a command is available in PATH
async fn check_command_available(command: &str) -> bool {
    use tokio::process::Command;

    Command::new(command)
        .arg("--version")
        .output()
        .await
        .map(|output| output.status.success())
        .unwrap_or(false)
}
