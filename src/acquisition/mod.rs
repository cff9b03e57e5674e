use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::fs;
use tokio::process::Command;

use crate::utils::{primary_subtag, sanitize_filename, unique_audio_filename};
use crate::AnalyzerError;

/// Metadata describing the source video, filled in as far as the provider allows
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaMetadata {
    pub title: Option<String>,
    pub duration_seconds: Option<u64>,
    pub language_code: Option<String>,
}

/// A transient audio file owned by exactly one transcription call
///
/// The file is removed when the artifact is dropped, so deletion happens on
/// every exit path rather than being repeated in each failure branch.
#[derive(Debug)]
pub struct AudioArtifact {
    path: PathBuf,
}

impl AudioArtifact {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for AudioArtifact {
    fn drop(&mut self) {
        // yt-dlp stages in-progress downloads beside the target
        let mut partial = self.path.clone().into_os_string();
        partial.push(".part");

        for path in [self.path.clone(), PathBuf::from(partial)] {
            if !path.exists() {
                continue;
            }
            if let Err(e) = std::fs::remove_file(&path) {
                tracing::warn!(path = %path.display(), error = %e, "Failed to remove temporary audio file");
            } else {
                tracing::debug!(path = %path.display(), "Temporary audio file removed");
            }
        }
    }
}

/// Result of one acquisition call: one temp audio file plus provider metadata
#[derive(Debug)]
pub struct AcquiredAudio {
    pub artifact: AudioArtifact,
    pub metadata: MediaMetadata,
}

/// Fetches audio tracks from remote videos (yt-dlp) or local files (ffmpeg)
pub struct AudioAcquirer {
    yt_dlp_path: String,
    temp_dir: PathBuf,
}

impl AudioAcquirer {
    pub fn new(temp_dir: Option<PathBuf>) -> Self {
        Self {
            yt_dlp_path: "yt-dlp".to_string(),
            temp_dir: temp_dir.unwrap_or_else(std::env::temp_dir),
        }
    }

    #[cfg(test)]
    fn with_command(yt_dlp_path: String, temp_dir: PathBuf) -> Self {
        Self {
            yt_dlp_path,
            temp_dir,
        }
    }

    /// Download the best-available audio track of a remote video as MP3
    ///
    /// Provider metadata (title, duration, language) is extracted when present.
    /// A non-zero yt-dlp exit is reported as the distinguishable download-failed
    /// kind; spawn and parse problems fall back to the generic acquisition kind.
    pub async fn fetch_remote(&self, url: &str) -> Result<AcquiredAudio, AnalyzerError> {
        let info = self.probe_remote(url).await?;
        let metadata = Self::metadata_from_provider(&info);

        // Unique name per call so concurrent runs never share a temp path.
        // The artifact takes ownership before the tool runs: if the download
        // fails partway, the drop still removes whatever landed at the path.
        let artifact = AudioArtifact::new(self.temp_dir.join(unique_audio_filename("mp3")));
        self.download_audio(url, artifact.path()).await?;

        tracing::info!(path = %artifact.path().display(), "Audio downloaded");
        Ok(AcquiredAudio { artifact, metadata })
    }

    /// Re-encode the audio track of a local video file as MP3
    ///
    /// No provider metadata exists here: the title comes from the sanitized file
    /// name, the duration from probing the container, and the language is left
    /// unset to be resolved from the transcription output.
    pub async fn fetch_local(&self, path: &Path) -> Result<AcquiredAudio, AnalyzerError> {
        self.validate_file(path).await?;
        let duration_seconds = self.probe_local(path).await?;

        let title = path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(sanitize_filename)
            .unwrap_or_else(|| "Local File".to_string());

        // Own the target path before ffmpeg runs so a failed re-encode cannot
        // orphan a half-written file (-y may create the target regardless).
        let artifact = AudioArtifact::new(self.temp_dir.join(unique_audio_filename("mp3")));
        self.extract_audio_track(path, artifact.path()).await?;

        tracing::info!(path = %artifact.path().display(), "Audio track extracted");
        Ok(AcquiredAudio {
            artifact,
            metadata: MediaMetadata {
                title: Some(title),
                duration_seconds,
                language_code: None,
            },
        })
    }

    /// Get video information using yt-dlp
    async fn probe_remote(&self, url: &str) -> Result<Value, AnalyzerError> {
        tracing::debug!(url, "Extracting video info");

        let output = Command::new(&self.yt_dlp_path)
            .args(["--dump-json", "--no-playlist", url])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| AnalyzerError::Acquisition(format!("failed to run yt-dlp: {}", e)))?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(AnalyzerError::DownloadFailed(error.trim().to_string()));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| AnalyzerError::Acquisition(format!("invalid yt-dlp metadata: {}", e)))
    }

    fn metadata_from_provider(info: &Value) -> MediaMetadata {
        let language = info["language"]
            .as_str()
            .map(primary_subtag)
            .filter(|l| !l.is_empty());

        MediaMetadata {
            title: info["title"].as_str().map(|s| s.to_string()),
            duration_seconds: info["duration"].as_f64().map(|d| d as u64),
            language_code: language,
        }
    }

    /// Download and transcode the audio stream with yt-dlp
    async fn download_audio(&self, url: &str, output_path: &Path) -> Result<(), AnalyzerError> {
        let progress = ProgressBar::new_spinner();
        progress.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        progress.set_message("Downloading audio...");

        let output = Command::new(&self.yt_dlp_path)
            .args([
                "--output",
                &output_path.to_string_lossy(),
                "--extract-audio",
                "--audio-format",
                "mp3",
                "--audio-quality",
                "192K",
                "--format",
                "bestaudio/best",
                "--no-playlist",
                "--quiet",
                "--no-warnings",
                url,
            ])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| AnalyzerError::Acquisition(format!("failed to run yt-dlp: {}", e)))?;

        progress.finish_and_clear();

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(AnalyzerError::DownloadFailed(error.trim().to_string()));
        }

        Ok(())
    }

    /// Check if the file exists and is accessible
    async fn validate_file(&self, path: &Path) -> Result<(), AnalyzerError> {
        if !path.exists() {
            return Err(AnalyzerError::Acquisition(format!(
                "file does not exist: {}",
                path.display()
            )));
        }

        if !path.is_file() {
            return Err(AnalyzerError::Acquisition(format!(
                "path is not a file: {}",
                path.display()
            )));
        }

        match fs::metadata(path).await {
            Ok(metadata) if metadata.len() == 0 => Err(AnalyzerError::Acquisition(format!(
                "file is empty: {}",
                path.display()
            ))),
            Ok(_) => Ok(()),
            Err(e) => Err(AnalyzerError::Acquisition(format!(
                "cannot access file {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// Probe the container with ffprobe; returns the duration in whole seconds
    async fn probe_local(&self, path: &Path) -> Result<Option<u64>, AnalyzerError> {
        let output = Command::new("ffprobe")
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
                &path.to_string_lossy(),
            ])
            .output()
            .await
            .map_err(|e| AnalyzerError::Acquisition(format!("failed to run ffprobe: {}", e)))?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(AnalyzerError::Acquisition(format!(
                "ffprobe could not analyze {}: {}",
                path.display(),
                error.trim()
            )));
        }

        let info: Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| AnalyzerError::Acquisition(format!("invalid ffprobe output: {}", e)))?;

        let empty_vec = vec![];
        let streams = info["streams"].as_array().unwrap_or(&empty_vec);
        let has_audio = streams
            .iter()
            .any(|stream| stream["codec_type"].as_str() == Some("audio"));

        if !has_audio {
            return Err(AnalyzerError::Acquisition(format!(
                "file does not contain any audio streams: {}",
                path.display()
            )));
        }

        let duration = info["format"]["duration"]
            .as_str()
            .and_then(|d| d.parse::<f64>().ok())
            .map(|d| d as u64);

        Ok(duration)
    }

    /// Demux and re-encode the audio track to MP3 using ffmpeg
    async fn extract_audio_track(
        &self,
        source_path: &Path,
        target_path: &Path,
    ) -> Result<(), AnalyzerError> {
        tracing::debug!(
            source = %source_path.display(),
            target = %target_path.display(),
            "Re-encoding audio track"
        );

        let output = Command::new("ffmpeg")
            .args([
                "-i",
                &source_path.to_string_lossy(),
                "-vn", // No video
                "-acodec",
                "mp3",
                "-ab",
                "192k",
                "-ar",
                "44100", // Standard sample rate
                "-y", // Overwrite output file
                &target_path.to_string_lossy(),
            ])
            .output()
            .await
            .map_err(|e| AnalyzerError::Acquisition(format!("failed to run ffmpeg: {}", e)))?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(AnalyzerError::Acquisition(format!(
                "ffmpeg could not extract audio: {}",
                error.trim()
            )));
        }

        Ok(())
    }
}
