use anyhow::Result;
use std::path::Path;

use crate::cli::ReportFormat;
use crate::pipeline::AnalysisReport;
use crate::utils::format_duration;

/// Save the analysis report to file
pub async fn save_to_file(report: &AnalysisReport, path: &Path, format: &ReportFormat) -> Result<()> {
    let content = match format {
        ReportFormat::Text => format_as_text(report),
        ReportFormat::Json => format_as_json(report)?,
    };

    fs_err::write(path, content)?;
    Ok(())
}

/// Print the analysis report to console
pub fn print_to_console(report: &AnalysisReport, format: &ReportFormat) -> Result<()> {
    let content = match format {
        ReportFormat::Text => format_as_text(report),
        ReportFormat::Json => format_as_json(report)?,
    };

    println!("{}", content);
    Ok(())
}

fn format_as_text(report: &AnalysisReport) -> String {
    let mut out = String::new();

    out.push_str("Video Metadata\n");
    out.push_str(&format!("  Title:    {}\n", report.video_metadata.title));
    out.push_str(&format!(
        "  Duration: {}\n",
        format_duration(report.video_metadata.duration_seconds)
    ));
    out.push_str(&format!(
        "  Language: {}\n\n",
        report.video_metadata.language_code
    ));

    out.push_str("Analysis\n");
    out.push_str(&format!(
        "  Sentiment: {} ({:.2})\n",
        report.analysis.sentiment, report.analysis.sentiment_score
    ));
    out.push_str(&format!("  Tone:      {}\n\n", report.analysis.tone));

    out.push_str("Key Points\n");
    for (i, point) in report.analysis.key_points.iter().enumerate() {
        out.push_str(&format!("  {}. {}\n", i + 1, point));
    }

    out
}

fn format_as_json(report: &AnalysisReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Sentiment;
    use crate::pipeline::{AnalysisBlock, VideoMetadataBlock};

    fn sample_report() -> AnalysisReport {
        AnalysisReport {
            video_metadata: VideoMetadataBlock {
                title: "Demo".to_string(),
                duration_seconds: 93,
                language_code: "en".to_string(),
            },
            analysis: AnalysisBlock {
                sentiment: Sentiment::Positive,
                sentiment_score: 0.9,
                tone: "enthusiastic".to_string(),
                key_points: vec![
                    "First point.".to_string(),
                    "Second point.".to_string(),
                    "N/A".to_string(),
                ],
            },
        }
    }

    #[test]
    fn text_format_lists_all_key_points() {
        let text = format_as_text(&sample_report());

        assert!(text.contains("Title:    Demo"));
        assert!(text.contains("1m 33s"));
        assert!(text.contains("positive (0.90)"));
        assert!(text.contains("3. N/A"));
    }

    #[test]
    fn json_format_keeps_the_nested_shape() {
        let json = format_as_json(&sample_report()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["video_metadata"]["title"], "Demo");
        assert_eq!(value["analysis"]["sentiment"], "positive");
        assert_eq!(value["analysis"]["key_points"].as_array().unwrap().len(), 3);
    }
}
