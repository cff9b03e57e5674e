use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use video_insight::{
    output, utils, AnalysisPipeline, AnalyzerError, Cli, Commands, Config, FailureClass,
    VideoLocator,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "video_insight=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    // Check for required external dependencies (non-fatal in Docker)
    let missing_deps = utils::check_dependencies().await;
    if !missing_deps.is_empty() {
        eprintln!("⚠️  Dependency check warnings:");
        for dep in missing_deps {
            eprintln!("   • {}", dep);
        }
        eprintln!("   (Continuing anyway - tools may be available)");
    }

    let config = Config::load().await?;

    match cli.command {
        Commands::Analyze {
            input,
            output: output_path,
            format,
        } => {
            let locator = match resolve_locator(&input) {
                Ok(locator) => locator,
                Err(error) => {
                    eprintln!("Validation error: {}", error);
                    std::process::exit(exit_code(FailureClass::Validation));
                }
            };

            let pipeline = match AnalysisPipeline::from_config(&config) {
                Ok(pipeline) => pipeline,
                Err(error) => {
                    eprintln!("Internal error: {:#}", error);
                    std::process::exit(exit_code(FailureClass::Internal));
                }
            };

            tracing::info!(%locator, "Starting video analysis");
            let state = pipeline.invoke(locator).await;

            if let Some(class) = state.failure_class() {
                eprintln!("Analysis did not complete ({:?}):", class);
                for error in &state.errors {
                    eprintln!("   • {}", error);
                }
                std::process::exit(exit_code(class));
            }

            let report = match state.report {
                Some(report) => report,
                None => {
                    eprintln!("Internal error: successful run produced no report");
                    std::process::exit(exit_code(FailureClass::Internal));
                }
            };

            match output_path {
                Some(path) => {
                    output::save_to_file(&report, &path, &format).await?;
                    println!("Report saved to: {}", path.display());
                }
                None => {
                    output::print_to_console(&report, &format)?;
                }
            }
        }
        Commands::Config { show } => {
            if show {
                config.display();
            } else {
                config.interactive_setup().await?;
            }
        }
    }

    Ok(())
}

fn exit_code(class: FailureClass) -> i32 {
    match class {
        FailureClass::Validation => 2,
        FailureClass::Processing => 1,
        FailureClass::Internal => 3,
    }
}

/// Decide which acquisition path the input drives
fn resolve_locator(input: &str) -> std::result::Result<VideoLocator, AnalyzerError> {
    if utils::is_local_file(input) {
        VideoLocator::resolve(None, Some(PathBuf::from(input)))
    } else {
        VideoLocator::resolve(Some(input.to_string()), None)
    }
}
