//! srtlingo - SRT subtitle translation through LLM completion services
//!
//! Entry point: parses the command line, sets up logging and dispatches to
//! the workflow.

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use tracing_appender::{non_blocking, rolling};

use srtlingo::cli::{Args, Commands, Overrides};
use srtlingo::config::Config;
use srtlingo::workflow::Workflow;

const DEFAULT_CONFIG_FILE: &str = "srtlingo.toml";

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Keep the guard alive so buffered log lines reach the file
    let _guard = setup_logging(args.verbose)?;

    let mut config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if std::path::Path::new(DEFAULT_CONFIG_FILE).exists() {
                info!("Found {} in current directory, loading...", DEFAULT_CONFIG_FILE);
                Config::from_file(DEFAULT_CONFIG_FILE)?
            } else {
                Config::default()
            }
        }
    };

    match args.command {
        Commands::Translate {
            input,
            output,
            source_lang,
            target_lang,
            api_key,
            max_width,
            batch_size,
            buffer,
            provider,
            model,
            endpoint,
        } => {
            Overrides {
                source_lang,
                target_lang,
                api_key,
                max_width,
                batch_size,
                buffer,
                provider,
                model,
                endpoint,
            }
            .apply(&mut config);

            info!("Input srt file: {}", input.display());
            info!("Output srt file: {}", output.display());
            info!(
                "Translating {} -> {} with {} ({:?}), batches of {} (+{}), lines up to {} chars",
                config.completion.source_language,
                config.completion.target_language,
                config.completion.model(),
                config.completion.provider,
                config.batch.size,
                config.batch.buffer,
                config.output.max_line_width
            );

            let workflow = Workflow::new(config)?;
            let report = workflow.translate_file(&input, &output).await?;

            println!(
                "Translated {} records in {} batches ({} reconciled, {} given up, {} attempts)",
                report.records_updated,
                report.batches,
                report.reconciled,
                report.failed,
                report.attempts
            );
        }
        Commands::Plan { input, batch_size, buffer } => {
            Overrides {
                batch_size,
                buffer,
                ..Overrides::default()
            }
            .apply(&mut config);

            let workflow = Workflow::new(config)?;
            let spans = workflow.plan_file(&input).await?;

            println!("{:<8} {:<16} {:<8} {:<8}", "Batch", "Records", "Sent", "Held");
            println!("{}", "-".repeat(42));
            for (index, span) in spans.iter().enumerate() {
                println!(
                    "{:<8} {:<16} {:<8} {:<8}",
                    index + 1,
                    format!("{}-{}", span.start_id, span.end_id),
                    span.sent,
                    span.skipped
                );
            }
        }
        Commands::InitConfig { output } => {
            config.save_to_file(&output)?;
            println!("Wrote configuration to {}", output.display());
        }
    }

    Ok(())
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    let log_dir = std::env::current_dir()?.join(".srtlingo").join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Daily rotated log file
    let file_appender = rolling::daily(&log_dir, "srtlingo.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false); // No ANSI colors in file

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Logging initialized - console: {}, file: {}",
          log_level, log_dir.join("srtlingo.log").display());

    Ok(guard)
}
