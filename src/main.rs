//! `url-risk`: score URLs for phishing risk.
//!
//! # Flow
//! 1. Parse CLI arguments ([`cli`]).
//! 2. Load config ([`config::load_config`]) and initialize logging.
//! 3. Build the [`engine::RiskEngine`]: load or train the structural model
//!    ([`classifier::structural`]) and load the text classifier
//!    ([`classifier::text`]).
//! 4. Per URL: extract features ([`features`]), score with both models, and
//!    fuse the scores into a risk tier ([`fusion`]).
//! 5. Serve results over HTTP ([`api`]) or print them ([`report`]).

mod api;
mod classifier;
mod cli;
mod config;
mod engine;
mod error;
mod features;
mod fusion;
mod models;
mod report;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use classifier::structural::StructuralClassifier;
use cli::{Cli, Command, OutputFormat};
use config::load_config;
use engine::RiskEngine;
use models::AnalysisResponse;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let cwd = std::env::current_dir().context("resolving working directory")?;
    let config = load_config(&cwd, cli.config.as_deref())?;

    init_logging(&config.logging.level);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            info!("Initializing models...");
            let engine = build_engine(&config).await?;
            info!("Models initialized");
            api::serve(engine, &config.server).await?;
        }
        Command::Analyze {
            urls,
            format,
            verbose,
        } => {
            let engine = build_engine(&config).await?;
            let assessments: Vec<_> = urls.iter().map(|u| engine.analyze(u)).collect();

            match format {
                OutputFormat::Terminal => report::terminal::render(&assessments, verbose)?,
                OutputFormat::Json => {
                    let responses: Vec<AnalysisResponse> =
                        assessments.iter().map(AnalysisResponse::from).collect();
                    println!("{}", serde_json::to_string_pretty(&responses)?);
                }
            }
        }
        Command::Train => {
            let model = config.model.clone();
            tokio::task::spawn_blocking(move || StructuralClassifier::train_and_persist(&model))
                .await
                .context("training task panicked")??;
            eprintln!(
                "  {} structural model written to {}",
                "→".cyan(),
                config.model.path.display()
            );
        }
    }

    Ok(())
}

/// Model loading may train trees and load transformer weights, so it runs
/// off the async workers.
async fn build_engine(config: &config::Config) -> Result<RiskEngine> {
    let config = config.clone();
    let engine = tokio::task::spawn_blocking(move || RiskEngine::from_config(&config))
        .await
        .context("model initialization panicked")??;
    Ok(engine)
}

/// `RUST_LOG` wins; otherwise the configured level. Logs go to stderr so
/// `analyze --format json` output stays machine-readable.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
