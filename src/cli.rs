use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "url-risk",
    about = "Score URLs for phishing risk by fusing structural and text classifiers",
    version
)]
pub struct Cli {
    /// Config file [default: ./.url-risk/config.toml, fallback ~/.config/url-risk/config.toml]
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP API (default)
    Serve,

    /// Score one or more URLs and print the result
    Analyze {
        /// URLs to score
        #[arg(required = true)]
        urls: Vec<String>,

        /// Output format
        #[arg(long, default_value = "terminal", value_name = "FORMAT")]
        format: OutputFormat,

        /// Also print the extracted feature table
        #[arg(short, long)]
        verbose: bool,
    },

    /// Retrain the structural model and overwrite the saved artifact
    Train,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum OutputFormat {
    Terminal,
    Json,
}
