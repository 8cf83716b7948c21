mod commands;

use clap::{Parser, Subcommand};
use anyhow::Result;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "gavel-cli")]
#[command(about = "Gavel CLI - Grade and run submissions locally", long_about = None)]
struct Cli {
    /// Judge config file (defaults to GAVEL_CONFIG or config/judge.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Grade a source file against a JSON list of test cases
    Grade {
        /// Language (c, cpp, java, python)
        #[arg(short, long)]
        language: String,

        /// Source file to grade
        #[arg(short, long)]
        source: PathBuf,

        /// JSON file: [{"input": "...", "expected_output": "..."}]
        #[arg(short, long)]
        tests: PathBuf,

        /// Time limit per test case in milliseconds
        #[arg(long)]
        time_limit: Option<u64>,

        /// Memory limit in MB
        #[arg(long)]
        memory_limit: Option<u64>,

        /// Print the grade response as JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Run a source file once and print its raw output
    Run {
        /// Language (c, cpp, java, python)
        #[arg(short, long)]
        language: String,

        /// Source file to run
        #[arg(short, long)]
        source: PathBuf,

        /// File to feed on stdin (empty input if omitted)
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Show the effective judge configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"))
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Grade {
            language,
            source,
            tests,
            time_limit,
            memory_limit,
            json,
        } => {
            let passed = commands::grade(config, &language, &source, &tests, time_limit, memory_limit, json).await?;
            if !passed {
                std::process::exit(1);
            }
        }
        Commands::Run { language, source, input } => {
            commands::run(config, &language, &source, input.as_deref()).await?;
        }
        Commands::Config => {
            commands::show_config(&config);
        }
    }

    Ok(())
}
