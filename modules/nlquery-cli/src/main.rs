use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

use nlquery_common::Config;
use nlquery_store::MemoryStore;
use nlquery_synth::{ContextBuilder, QueryService, QuerySynthesizer};

/// Collections loaded when no `--data` file is given.
const SAMPLE_DATA: &str = include_str!("../data/sample.json");

#[derive(Parser)]
#[command(name = "nlquery")]
#[command(about = "Ask questions of a document database in plain English")]
#[command(version)]
struct Cli {
    /// JSON file of the form {"collection": [document, ...]}; defaults to bundled sample data
    #[arg(long, global = true)]
    data: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Translate a question into a structured query without running it
    Translate { question: String },

    /// Translate a question, run it, and print the response envelope
    Ask { question: String },

    /// Print the schema summary the prompt would be built from
    Schema,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,nlquery_synth=info,nlquery_store=info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn load_store(path: Option<&Path>) -> Result<Arc<MemoryStore>> {
    let raw = match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read data file {}", path.display()))?,
        None => SAMPLE_DATA.to_string(),
    };
    let data: Value = serde_json::from_str(&raw).context("Data file is not valid JSON")?;
    let store = MemoryStore::from_value(data).await?;
    Ok(Arc::new(store))
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

/// Returns whether the command produced a successful answer.
async fn run(cli: Cli) -> Result<bool> {
    let config = Config::from_env()?;
    tracing::debug!(?config, "Loaded config");
    let store = load_store(cli.data.as_deref()).await?;

    match cli.command {
        Commands::Translate { question } => {
            let synthesizer = QuerySynthesizer::from_config(&config, store);
            match synthesizer.translate(&question).await {
                Ok(query) => {
                    print_json(&query.to_value())?;
                    Ok(true)
                }
                Err(e) => {
                    print_json(&json!({
                        "error": e.to_string(),
                        "kind": e.kind(),
                        "status": e.status_code(),
                        "raw_llm_response": e.raw_response(),
                    }))?;
                    Ok(false)
                }
            }
        }
        Commands::Ask { question } => {
            let service = QueryService::from_config(&config, store);
            let answer = service.ask(&question).await;
            print_json(&serde_json::to_value(&answer)?)?;
            Ok(answer.is_success())
        }
        Commands::Schema => {
            let summary = ContextBuilder::new(store).build().await;
            print!("{summary}");
            Ok(true)
        }
    }
}
