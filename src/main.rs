use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use aurum::config::ServiceConfig;
use aurum::dataset::build_feature_windows;
use aurum::domain::FeatureRow;
use aurum::error::Result;
use aurum::model::{capabilities, ModelRegistry};
use aurum::training::{run_evaluation, train_policy, EvaluationRequest, TrainingRunConfig};

#[derive(Parser)]
#[command(name = "aurum", about = "RL policy training and walk-forward evaluation service")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a policy on a JSON file of feature rows
    Train {
        /// Path to a JSON array of feature rows
        #[arg(long)]
        features: PathBuf,
        /// Path to a training run config (JSON); defaults apply when omitted
        #[arg(long)]
        config: PathBuf,
        #[arg(long, default_value_t = 30)]
        window_size: usize,
        #[arg(long, default_value_t = 1)]
        stride: usize,
    },
    /// Evaluate a trained artifact with walk-forward folds
    Evaluate {
        /// Path to a full evaluation request (JSON)
        #[arg(long)]
        request: PathBuf,
    },
    /// Report which optional capabilities this build can serve
    Capabilities,
}

fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let service = ServiceConfig::load()?;
    init_logging(&service);

    match cli.command {
        Commands::Train {
            features,
            config,
            window_size,
            stride,
        } => {
            let rows: Vec<FeatureRow> = load_json(&features)?;
            let run_config: TrainingRunConfig = load_json(&config)?;
            let windows = build_feature_windows(&rows, window_size, stride)?;
            info!(rows = rows.len(), windows = windows.len(), "training");
            let result = train_policy(&windows, &run_config)?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Evaluate { request } => {
            let request: EvaluationRequest = load_json(&request)?;
            let registry = ModelRegistry::new();
            let report = run_evaluation(&request, &service, &registry, None).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Capabilities => {
            println!("{}", serde_json::to_string_pretty(&capabilities(false))?);
        }
    }
    Ok(())
}

fn init_logging(service: &ServiceConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},aurum=debug", service.log_level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
