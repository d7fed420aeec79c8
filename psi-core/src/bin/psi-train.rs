//! `psi-train` - fits the PSI ensemble and scaler from the historical dataset.
//!
//! # Usage
//!
//! ```bash
//! psi-train --dataset suraksha_pune_dataset_with_coords.csv \
//!     --model-out suraksha_psi_model.json --scaler-out scaler.json
//! ```

use std::path::PathBuf;

use clap::Parser;
use psi_core::training::{self, TrainingConfig};
use psi_core::HistoricalDataset;

/// Command-line arguments for the training binary.
#[derive(Parser, Debug)]
#[command(name = "psi-train", version, about = "Train the Personal Safety Index model", long_about = None)]
struct Args {
    /// Historical dataset CSV (must include `psi_score`).
    #[arg(short, long, value_name = "FILE")]
    dataset: PathBuf,

    /// Where to write the trained model.
    #[arg(long, value_name = "FILE", default_value = "suraksha_psi_model.json")]
    model_out: PathBuf,

    /// Where to write the fitted scaler.
    #[arg(long, value_name = "FILE", default_value = "scaler.json")]
    scaler_out: PathBuf,

    /// Optional JSON training report.
    #[arg(long, value_name = "FILE")]
    report_out: Option<PathBuf>,

    /// Number of trees in the ensemble.
    #[arg(long, default_value_t = 200)]
    trees: usize,

    /// Maximum tree depth.
    #[arg(long, default_value_t = 12)]
    max_depth: u32,

    /// Learning rate applied to each tree.
    #[arg(long, default_value_t = 0.1)]
    shrinkage: f32,

    /// Fraction of rows held out for evaluation.
    #[arg(long, default_value_t = 0.2)]
    test_fraction: f64,

    /// Seed for the train/test shuffle.
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() {
    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(args.log_level.as_str()))
        .init();

    log::info!("PSI training v{}", psi_core::VERSION);

    let config = TrainingConfig {
        trees: args.trees,
        max_depth: args.max_depth,
        shrinkage: args.shrinkage,
        test_fraction: args.test_fraction,
        seed: args.seed,
        ..Default::default()
    };

    if let Err(e) = run(&args, &config) {
        log::error!("Training failed: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args, config: &TrainingConfig) -> psi_core::Result<()> {
    config.validate()?;

    let dataset = HistoricalDataset::from_csv(&args.dataset)?;

    log::info!("  trees        : {}", config.trees);
    log::info!("  max depth    : {}", config.max_depth);
    log::info!("  shrinkage    : {}", config.shrinkage);
    log::info!("  test fraction: {}", config.test_fraction);

    let mut trained = training::train(&dataset, config)?;
    trained.save(&args.model_out, &args.scaler_out, args.report_out.as_deref())?;

    let report = &trained.report;
    match (report.mae, report.r2) {
        (Some(mae), Some(r2)) => log::info!("MAE: {:.4}  R2 Score: {:.4}", mae, r2),
        _ => log::warn!("Test split is empty, no evaluation metrics"),
    }

    log::info!(
        "Model saved to {} (sha256 {})",
        args.model_out.display(),
        report.model_checksum.as_deref().unwrap_or("-")
    );
    log::info!("Scaler saved to {}", args.scaler_out.display());

    Ok(())
}
