// src/main.rs
//! Address pattern scanner entry point
//! Reads records from JSON, runs the requested stage and writes JSON results.
use anyhow::{Context, Result};
use chain_patterns::cli::{Cli, CommonArgs, Commands, ConfigFormat};
use chain_patterns::{load_records, PatternAnalyzer, PatternRecognitionConfig};
use clap::Parser;
use serde::Serialize;
use std::fs;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    init_logging()?;

    match cli.command {
        Commands::Analyze { common, summary } => {
            let config = load_config(&common)?;
            let records = load_records(&common.input)
                .with_context(|| format!("failed to read records from {}", common.input.display()))?;
            let analyzer = PatternAnalyzer::new(config).context("invalid configuration")?;
            let result = analyzer.analyze(&records).context("analysis failed")?;
            if summary {
                write_json(&result.summary(), &common)?;
            } else {
                write_json(&result, &common)?;
            }
        }
        Commands::Cluster { common, algorithm, k } => {
            let mut config = load_config(&common)?;
            if let Some(algorithm) = algorithm {
                config.cluster_algorithm = algorithm;
            }
            if let Some(k) = k {
                config.kmeans.k = k;
                config.hierarchical.k = k;
            }
            let records = load_records(&common.input)
                .with_context(|| format!("failed to read records from {}", common.input.display()))?;
            let analyzer = PatternAnalyzer::new(config).context("invalid configuration")?;
            let clusters = analyzer.cluster_records(&records)?;
            info!("Found {} clusters", clusters.len());
            write_json(&clusters, &common)?;
        }
        Commands::Detect {
            common,
            algorithm,
            method,
        } => {
            let mut config = load_config(&common)?;
            if let Some(algorithm) = algorithm {
                config.anomaly_algorithm = algorithm;
            }
            if let Some(method) = method {
                config.statistical.method = method.into();
            }
            let records = load_records(&common.input)
                .with_context(|| format!("failed to read records from {}", common.input.display()))?;
            let analyzer = PatternAnalyzer::new(config).context("invalid configuration")?;
            let anomalies = analyzer.detect_records(&records)?;
            info!("Found {} anomalies", anomalies.len());
            write_json(&anomalies, &common)?;
        }
        Commands::Config { format } => {
            let config = PatternRecognitionConfig::default();
            let rendered = match format {
                ConfigFormat::Toml => toml::to_string_pretty(&config)?,
                ConfigFormat::Json => serde_json::to_string_pretty(&config)?,
            };
            println!("{}", rendered);
        }
    }

    Ok(())
}

fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // stdout carries the JSON result
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Configuration from `--config` (or the environment), with `--seed` applied
fn load_config(args: &CommonArgs) -> Result<PatternRecognitionConfig> {
    let mut config = match &args.config {
        Some(path) => PatternRecognitionConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => PatternRecognitionConfig::from_env().context("invalid PATTERNS_* environment")?,
    };
    if let Some(seed) = args.seed {
        config.seed = Some(seed);
    }
    Ok(config)
}

fn write_json<T: Serialize>(value: &T, args: &CommonArgs) -> Result<()> {
    let json = if args.pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };

    match &args.output {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
            info!("Wrote results to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}
