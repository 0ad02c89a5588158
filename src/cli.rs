use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::anomaly::{AnomalyAlgorithm, StatisticalMethod};
use crate::clustering::ClusterAlgorithm;

/// Address pattern scanner CLI (library-facing definitions)
#[derive(Debug, Parser)]
#[command(
    name = "pattern-scan",
    about = "Cluster, score and group address records",
    version,
    disable_help_subcommand = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the full analysis pipeline
    Analyze {
        #[command(flatten)]
        common: CommonArgs,
        /// Print summary counts instead of the full result
        #[arg(long)]
        summary: bool,
    },
    /// Run only the clustering stage
    Cluster {
        #[command(flatten)]
        common: CommonArgs,
        /// kmeans, dbscan or hierarchical
        #[arg(long)]
        algorithm: Option<ClusterAlgorithm>,
        /// Target cluster count for k-means and hierarchical
        #[arg(long)]
        k: Option<usize>,
    },
    /// Run only the anomaly stage (rule anomalies included)
    Detect {
        #[command(flatten)]
        common: CommonArgs,
        /// isolation_forest, lof or statistical
        #[arg(long)]
        algorithm: Option<AnomalyAlgorithm>,
        /// Method for the statistical detector
        #[arg(long, value_enum)]
        method: Option<MethodArg>,
    },
    /// Print the default configuration
    Config {
        #[arg(long, value_enum, default_value_t = ConfigFormat::Toml)]
        format: ConfigFormat,
    },
}

/// Arguments shared by the analysis commands
#[derive(Debug, Args)]
pub struct CommonArgs {
    /// JSON file with an array of records
    #[arg(long, short)]
    pub input: PathBuf,
    /// TOML or JSON configuration file
    #[arg(long, short)]
    pub config: Option<PathBuf>,
    /// Seed for the randomized algorithms
    #[arg(long)]
    pub seed: Option<u64>,
    /// Write JSON here instead of stdout
    #[arg(long, short)]
    pub output: Option<PathBuf>,
    /// Pretty-print JSON
    #[arg(long)]
    pub pretty: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConfigFormat {
    Toml,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MethodArg {
    Zscore,
    Iqr,
}

impl From<MethodArg> for StatisticalMethod {
    fn from(arg: MethodArg) -> Self {
        match arg {
            MethodArg::Zscore => StatisticalMethod::ZScore,
            MethodArg::Iqr => StatisticalMethod::Iqr,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_analyze() {
        let cli = Cli::try_parse_from(["pattern-scan", "analyze", "--input", "records.json", "--seed", "7", "--pretty"])
            .unwrap();
        match cli.command {
            Commands::Analyze { common, summary } => {
                assert_eq!(common.input, PathBuf::from("records.json"));
                assert_eq!(common.seed, Some(7));
                assert!(common.pretty);
                assert!(!summary);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_cluster_algorithm() {
        let cli = Cli::try_parse_from(["pattern-scan", "cluster", "-i", "r.json", "--algorithm", "dbscan"]).unwrap();
        match cli.command {
            Commands::Cluster { algorithm, k, .. } => {
                assert_eq!(algorithm, Some(ClusterAlgorithm::Dbscan));
                assert_eq!(k, None);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_detect_method() {
        let cli = Cli::try_parse_from([
            "pattern-scan",
            "detect",
            "-i",
            "r.json",
            "--algorithm",
            "statistical",
            "--method",
            "iqr",
        ])
        .unwrap();
        match cli.command {
            Commands::Detect { algorithm, method, .. } => {
                assert_eq!(algorithm, Some(AnomalyAlgorithm::Statistical));
                assert_eq!(method.map(StatisticalMethod::from), Some(StatisticalMethod::Iqr));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_rejects_unknown_algorithm() {
        assert!(Cli::try_parse_from(["pattern-scan", "cluster", "-i", "r.json", "--algorithm", "spectral"]).is_err());
    }
}
