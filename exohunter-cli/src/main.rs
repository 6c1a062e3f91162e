//! ExoHunter CLI: train the hybrid classifier and analyze candidate tables.

mod commands;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// ExoHunter: hybrid exoplanet candidate classifier
#[derive(Parser, Debug)]
#[command(name = "exohunter", version, about, long_about = None)]
struct Cli {
    /// Workspace directory
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Train the models and print held-out accuracies
    Train,
    /// Classify every row of a CSV file
    Detect {
        /// CSV file of candidate measurements
        csv: PathBuf,
        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Attribute tree classifier predictions to features
    Explain {
        /// CSV file of candidate measurements
        csv: PathBuf,
        /// Print the attributions as JSON
        #[arg(long)]
        json: bool,
    },
    /// Summarize the contents and quality of a CSV file
    Insights {
        /// CSV file to summarize
        csv: PathBuf,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write a PDF detection report
    Report {
        /// CSV file of candidate measurements
        csv: PathBuf,
        /// Output PDF path
        #[arg(short, long, default_value = "exohunter_report.pdf")]
        output: PathBuf,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Create default configuration file
    Init,
    /// Show current configuration
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Set up tracing: human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    let log_dir = directories::ProjectDirs::from("dev", "exohunter", "exohunter")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "exohunter.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    commands::handle_command(cli.command, &workspace, cli.config.as_deref()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_detect() {
        let cli = Cli::try_parse_from(["exohunter", "-vv", "detect", "koi.csv", "--json"]).unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Detect { csv, json } => {
                assert_eq!(csv, PathBuf::from("koi.csv"));
                assert!(json);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_report_default_output() {
        let cli = Cli::try_parse_from(["exohunter", "-w", "/tmp", "report", "koi.csv"]).unwrap();
        assert_eq!(cli.workspace, PathBuf::from("/tmp"));
        match cli.command {
            Commands::Report { output, .. } => {
                assert_eq!(output, PathBuf::from("exohunter_report.pdf"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_command_required() {
        assert!(Cli::try_parse_from(["exohunter"]).is_err());
    }
}
