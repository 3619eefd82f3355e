//! Flow monitor analysis CLI.
//!
//! Ingests per-protocol, per-scale flow monitor and counters logs and
//! reports comparable metrics.

use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Context, Result};
use env_logger::Env;
use log::info;

use flowmetrics::config::{load_config, AnalysisConfig};
use flowmetrics::flowmon::RunCollection;
use flowmetrics::{orchestrator, report};

#[derive(Parser, Debug)]
#[command(name = "flowmetrics")]
#[command(about = "Flow monitor analysis for MANET routing protocol comparisons")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to an analysis configuration YAML file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory containing the flow monitor and counters logs
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Output directory for reports
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Protocols to ingest, comma separated
    #[arg(long, value_delimiter = ',')]
    protocols: Option<Vec<String>>,

    /// Network sizes to ingest, comma separated
    #[arg(long, value_delimiter = ',')]
    sizes: Option<Vec<u32>>,

    /// Keep flows that received no packets
    #[arg(long)]
    retain_silent_flows: bool,

    /// Abort on the first file that fails to ingest
    #[arg(long)]
    strict: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ingest all configured runs and write text and JSON reports
    Report,

    /// Ingest all configured runs and print a summary table
    Summary,

    /// Ingest a single flow monitor log
    File {
        /// Protocol name to file the run under
        #[arg(long)]
        protocol: String,

        /// Network scale (node count) of the run
        #[arg(long)]
        scale: u32,

        /// Flow monitor log
        flowmon: PathBuf,

        /// Routing counters log
        #[arg(long)]
        counters: Option<PathBuf>,
    },
}

impl Cli {
    fn resolve_config(&self) -> Result<AnalysisConfig> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => AnalysisConfig::default(),
        };

        if let Some(dir) = &self.data_dir {
            config.input.data_dir = dir.clone();
        }
        if let Some(dir) = &self.output {
            config.output.directory = dir.clone();
        }
        if let Some(level) = &self.log_level {
            config.general.log_level = level.clone();
        }
        if let Some(protocols) = &self.protocols {
            config.input.protocols = protocols.clone();
        }
        if let Some(sizes) = &self.sizes {
            config.input.network_sizes = sizes.clone();
        }
        if self.retain_silent_flows {
            config.metrics.retain_silent_flows = true;
        }

        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    let config = cli.resolve_config()?;

    env_logger::Builder::from_env(Env::default().default_filter_or(config.general.log_level.as_str())).init();

    info!("Data directory: {:?}", config.input.data_dir);

    match &cli.command {
        Commands::Report => {
            let (runs, _) = orchestrator::collect_runs(&config, cli.strict)?;
            write_reports(&config, &runs)?;
            report::print_summary(&runs);
        }
        Commands::Summary => {
            let (runs, summary) = orchestrator::collect_runs(&config, cli.strict)?;
            report::print_summary(&runs);
            println!(
                "Files: {} ingested, {} missing, {} failed",
                summary.files_ingested, summary.files_missing, summary.files_failed
            );
        }
        Commands::File {
            protocol,
            scale,
            flowmon,
            counters,
        } => {
            let mut runs = RunCollection::new();
            runs.ingest_file(protocol, *scale, flowmon, counters.as_deref(), &config.metrics)?;
            report::print_summary(&runs);
        }
    }

    Ok(())
}

fn write_reports(config: &AnalysisConfig, runs: &RunCollection) -> Result<()> {
    let output = &config.output.directory;
    fs::create_dir_all(output)
        .with_context(|| format!("Failed to create output directory: {}", output.display()))?;

    let metadata = report::ReportMetadata::new(&config.input.data_dir, runs);
    report::generate_json_report(&metadata, runs, &output.join("flow_report.json"))?;
    report::generate_text_report(&metadata, runs, &output.join("flow_report.txt"))?;

    info!("Reports written to {}", output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from([
            "flowmetrics",
            "--data-dir", "runs",
            "--protocols", "olsr,aodv",
            "--sizes", "5,10",
            "report",
        ]);

        assert_eq!(cli.data_dir, Some(PathBuf::from("runs")));
        assert!(matches!(cli.command, Commands::Report));

        let config = cli.resolve_config().unwrap();
        assert_eq!(config.input.protocols, vec!["olsr", "aodv"]);
        assert_eq!(config.input.network_sizes, vec![5, 10]);
        assert!(!config.metrics.retain_silent_flows);
    }

    #[test]
    fn test_file_subcommand_args() {
        let cli = Cli::parse_from([
            "flowmetrics",
            "--retain-silent-flows",
            "file",
            "--protocol", "sally",
            "--scale", "25",
            "--counters", "sally.custom.25",
            "sally.flomonitor.25",
        ]);

        match cli.command {
            Commands::File { ref protocol, scale, ref flowmon, ref counters } => {
                assert_eq!(protocol, "sally");
                assert_eq!(scale, 25);
                assert_eq!(flowmon, &PathBuf::from("sally.flomonitor.25"));
                assert_eq!(counters.as_deref(), Some(std::path::Path::new("sally.custom.25")));
            }
            _ => panic!("expected file subcommand"),
        }
        assert!(cli.resolve_config().unwrap().metrics.retain_silent_flows);
    }
}
