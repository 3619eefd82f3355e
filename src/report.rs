//! Report generation for collected simulation runs.
//!
//! Generates both JSON and human-readable text reports.

use std::fs;
use std::path::Path;

use color_eyre::eyre::{Context, Result};
use serde::Serialize;

use crate::flowmon::{RunCollection, SampleSummary, SimulationStats};

#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    pub analysis_timestamp: String,
    pub data_dir: String,
    pub protocols: Vec<String>,
    pub total_runs: usize,
}

impl ReportMetadata {
    pub fn new(data_dir: &Path, runs: &RunCollection) -> Self {
        Self {
            analysis_timestamp: chrono::Utc::now().to_rfc3339(),
            data_dir: data_dir.display().to_string(),
            protocols: runs.protocol_names().iter().map(|p| p.to_string()).collect(),
            total_runs: runs.total_runs(),
        }
    }
}

/// Distribution summaries over every ingested flow
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SampleReport {
    pub rx_bitrate: SampleSummary,
    pub loss_ratio: SampleSummary,
    pub jitter_mean: SampleSummary,
}

impl SampleReport {
    pub fn of(runs: &RunCollection) -> Self {
        let samples = runs.samples();
        Self {
            rx_bitrate: SampleSummary::of(&samples.rx_bitrates),
            loss_ratio: SampleSummary::of(&samples.loss_ratios),
            jitter_mean: SampleSummary::of(&samples.jitter_means),
        }
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    metadata: &'a ReportMetadata,
    samples: SampleReport,
    runs: &'a RunCollection,
}

/// Generate JSON report
pub fn generate_json_report(metadata: &ReportMetadata, runs: &RunCollection, output_path: &Path) -> Result<()> {
    let report = JsonReport {
        metadata,
        samples: SampleReport::of(runs),
        runs,
    };
    let json = serde_json::to_string_pretty(&report)
        .context("Failed to serialize report to JSON")?;

    fs::write(output_path, json)
        .with_context(|| format!("Failed to write JSON report to {}", output_path.display()))?;

    log::info!("JSON report written to {}", output_path.display());
    Ok(())
}

fn stats_lines(stats: &SimulationStats) -> Vec<String> {
    vec![
        format!("  Data flows: {}", stats.data_flow_count),
        format!("  TX bitrate: {:.2} kbit/s", stats.mean_tx_bitrate / 1e3),
        format!("  RX bitrate: {:.2} kbit/s", stats.mean_rx_bitrate / 1e3),
        format!("  Delay mean: {:.2} ms", stats.mean_delay * 1e3),
        format!("  Jitter mean: {:.2} ms", stats.mean_jitter * 1e3),
        format!("  Packet size mean: {:.2} bytes", stats.mean_packet_size),
        format!("  Packet loss ratio: {:.2} %", stats.mean_packet_loss_ratio * 100.0),
        format!("  Packet delivery ratio: {:.2} %", stats.mean_packet_delivery_ratio),
        format!("  Hop count mean: {:.2}", stats.mean_hop_count),
        format!("  Data packets delivered: {}", stats.data_packets_delivered),
        format!("  Lost packets: {}", stats.lost_packets),
        format!("  Control packets: {}", stats.control_packets),
        format!("  Normalised routing load: {:.3}", stats.normalized_routing_load),
        format!("  Energy consumed: {:.3} J", stats.energy_consumed),
    ]
}

/// Render the human-readable report text
pub fn render_text_report(metadata: &ReportMetadata, runs: &RunCollection) -> String {
    let mut lines: Vec<String> = Vec::new();

    lines.push("=".repeat(80));
    lines.push("                    FLOW MONITOR ROUTING PROTOCOL COMPARISON".to_string());
    lines.push("=".repeat(80));
    lines.push(String::new());

    lines.push(format!("Analysis Date: {}", metadata.analysis_timestamp));
    lines.push(format!("Data Directory: {}", metadata.data_dir));
    lines.push(format!("Protocols: {}", metadata.protocols.join(", ")));
    lines.push(format!("Runs: {}", metadata.total_runs));
    lines.push(String::new());

    for protocol in runs.protocols() {
        lines.push("=".repeat(80));
        lines.push(format!("Stats for {}", protocol.protocol));
        lines.push("=".repeat(80));

        if protocol.runs.is_empty() {
            lines.push("  No runs ingested".to_string());
            lines.push(String::new());
            continue;
        }

        for run in &protocol.runs {
            lines.push(format!("Network size {}", run.scale));
            lines.extend(stats_lines(&run.simulation.stats));
            lines.push(String::new());
        }
    }

    let samples = SampleReport::of(runs);
    if samples.rx_bitrate.count > 0 {
        lines.push("=".repeat(80));
        lines.push("Flow distributions (all protocols and scales)".to_string());
        lines.push("=".repeat(80));
        lines.push(format!(
            "  RX bitrate: n={} min {:.2} / mean {:.2} / max {:.2} kbit/s",
            samples.rx_bitrate.count,
            samples.rx_bitrate.min / 1e3,
            samples.rx_bitrate.mean / 1e3,
            samples.rx_bitrate.max / 1e3
        ));
        lines.push(format!(
            "  Loss ratio: n={} min {:.2} / mean {:.2} / max {:.2} %",
            samples.loss_ratio.count,
            samples.loss_ratio.min * 100.0,
            samples.loss_ratio.mean * 100.0,
            samples.loss_ratio.max * 100.0
        ));
        lines.push(format!(
            "  Jitter: n={} min {:.2} / mean {:.2} / max {:.2} ms",
            samples.jitter_mean.count,
            samples.jitter_mean.min * 1e3,
            samples.jitter_mean.mean * 1e3,
            samples.jitter_mean.max * 1e3
        ));
        lines.push(String::new());
    }

    lines.push("=".repeat(80));
    lines.join("\n")
}

/// Generate human-readable text report
pub fn generate_text_report(metadata: &ReportMetadata, runs: &RunCollection, output_path: &Path) -> Result<()> {
    let content = render_text_report(metadata, runs);
    fs::write(output_path, content)
        .with_context(|| format!("Failed to write text report to {}", output_path.display()))?;

    log::info!("Text report written to {}", output_path.display());
    Ok(())
}

/// Print a summary table to stdout
pub fn print_summary(runs: &RunCollection) {
    println!("\n=== FLOW MONITOR SUMMARY ===\n");
    println!(
        "{:<10} {:>6} {:>12} {:>10} {:>10} {:>8} {:>10} {:>8}",
        "protocol", "nodes", "rx kbit/s", "delay ms", "jitter ms", "loss %", "ctrl pkts", "NRL"
    );
    for protocol in runs.protocols() {
        for run in &protocol.runs {
            let s = &run.simulation.stats;
            println!(
                "{:<10} {:>6} {:>12.2} {:>10.2} {:>10.2} {:>8.2} {:>10} {:>8.3}",
                protocol.protocol,
                run.scale,
                s.mean_rx_bitrate / 1e3,
                s.mean_delay * 1e3,
                s.mean_jitter * 1e3,
                s.mean_packet_loss_ratio * 100.0,
                s.control_packets,
                s.normalized_routing_load
            );
        }
    }
    println!();
}
