//! Per-protocol collection of simulation runs across network scales.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use color_eyre::eyre::{Context, Result};
use serde::Serialize;

use super::builder::FlowSamples;
use super::counters::{read_counters_file, RoutingCounters};
use super::flow::FlowPolicy;
use super::simulation::{AggregationPolicy, Simulation};
use super::stream::{RecordReader, SimulationStream};
use crate::config::MetricsConfig;
use crate::error::FlowmonError;

/// A simulation together with the network scale it was run at
#[derive(Debug, Clone, Serialize)]
pub struct ScaledRun {
    pub scale: u32,
    pub simulation: Simulation,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProtocolRuns {
    pub protocol: String,
    pub runs: Vec<ScaledRun>,
}

/// Protocol name to ordered runs, protocols kept in first-insertion order
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunCollection {
    protocols: Vec<ProtocolRuns>,
    #[serde(skip)]
    samples: FlowSamples,
}

impl RunCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs recorded for a protocol, in ingestion order
    pub fn get(&self, protocol: &str) -> Option<&[ScaledRun]> {
        self.protocols
            .iter()
            .find(|p| p.protocol == protocol)
            .map(|p| p.runs.as_slice())
    }

    pub fn protocols(&self) -> impl Iterator<Item = &ProtocolRuns> {
        self.protocols.iter()
    }

    pub fn protocol_names(&self) -> Vec<&str> {
        self.protocols.iter().map(|p| p.protocol.as_str()).collect()
    }

    /// Flow samples gathered across everything ingested so far
    pub fn samples(&self) -> &FlowSamples {
        &self.samples
    }

    pub fn total_runs(&self) -> usize {
        self.protocols.iter().map(|p| p.runs.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_runs() == 0
    }

    /// Register a protocol so it keeps its position even if all its files fail
    pub fn register_protocol(&mut self, protocol: &str) {
        if self.get(protocol).is_none() {
            self.protocols.push(ProtocolRuns {
                protocol: protocol.to_string(),
                runs: Vec::new(),
            });
        }
    }

    pub fn push(&mut self, protocol: &str, scale: u32, simulation: Simulation) {
        self.register_protocol(protocol);
        if let Some(entry) = self.protocols.iter_mut().find(|p| p.protocol == protocol) {
            entry.runs.push(ScaledRun { scale, simulation });
        }
    }

    /// Ingest every simulation record of one flow monitor log.
    ///
    /// The file is parsed in full before anything is committed, so an error
    /// leaves previously ingested runs and samples untouched.
    pub fn ingest_source<R: BufRead>(
        &mut self,
        protocol: &str,
        scale: u32,
        source: R,
        counters: RoutingCounters,
        metrics: &MetricsConfig,
    ) -> Result<usize, FlowmonError> {
        let mut samples = FlowSamples::default();
        let simulations = ingest_simulations(source, counters, metrics, &mut samples)?;

        let count = simulations.len();
        for simulation in simulations {
            log::info!(
                "{} @ {}: {} data flows, {} data packets delivered",
                protocol,
                scale,
                simulation.stats.data_flow_count,
                simulation.stats.data_packets_delivered
            );
            self.push(protocol, scale, simulation);
        }
        self.samples.rx_bitrates.extend(samples.rx_bitrates);
        self.samples.loss_ratios.extend(samples.loss_ratios);
        self.samples.jitter_means.extend(samples.jitter_means);
        Ok(count)
    }

    /// Ingest a flow monitor log file and its optional counters log
    pub fn ingest_file(
        &mut self,
        protocol: &str,
        scale: u32,
        flowmon_path: &Path,
        counters_path: Option<&Path>,
        metrics: &MetricsConfig,
    ) -> Result<usize> {
        log::info!("Ingesting {} ({} @ {})", flowmon_path.display(), protocol, scale);

        let counters = match counters_path {
            Some(path) => read_counters_file(path)?,
            None => RoutingCounters::default(),
        };

        let file = File::open(flowmon_path)
            .with_context(|| format!("Failed to open flow monitor log: {}", flowmon_path.display()))?;
        let reader = BufReader::with_capacity(64 * 1024, file);

        let count = self
            .ingest_source(protocol, scale, reader, counters, metrics)
            .with_context(|| format!("Failed to ingest flow monitor log {}", flowmon_path.display()))?;

        if count == 0 {
            log::warn!(
                "No <{}> records found in {}",
                metrics.record_tag,
                flowmon_path.display()
            );
        }
        Ok(count)
    }
}

/// Stream every record of a flow monitor log into finished simulations
pub fn ingest_simulations<R: BufRead>(
    source: R,
    counters: RoutingCounters,
    metrics: &MetricsConfig,
    samples: &mut FlowSamples,
) -> Result<Vec<Simulation>, FlowmonError> {
    let records = RecordReader::new(source, &metrics.record_tag, metrics.record_depth);
    let flow_policy = FlowPolicy {
        retain_silent_flows: metrics.retain_silent_flows,
        ratio_guard: metrics.ratio_guard,
    };
    let aggregation = AggregationPolicy {
        data_port: metrics.data_port,
        keep_flows: metrics.keep_flows,
    };

    SimulationStream::new(records, flow_policy, aggregation, counters, samples).collect()
}
