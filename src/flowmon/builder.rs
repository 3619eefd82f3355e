//! Flow assembly from one complete flow monitor record.
//!
//! Classifier identities, per-flow statistics and probe samples live in
//! separate sections of the record; this module joins them by flow id.

use std::collections::HashMap;

use serde::Serialize;

use super::element::Element;
use super::flow::{FiveTuple, Flow, FlowPolicy, ProbeFlowStats};
use crate::error::FlowmonError;

/// Classifier block tags; each may appear at most once per record
pub const CLASSIFIER_TAGS: [&str; 2] = ["Ipv4FlowClassifier", "Ipv6FlowClassifier"];

/// Flows of one record, iterable in document order and addressable by id
#[derive(Debug, Clone, Default)]
pub struct FlowSet {
    flows: Vec<Flow>,
    index: HashMap<u32, usize>,
    /// Whether any classifier block was present
    pub classifier_found: bool,
    /// Number of distinct classifier kinds merged (IPv4, IPv6)
    pub classifier_kinds: usize,
    /// Classifier entries whose flow id has no retained flow
    pub unmatched_classifier_entries: usize,
    /// Probe samples whose flow id has no retained flow
    pub unmatched_probe_samples: usize,
    /// Flows with zero received packets left out by policy
    pub silent_flows_dropped: usize,
}

impl FlowSet {
    pub fn get(&self, flow_id: u32) -> Option<&Flow> {
        self.index.get(&flow_id).map(|&i| &self.flows[i])
    }

    fn get_mut(&mut self, flow_id: u32) -> Option<&mut Flow> {
        self.index.get(&flow_id).map(|&i| &mut self.flows[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Flow> {
        self.flows.iter()
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    pub fn into_flows(self) -> Vec<Flow> {
        self.flows
    }

    fn insert(&mut self, flow: Flow) -> Result<(), FlowmonError> {
        if self.index.contains_key(&flow.flow_id) {
            return Err(FlowmonError::schema(
                "FlowStats",
                format!("flowId {} appears more than once", flow.flow_id),
            ));
        }
        self.index.insert(flow.flow_id, self.flows.len());
        self.flows.push(flow);
        Ok(())
    }
}

/// Per-flow samples collected across every record and file ingested.
///
/// Owned by the caller and threaded through [`build_flows`]; used for
/// cross-simulation distributions.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FlowSamples {
    /// Bits per second
    pub rx_bitrates: Vec<f64>,
    /// Fractions in [0, 1]
    pub loss_ratios: Vec<f64>,
    /// Seconds
    pub jitter_means: Vec<f64>,
}

/// Min / mean / max of one sample series
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SampleSummary {
    pub count: usize,
    pub min: f64,
    pub mean: f64,
    pub max: f64,
}

impl SampleSummary {
    pub fn of(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        Self { count: values.len(), min, mean, max }
    }
}

impl FlowSamples {
    pub fn record(&mut self, flow: &Flow) {
        let metrics = flow.metrics();
        self.rx_bitrates.push(metrics.rx_bitrate);
        if let Some(loss) = metrics.packet_loss_ratio {
            self.loss_ratios.push(loss);
        }
        if let Some(jitter) = metrics.jitter_mean {
            self.jitter_means.push(jitter);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rx_bitrates.is_empty()
    }
}

/// Collect classifier identities keyed by flow id
fn classifier_identities(record: &Element) -> Result<(usize, HashMap<u32, FiveTuple>), FlowmonError> {
    let mut identities = HashMap::new();
    let mut kinds = 0;

    for tag in CLASSIFIER_TAGS {
        let blocks: Vec<&Element> = record.children_named(tag).collect();
        if blocks.len() > 1 {
            return Err(FlowmonError::schema(
                &record.name,
                format!("expected one <{}> block, found {}", tag, blocks.len()),
            ));
        }
        if let Some(block) = blocks.first() {
            kinds += 1;
            for entry in block.children_named("Flow") {
                let (flow_id, tuple) = FiveTuple::from_element(entry)?;
                identities.insert(flow_id, tuple);
            }
        }
    }

    if kinds > 1 {
        log::warn!(
            "<{}> carries both IPv4 and IPv6 classifier blocks; merging their identities",
            record.name
        );
    }

    Ok((kinds, identities))
}

/// Build the flow collection of one simulation record.
///
/// Steps: read classifier identities, construct flows from
/// `FlowStats/Flow`, attach identities, then append probe samples from
/// `FlowProbes/FlowProbe/FlowStats`. Classifier or probe entries for unknown
/// flow ids are skipped.
pub fn build_flows(
    record: &Element,
    policy: &FlowPolicy,
    samples: &mut FlowSamples,
) -> Result<FlowSet, FlowmonError> {
    let (classifier_kinds, identities) = classifier_identities(record)?;

    let mut set = FlowSet {
        classifier_found: classifier_kinds > 0,
        classifier_kinds,
        ..FlowSet::default()
    };

    for flow_el in record.find_all("FlowStats/Flow") {
        let flow = Flow::from_element(flow_el, policy)?;
        if flow.is_silent() && !policy.retain_silent_flows {
            set.silent_flows_dropped += 1;
            continue;
        }
        set.insert(flow)?;
    }

    for (flow_id, tuple) in identities {
        match set.get_mut(flow_id) {
            Some(flow) => flow.set_five_tuple(tuple),
            None => {
                log::debug!("Classifier entry for flow {} has no retained flow, skipping", flow_id);
                set.unmatched_classifier_entries += 1;
            }
        }
    }

    for probe_el in record.find_all("FlowProbes/FlowProbe") {
        let probe_id: u32 = probe_el.parse_attr("index")?;
        for stats_el in probe_el.children_named("FlowStats") {
            let (flow_id, probe) = ProbeFlowStats::from_element(probe_id, stats_el)?;
            match set.get_mut(flow_id) {
                Some(flow) => flow.push_probe(probe),
                None => set.unmatched_probe_samples += 1,
            }
        }
    }

    for flow in set.iter() {
        samples.record(flow);
    }

    log::debug!(
        "Built {} flows ({} silent dropped, {} unmatched classifier entries)",
        set.len(),
        set.silent_flows_dropped,
        set.unmatched_classifier_entries
    );

    Ok(set)
}
