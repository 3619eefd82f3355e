//! Simulation-level aggregation over data flows.

use serde::{Deserialize, Serialize};

use super::builder::FlowSet;
use super::counters::RoutingCounters;
use super::flow::Flow;

/// Destination port of application data traffic
pub const DATA_PORT: u16 = 9;

/// Aggregation options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationPolicy {
    /// Flows whose classifier destination port equals this are data flows
    pub data_port: u16,
    /// Keep the per-flow collection after aggregation
    pub keep_flows: bool,
}

impl Default for AggregationPolicy {
    fn default() -> Self {
        Self {
            data_port: DATA_PORT,
            keep_flows: true,
        }
    }
}

/// Running sum over defined samples; mean of an empty accumulator is 0
#[derive(Debug, Clone, Copy, Default)]
struct MeanAccumulator {
    sum: f64,
    count: usize,
}

impl MeanAccumulator {
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn add_opt(&mut self, value: Option<f64>) {
        if let Some(v) = value {
            self.add(v);
        }
    }

    fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

/// Aggregate metrics of one simulation run
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SimulationStats {
    /// Flows whose destination port is the data port
    pub data_flow_count: usize,
    /// Sum of rxPackets over data flows
    pub data_packets_delivered: u64,
    /// Sum of lostPackets over data flows
    pub lost_packets: u64,
    /// Mean receive bitrate over data flows, bit/s
    pub mean_rx_bitrate: f64,
    /// Mean transmit bitrate over data flows, bit/s
    pub mean_tx_bitrate: f64,
    /// Seconds
    pub mean_delay: f64,
    /// Seconds
    pub mean_jitter: f64,
    /// Bytes per received packet
    pub mean_packet_size: f64,
    /// Fraction
    pub mean_packet_loss_ratio: f64,
    /// Percent
    pub mean_packet_delivery_ratio: f64,
    pub mean_hop_count: f64,
    pub routing_packets: u64,
    pub control_packets: u64,
    /// Joules
    pub energy_consumed: f64,
    /// Control packets per delivered data packet
    pub normalized_routing_load: f64,
}

impl SimulationStats {
    /// Throughput is the mean receive bitrate of data flows
    pub fn throughput(&self) -> f64 {
        self.mean_rx_bitrate
    }
}

/// One complete run for one (protocol, scale) pair
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Simulation {
    pub stats: SimulationStats,
    /// Retained flows in document order; empty when flows are not kept
    pub flows: Vec<Flow>,
    /// Number of flows built before any were released
    pub flow_count: usize,
    pub classifier_found: bool,
}

impl Simulation {
    /// Join flows with their identities and counters into a finished simulation.
    ///
    /// Only flows with a classifier identity whose destination port equals
    /// the data port contribute to the flow means. Empty subsets yield
    /// zero-valued means.
    pub fn aggregate(flows: FlowSet, counters: RoutingCounters, policy: &AggregationPolicy) -> Self {
        if !flows.classifier_found {
            log::warn!("Record has no flow classifier block; data-flow metrics default to zero");
        }

        let mut stats = SimulationStats {
            routing_packets: counters.routing_packets,
            control_packets: counters.control_packets,
            energy_consumed: counters.energy_consumed,
            ..SimulationStats::default()
        };

        let mut rx_bitrate = MeanAccumulator::default();
        let mut tx_bitrate = MeanAccumulator::default();
        let mut delay = MeanAccumulator::default();
        let mut jitter = MeanAccumulator::default();
        let mut packet_size = MeanAccumulator::default();
        let mut loss = MeanAccumulator::default();
        let mut delivery = MeanAccumulator::default();
        let mut hops = MeanAccumulator::default();

        for flow in flows.iter().filter(|f| is_data_flow(f, policy.data_port)) {
            let m = flow.metrics();
            stats.data_flow_count += 1;
            stats.data_packets_delivered += flow.rx_packets;
            stats.lost_packets += flow.lost_packets;

            rx_bitrate.add(m.rx_bitrate);
            tx_bitrate.add(m.tx_bitrate);
            delay.add_opt(m.delay_mean);
            jitter.add_opt(m.jitter_mean);
            packet_size.add_opt(m.packet_size_mean);
            loss.add_opt(m.packet_loss_ratio);
            delivery.add_opt(m.packet_delivery_ratio);
            if !flow.is_silent() {
                hops.add(m.hop_count);
            }
        }

        if stats.data_flow_count == 0 {
            log::warn!("No data flows on port {}; flow means default to zero", policy.data_port);
        }

        stats.mean_rx_bitrate = rx_bitrate.mean();
        stats.mean_tx_bitrate = tx_bitrate.mean();
        stats.mean_delay = delay.mean();
        stats.mean_jitter = jitter.mean();
        stats.mean_packet_size = packet_size.mean();
        stats.mean_packet_loss_ratio = loss.mean();
        stats.mean_packet_delivery_ratio = delivery.mean();
        stats.mean_hop_count = hops.mean();
        stats.normalized_routing_load = if stats.data_packets_delivered > 0 {
            stats.control_packets as f64 / stats.data_packets_delivered as f64
        } else {
            0.0
        };

        let flow_count = flows.len();
        let classifier_found = flows.classifier_found;
        let flows = if policy.keep_flows {
            flows.into_flows()
        } else {
            Vec::new()
        };

        Simulation {
            stats,
            flows,
            flow_count,
            classifier_found,
        }
    }

    /// Data flows among the retained flows
    pub fn data_flows(&self, data_port: u16) -> impl Iterator<Item = &Flow> {
        self.flows.iter().filter(move |f| is_data_flow(f, data_port))
    }
}

fn is_data_flow(flow: &Flow, data_port: u16) -> bool {
    flow.five_tuple()
        .is_some_and(|t| t.destination_port == data_port)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flowmon::builder::{build_flows, FlowSamples};
    use crate::flowmon::element::Element;
    use crate::flowmon::flow::tests::flow_element;
    use crate::flowmon::flow::FlowPolicy;

    fn classifier(entries: &[(u32, u16)]) -> Element {
        let mut block = Element::new("Ipv4FlowClassifier");
        for (id, port) in entries {
            block.children.push(
                Element::new("Flow")
                    .with_attr("flowId", &id.to_string())
                    .with_attr("sourceAddress", "10.0.0.1")
                    .with_attr("destinationAddress", "10.0.0.2")
                    .with_attr("protocol", "17")
                    .with_attr("sourcePort", "49153")
                    .with_attr("destinationPort", &port.to_string()),
            );
        }
        block
    }

    fn simulate(record: &Element, flow_policy: FlowPolicy, counters: RoutingCounters) -> Simulation {
        let flows = build_flows(record, &flow_policy, &mut FlowSamples::default()).unwrap();
        Simulation::aggregate(flows, counters, &AggregationPolicy::default())
    }

    #[test]
    fn test_means_over_data_flows_only() {
        let record = Element::new("FlowMonitor")
            .with_child(
                Element::new("FlowStats")
                    .with_child(flow_element(1, 100, 100, 0))
                    .with_child(flow_element(2, 100, 50, 50))
                    .with_child(flow_element(3, 10, 10, 0)),
            )
            .with_child(classifier(&[(1, 9), (2, 9), (3, 654)]));

        let counters = RoutingCounters { routing_packets: 900, control_packets: 300, energy_consumed: 12.5 };
        let sim = simulate(&record, FlowPolicy::default(), counters);
        let s = sim.stats;

        assert_eq!(s.data_flow_count, 2);
        assert_eq!(s.data_packets_delivered, 150);
        assert_eq!(s.lost_packets, 50);
        assert!((s.mean_delay - (0.5 / 100.0 + 0.5 / 50.0) / 2.0).abs() < 1e-12);
        assert!((s.mean_packet_size - 512.0).abs() < 1e-12);
        assert!((s.mean_packet_loss_ratio - 0.25).abs() < 1e-12);
        assert!((s.mean_packet_delivery_ratio - 75.0).abs() < 1e-9);
        assert!((s.throughput() - (100.0 + 50.0) * 512.0 * 8.0 / 2.0).abs() < 1e-6);
        assert_eq!(s.control_packets, 300);
        assert_eq!(s.energy_consumed, 12.5);
        assert!((s.normalized_routing_load - 2.0).abs() < 1e-12);
        assert_eq!(sim.flows.len(), 3);
        assert_eq!(sim.data_flows(DATA_PORT).count(), 2);
    }

    #[test]
    fn test_empty_data_subset_yields_zeros() {
        let record = Element::new("FlowMonitor")
            .with_child(Element::new("FlowStats").with_child(flow_element(1, 10, 10, 0)))
            .with_child(classifier(&[(1, 80)]));

        let sim = simulate(&record, FlowPolicy::default(), RoutingCounters::default());
        let s = sim.stats;
        assert_eq!(s.data_flow_count, 0);
        for value in [
            s.mean_rx_bitrate,
            s.mean_tx_bitrate,
            s.mean_delay,
            s.mean_jitter,
            s.mean_packet_size,
            s.mean_packet_loss_ratio,
            s.mean_packet_delivery_ratio,
            s.mean_hop_count,
            s.normalized_routing_load,
        ] {
            assert_eq!(value, 0.0);
        }
    }

    #[test]
    fn test_missing_classifier_yields_zeros() {
        let record = Element::new("FlowMonitor")
            .with_child(Element::new("FlowStats").with_child(flow_element(1, 10, 10, 0)));
        let sim = simulate(&record, FlowPolicy::default(), RoutingCounters::default());
        assert!(!sim.classifier_found);
        assert_eq!(sim.stats, SimulationStats::default());
    }

    #[test]
    fn test_retained_silent_data_flow_counts_but_adds_no_undefined_values() {
        let record = Element::new("FlowMonitor")
            .with_child(
                Element::new("FlowStats")
                    .with_child(flow_element(1, 100, 100, 0))
                    .with_child(flow_element(2, 100, 0, 100)),
            )
            .with_child(classifier(&[(1, 9), (2, 9)]));

        let policy = FlowPolicy { retain_silent_flows: true, ..FlowPolicy::default() };
        let s = simulate(&record, policy, RoutingCounters::default()).stats;
        assert_eq!(s.data_flow_count, 2);
        assert!((s.mean_delay - 0.005).abs() < 1e-12);
        assert!((s.mean_hop_count - 3.0).abs() < 1e-12);
        assert!(!s.mean_delay.is_nan());
    }

    #[test]
    fn test_flows_released_when_not_kept() {
        let record = Element::new("FlowMonitor")
            .with_child(Element::new("FlowStats").with_child(flow_element(1, 10, 10, 0)))
            .with_child(classifier(&[(1, 9)]));
        let flows = build_flows(&record, &FlowPolicy::default(), &mut FlowSamples::default()).unwrap();
        let policy = AggregationPolicy { keep_flows: false, ..AggregationPolicy::default() };
        let sim = Simulation::aggregate(flows, RoutingCounters::default(), &policy);
        assert!(sim.flows.is_empty());
        assert_eq!(sim.flow_count, 1);
        assert_eq!(sim.stats.data_flow_count, 1);
    }
}
