//! Per-flow entities and their derived metrics.

use serde::{Deserialize, Serialize};

use super::element::Element;
use crate::error::FlowmonError;
use crate::utils::duration::{ns_to_seconds, parse_quantity_ns, parse_time_ns};

/// Hop count reported for a flow that delivered nothing
pub const HOP_COUNT_UNDEFINED: f64 = -1000.0;

/// Which packet counts must be non-zero for loss and delivery ratios to be defined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatioGuard {
    /// Undefined when either rxPackets or txPackets is zero
    #[default]
    ReceivedAndSent,
    /// Undefined only when the divisor (txPackets) is zero
    SentOnly,
}

/// Flow construction options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FlowPolicy {
    /// Keep flows with zero received packets in the emitted collection
    #[serde(default)]
    pub retain_silent_flows: bool,
    #[serde(default)]
    pub ratio_guard: RatioGuard,
}

/// Classifier identity of a flow
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct FiveTuple {
    pub source_address: String,
    pub destination_address: String,
    pub source_port: u16,
    pub destination_port: u16,
    pub protocol: u8,
}

impl FiveTuple {
    /// Parse a classifier `<Flow>` entry, returning its flow id and identity
    pub fn from_element(el: &Element) -> Result<(u32, FiveTuple), FlowmonError> {
        let flow_id = el.parse_attr("flowId")?;
        let tuple = FiveTuple {
            source_address: el.required_attr("sourceAddress")?.to_string(),
            destination_address: el.required_attr("destinationAddress")?.to_string(),
            source_port: el.parse_attr("sourcePort")?,
            destination_port: el.parse_attr("destinationPort")?,
            protocol: el.parse_attr("protocol")?,
        };
        Ok((flow_id, tuple))
    }
}

impl std::fmt::Display for FiveTuple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{} -> {}:{} (proto {})",
            self.source_address,
            self.source_port,
            self.destination_address,
            self.destination_port,
            self.protocol
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistogramBin {
    pub start: f64,
    pub width: f64,
    pub count: u64,
}

/// Ordered bins of a flow monitor histogram
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Histogram {
    pub bins: Vec<HistogramBin>,
}

impl Histogram {
    pub fn from_element(el: &Element) -> Result<Self, FlowmonError> {
        let bins = el
            .children_named("bin")
            .map(|bin| {
                Ok(HistogramBin {
                    start: bin.parse_attr("start")?,
                    width: bin.parse_attr("width")?,
                    count: bin.parse_attr("count")?,
                })
            })
            .collect::<Result<Vec<_>, FlowmonError>>()?;
        Ok(Self { bins })
    }

    /// Total number of samples across all bins
    pub fn total_count(&self) -> u64 {
        self.bins.iter().map(|b| b.count).sum()
    }
}

/// Histograms attached to a flow, each absent when the log has no such sub-element
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FlowHistograms {
    pub delay: Option<Histogram>,
    pub jitter: Option<Histogram>,
    pub packet_size: Option<Histogram>,
    pub flow_interruptions: Option<Histogram>,
}

/// Packets or bytes dropped for one drop reason
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DropCount {
    pub reason_code: u32,
    pub count: u64,
}

/// One probe's observation of a flow
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeFlowStats {
    pub probe_id: u32,
    pub packets: u64,
    pub bytes: u64,
    /// Mean delay from the first probe, in seconds
    pub delay_from_first_probe: f64,
}

impl ProbeFlowStats {
    /// Parse a `<FlowStats>` entry under `<FlowProbe index=..>`, returning the owning flow id
    pub fn from_element(probe_id: u32, el: &Element) -> Result<(u32, ProbeFlowStats), FlowmonError> {
        let flow_id = el.parse_attr("flowId")?;
        let packets: u64 = el.parse_attr("packets")?;
        let bytes = el.parse_attr("bytes")?;
        let delay_sum_ns = parse_quantity_ns(el.required_attr("delayFromFirstProbeSum")?)?;

        let delay_from_first_probe = if packets > 0 {
            ns_to_seconds(delay_sum_ns) / packets as f64
        } else {
            0.0
        };

        Ok((
            flow_id,
            ProbeFlowStats {
                probe_id,
                packets,
                bytes,
                delay_from_first_probe,
            },
        ))
    }
}

/// Metrics derived from a flow's raw counters, computed once at construction
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FlowMetrics {
    /// Seconds between first and last transmitted packet (not clamped)
    pub tx_duration: f64,
    /// Seconds between first and last received packet (not clamped)
    pub rx_duration: f64,
    /// Mean hops per received packet, or [`HOP_COUNT_UNDEFINED`]
    pub hop_count: f64,
    /// Seconds
    pub delay_mean: Option<f64>,
    /// Seconds
    pub jitter_mean: Option<f64>,
    /// Bytes
    pub packet_size_mean: Option<f64>,
    /// Bits per second, 0 when the receive window is empty
    pub rx_bitrate: f64,
    /// Bits per second, 0 when the transmit window is empty
    pub tx_bitrate: f64,
    /// Fraction of transmitted packets lost
    pub packet_loss_ratio: Option<f64>,
    /// Percentage of transmitted packets delivered
    pub packet_delivery_ratio: Option<f64>,
}

/// A single source to destination stream tracked by the flow monitor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Flow {
    pub flow_id: u32,
    pub tx_packets: u64,
    pub rx_packets: u64,
    pub tx_bytes: u64,
    pub rx_bytes: u64,
    pub time_first_tx_ns: i64,
    pub time_last_tx_ns: i64,
    pub time_first_rx_ns: i64,
    pub time_last_rx_ns: i64,
    pub times_forwarded: u64,
    pub delay_sum_ns: f64,
    pub jitter_sum_ns: f64,
    pub lost_packets: u64,
    pub histograms: FlowHistograms,
    pub packets_dropped: Vec<DropCount>,
    pub bytes_dropped: Vec<DropCount>,
    metrics: FlowMetrics,
    five_tuple: Option<FiveTuple>,
    probes: Vec<ProbeFlowStats>,
}

impl Flow {
    /// Build a flow from a `FlowStats/Flow` element, deriving all metrics.
    pub fn from_element(el: &Element, policy: &FlowPolicy) -> Result<Self, FlowmonError> {
        let mut flow = Flow {
            flow_id: el.parse_attr("flowId")?,
            tx_packets: el.parse_attr("txPackets")?,
            rx_packets: el.parse_attr("rxPackets")?,
            tx_bytes: el.parse_attr("txBytes")?,
            rx_bytes: el.parse_attr("rxBytes")?,
            time_first_tx_ns: parse_time_ns(el.required_attr("timeFirstTxPacket")?)?,
            time_last_tx_ns: parse_time_ns(el.required_attr("timeLastTxPacket")?)?,
            time_first_rx_ns: parse_time_ns(el.required_attr("timeFirstRxPacket")?)?,
            time_last_rx_ns: parse_time_ns(el.required_attr("timeLastRxPacket")?)?,
            times_forwarded: el.parse_attr_or("timesForwarded", 0)?,
            delay_sum_ns: parse_quantity_ns(el.required_attr("delaySum")?)?,
            jitter_sum_ns: parse_quantity_ns(el.required_attr("jitterSum")?)?,
            lost_packets: el.parse_attr_or("lostPackets", 0)?,
            histograms: FlowHistograms {
                delay: optional_histogram(el, "delayHistogram")?,
                jitter: optional_histogram(el, "jitterHistogram")?,
                packet_size: optional_histogram(el, "packetSizeHistogram")?,
                flow_interruptions: optional_histogram(el, "flowInterruptionsHistogram")?,
            },
            packets_dropped: drop_counts(el, "packetsDropped", "number")?,
            bytes_dropped: drop_counts(el, "bytesDropped", "bytes")?,
            metrics: FlowMetrics {
                tx_duration: 0.0,
                rx_duration: 0.0,
                hop_count: HOP_COUNT_UNDEFINED,
                delay_mean: None,
                jitter_mean: None,
                packet_size_mean: None,
                rx_bitrate: 0.0,
                tx_bitrate: 0.0,
                packet_loss_ratio: None,
                packet_delivery_ratio: None,
            },
            five_tuple: None,
            probes: Vec::new(),
        };
        flow.metrics = flow.derive_metrics(policy);
        Ok(flow)
    }

    fn derive_metrics(&self, policy: &FlowPolicy) -> FlowMetrics {
        // Timestamps span the full i64 range, so the difference is taken in f64
        let tx_duration = ns_to_seconds(self.time_last_tx_ns as f64 - self.time_first_tx_ns as f64);
        let rx_duration = ns_to_seconds(self.time_last_rx_ns as f64 - self.time_first_rx_ns as f64);
        let rx = self.rx_packets as f64;

        let per_received = |sum: f64| (self.rx_packets > 0).then(|| sum / rx);

        let ratios_defined = match policy.ratio_guard {
            RatioGuard::ReceivedAndSent => self.rx_packets > 0 && self.tx_packets > 0,
            RatioGuard::SentOnly => self.tx_packets > 0,
        };
        let per_sent = |numerator: f64| ratios_defined.then(|| numerator / self.tx_packets as f64);

        FlowMetrics {
            tx_duration,
            rx_duration,
            hop_count: if self.rx_packets > 0 {
                self.times_forwarded as f64 / rx + 1.0
            } else {
                HOP_COUNT_UNDEFINED
            },
            delay_mean: per_received(ns_to_seconds(self.delay_sum_ns)),
            jitter_mean: per_received(ns_to_seconds(self.jitter_sum_ns)),
            packet_size_mean: per_received(self.rx_bytes as f64),
            rx_bitrate: bitrate(self.rx_bytes, rx_duration),
            tx_bitrate: bitrate(self.tx_bytes, tx_duration),
            packet_loss_ratio: per_sent(self.lost_packets as f64),
            packet_delivery_ratio: per_sent(rx * 100.0),
        }
    }

    pub fn metrics(&self) -> &FlowMetrics {
        &self.metrics
    }

    pub fn five_tuple(&self) -> Option<&FiveTuple> {
        self.five_tuple.as_ref()
    }

    pub fn probes(&self) -> &[ProbeFlowStats] {
        &self.probes
    }

    /// True when the flow delivered nothing
    pub fn is_silent(&self) -> bool {
        self.rx_packets == 0
    }

    pub(crate) fn set_five_tuple(&mut self, tuple: FiveTuple) {
        self.five_tuple = Some(tuple);
    }

    pub(crate) fn push_probe(&mut self, probe: ProbeFlowStats) {
        self.probes.push(probe);
    }
}

fn bitrate(bytes: u64, duration: f64) -> f64 {
    if duration > 0.0 {
        bytes as f64 * 8.0 / duration
    } else {
        0.0
    }
}

fn optional_histogram(el: &Element, name: &str) -> Result<Option<Histogram>, FlowmonError> {
    el.child(name).map(Histogram::from_element).transpose()
}

fn drop_counts(el: &Element, name: &str, count_attr: &str) -> Result<Vec<DropCount>, FlowmonError> {
    el.children_named(name)
        .map(|d| {
            Ok(DropCount {
                reason_code: d.parse_attr("reasonCode")?,
                count: d.parse_attr(count_attr)?,
            })
        })
        .collect()
}
