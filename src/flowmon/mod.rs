//! Flow monitor log ingestion and metric derivation.
//!
//! Records stream out of the log one at a time, are turned into flows,
//! joined with classifier identities and probe samples, and aggregated into
//! one [`Simulation`] per record.

pub mod builder;
pub mod counters;
pub mod element;
pub mod flow;
pub mod runs;
pub mod simulation;
pub mod stream;

pub use builder::{build_flows, FlowSamples, FlowSet, SampleSummary};
pub use counters::{read_counters, read_counters_file, RoutingCounters};
pub use element::Element;
pub use flow::{FiveTuple, Flow, FlowMetrics, FlowPolicy, Histogram, ProbeFlowStats, RatioGuard, HOP_COUNT_UNDEFINED};
pub use runs::{ingest_simulations, RunCollection, ScaledRun};
pub use simulation::{AggregationPolicy, Simulation, SimulationStats, DATA_PORT};
pub use stream::{RecordReader, SimulationStream, FLOW_MONITOR_TAG};
