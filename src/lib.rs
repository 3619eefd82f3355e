//! # Flowmetrics - flow monitor analysis for routing protocol comparisons
//!
//! This library ingests ns-3 flow monitor logs and the companion routing
//! counters logs produced by MANET routing comparison runs, and derives
//! normalized per-flow and per-simulation metrics (throughput, delay,
//! jitter, packet loss and delivery ratio, hop count, routing overhead,
//! energy) for cross-protocol, cross-scale comparison.
//!
//! ## Architecture
//!
//! - `utils::duration`: decoding of `ns`-suffixed time quantities
//! - `flowmon::stream`: depth-counting streaming reader yielding one record at a time
//! - `flowmon::builder`: flow construction, classifier and probe joins
//! - `flowmon::simulation`: data-flow selection and simulation aggregates
//! - `flowmon::counters`: routing/energy counters log reader
//! - `flowmon::runs`: the per-protocol, per-scale run collection
//! - `config`: YAML analysis configuration
//! - `orchestrator`: file discovery and ingestion across protocols and scales
//! - `report`: text and JSON reports
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use flowmetrics::{config::AnalysisConfig, orchestrator};
//!
//! let config = AnalysisConfig::default();
//! let (runs, _summary) = orchestrator::collect_runs(&config, false)?;
//!
//! for protocol in runs.protocols() {
//!     for run in &protocol.runs {
//!         println!("{} @ {}: {:.3} ms", protocol.protocol, run.scale, run.simulation.stats.mean_delay * 1e3);
//!     }
//! }
//! # Ok::<(), color_eyre::eyre::Error>(())
//! ```
//!
//! ## Error Handling
//!
//! Parsing functions return [`error::FlowmonError`]; file-level functions
//! wrap it in `color_eyre` reports naming the offending file.

pub mod config;
pub mod error;
pub mod flowmon;
pub mod orchestrator;
pub mod report;
pub mod utils;

pub use error::FlowmonError;
