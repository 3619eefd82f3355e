//! Routing and energy counters from the per-run custom statistics log.
//!
//! The log is small (`<CustomStats><RoutingStats .../></CustomStats>`) but
//! is read with the same depth-counting reader as flow monitor output.
//! Attribute names vary between routing protocol builds, so each counter
//! accepts several aliases and defaults when all are absent.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use color_eyre::eyre::{Context, Result};
use serde::Serialize;

use super::element::Element;
use super::stream::RecordReader;
use crate::error::FlowmonError;

/// Root tag of the custom statistics log
pub const CUSTOM_STATS_TAG: &str = "CustomStats";

const ROUTING_PACKET_KEYS: [&str; 2] = ["numPackets", "routingPackets"];
const CONTROL_PACKET_KEYS: [&str; 3] = ["numControlPackets", "controlPackets", "routingOverhead"];
const ENERGY_KEYS: [&str; 3] = ["totalEnergy", "energyConsumed", "energy"];

/// Counters for one (protocol, scale) run; every field defaults to zero
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RoutingCounters {
    /// Packets handled by the routing layer (default 0)
    pub routing_packets: u64,
    /// Routing protocol signalling packets (default 0)
    pub control_packets: u64,
    /// Total energy consumed in joules (default 0.0)
    pub energy_consumed: f64,
}

impl RoutingCounters {
    /// Read counters from a `<CustomStats>` record
    pub fn from_element(record: &Element) -> Result<Self, FlowmonError> {
        let Some(stats) = record.child("RoutingStats") else {
            log::warn!("<{}> has no <RoutingStats> entry, counters default to zero", record.name);
            return Ok(Self::default());
        };

        Ok(Self {
            routing_packets: aliased(stats, &ROUTING_PACKET_KEYS, 0)?,
            control_packets: aliased(stats, &CONTROL_PACKET_KEYS, 0)?,
            energy_consumed: aliased(stats, &ENERGY_KEYS, 0.0)?,
        })
    }
}

fn aliased<T: std::str::FromStr>(el: &Element, keys: &[&str], default: T) -> Result<T, FlowmonError> {
    match el.attr_any(keys) {
        Some((key, raw)) => raw
            .trim()
            .parse()
            .map_err(|_| FlowmonError::format(key, raw, "not a valid number")),
        None => Ok(default),
    }
}

/// Read the first `<CustomStats>` record from a stream
pub fn read_counters<R: BufRead>(source: R) -> Result<RoutingCounters, FlowmonError> {
    let mut records = RecordReader::new(source, CUSTOM_STATS_TAG, 0);
    match records.next() {
        Some(record) => RoutingCounters::from_element(&record?),
        None => Err(FlowmonError::NotFound {
            tag: CUSTOM_STATS_TAG.to_string(),
        }),
    }
}

/// Read counters from a custom statistics log file
pub fn read_counters_file(path: &Path) -> Result<RoutingCounters> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open counters log: {}", path.display()))?;
    let counters = read_counters(BufReader::new(file))
        .with_context(|| format!("Failed to read counters from {}", path.display()))?;

    log::debug!(
        "Counters from {}: {} control packets, {:.3} J",
        path.display(),
        counters.control_packets,
        counters.energy_consumed
    );
    Ok(counters)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_counters() {
        let xml = r#"<?xml version="1.0" ?>
<CustomStats>
<RoutingStats numPackets="5120" numControlPackets="812" totalEnergy="43.25" />
</CustomStats>"#;
        let counters = read_counters(xml.as_bytes()).unwrap();
        assert_eq!(counters.routing_packets, 5120);
        assert_eq!(counters.control_packets, 812);
        assert_eq!(counters.energy_consumed, 43.25);
    }

    #[test]
    fn test_missing_energy_defaults_to_zero() {
        let xml = r#"<CustomStats><RoutingStats numPackets="10" numControlPackets="4" /></CustomStats>"#;
        let counters = read_counters(xml.as_bytes()).unwrap();
        assert_eq!(counters.control_packets, 4);
        assert_eq!(counters.energy_consumed, 0.0);
    }

    #[test]
    fn test_aliases_and_absent_fields() {
        let xml = r#"<CustomStats><RoutingStats controlPackets="7" energy="1.5"/></CustomStats>"#;
        let counters = read_counters(xml.as_bytes()).unwrap();
        assert_eq!(
            counters,
            RoutingCounters { routing_packets: 0, control_packets: 7, energy_consumed: 1.5 }
        );

        let empty = read_counters("<CustomStats/>".as_bytes()).unwrap();
        assert_eq!(empty, RoutingCounters::default());
    }

    #[test]
    fn test_missing_root_is_not_found() {
        let err = read_counters("<OtherStats><RoutingStats/></OtherStats>".as_bytes()).unwrap_err();
        assert!(matches!(err, FlowmonError::NotFound { .. }));

        let err = read_counters("".as_bytes()).unwrap_err();
        assert!(matches!(err, FlowmonError::NotFound { .. }));
    }

    #[test]
    fn test_bad_counter_value_is_format_error() {
        let xml = r#"<CustomStats><RoutingStats numControlPackets="many"/></CustomStats>"#;
        assert!(matches!(
            read_counters(xml.as_bytes()),
            Err(FlowmonError::Format { .. })
        ));
    }
}
