//! Streaming record extraction from flow monitor logs.
//!
//! The reader walks start/end events in document order while tracking
//! nesting depth. Only the subtree of the record tag currently being read is
//! materialized; each completed record is handed off and dropped before the
//! next one is read, so memory stays bounded by one record.

use std::io::BufRead;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::builder::{build_flows, FlowSamples};
use super::counters::RoutingCounters;
use super::element::Element;
use super::flow::FlowPolicy;
use super::simulation::{AggregationPolicy, Simulation};
use crate::error::FlowmonError;

/// Root tag of one simulation run in ns-3 flow monitor output
pub const FLOW_MONITOR_TAG: &str = "FlowMonitor";

/// Yields complete top-level records, one per closing record tag.
///
/// A record is recognised when an end event for `record_tag` leaves the
/// depth counter at exactly `record_depth`. With the default depth of 0 this
/// matches records that are document roots (optionally concatenated); a
/// depth of 1 matches records wrapped in a single enclosing element.
pub struct RecordReader<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    record_tag: String,
    record_depth: i64,
    depth: i64,
    /// Open elements of the record being captured, outermost first
    capture: Vec<Element>,
    records_emitted: usize,
    done: bool,
}

impl<R: BufRead> RecordReader<R> {
    pub fn new(source: R, record_tag: &str, record_depth: usize) -> Self {
        let mut reader = Reader::from_reader(source);
        let config = reader.config_mut();
        config.trim_text(true);
        // Mismatched close tags surface as `IllFormed` and map to MalformedInput
        config.check_end_names = true;

        Self {
            reader,
            buf: Vec::with_capacity(8 * 1024),
            record_tag: record_tag.to_string(),
            record_depth: record_depth as i64,
            depth: 0,
            capture: Vec::new(),
            records_emitted: 0,
            done: false,
        }
    }

    /// Number of complete records handed out so far
    pub fn records_emitted(&self) -> usize {
        self.records_emitted
    }

    fn opens_record(&self, start: &BytesStart<'_>) -> bool {
        self.depth == self.record_depth && start.name().as_ref() == self.record_tag.as_bytes()
    }

    fn byte_position(&self) -> u64 {
        self.reader.buffer_position() as u64
    }

    fn malformed(&self, reason: impl Into<String>) -> FlowmonError {
        FlowmonError::MalformedInput {
            position: self.byte_position(),
            reason: reason.into(),
        }
    }

    fn map_xml_error(&self, err: quick_xml::Error) -> FlowmonError {
        match err {
            quick_xml::Error::Io(io) => FlowmonError::Io(std::io::Error::new(io.kind(), io.to_string())),
            quick_xml::Error::IllFormed(ill) => self.malformed(ill.to_string()),
            other => FlowmonError::Xml {
                position: self.byte_position(),
                source: other,
            },
        }
    }

    fn next_record(&mut self) -> Result<Option<Element>, FlowmonError> {
        loop {
            self.buf.clear();
            let result = self
                .reader
                .read_event_into(&mut self.buf)
                .map(|event| event.into_owned());
            let event = match result {
                Ok(event) => event,
                Err(e) => return Err(self.map_xml_error(e)),
            };

            let position = self.byte_position();
            match event {
                Event::Start(start) => {
                    if !self.capture.is_empty() || self.opens_record(&start) {
                        self.capture.push(element_from_start(&start, position)?);
                    }
                    self.depth += 1;
                }
                Event::Empty(start) => {
                    if let Some(parent) = self.capture.last_mut() {
                        parent.children.push(element_from_start(&start, position)?);
                    } else if self.opens_record(&start) {
                        self.records_emitted += 1;
                        return Ok(Some(element_from_start(&start, position)?));
                    }
                }
                Event::End(end) => {
                    self.depth -= 1;
                    if self.depth < 0 {
                        let name = String::from_utf8_lossy(end.name().as_ref()).into_owned();
                        return Err(self.malformed(format!(
                            "closing tag </{}> has no matching opening tag",
                            name
                        )));
                    }

                    if let Some(finished) = self.capture.pop() {
                        match self.capture.last_mut() {
                            Some(parent) => parent.children.push(finished),
                            None => {
                                let name = String::from_utf8_lossy(end.name().as_ref()).into_owned();
                                if self.depth != self.record_depth || name != self.record_tag {
                                    return Err(self.malformed(format!(
                                        "record <{}> closed by </{}> at depth {}",
                                        finished.name, name, self.depth
                                    )));
                                }
                                self.records_emitted += 1;
                                return Ok(Some(finished));
                            }
                        }
                    }
                }
                Event::Eof => {
                    if self.depth != 0 {
                        return Err(self.malformed(format!(
                            "input truncated with {} unclosed element(s)",
                            self.depth
                        )));
                    }
                    return Ok(None);
                }
                _ => {}
            }
        }
    }
}

impl<R: BufRead> Iterator for RecordReader<R> {
    type Item = Result<Element, FlowmonError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                self.capture.clear();
                Some(Err(e))
            }
        }
    }
}

fn element_from_start(start: &BytesStart<'_>, position: u64) -> Result<Element, FlowmonError> {
    let mut element = Element::new(String::from_utf8_lossy(start.name().as_ref()).into_owned());
    for attr in start.attributes() {
        let attr = attr.map_err(|e| FlowmonError::Xml {
            position,
            source: quick_xml::Error::from(e),
        })?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|source| FlowmonError::Xml { position, source })?
            .into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

/// Lazily turns each flow monitor record into a fully aggregated [`Simulation`].
///
/// Each record subtree is consumed by the flow builder and released before
/// the next record is read. The stream stops after the first error.
pub struct SimulationStream<'a, R: BufRead> {
    records: RecordReader<R>,
    flow_policy: FlowPolicy,
    aggregation: AggregationPolicy,
    counters: RoutingCounters,
    samples: &'a mut FlowSamples,
}

impl<'a, R: BufRead> SimulationStream<'a, R> {
    pub fn new(
        records: RecordReader<R>,
        flow_policy: FlowPolicy,
        aggregation: AggregationPolicy,
        counters: RoutingCounters,
        samples: &'a mut FlowSamples,
    ) -> Self {
        Self {
            records,
            flow_policy,
            aggregation,
            counters,
            samples,
        }
    }
}

impl<R: BufRead> Iterator for SimulationStream<'_, R> {
    type Item = Result<Simulation, FlowmonError>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = match self.records.next()? {
            Ok(record) => record,
            Err(e) => return Some(Err(e)),
        };

        // `record` is moved into this scope and dropped once flows are built
        let built = build_flows(&record, &self.flow_policy, self.samples);
        drop(record);

        Some(built.map(|flows| Simulation::aggregate(flows, self.counters, &self.aggregation)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(xml: &str, tag: &str, depth: usize) -> Vec<Result<Element, FlowmonError>> {
        RecordReader::new(xml.as_bytes(), tag, depth).collect()
    }

    #[test]
    fn test_single_root_record() {
        let xml = r#"<?xml version="1.0" ?>
<FlowMonitor>
  <FlowStats>
    <Flow flowId="1" rxPackets="3"><delayHistogram nBins="0"/></Flow>
  </FlowStats>
  <Ipv4FlowClassifier/>
</FlowMonitor>"#;
        let out = records(xml, FLOW_MONITOR_TAG, 0);
        assert_eq!(out.len(), 1);
        let record = out.into_iter().next().unwrap().unwrap();
        assert_eq!(record.name, "FlowMonitor");
        assert_eq!(record.children.len(), 2);
        let flows = record.find_all("FlowStats/Flow");
        assert_eq!(flows[0].attr("rxPackets"), Some("3"));
        assert_eq!(flows[0].children[0].name, "delayHistogram");
    }

    #[test]
    fn test_concatenated_records_in_document_order() {
        let xml = "<FlowMonitor id=\"a\"/><FlowMonitor id=\"b\"><x/></FlowMonitor><Other/>";
        let out: Vec<Element> = records(xml, FLOW_MONITOR_TAG, 0)
            .into_iter()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].attr("id"), Some("a"));
        assert_eq!(out[1].attr("id"), Some("b"));
    }

    #[test]
    fn test_wrapped_records_at_depth_one() {
        let xml = "<Runs><FlowMonitor n=\"1\"><FlowMonitor n=\"inner\"/></FlowMonitor><FlowMonitor n=\"2\"/></Runs>";
        let out: Vec<Element> = records(xml, FLOW_MONITOR_TAG, 1)
            .into_iter()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].attr("n"), Some("1"));
        assert_eq!(out[0].children[0].attr("n"), Some("inner"));

        // At depth 0 nothing closes at the root level with the record tag
        assert!(records(xml, FLOW_MONITOR_TAG, 0).is_empty());
    }

    #[test]
    fn test_truncated_input_is_malformed() {
        let xml = "<FlowMonitor><FlowStats><Flow flowId=\"1\"/>";
        let out = records(xml, FLOW_MONITOR_TAG, 0);
        assert_eq!(out.len(), 1);
        assert!(matches!(out[0], Err(FlowmonError::MalformedInput { .. })));
    }

    #[test]
    fn test_extra_closing_tag_is_malformed() {
        let xml = "<FlowMonitor></FlowMonitor></FlowMonitor>";
        let mut reader = RecordReader::new(xml.as_bytes(), FLOW_MONITOR_TAG, 0);
        assert!(reader.next().unwrap().is_ok());
        assert!(matches!(
            reader.next(),
            Some(Err(FlowmonError::MalformedInput { .. }))
        ));
        // Fused after the error
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_mismatched_closing_tag_is_malformed() {
        let xml = "<FlowMonitor><FlowStats></Bogus></FlowMonitor>";
        let out = records(xml, FLOW_MONITOR_TAG, 0);
        assert_eq!(out.len(), 1);
        assert!(matches!(out[0], Err(FlowmonError::MalformedInput { .. })));
    }

    #[test]
    fn test_record_count_matches_closing_tags() {
        let mut xml = String::new();
        for i in 0..5 {
            xml.push_str(&format!("<FlowMonitor run=\"{}\"><FlowStats/></FlowMonitor>\n", i));
        }
        let mut reader = RecordReader::new(xml.as_bytes(), FLOW_MONITOR_TAG, 0);
        let count = reader.by_ref().filter(|r| r.is_ok()).count();
        assert_eq!(count, 5);
        assert_eq!(reader.records_emitted(), 5);
    }
}
