//! Materialized element subtree handed from the streaming reader to the builders.

use std::str::FromStr;

use crate::error::FlowmonError;

/// One XML element with its attributes and child elements.
///
/// Text content is not retained; flow monitor logs carry everything in
/// attributes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Element>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder-style attribute setter, mostly for tests
    pub fn with_attr(mut self, key: &str, value: &str) -> Self {
        self.attributes.push((key.to_string(), value.to_string()));
        self
    }

    /// Builder-style child setter, mostly for tests
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    /// Get an attribute value by name
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Get the first attribute present among several alias names
    pub fn attr_any<'a>(&'a self, keys: &[&'a str]) -> Option<(&'a str, &'a str)> {
        keys.iter()
            .find_map(|key| self.attr(key).map(|value| (*key, value)))
    }

    /// Get an attribute that must be present
    pub fn required_attr(&self, key: &str) -> Result<&str, FlowmonError> {
        self.attr(key).ok_or_else(|| {
            FlowmonError::schema(&self.name, format!("missing required attribute '{}'", key))
        })
    }

    /// Parse a required attribute into a numeric type
    pub fn parse_attr<T: FromStr>(&self, key: &str) -> Result<T, FlowmonError> {
        let raw = self.required_attr(key)?;
        parse_value(key, raw)
    }

    /// Parse an optional attribute, falling back to `default` when absent
    pub fn parse_attr_or<T: FromStr>(&self, key: &str, default: T) -> Result<T, FlowmonError> {
        match self.attr(key) {
            Some(raw) => parse_value(key, raw),
            None => Ok(default),
        }
    }

    /// Iterate direct children with the given tag name
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// First direct child with the given tag name
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Collect elements reached by following a `/`-separated tag path.
    ///
    /// `"FlowStats/Flow"` yields every `Flow` child of every `FlowStats` child.
    pub fn find_all(&self, path: &str) -> Vec<&Element> {
        let mut current: Vec<&Element> = vec![self];
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current = current
                .into_iter()
                .flat_map(|el| el.children.iter().filter(|c| c.name == segment))
                .collect();
        }
        current
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T, FlowmonError> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| FlowmonError::format(key, raw, "not a valid number"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Element {
        Element::new("FlowMonitor")
            .with_child(
                Element::new("FlowStats")
                    .with_child(Element::new("Flow").with_attr("flowId", "1"))
                    .with_child(Element::new("Flow").with_attr("flowId", "2")),
            )
            .with_child(Element::new("Ipv4FlowClassifier"))
    }

    #[test]
    fn test_find_all_follows_path() {
        let root = sample();
        let flows = root.find_all("FlowStats/Flow");
        assert_eq!(flows.len(), 2);
        assert_eq!(flows[1].attr("flowId"), Some("2"));
        assert!(root.find_all("FlowProbes/FlowProbe").is_empty());
    }

    #[test]
    fn test_find_all_outlives_path() {
        let root = sample();
        let flows = {
            let path = format!("{}/{}", "FlowStats", "Flow");
            root.find_all(&path)
        };
        assert_eq!(flows.len(), 2);
        assert_eq!(flows[0].attr("flowId"), Some("1"));
    }

    #[test]
    fn test_attribute_parsing() {
        let el = Element::new("Flow")
            .with_attr("rxPackets", "12")
            .with_attr("bad", "x1");

        assert_eq!(el.parse_attr::<u64>("rxPackets").unwrap(), 12);
        assert_eq!(el.parse_attr_or::<u64>("lostPackets", 0).unwrap(), 0);
        assert!(matches!(
            el.parse_attr::<u64>("txPackets"),
            Err(FlowmonError::Schema { .. })
        ));
        assert!(matches!(
            el.parse_attr::<u64>("bad"),
            Err(FlowmonError::Format { .. })
        ));
    }

    #[test]
    fn test_attr_any_prefers_first_alias() {
        let el = Element::new("RoutingStats")
            .with_attr("energy", "1.5")
            .with_attr("totalEnergy", "2.5");
        assert_eq!(el.attr_any(&["totalEnergy", "energy"]), Some(("totalEnergy", "2.5")));
        assert_eq!(el.attr_any(&["missing"]), None);
    }
}
