//! Error types for flow monitor and counter log ingestion.
//!
//! All variants are fatal to the single record or file being ingested.
//! Degenerate but well-formed data (silent flows, empty data-flow subsets,
//! unmatched classifier entries) never produces an error.

/// Errors raised while decoding, parsing or assembling simulation records
#[derive(Debug, thiserror::Error)]
pub enum FlowmonError {
    /// A scalar did not match its expected unit-suffixed or numeric shape
    #[error("Invalid value for '{field}': '{value}' ({reason})")]
    Format {
        field: String,
        value: String,
        reason: String,
    },

    /// Element nesting is unbalanced (over-terminated or truncated input)
    #[error("Malformed input at byte {position}: {reason}")]
    MalformedInput { position: u64, reason: String },

    /// An expected singleton block or required attribute is missing or duplicated
    #[error("Schema violation in <{element}>: {reason}")]
    Schema { element: String, reason: String },

    /// The expected root record never appeared before end of stream
    #[error("Root element <{tag}> not found before end of input")]
    NotFound { tag: String },

    #[error("XML syntax error at byte {position}: {source}")]
    Xml {
        position: u64,
        #[source]
        source: quick_xml::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FlowmonError {
    pub fn format(field: &str, value: &str, reason: impl Into<String>) -> Self {
        FlowmonError::Format {
            field: field.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    pub fn schema(element: &str, reason: impl Into<String>) -> Self {
        FlowmonError::Schema {
            element: element.to_string(),
            reason: reason.into(),
        }
    }

    /// Short category name, used in log lines and reports
    pub fn kind(&self) -> &'static str {
        match self {
            FlowmonError::Format { .. } => "format",
            FlowmonError::MalformedInput { .. } => "malformed-input",
            FlowmonError::Schema { .. } => "schema",
            FlowmonError::NotFound { .. } => "not-found",
            FlowmonError::Xml { .. } => "xml",
            FlowmonError::Io(_) => "io",
        }
    }
}
