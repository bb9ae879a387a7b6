//! Trace context header parsing and propagation.
//!
//! The header is a `;` separated list of `key=value` pairs, e.g.
//! `Root=1-5759e988-bd862e3fe1be46a994272793;Parent=53995c3f42cd8ad8;Sampled=1`.

use std::collections::BTreeMap;

pub const ROOT_KEY: &str = "Root";
pub const PARENT_KEY: &str = "Parent";
pub const SAMPLED_KEY: &str = "Sampled";

/// Sampling decision carried by the `Sampled` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SamplingDecision {
    /// `Sampled=1`
    Sampled,
    /// `Sampled=0`
    NotSampled,
    /// `Sampled=?`: the caller asks us to decide and send the decision back.
    Requested,
    /// No (or an unrecognized) `Sampled` key.
    #[default]
    Unknown,
}

impl SamplingDecision {
    fn from_value(value: &str) -> Self {
        match value {
            "1" => Self::Sampled,
            "0" => Self::NotSampled,
            "?" => Self::Requested,
            _ => Self::Unknown,
        }
    }
}

/// Parsed inbound trace context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceHeader {
    pub root: Option<String>,
    pub parent: Option<String>,
    pub sampled: SamplingDecision,
    /// Every pair found in the header, recognized or not.
    pub fields: BTreeMap<String, String>,
}

/// Split a header value into its key/value pairs.
///
/// Keys and values are trimmed. A key without `=` maps to an empty value,
/// and empty keys are dropped, so `""` parses to an empty map.
pub fn parse_header_map(value: &str) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    for part in value.split(';') {
        let mut kv = part.splitn(2, '=');
        let key = kv.next().unwrap_or_default().trim();
        if key.is_empty() {
            continue;
        }
        let val = kv.next().map(str::trim).unwrap_or_default();
        map.insert(key.to_string(), val.to_string());
    }
    map
}

fn non_empty(map: &BTreeMap<String, String>, key: &str) -> Option<String> {
    map.get(key).filter(|v| !v.is_empty()).cloned()
}

impl TraceHeader {
    /// Parse a raw header value. Never fails; unusable input yields an empty context.
    pub fn parse(value: &str) -> Self {
        let fields = parse_header_map(value);
        Self {
            root: non_empty(&fields, ROOT_KEY),
            parent: non_empty(&fields, PARENT_KEY),
            sampled: fields
                .get(SAMPLED_KEY)
                .map(|v| SamplingDecision::from_value(v))
                .unwrap_or_default(),
            fields,
        }
    }

    /// Value sent back to the caller on the response.
    ///
    /// Only the root id goes back, plus our sampling decision when the caller
    /// deferred it with `Sampled=?`.
    pub fn response_value(&self, trace_id: &str, sampled: bool) -> String {
        let mut value = format!("{ROOT_KEY}={trace_id}");
        if self.sampled == SamplingDecision::Requested {
            value.push_str(&format!(";{SAMPLED_KEY}={}", u8::from(sampled)));
        }
        value
    }
}

/// Value attached to calls this service makes to other services.
pub fn downstream_value(trace_id: &str, parent_id: &str, sampled: bool) -> String {
    format!(
        "{ROOT_KEY}={trace_id};{PARENT_KEY}={parent_id};{SAMPLED_KEY}={}",
        u8::from(sampled)
    )
}
