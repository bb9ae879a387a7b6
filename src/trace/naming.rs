//! Segment naming strategies.

use std::sync::Arc;

use crate::config::TracingConfig;

/// Chooses the segment name for a request from its host.
pub trait SegmentNamer: Send + Sync + std::fmt::Debug {
    fn name(&self, host: &str) -> String;
}

/// Same name for every request.
#[derive(Debug, Clone)]
pub struct FixedSegmentNamer {
    name: String,
}

impl FixedSegmentNamer {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl SegmentNamer for FixedSegmentNamer {
    fn name(&self, _host: &str) -> String {
        self.name.clone()
    }
}

/// Names the segment after the host when it matches `pattern`.
///
/// Matching is case-insensitive; `*` matches any run of characters and `?`
/// exactly one.
#[derive(Debug, Clone)]
pub struct DynamicSegmentNamer {
    fallback: String,
    pattern: String,
}

impl DynamicSegmentNamer {
    pub fn new(fallback: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            fallback: fallback.into(),
            pattern: pattern.into().to_lowercase(),
        }
    }
}

impl SegmentNamer for DynamicSegmentNamer {
    fn name(&self, host: &str) -> String {
        if !host.is_empty() && wildcard_match(&self.pattern, &host.to_lowercase()) {
            host.to_string()
        } else {
            self.fallback.clone()
        }
    }
}

/// Build the namer described by the configuration.
pub fn namer_from_config(config: &TracingConfig) -> Arc<dyn SegmentNamer> {
    match &config.dynamic_naming {
        Some(dynamic) => Arc::new(DynamicSegmentNamer::new(
            dynamic.fallback.clone(),
            dynamic.pattern.clone(),
        )),
        None => Arc::new(FixedSegmentNamer::new(config.default_segment_name.clone())),
    }
}

/// Iterative glob match with single-star backtracking.
fn wildcard_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ti));
            pi += 1;
        } else if let Some((sp, st)) = star {
            pi = sp + 1;
            ti = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|&c| c == '*')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DynamicNamingConfig;

    #[test]
    fn test_wildcard() {
        assert!(wildcard_match("*", ""));
        assert!(wildcard_match("*.example.com", "api.example.com"));
        assert!(wildcard_match("api-?.example.com", "api-1.example.com"));
        assert!(!wildcard_match("api-?.example.com", "api-12.example.com"));
        assert!(wildcard_match("a*b*c", "aXXbYYc"));
        assert!(!wildcard_match("*.example.com", "example.org"));
    }

    #[test]
    fn test_dynamic_namer() {
        let namer = DynamicSegmentNamer::new("fallback", "*.Example.com");
        assert_eq!(namer.name("API.example.com"), "API.example.com");
        assert_eq!(namer.name("other.org"), "fallback");
        assert_eq!(namer.name(""), "fallback");
    }

    #[test]
    fn test_from_config() {
        let mut config = TracingConfig::default();
        config.default_segment_name = "orders".into();
        assert_eq!(namer_from_config(&config).name("any.host"), "orders");

        config.dynamic_naming = Some(DynamicNamingConfig {
            fallback: "edge".into(),
            pattern: "*.internal".into(),
        });
        let namer = namer_from_config(&config);
        assert_eq!(namer.name("billing.internal"), "billing.internal");
        assert_eq!(namer.name("billing.public"), "edge");
    }
}
