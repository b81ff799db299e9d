//! Message router (§2, §4.5).
//!
//! Decodes a probe's raw text frames into [`reactcheck_protocol::message::Inbound`]
//! values and applies the include/exclude glob filter (§3 "Configuration",
//! §8 "a component excluded by pattern never appears in any stats or chain
//! output") before anything reaches the orchestrator's sinks. Malformed
//! JSON is dropped and counted, never treated as a connection error (§4.1
//! "Failure semantics").

use globset::{Glob, GlobSet, GlobSetBuilder};
use reactcheck_protocol::message::Inbound;

/// Compiles `include`/`exclude` glob pattern lists (§3) into matchers the
/// router can test a component name against on every message.
pub struct NameFilter {
    include: GlobSet,
    exclude: GlobSet,
}

impl NameFilter {
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self, globset::Error> {
        Ok(Self {
            include: build_set(include)?,
            exclude: build_set(exclude)?,
        })
    }

    /// A component passes if it matches at least one `include` pattern (an
    /// empty include list behaves as "match everything") and no `exclude`
    /// pattern.
    pub fn allows(&self, component: &str) -> bool {
        let included = self.include.is_empty() || self.include.is_match(component);
        let excluded = self.exclude.is_match(component);
        included && !excluded
    }
}

fn build_set(patterns: &[String]) -> Result<GlobSet, globset::Error> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    builder.build()
}

/// The router's decoded, pre-filter output: a message the caller should
/// route by tag, or `None` if a malformed frame was dropped (the caller
/// should increment its own malformed-frame counter when it sees `None`).
pub fn decode(text: &str) -> Option<Inbound> {
    match serde_json::from_str::<Inbound>(text) {
        Ok(message) => Some(message),
        Err(error) => {
            tracing::warn!(%error, "discarding malformed inbound message");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excluded_component_never_passes() {
        let filter = NameFilter::new(
            &["*".to_string()],
            &["Internal*".to_string()],
        )
        .unwrap();
        assert!(filter.allows("Button"));
        assert!(!filter.allows("InternalDebugPanel"));
    }

    #[test]
    fn include_pattern_restricts_to_matches() {
        let filter = NameFilter::new(&["App.*".to_string()], &[]).unwrap();
        assert!(filter.allows("App.Header"));
        assert!(!filter.allows("Footer"));
    }

    #[test]
    fn malformed_json_decodes_to_none() {
        assert!(decode("not json").is_none());
    }

    #[test]
    fn unknown_type_still_decodes() {
        assert!(decode(r#"{"type":"future","payload":{}}"#).is_some());
    }
}
