//! # Data model (§3)
//!
//! The types here are plain data: nothing in this module owns a lock, a
//! socket, or a background thread. [`crate::stats::StatsCollector`],
//! [`crate::chain::ChainAnalyzer`], and [`crate::suggester::Suggester`]
//! are the engines that build and transform these values; this module
//! only defines their shape and their serialization for the report
//! interchange format (§6.2).

use serde::{Deserialize, Serialize, Serializer};

/// Whether a render was the component's first mount or a subsequent
/// update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderPhase {
    Mount,
    Update,
}

/// The atomic input to the analysis engine (§3 "RenderEvent"). Immutable
/// once constructed; the host never mutates an event after receiving it.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderEvent {
    pub component: String,
    pub instance_id: Option<String>,
    pub phase: RenderPhase,
    /// Milliseconds. Never negative; a negative value reaching
    /// [`crate::stats::StatsCollector::ingest`] is an invariant violation
    /// (§7), not a value to clamp silently.
    pub duration_ms: f64,
    /// Milliseconds since session start. Monotonic, non-decreasing per
    /// sender (§3).
    pub timestamp_ms: f64,
    pub necessary: bool,
    pub changed_props: Vec<String>,
    pub changed_state: Vec<String>,
}

impl RenderEvent {
    pub fn props_changed(&self) -> bool {
        !self.changed_props.is_empty()
    }

    pub fn state_changed(&self) -> bool {
        !self.changed_state.is_empty()
    }
}

/// A component's render-pressure classification (§4.2). `Info` is never
/// produced by the classifier itself; it is reserved for the suggester's
/// rule-based escalations (the `state-colocation` rule fires at `Info`
/// regardless of the component's own severity).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Healthy,
    Info,
    Warning,
    Critical,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn serialize_rounded<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(round2(*value))
}

fn serialize_min_sentinel<S: Serializer>(
    value: &Option<f64>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(value.map(round2).unwrap_or(0.0))
}

fn deserialize_min_sentinel<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    Ok(Some(value))
}

/// Per-component aggregate (§3 "ComponentStats", §4.2).
///
/// Invariants (checked by property tests in [`crate::stats`]):
/// `renders == necessary_renders + unnecessary`,
/// `total_duration_ms == sum of ingested durations`,
/// `avg_duration_ms == total_duration_ms / renders`, `first <= last`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentStats {
    pub component: String,
    pub renders: u64,
    pub unnecessary: u64,
    #[serde(
        serialize_with = "serialize_min_sentinel",
        deserialize_with = "deserialize_min_sentinel"
    )]
    pub min_duration_ms: Option<f64>,
    #[serde(serialize_with = "serialize_rounded")]
    pub avg_duration_ms: f64,
    #[serde(serialize_with = "serialize_rounded")]
    pub max_duration_ms: f64,
    #[serde(serialize_with = "serialize_rounded")]
    pub total_duration_ms: f64,
    pub first_timestamp_ms: Option<f64>,
    pub last_timestamp_ms: Option<f64>,
    /// Heuristic baseline; informative only (§4.2 "Expected renders").
    pub expected_renders: u64,
    pub props_changed: bool,
    pub state_changed: bool,
    /// Names from the most recent event's `changedProps` (§4.4's
    /// `useCallback` rule inspects these for function-shaped prop names).
    pub last_changed_props: Vec<String>,
    pub severity: Severity,
    pub parent: Option<String>,
    pub chain_path: Vec<String>,
    pub suggestions: Vec<FixSuggestion>,
}

impl ComponentStats {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            renders: 0,
            unnecessary: 0,
            min_duration_ms: None,
            avg_duration_ms: 0.0,
            max_duration_ms: 0.0,
            total_duration_ms: 0.0,
            first_timestamp_ms: None,
            last_timestamp_ms: None,
            expected_renders: 0,
            props_changed: false,
            state_changed: false,
            last_changed_props: Vec::new(),
            severity: Severity::Healthy,
            parent: None,
            chain_path: Vec::new(),
            suggestions: Vec::new(),
        }
    }
}

/// One detected cascade (§3 "RenderChain", §4.3). Never mutated after a
/// [`crate::chain::ChainAnalyzer`] emits it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderChain {
    pub trigger: String,
    pub components: Vec<String>,
    pub depth: usize,
    pub total_renders: u64,
    pub root_cause: String,
    pub timestamp_ms: f64,
    pub context_triggered: bool,
}

/// The remediation technique a [`FixSuggestion`] recommends (§3, §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FixKind {
    Memo,
    UseMemo,
    UseCallback,
    ContextSplit,
    StateColocation,
    ComponentExtraction,
}

/// A single remediation record produced by the suggester (§3, §4.4). A
/// component may accumulate several, one per firing rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixSuggestion {
    pub component: String,
    pub severity: Severity,
    pub issue: String,
    pub cause: String,
    pub fix_kind: FixKind,
    pub code_before: String,
    pub code_after: String,
    pub explanation: String,
    pub impact_estimate: Option<String>,
}

/// Configuration accepted by the orchestrator (§3 "Configuration").
///
/// Recognized-option validation happens in the (out-of-scope) config file
/// loader; this type is the validated result it hands the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Render count threshold (inclusive) at which a component becomes
    /// `critical`.
    pub critical: u32,
    /// Render count threshold (inclusive) at which a component becomes
    /// `warning`.
    pub warning: u32,
    /// Render-rate floor reserved for future FPS-based hysteresis (§3).
    pub fps_threshold: f64,
    /// Glob patterns (`*`, `?`) a component name must match at least one
    /// of to be tracked.
    pub include: Vec<String>,
    /// Glob patterns that exclude an otherwise-included component.
    pub exclude: Vec<String>,
    pub track_unnecessary: bool,
    /// Chain window duration in milliseconds (default one 60 Hz frame).
    pub chain_window_ms: u64,
    /// `K`: the distinct-consumer count the context-trigger heuristic
    /// requires (§4.3, §9 open question — fixed default of 3, exposed
    /// here as configuration).
    pub context_trigger_k: u32,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            critical: 50,
            warning: 20,
            fps_threshold: 30.0,
            include: vec!["*".to_string()],
            exclude: Vec::new(),
            track_unnecessary: true,
            chain_window_ms: 16,
            context_trigger_k: 3,
        }
    }
}

impl Configuration {
    pub fn builder() -> ConfigurationBuilder {
        ConfigurationBuilder::default()
    }
}

/// Fluent builder over [`Configuration`], for programmatic construction in
/// tests and embedding code (the config *file* loader is out of scope).
#[derive(Debug, Clone, Default)]
pub struct ConfigurationBuilder {
    inner: Configuration,
}

impl ConfigurationBuilder {
    pub fn critical(mut self, value: u32) -> Self {
        self.inner.critical = value;
        self
    }

    pub fn warning(mut self, value: u32) -> Self {
        self.inner.warning = value;
        self
    }

    pub fn fps_threshold(mut self, value: f64) -> Self {
        self.inner.fps_threshold = value;
        self
    }

    pub fn include(mut self, patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.inner.include = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn exclude(mut self, patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.inner.exclude = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn track_unnecessary(mut self, value: bool) -> Self {
        self.inner.track_unnecessary = value;
        self
    }

    pub fn chain_window_ms(mut self, value: u64) -> Self {
        self.inner.chain_window_ms = value;
        self
    }

    pub fn context_trigger_k(mut self, value: u32) -> Self {
        self.inner.context_trigger_k = value;
        self
    }

    pub fn build(self) -> Configuration {
        self.inner
    }
}

/// Static descriptor of the session the report summarizes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDescriptor {
    pub target_url: String,
    pub session_id: String,
    pub start_timestamp: chrono::DateTime<chrono::Utc>,
    pub duration_ms: f64,
}

/// Aggregate counts over the whole session (§3 "SessionReport.summary").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Summary {
    pub unique_components: u64,
    pub total_renders: u64,
    pub healthy_count: u64,
    pub info_count: u64,
    pub warning_count: u64,
    pub critical_count: u64,
    #[serde(serialize_with = "serialize_rounded")]
    pub avg_fps: f64,
    #[serde(serialize_with = "serialize_rounded")]
    pub min_fps: f64,
    pub unnecessary_total: u64,
    /// Events coalesced away under back-pressure (§5).
    pub dropped_events: u64,
}

/// The assembled output of a session (§3 "SessionReport", §6.2).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub version: u32,
    pub generated: chrono::DateTime<chrono::Utc>,
    pub session: SessionDescriptor,
    pub summary: Summary,
    pub components: Vec<ComponentStats>,
    pub chains: Vec<RenderChain>,
    pub suggestions: Vec<FixSuggestion>,
    /// Supplied by an external framework-detection collaborator; opaque
    /// to this crate.
    pub framework: Option<serde_json::Value>,
    /// Reserved for future use; always empty in this implementation.
    #[serde(default)]
    pub timeline: Vec<serde_json::Value>,
}

/// Current report format version this crate emits.
pub const REPORT_FORMAT_VERSION: u32 = 1;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_duration_sentinel_serializes_as_zero() {
        let mut stats = ComponentStats::new("Widget");
        stats.min_duration_ms = None;
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["min_duration_ms"], 0.0);
    }

    #[test]
    fn floats_round_to_two_decimals_on_serialize() {
        let mut stats = ComponentStats::new("Widget");
        stats.renders = 3;
        stats.avg_duration_ms = 1.23456;
        stats.max_duration_ms = 2.005;
        stats.total_duration_ms = 3.7001;
        stats.min_duration_ms = Some(0.1234);
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["avg_duration_ms"], 1.23);
        assert_eq!(json["total_duration_ms"], 3.7);
        assert_eq!(json["min_duration_ms"], 0.12);
    }

    #[test]
    fn configuration_default_matches_spec_defaults() {
        let config = Configuration::default();
        assert_eq!(config.chain_window_ms, 16);
        assert_eq!(config.context_trigger_k, 3);
        assert_eq!(config.include, vec!["*".to_string()]);
    }
}
