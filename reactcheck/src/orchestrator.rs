//! Session orchestrator (§4.5, §6.3).
//!
//! Owns every piece of mutable session state: the stats collector, the
//! chain analyzer, the suggester, the accumulated chain history, and the
//! event bus they publish through (§3 "Ownership"). Nothing here touches a
//! socket; the transport/router layer feeds it decoded messages and the
//! `reactcheck` facade's driving loop is the single thread ever allowed to
//! call into it (§4.1.1, §5).

use reactcheck_core::bus::{Event, EventBus, ReentrancyGuard, Tag};
use reactcheck_core::chain::ChainAnalyzer;
use reactcheck_core::stats::{StatsCollector, Thresholds};
use reactcheck_core::suggester::Suggester;
use reactcheck_core::{
    Configuration, RenderChain, RenderEvent, RenderPhase, SessionDescriptor, SessionReport,
    Severity, Summary, REPORT_FORMAT_VERSION,
};
use reactcheck_protocol::message::{self, ComponentNodePayload, RenderEventPayload};

use crate::error::ReactCheckError;
use crate::router::NameFilter;

/// The session lifecycle (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    Paused,
    Stopped,
}

/// Owns all session state and exposes the host-side control surface
/// (§6.3). One `Session` per probe connection.
pub struct Session {
    state: SessionState,
    target_url: String,
    session_id: Option<uuid::Uuid>,
    start_timestamp: Option<chrono::DateTime<chrono::Utc>>,
    config: Configuration,
    filter: NameFilter,
    stats: StatsCollector,
    chain: ChainAnalyzer,
    suggester: Suggester,
    bus: EventBus,
    chains: Vec<RenderChain>,
    fps_samples: Vec<f64>,
    dropped_events: u64,
    framework: Option<serde_json::Value>,
    reentrancy: ReentrancyGuard,
    last_report: Option<SessionReport>,
}

impl Session {
    pub fn new(target_url: impl Into<String>) -> Result<Self, ReactCheckError> {
        Self::with_config(target_url, Configuration::default())
    }

    pub fn with_config(
        target_url: impl Into<String>,
        config: Configuration,
    ) -> Result<Self, ReactCheckError> {
        let filter = build_filter(&config)?;
        let thresholds = thresholds_from(&config);
        Ok(Self {
            state: SessionState::Idle,
            target_url: target_url.into(),
            session_id: None,
            start_timestamp: None,
            chain: ChainAnalyzer::new(config.chain_window_ms as f64, config.context_trigger_k),
            suggester: Suggester::new(thresholds),
            stats: StatsCollector::new(thresholds),
            filter,
            config,
            bus: EventBus::new(),
            chains: Vec::new(),
            fps_samples: Vec::new(),
            dropped_events: 0,
            framework: None,
            reentrancy: ReentrancyGuard::new(),
            last_report: None,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn session_id(&self) -> Option<uuid::Uuid> {
        self.session_id
    }

    /// Replaces the active configuration. Permitted in any state; render
    /// thresholds apply immediately (§8 scenario 5), the include/exclude
    /// filter applies to subsequently-ingested events, and the chain
    /// window/`K` apply to windows opened after this call. Any
    /// already-open chain window is flushed first rather than discarded,
    /// and recorded parent edges survive the call (§4.3: edges are
    /// "persisted per session; they are not mutated by subsequent
    /// events" — a mid-session `configure` is not an exception).
    pub fn configure(&mut self, config: Configuration) -> Result<(), ReactCheckError> {
        let _scope = self.reentrancy.enter();
        let filter = build_filter(&config)?;
        let thresholds = thresholds_from(&config);
        self.stats.set_thresholds(thresholds, &mut self.bus);
        if let Some(chain) = self.chain.flush() {
            self.finish_chain(chain);
        }
        self.chain
            .reconfigure(config.chain_window_ms as f64, config.context_trigger_k);
        self.suggester = Suggester::new(thresholds);
        self.filter = filter;
        self.config = config;
        Ok(())
    }

    /// `idle -> running`. A no-op (acknowledged, dropped) if not idle
    /// (§4.5: "Control messages received in any other state are
    /// acknowledged and dropped").
    pub fn start(&mut self) -> uuid::Uuid {
        let _scope = self.reentrancy.enter();
        if self.state != SessionState::Idle {
            return self.session_id.unwrap_or_else(uuid::Uuid::new_v4);
        }
        let id = uuid::Uuid::new_v4();
        self.session_id = Some(id);
        self.start_timestamp = Some(chrono::Utc::now());
        self.state = SessionState::Running;
        tracing::info!(session_id = %id, target_url = %self.target_url, "session started");
        id
    }

    pub fn pause(&mut self) {
        let _scope = self.reentrancy.enter();
        if self.state == SessionState::Running {
            self.state = SessionState::Paused;
            tracing::debug!("session paused");
        }
    }

    pub fn resume(&mut self) {
        let _scope = self.reentrancy.enter();
        if self.state == SessionState::Paused {
            self.state = SessionState::Running;
            tracing::debug!("session resumed");
        }
    }

    /// Clears all accumulated counters without changing lifecycle state.
    /// A no-op once `stopped` (§4.5's transitions do not list a way back
    /// out of `stopped`).
    pub fn reset(&mut self) {
        let _scope = self.reentrancy.enter();
        if self.state == SessionState::Stopped {
            return;
        }
        self.stats.reset();
        self.chains.clear();
        self.fps_samples.clear();
        self.dropped_events = 0;
        tracing::debug!("session counters reset");
    }

    /// Ingests one render event. Silently dropped outside `running` (§4.5)
    /// or if excluded by the name filter (§8).
    pub fn ingest_render(&mut self, payload: RenderEventPayload) {
        if self.state != SessionState::Running {
            return;
        }
        if !self.filter.allows(&payload.component_name) {
            return;
        }

        let event = RenderEvent {
            component: payload.component_name,
            instance_id: payload.instance_id,
            phase: match payload.phase {
                message::RenderPhase::Mount => RenderPhase::Mount,
                message::RenderPhase::Update => RenderPhase::Update,
            },
            duration_ms: payload.render_time,
            timestamp_ms: payload.timestamp,
            necessary: payload.necessary,
            changed_props: payload.changed_props.unwrap_or_default(),
            changed_state: payload.changed_state.unwrap_or_default(),
        };

        self.bus.publish(Event::Render(event.clone()));
        // A negative duration is an invariant violation, not malformed
        // input to drop (§7): the probe is never supposed to emit one, so
        // reaching here with one is treated as a bug rather than absorbed
        // silently.
        let newly_ingested = self
            .stats
            .ingest(&event, &mut self.bus)
            .expect("render event had a negative duration");
        // A duplicate commit (§9: "treat duplicate commits with identical
        // timestamps and component identity as a single event") must stay
        // idempotent for the chain analyzer too, or a replayed commit would
        // inflate `RenderChain::total_renders` and the context-trigger
        // member count for a window it was already counted in.
        if newly_ingested {
            if let Some(closed) = self.chain.observe(&event) {
                self.finish_chain(closed);
            }
        }
    }

    /// Applies a probe-reported component tree as parent/child edges
    /// (§4.3 "Parent/child discovery"). The probe's own `chain` hints are
    /// absorbed separately and never override analyzer output (§4.5).
    pub fn ingest_component_tree(&mut self, nodes: &[ComponentNodePayload]) {
        if self.state != SessionState::Running {
            return;
        }
        for node in nodes {
            self.apply_tree_edges(node);
        }
    }

    fn apply_tree_edges(&mut self, node: &ComponentNodePayload) {
        for child in &node.children {
            self.stats.set_parent(&child.name, &node.name);
            self.chain.set_parent(&child.name, &node.name);
            self.apply_tree_edges(child);
        }
    }

    /// Advisory only; the authoritative chain output always comes from
    /// [`ChainAnalyzer`] (§4.5).
    pub fn ingest_chain_hint(&mut self) {
        if self.state != SessionState::Running {
            return;
        }
        tracing::debug!("received advisory chain hint from probe, ignoring (analyzer is authoritative)");
    }

    pub fn ingest_fps(&mut self, fps: f64) {
        if self.state != SessionState::Running {
            return;
        }
        self.fps_samples.push(fps);
        if fps < self.config.fps_threshold {
            self.bus.publish(Event::FpsDrop { fps });
        }
    }

    pub fn ingest_ready(&mut self, react_version: String) {
        if self.state != SessionState::Running {
            return;
        }
        self.framework = Some(serde_json::json!({ "reactVersion": react_version }));
        self.bus.publish(Event::Ready { react_version });
    }

    pub fn ingest_probe_error(&mut self, message: String, code: String) {
        if self.state != SessionState::Running {
            return;
        }
        tracing::warn!(%code, %message, "probe reported an error");
        self.bus.publish(Event::Error { message, code });
    }

    /// Records events coalesced away under back-pressure (§5), so the
    /// final summary reflects them even though they were never ingested.
    pub fn record_dropped(&mut self, count: u64) {
        self.dropped_events += count;
        tracing::warn!(dropped = self.dropped_events, "coalesced events under back-pressure");
    }

    fn finish_chain(&mut self, chain: RenderChain) {
        for window in chain.components.windows(2) {
            self.stats.set_chain(&window[1], chain.components.clone());
        }
        if let Some(first) = chain.components.first() {
            self.stats.set_chain(first, chain.components.clone());
        }
        self.bus.publish(Event::Chain(chain.clone()));
        self.chains.push(chain);
    }

    pub fn subscribe(
        &mut self,
        tag: Tag,
        handler: impl FnMut(&Event) + Send + 'static,
    ) -> reactcheck_core::bus::SubscriptionId {
        self.bus.subscribe(tag, handler)
    }

    pub fn unsubscribe(&mut self, id: reactcheck_core::bus::SubscriptionId) {
        self.bus.unsubscribe(id)
    }

    /// Idempotent (§4.5 "Cancellation"). Flushes the open chain window,
    /// asks the suggester to enumerate suggestions for every component at
    /// or above `warning`, assembles the final [`SessionReport`], and
    /// transitions to `stopped`. Subsequent calls return the same report.
    pub fn stop(&mut self) -> SessionReport {
        let _scope = self.reentrancy.enter();
        if self.state == SessionState::Stopped {
            return self
                .last_report
                .clone()
                .expect("stopped state always has a cached report");
        }

        if let Some(chain) = self.chain.flush() {
            self.finish_chain(chain);
        }

        let mut components = self.stats.snapshot();
        let mut suggestions = Vec::new();
        for stats in &mut components {
            if stats.severity >= Severity::Warning {
                let fired = self.suggester.evaluate(stats, &self.chains);
                stats.suggestions = fired.clone();
                suggestions.extend(fired);
            }
        }

        let (healthy_count, info_count, warning_count, critical_count) =
            self.stats.summary_counts();
        let avg_fps = if self.fps_samples.is_empty() {
            0.0
        } else {
            self.fps_samples.iter().sum::<f64>() / self.fps_samples.len() as f64
        };
        let min_fps = self
            .fps_samples
            .iter()
            .copied()
            .fold(f64::INFINITY, f64::min);
        let min_fps = if min_fps.is_finite() { min_fps } else { 0.0 };

        let start_timestamp = self.start_timestamp.unwrap_or_else(chrono::Utc::now);
        let duration_ms = (chrono::Utc::now() - start_timestamp)
            .num_milliseconds()
            .max(0) as f64;

        let report = SessionReport {
            version: REPORT_FORMAT_VERSION,
            generated: chrono::Utc::now(),
            session: SessionDescriptor {
                target_url: self.target_url.clone(),
                session_id: self
                    .session_id
                    .map(|id| id.to_string())
                    .unwrap_or_default(),
                start_timestamp,
                duration_ms,
            },
            summary: Summary {
                unique_components: components.len() as u64,
                total_renders: self.stats.total_renders(),
                healthy_count,
                info_count,
                warning_count,
                critical_count,
                avg_fps,
                min_fps,
                unnecessary_total: self.stats.total_unnecessary(),
                dropped_events: self.dropped_events,
            },
            components,
            chains: self.chains.clone(),
            suggestions,
            framework: self.framework.clone(),
            timeline: Vec::new(),
        };

        self.state = SessionState::Stopped;
        self.last_report = Some(report.clone());
        tracing::info!(session_id = ?self.session_id, "session stopped");
        report
    }
}

fn build_filter(config: &Configuration) -> Result<NameFilter, ReactCheckError> {
    NameFilter::new(&config.include, &config.exclude)
        .map_err(|e| ReactCheckError::ConfigInvalid(e.to_string()))
}

fn thresholds_from(config: &Configuration) -> Thresholds {
    Thresholds {
        warning: config.warning,
        critical: config.critical,
    }
}
