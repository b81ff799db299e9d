//! Frame-windowed cascade detector (§4.3 — "the central algorithm").

use rustc_hash::FxHashMap;

use crate::model::{RenderChain, RenderEvent};

/// One event captured inside a pending window, plus the bits of the
/// originating [`RenderEvent`] the window-close algorithm needs.
#[derive(Debug, Clone)]
struct WindowMember {
    component: String,
    props_changed: bool,
    state_changed: bool,
    timestamp_ms: f64,
    arrival_index: u64,
}

/// Detects render cascades within a sliding, non-overlapping window (§4.3
/// "Windowing"). A window opens on the first event after idleness and
/// closes `window_ms` after its own opening event; a late event landing
/// inside an already-closed window starts a fresh one rather than
/// reopening the old one.
pub struct ChainAnalyzer {
    window_ms: f64,
    context_trigger_k: u32,
    /// Child → parent, append-only for the session (§4.3 "Parent/child
    /// discovery"; §4.3.1 internal representation).
    parent_edges: FxHashMap<String, String>,
    /// Insertion order of `parent_edges`, since the chain-path walk must
    /// traverse them "in deterministic order (insertion order of edges)".
    parent_edge_order: Vec<String>,
    pending: Vec<WindowMember>,
    window_open_ms: Option<f64>,
    next_arrival_index: u64,
}

impl ChainAnalyzer {
    pub fn new(window_ms: f64, context_trigger_k: u32) -> Self {
        Self {
            window_ms,
            context_trigger_k,
            parent_edges: FxHashMap::default(),
            parent_edge_order: Vec::new(),
            pending: Vec::new(),
            window_open_ms: None,
            next_arrival_index: 0,
        }
    }

    /// Updates the window width and context-trigger `K` in place, leaving
    /// `parent_edges`/`parent_edge_order` and any currently-open window
    /// untouched (§4.3: parent edges are "persisted per session; they are
    /// not mutated by subsequent events" — a mid-session configuration
    /// change is not an exception). The new width applies to windows
    /// opened from this point on; an already-open window keeps the width
    /// it was opened with.
    pub fn reconfigure(&mut self, window_ms: f64, context_trigger_k: u32) {
        self.window_ms = window_ms;
        self.context_trigger_k = context_trigger_k;
    }

    pub fn set_parent(&mut self, child: &str, parent: &str) {
        if !self.parent_edges.contains_key(child) {
            self.parent_edge_order.push(child.to_string());
        }
        self.parent_edges.insert(child.to_string(), parent.to_string());
    }

    /// Feeds one event into the analyzer. Returns a closed [`RenderChain`]
    /// if admitting `event` closed the previously-open window (i.e. `event`
    /// falls outside it); the event itself always starts or joins a
    /// window, so the caller should continue feeding subsequent events
    /// normally.
    pub fn observe(&mut self, event: &RenderEvent) -> Option<RenderChain> {
        let member = WindowMember {
            component: event.component.clone(),
            props_changed: event.props_changed(),
            state_changed: event.state_changed(),
            timestamp_ms: event.timestamp_ms,
            arrival_index: self.next_arrival_index,
        };
        self.next_arrival_index += 1;

        match self.window_open_ms {
            None => {
                self.window_open_ms = Some(event.timestamp_ms);
                self.pending.push(member);
                None
            }
            Some(open) if event.timestamp_ms - open < self.window_ms => {
                self.pending.push(member);
                None
            }
            Some(_) => {
                let closed = self.close_window();
                self.window_open_ms = Some(event.timestamp_ms);
                self.pending.push(member);
                closed
            }
        }
    }

    /// Closes any open window without waiting for a subsequent event, used
    /// by the orchestrator's `stop()` sequence (§4.5: "Flushes any open
    /// chain window").
    pub fn flush(&mut self) -> Option<RenderChain> {
        self.close_window()
    }

    fn close_window(&mut self) -> Option<RenderChain> {
        let open = self.window_open_ms.take()?;
        if self.pending.is_empty() {
            return None;
        }
        let members = std::mem::take(&mut self.pending);
        let chain = self.attribute(open, members);
        tracing::debug!(root_cause = %chain.root_cause, depth = chain.depth, "closed render chain window");
        Some(chain)
    }

    fn attribute(&self, open_ms: f64, mut members: Vec<WindowMember>) -> RenderChain {
        // Deterministic arrival order: timestamp, ties broken by arrival
        // index (§8 "Two events with identical timestamps are ordered by
        // arrival").
        members.sort_by(|a, b| {
            a.timestamp_ms
                .partial_cmp(&b.timestamp_ms)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.arrival_index.cmp(&b.arrival_index))
        });

        let total_renders = members.len() as u64;

        // Step 3: select the root cause.
        let state_changers: Vec<&WindowMember> =
            members.iter().filter(|m| m.state_changed).collect();
        let root_cause = if let Some(unique) = self.unique_root_without_ancestor_state_change(&members, &state_changers) {
            unique
        } else if let Some(first_state_changer) = state_changers.first() {
            first_state_changer.component.clone()
        } else {
            members[0].component.clone()
        };

        // Step 4: context-triggered heuristic.
        let distinct_components: std::collections::BTreeSet<&str> =
            members.iter().map(|m| m.component.as_str()).collect();
        let unparented_without_state_change = members
            .iter()
            .filter(|m| {
                !self.parent_edges.contains_key(&m.component) && !m.state_changed
            })
            .count();
        let context_triggered = distinct_components.len() as u32 >= self.context_trigger_k
            && unparented_without_state_change + 1 >= members.len();

        // Step 5: derive the chain path.
        let chain_path = self.chain_path(&root_cause, &members);

        let trigger = if context_triggered {
            format!("context update near {root_cause}")
        } else if members
            .iter()
            .find(|m| m.component == root_cause)
            .map(|m| m.state_changed)
            .unwrap_or(false)
        {
            format!("state change in {root_cause}")
        } else {
            format!("render in {root_cause}")
        };

        RenderChain {
            trigger,
            depth: chain_path.len(),
            components: chain_path.clone(),
            total_renders,
            root_cause,
            timestamp_ms: open_ms,
            context_triggered,
        }
    }

    /// The component whose state changed while no ancestor present in the
    /// window also had a state change, if that component is unique.
    fn unique_root_without_ancestor_state_change(
        &self,
        members: &[WindowMember],
        state_changers: &[&WindowMember],
    ) -> Option<String> {
        let state_changed_set: std::collections::HashSet<&str> = members
            .iter()
            .filter(|m| m.state_changed)
            .map(|m| m.component.as_str())
            .collect();

        let mut candidates: Vec<&str> = Vec::new();
        for member in state_changers {
            let mut ancestor_has_state_change = false;
            let mut current = member.component.as_str();
            // Walk recorded ancestry; bounded by edge count to stay
            // terminating even if an adversarial edge set were cyclic.
            for _ in 0..self.parent_edges.len() + 1 {
                match self.parent_edges.get(current) {
                    Some(parent) => {
                        if state_changed_set.contains(parent.as_str()) {
                            ancestor_has_state_change = true;
                            break;
                        }
                        current = parent.as_str();
                    }
                    None => break,
                }
            }
            if !ancestor_has_state_change {
                candidates.push(member.component.as_str());
            }
        }

        candidates.sort();
        candidates.dedup();
        match candidates.as_slice() {
            [only] => Some(only.to_string()),
            _ => None,
        }
    }

    /// Walks from `root` outward along recorded parent edges in edge
    /// insertion order, then appends any window members not yet on the
    /// path in timestamp (arrival) order (§4.3 step 5).
    fn chain_path(&self, root: &str, members: &[WindowMember]) -> Vec<String> {
        let mut path = vec![root.to_string()];

        for child in &self.parent_edge_order {
            let parent = &self.parent_edges[child];
            if parent == root && !path.contains(child) {
                path.push(child.clone());
            }
        }

        for member in members {
            if !path.contains(&member.component) {
                path.push(member.component.clone());
            }
        }

        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RenderPhase;

    fn event(component: &str, timestamp_ms: f64, state_changed: bool) -> RenderEvent {
        RenderEvent {
            component: component.to_string(),
            instance_id: None,
            phase: RenderPhase::Update,
            duration_ms: 1.0,
            timestamp_ms,
            necessary: true,
            changed_props: Vec::new(),
            changed_state: if state_changed {
                vec!["y".to_string()]
            } else {
                Vec::new()
            },
        }
    }

    #[test]
    fn single_event_window_has_depth_one() {
        let mut analyzer = ChainAnalyzer::new(16.0, 3);
        assert!(analyzer.observe(&event("Solo", 0.0, false)).is_none());
        let chain = analyzer.flush().unwrap();
        assert_eq!(chain.depth, 1);
        assert_eq!(chain.root_cause, "Solo");
    }

    #[test]
    fn window_boundary_splits_into_two_chains() {
        let mut analyzer = ChainAnalyzer::new(16.0, 3);
        assert!(analyzer.observe(&event("A", 0.0, false)).is_none());
        // t=17 is outside [0, 16) of the first window.
        let first = analyzer.observe(&event("B", 17.0, false));
        assert!(first.is_some());
        assert_eq!(first.unwrap().depth, 1);
        let second = analyzer.flush().unwrap();
        assert_eq!(second.depth, 1);
        assert_eq!(second.root_cause, "B");
    }

    #[test]
    fn context_trigger_scenario() {
        let mut analyzer = ChainAnalyzer::new(16.0, 3);
        analyzer.observe(&event("Provider", 0.0, true));
        analyzer.observe(&event("ConsumerA", 2.0, false));
        analyzer.observe(&event("ConsumerB", 4.0, false));
        analyzer.observe(&event("ConsumerC", 6.0, false));
        let chain = analyzer.flush().unwrap();
        assert_eq!(chain.root_cause, "Provider");
        assert!(chain.depth >= 2);
        assert!(chain.context_triggered);
    }

    #[test]
    fn chains_never_overlap_and_open_timestamps_are_non_decreasing() {
        let mut analyzer = ChainAnalyzer::new(16.0, 3);
        let mut emitted = Vec::new();
        for (component, t) in [("A", 0.0), ("B", 5.0), ("C", 20.0), ("D", 50.0), ("E", 52.0)] {
            if let Some(chain) = analyzer.observe(&event(component, t, false)) {
                emitted.push(chain);
            }
        }
        if let Some(chain) = analyzer.flush() {
            emitted.push(chain);
        }
        let timestamps: Vec<f64> = emitted.iter().map(|c| c.timestamp_ms).collect();
        let mut sorted = timestamps.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(timestamps, sorted);
    }
}
