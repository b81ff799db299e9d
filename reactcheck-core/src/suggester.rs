//! Rule-based remediation engine (§4.4).
//!
//! Rules run in table order against one [`ComponentStats`] at a time, each
//! deciding independently whether to fire; a component can accumulate
//! several suggestions in the same pass. Code fragments come from the
//! static template table at the bottom of this file, analogous to how
//! `tessera-ui`'s profiler keeps a closed, static vocabulary rather than a
//! registry (§4.4.1).

use crate::model::{ComponentStats, FixKind, FixSuggestion, RenderChain, Severity};

/// Average render-time floor (ms) the `useMemo` rule compares against.
const DEFAULT_T_AVG_MS: f64 = 2.0;

pub struct Suggester {
    thresholds: crate::stats::Thresholds,
    t_avg_ms: f64,
}

impl Suggester {
    pub fn new(thresholds: crate::stats::Thresholds) -> Self {
        Self {
            thresholds,
            t_avg_ms: DEFAULT_T_AVG_MS,
        }
    }

    /// Evaluates every rule against `stats`, given the chains observed this
    /// session for chain-membership-dependent rules (`useCallback`,
    /// `context-split`, `state-colocation`). Returns suggestions in rule
    /// table order.
    pub fn evaluate(&self, stats: &ComponentStats, chains: &[RenderChain]) -> Vec<FixSuggestion> {
        let mut suggestions = Vec::new();
        let warning = self.thresholds.warning as u64;
        let critical = self.thresholds.critical as u64;

        // memo
        if stats.renders >= warning && !stats.props_changed {
            suggestions.push(self.build(
                stats,
                stats.severity,
                FixKind::Memo,
                "re-renders repeatedly without its props changing",
                "the component is not memoized, so it re-renders whenever its parent does",
            ));
        }

        // useMemo
        if stats.renders >= warning && stats.avg_duration_ms >= self.t_avg_ms {
            suggestions.push(self.build(
                stats,
                at_least(stats.severity, Severity::Warning),
                FixKind::UseMemo,
                "render work is expensive and recomputed on every render",
                "an expensive computation inside the component body runs unconditionally",
            ));
        }

        // useCallback: component is a non-leaf in some chain whose child's
        // most recent changed props include a function-named prop.
        if self.has_memoized_child_rerendering_on_function_prop(stats, chains) {
            suggestions.push(self.build(
                stats,
                at_least(stats.severity, Severity::Warning),
                FixKind::UseCallback,
                "a memoized child still re-renders because it receives a new function prop",
                "an inline function prop is recreated on every render, defeating the child's memoization",
            ));
        }

        // context-split
        if chains
            .iter()
            .any(|chain| chain.context_triggered && chain.depth >= 3 && chain.components.contains(&stats.component))
        {
            suggestions.push(self.build(
                stats,
                Severity::Warning,
                FixKind::ContextSplit,
                "sits on a deep context-triggered cascade",
                "a single context value change fans out to many unrelated consumers",
            ));
        }

        // state-colocation
        if stats.state_changed
            && !stats.chain_path.is_empty()
            && stats.chain_path.last() != Some(&stats.component)
        {
            suggestions.push(self.build(
                stats,
                Severity::Info,
                FixKind::StateColocation,
                "owns state that is consumed further down its own chain",
                "state lives higher in the tree than the components that actually read it",
            ));
        }

        // component-extraction
        if stats.renders >= critical && stats.props_changed && stats.state_changed {
            suggestions.push(self.build(
                stats,
                Severity::Critical,
                FixKind::ComponentExtraction,
                "re-renders under both prop churn and state churn",
                "one component is doing the work of several independently-changing pieces",
            ));
        }

        suggestions
    }

    fn has_memoized_child_rerendering_on_function_prop(
        &self,
        stats: &ComponentStats,
        chains: &[RenderChain],
    ) -> bool {
        let is_function_named = |name: &str| {
            name.starts_with("on")
                && name
                    .chars()
                    .nth(2)
                    .map(|c| c.is_uppercase())
                    .unwrap_or(false)
        };
        chains.iter().any(|chain| {
            chain
                .components
                .iter()
                .position(|c| c == &stats.component)
                .map(|index| index + 1 < chain.components.len())
                .unwrap_or(false)
        }) && stats.last_changed_props.iter().any(|name| is_function_named(name))
    }

    fn build(
        &self,
        stats: &ComponentStats,
        severity: Severity,
        kind: FixKind,
        issue: &str,
        cause: &str,
    ) -> FixSuggestion {
        let (before, after, explanation) = template_for(kind, &stats.component);
        FixSuggestion {
            component: stats.component.clone(),
            severity,
            issue: format!("{} {}", stats.component, issue),
            cause: cause.to_string(),
            fix_kind: kind,
            code_before: before,
            code_after: after,
            explanation,
            impact_estimate: impact_estimate(kind, stats),
        }
    }
}

fn at_least(current: Severity, floor: Severity) -> Severity {
    if current > floor {
        current
    } else {
        floor
    }
}

fn impact_estimate(kind: FixKind, stats: &ComponentStats) -> Option<String> {
    match kind {
        FixKind::Memo | FixKind::UseMemo | FixKind::UseCallback => Some(format!(
            "could eliminate up to {} unnecessary renders observed this session",
            stats.unnecessary
        )),
        FixKind::ComponentExtraction => Some(format!(
            "splitting would isolate {} renders currently attributed to one component",
            stats.renders
        )),
        FixKind::ContextSplit | FixKind::StateColocation => None,
    }
}

/// Static, closed code-fragment table keyed by fix kind (§4.4.1). Fragments
/// are opaque illustrative strings; the engine never parses or executes
/// them.
fn template_for(kind: FixKind, component: &str) -> (String, String, String) {
    match kind {
        FixKind::Memo => (
            format!("function {component}(props) {{ /* ... */ }}"),
            format!("const {component} = memo(function {component}(props) {{ /* ... */ }});"),
            "Wrapping the component in a memoization helper skips re-rendering when props are referentially equal.".to_string(),
        ),
        FixKind::UseMemo => (
            "const value = computeExpensiveValue(a, b);".to_string(),
            "const value = useMemo(() => computeExpensiveValue(a, b), [a, b]);".to_string(),
            "Hoisting the computation behind a memoized accessor avoids recomputing it on every render."
                .to_string(),
        ),
        FixKind::UseCallback => (
            "<Child onClick={() => doThing(id)} />".to_string(),
            "const handleClick = useCallback(() => doThing(id), [id]);\n<Child onClick={handleClick} />".to_string(),
            "Memoizing the callback keeps the prop reference stable so the memoized child does not re-render."
                .to_string(),
        ),
        FixKind::ContextSplit => (
            "<BigContext.Provider value={{ a, b, c }}>".to_string(),
            "<AContext.Provider value={a}>\n  <BContext.Provider value={b}>\n    <CContext.Provider value={c}>"
                .to_string(),
            "Splitting one large context into focused contexts means a consumer of `a` is not re-rendered when only `b` changes."
                .to_string(),
        ),
        FixKind::StateColocation => (
            format!("// state declared in an ancestor of {component}"),
            format!("// state moved down into {component} itself"),
            "Moving state next to the component that reads it narrows the set of components a state change re-renders."
                .to_string(),
        ),
        FixKind::ComponentExtraction => (
            format!("function {component}(props) {{ /* props and state intermixed */ }}"),
            format!("function {component}(props) {{ return <StablePart {{...props}} /> <VolatilePart />; }}"),
            "Extracting the volatile piece into its own component confines re-renders to just that piece."
                .to_string(),
        ),
    }
}
