//! Probe ↔ host message schema (§6.1).
//!
//! Text frames carry UTF-8 JSON tagged by a `type` field. [`Inbound`] is the
//! union the probe sends; [`Outbound`] is the union the host sends. An
//! unrecognized inbound `type` decodes to [`Inbound::Unknown`] rather than
//! failing, per the forward-compatibility rule in §6.1.

use serde::{Deserialize, Serialize};

/// Whether a render was a first mount or a subsequent update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderPhase {
    Mount,
    Update,
}

/// Wire shape of a single render event, as emitted by the probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderEventPayload {
    pub component_name: String,
    /// The probe's own running render count for this component; informative
    /// only, the host recomputes counts itself (§4.2).
    #[serde(default)]
    pub render_count: Option<u64>,
    pub render_time: f64,
    pub phase: RenderPhase,
    pub necessary: bool,
    pub timestamp: f64,
    #[serde(default)]
    pub instance_id: Option<String>,
    #[serde(default)]
    pub changed_props: Option<Vec<String>>,
    #[serde(default)]
    pub changed_state: Option<Vec<String>>,
}

/// Advisory chain hint forwarded by the probe. The chain analyzer treats
/// this as a hint only; the authoritative output is always its own (§4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainHintPayload {
    pub trigger: Option<String>,
    #[serde(default)]
    pub components: Vec<String>,
    #[serde(default)]
    pub depth: Option<u32>,
    #[serde(default)]
    pub total_renders: Option<u32>,
    #[serde(default)]
    pub root_cause: Option<String>,
    #[serde(default)]
    pub timestamp: Option<f64>,
    #[serde(default)]
    pub context_triggered: Option<bool>,
}

/// A node in the probe-reported component tree, used only to enrich
/// ancestry hints; never authoritative over parent edges recorded from
/// actual render events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentNodePayload {
    pub name: String,
    #[serde(default)]
    pub children: Vec<ComponentNodePayload>,
}

/// Payload of a `ready` message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadyPayload {
    pub react_version: String,
}

/// Payload of an `error` message reported by the probe itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
    pub code: String,
}

/// Union of messages the probe sends to the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Inbound {
    Render { payload: RenderEventPayload },
    Chain { payload: ChainHintPayload },
    Fps { payload: f64 },
    ComponentTree { payload: Vec<ComponentNodePayload> },
    Ready { payload: ReadyPayload },
    Error { payload: ErrorPayload },
    /// Catch-all for any `type` this host does not recognize (§6.1: "A
    /// peer receiving an unknown `type` MUST ignore the message").
    #[serde(other)]
    Unknown,
}

/// Scanner configuration as sent to the probe (mirrors
/// `reactcheck_core::Configuration`; kept separate here so this crate does
/// not depend on `reactcheck-core`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScannerConfigPayload {
    pub critical: u32,
    pub warning: u32,
    pub fps_threshold: f64,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub track_unnecessary: bool,
    pub chain_window_ms: u64,
}

/// Payload of a `highlight` message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HighlightPayload {
    pub component: String,
    pub enabled: bool,
}

/// Union of messages the host sends to the probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Outbound {
    Start,
    Stop,
    Reset,
    Config { payload: ScannerConfigPayload },
    Highlight { payload: HighlightPayload },
}
