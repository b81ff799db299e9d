//! # ReactCheck analysis engine
//!
//! Owns the in-memory data model (§3) and the three analysis engines that
//! turn a stream of [`model::RenderEvent`]s into a [`model::SessionReport`]:
//! the [`stats`] collector, the [`chain`] analyzer, and the [`suggester`]
//! engine, wired together by an [`bus::EventBus`]. This crate knows nothing
//! about sockets or threads — that lives in the `reactcheck` facade crate,
//! which is the only thing that owns a [`bus::EventBus`] alongside live I/O.

pub mod bus;
pub mod chain;
pub mod error;
pub mod model;
pub mod stats;
pub mod suggester;

pub use bus::ReentrancyGuard;
pub use error::CoreError;
pub use model::{
    ComponentStats, Configuration, FixKind, FixSuggestion, RenderChain, RenderEvent, RenderPhase,
    Severity, SessionDescriptor, SessionReport, Summary, REPORT_FORMAT_VERSION,
};

#[cfg(test)]
mod proptests;
