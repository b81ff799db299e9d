//! # ReactCheck Wire Protocol
//!
//! This crate owns everything that crosses the probe ↔ host duplex socket:
//!
//! - [`handshake`] — the RFC 6455 opening handshake (key hashing, request
//!   parsing, the 101 Switching Protocols response).
//! - [`frame`] — the framed transport itself: opcode/close-code vocabulary,
//!   a streaming decoder that reassembles fragmented messages and unmasks
//!   client payloads, and encoders for the host's outbound frames.
//! - [`message`] — the JSON message schema layered on top of text frames
//!   (§6.1): the [`message::Inbound`] union the probe sends and the
//!   [`message::Outbound`] union the host sends.
//!
//! None of these types know about sessions, statistics, or connections —
//! that state lives in `reactcheck-core` and the `reactcheck` facade crate.
//! This crate is pure codec and schema, which keeps it trivially testable
//! against hand-built byte/JSON fixtures without any socket at all.

pub mod error;
pub mod frame;
pub mod handshake;
pub mod message;

pub use error::ProtocolError;
