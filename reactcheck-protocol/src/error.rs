//! Error taxonomy for the wire protocol layer.

/// Failures that can occur while decoding frames or performing the
/// handshake. These never propagate as panics; callers map them to the
/// close codes documented on [`crate::frame`] and [`crate::handshake`].
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// A frame header violated the RFC 6455 layout (bad reserved bits,
    /// unknown opcode, or an unmasked frame from the client).
    #[error("frame header is malformed")]
    MalformedHeader,

    /// The `Sec-WebSocket-Key` handshake header was missing or not valid
    /// base64.
    #[error("handshake request is malformed: {0}")]
    MalformedHandshake(String),
}
