//! RFC 6455 opening handshake.
//!
//! The probe connects like a browser WebSocket client: an HTTP/1.1
//! `Upgrade: websocket` request carrying a `Sec-WebSocket-Key` header. The
//! host answers with the accept key derived from that header, switching the
//! connection to the framed protocol in [`crate::frame`].

use base64::{Engine as _, engine::general_purpose::STANDARD};
use sha1::{Digest, Sha1};

use crate::error::ProtocolError;

/// Fixed GUID appended to the client key before hashing, per RFC 6455 §1.3.
const WEBSOCKET_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Computes the `Sec-WebSocket-Accept` value for a given client-supplied
/// `Sec-WebSocket-Key`.
///
/// `accept = base64(sha1(key + GUID))`. This is pure and side-effect free so
/// it can be exercised directly in tests without a socket.
pub fn accept_key(client_key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(client_key.as_bytes());
    hasher.update(WEBSOCKET_GUID.as_bytes());
    STANDARD.encode(hasher.finalize())
}

/// Verifies that a client-presented accept value matches the one this host
/// would compute for `client_key`. Exposed for testability (§8: "any input
/// where the upgrade hash does not equal ... is rejected").
pub fn verify_accept(client_key: &str, candidate_accept: &str) -> bool {
    accept_key(client_key) == candidate_accept
}

/// Minimal view of the parts of the HTTP upgrade request this host cares
/// about. Header parsing beyond extracting the key is out of scope: the
/// host does not negotiate subprotocols or extensions.
pub struct HandshakeRequest {
    pub key: String,
}

impl HandshakeRequest {
    /// Extracts the `Sec-WebSocket-Key` header from a raw HTTP request
    /// (CRLF-separated header lines, case-insensitive header names).
    pub fn parse(raw_request: &str) -> Result<Self, ProtocolError> {
        for line in raw_request.split("\r\n") {
            if let Some((name, value)) = line.split_once(':')
                && name.trim().eq_ignore_ascii_case("sec-websocket-key")
            {
                let key = value.trim().to_string();
                if key.is_empty() {
                    return Err(ProtocolError::MalformedHandshake(
                        "empty Sec-WebSocket-Key".to_string(),
                    ));
                }
                return Ok(Self { key });
            }
        }
        Err(ProtocolError::MalformedHandshake(
            "missing Sec-WebSocket-Key header".to_string(),
        ))
    }
}

/// Renders the HTTP/1.1 101 Switching Protocols response for the given
/// client key.
pub fn build_switching_protocols_response(client_key: &str) -> String {
    format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {}\r\n\r\n",
        accept_key(client_key)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The example from RFC 6455 §1.3 itself.
    #[test]
    fn matches_rfc6455_example() {
        assert_eq!(
            accept_key("dGhlIHNhbXBsZSBub25jZQ=="),
            "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
        );
    }

    #[test]
    fn verify_rejects_mismatched_hash() {
        assert!(!verify_accept("dGhlIHNhbXBsZSBub25jZQ==", "not-the-right-hash"));
        assert!(verify_accept(
            "dGhlIHNhbXBsZSBub25jZQ==",
            "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
        ));
    }

    #[test]
    fn parse_extracts_key_case_insensitively() {
        let req = "GET /probe HTTP/1.1\r\nHost: localhost\r\nSEC-WEBSOCKET-KEY: abc123==\r\nUpgrade: websocket\r\n\r\n";
        let parsed = HandshakeRequest::parse(req).unwrap();
        assert_eq!(parsed.key, "abc123==");
    }

    #[test]
    fn parse_rejects_missing_key() {
        let req = "GET /probe HTTP/1.1\r\nHost: localhost\r\n\r\n";
        assert!(HandshakeRequest::parse(req).is_err());
    }
}
