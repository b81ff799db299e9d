//! RFC 6455 frame codec.
//!
//! The probe is always the client (masked frames); the host is always the
//! server (unmasked frames). [`FrameDecoder`] consumes raw bytes read off
//! the socket and yields reassembled `(Opcode, Vec<u8>)` messages, or a
//! [`CloseCode`] the caller must use to close the connection. Encoding
//! helpers build the host's outbound frames.

use crate::error::ProtocolError;

/// Default bound on a single reassembled message, matching §4.1(e)'s
/// 16 MiB default.
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 16 * 1024 * 1024;

/// WebSocket opcodes this host understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Continuation,
    Text,
    Binary,
    Close,
    Ping,
    Pong,
}

impl Opcode {
    fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0x0 => Some(Self::Continuation),
            0x1 => Some(Self::Text),
            0x2 => Some(Self::Binary),
            0x8 => Some(Self::Close),
            0x9 => Some(Self::Ping),
            0xA => Some(Self::Pong),
            _ => None,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Continuation => 0x0,
            Self::Text => 0x1,
            Self::Binary => 0x2,
            Self::Close => 0x8,
            Self::Ping => 0x9,
            Self::Pong => 0xA,
        }
    }

    fn is_control(self) -> bool {
        matches!(self, Self::Close | Self::Ping | Self::Pong)
    }
}

/// Status codes this host sends when closing a connection (§4.1, §5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum CloseCode {
    Normal = 1000,
    GoingAway = 1001,
    ProtocolError = 1002,
    MessageTooBig = 1009,
}

/// A fully reassembled inbound message: the opcode of the first fragment
/// (or the only frame, if unfragmented) and the concatenated payload.
#[derive(Debug, Clone)]
pub struct DecodedMessage {
    pub opcode: Opcode,
    pub payload: Vec<u8>,
}

struct FrameHeader {
    fin: bool,
    opcode: Opcode,
    masked: bool,
    mask: [u8; 4],
    payload_len: u64,
    header_len: usize,
}

/// Attempts to parse one frame header from `buf`. Returns `Ok(None)` if
/// `buf` does not yet contain a complete header (caller should read more
/// bytes and retry); `Err` for a structurally invalid header, which the
/// caller must treat as a protocol violation (close code 1002).
fn parse_header(buf: &[u8]) -> Result<Option<FrameHeader>, ProtocolError> {
    if buf.len() < 2 {
        return Ok(None);
    }
    let b0 = buf[0];
    let b1 = buf[1];

    // RSV1-3 must be zero: this host negotiates no extensions.
    if b0 & 0x70 != 0 {
        return Err(ProtocolError::MalformedHeader);
    }
    let fin = b0 & 0x80 != 0;
    let opcode = Opcode::from_u8(b0 & 0x0F).ok_or(ProtocolError::MalformedHeader)?;
    if opcode.is_control() && !fin {
        // Control frames must not be fragmented.
        return Err(ProtocolError::MalformedHeader);
    }

    let masked = b1 & 0x80 != 0;
    if !masked {
        // Every client (probe) frame must be masked.
        return Err(ProtocolError::MalformedHeader);
    }

    let len_field = b1 & 0x7F;
    let (payload_len, mut offset): (u64, usize) = match len_field {
        0..=125 => (len_field as u64, 2),
        126 => {
            if buf.len() < 4 {
                return Ok(None);
            }
            (u16::from_be_bytes([buf[2], buf[3]]) as u64, 4)
        }
        127 => {
            if buf.len() < 10 {
                return Ok(None);
            }
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&buf[2..10]);
            (u64::from_be_bytes(bytes), 10)
        }
        _ => unreachable!("7-bit field"),
    };

    if buf.len() < offset + 4 {
        return Ok(None);
    }
    let mut mask = [0u8; 4];
    mask.copy_from_slice(&buf[offset..offset + 4]);
    offset += 4;

    if opcode.is_control() && payload_len > 125 {
        return Err(ProtocolError::MalformedHeader);
    }

    Ok(Some(FrameHeader {
        fin,
        opcode,
        masked,
        mask,
        payload_len,
        header_len: offset,
    }))
}

fn unmask(payload: &mut [u8], mask: [u8; 4]) {
    for (i, byte) in payload.iter_mut().enumerate() {
        *byte ^= mask[i % 4];
    }
}

struct Fragment {
    opcode: Opcode,
    payload: Vec<u8>,
}

/// Buffers bytes read from the socket and yields reassembled messages.
///
/// One decoder is owned per connection. It never blocks: [`Self::feed`]
/// appends bytes and [`Self::next_message`] pulls as many complete
/// messages as are currently buffered.
pub struct FrameDecoder {
    buf: Vec<u8>,
    max_message_bytes: usize,
    fragment: Option<Fragment>,
}

/// What the decoder did with the latest bytes fed to it.
pub enum DecodeEvent {
    /// A complete, reassembled message is ready.
    Message(DecodedMessage),
    /// The buffer has no complete frame yet; more bytes are needed.
    Incomplete,
    /// The frame (or the fragment accumulation) exceeded the bound; the
    /// caller must close the connection with this code.
    Overflow(CloseCode),
}

impl FrameDecoder {
    pub fn new(max_message_bytes: usize) -> Self {
        Self {
            buf: Vec::new(),
            max_message_bytes,
            fragment: None,
        }
    }

    /// Appends freshly read bytes to the internal buffer.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Attempts to decode the next message out of the buffered bytes.
    /// Call repeatedly after [`Self::feed`] until it returns
    /// [`DecodeEvent::Incomplete`].
    pub fn next_message(&mut self) -> Result<DecodeEvent, ProtocolError> {
        let Some(header) = parse_header(&self.buf)? else {
            return Ok(DecodeEvent::Incomplete);
        };

        let total_len = header.header_len + header.payload_len as usize;
        if header.payload_len as usize > self.max_message_bytes {
            return Ok(DecodeEvent::Overflow(CloseCode::MessageTooBig));
        }
        if self.buf.len() < total_len {
            return Ok(DecodeEvent::Incomplete);
        }

        let mut payload = self.buf[header.header_len..total_len].to_vec();
        if header.masked {
            unmask(&mut payload, header.mask);
        }
        self.buf.drain(0..total_len);

        if header.opcode.is_control() {
            return Ok(DecodeEvent::Message(DecodedMessage {
                opcode: header.opcode,
                payload,
            }));
        }

        match (header.opcode, header.fin) {
            (Opcode::Continuation, _) => {
                let Some(fragment) = self.fragment.as_mut() else {
                    return Err(ProtocolError::MalformedHeader);
                };
                if fragment.payload.len() + payload.len() > self.max_message_bytes {
                    self.fragment = None;
                    return Ok(DecodeEvent::Overflow(CloseCode::MessageTooBig));
                }
                fragment.payload.extend_from_slice(&payload);
                if header.fin {
                    let fragment = self.fragment.take().expect("checked above");
                    Ok(DecodeEvent::Message(DecodedMessage {
                        opcode: fragment.opcode,
                        payload: fragment.payload,
                    }))
                } else {
                    Ok(DecodeEvent::Incomplete)
                }
            }
            (opcode, true) => Ok(DecodeEvent::Message(DecodedMessage { opcode, payload })),
            (opcode, false) => {
                self.fragment = Some(Fragment { opcode, payload });
                Ok(DecodeEvent::Incomplete)
            }
        }
    }
}

fn encode_server_frame(opcode: Opcode, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 10);
    out.push(0x80 | opcode.as_u8());
    let len = payload.len();
    if len <= 125 {
        out.push(len as u8);
    } else if len <= u16::MAX as usize {
        out.push(126);
        out.extend_from_slice(&(len as u16).to_be_bytes());
    } else {
        out.push(127);
        out.extend_from_slice(&(len as u64).to_be_bytes());
    }
    out.extend_from_slice(payload);
    out
}

/// Encodes a text frame (host → probe control/config messages).
pub fn encode_text(payload: &str) -> Vec<u8> {
    encode_server_frame(Opcode::Text, payload.as_bytes())
}

/// Encodes a pong frame echoing the ping's payload (§4.1(c)).
pub fn encode_pong(payload: &[u8]) -> Vec<u8> {
    encode_server_frame(Opcode::Pong, payload)
}

/// Encodes a ping frame (used for the idle-read keepalive, §5).
pub fn encode_ping(payload: &[u8]) -> Vec<u8> {
    encode_server_frame(Opcode::Ping, payload)
}

/// Encodes a close frame carrying the given status code (§4.1(d), §4.5).
pub fn encode_close(code: CloseCode) -> Vec<u8> {
    encode_server_frame(Opcode::Close, &(code as u16).to_be_bytes())
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// The client-side masking XOR is its own inverse, which is what
        /// lets `next_message` unmask in place with no separate "remask"
        /// step anywhere in the codec.
        #[test]
        fn masking_is_its_own_inverse(
            payload in proptest::collection::vec(any::<u8>(), 0..256),
            mask in proptest::array::uniform4(any::<u8>()),
        ) {
            let mut data = payload.clone();
            unmask(&mut data, mask);
            unmask(&mut data, mask);
            prop_assert_eq!(data, payload);
        }

        /// Any short masked single-frame text message decodes back to
        /// exactly the bytes the sender started with.
        #[test]
        fn arbitrary_masked_frame_round_trips(payload in proptest::collection::vec(any::<u8>(), 0..120)) {
            let mask = [0x5A, 0x3C, 0x7E, 0x01];
            let mut frame = vec![0x81u8, 0x80 | payload.len() as u8];
            frame.extend_from_slice(&mask);
            let mut masked_payload = payload.clone();
            unmask(&mut masked_payload, mask);
            frame.extend_from_slice(&masked_payload);

            let mut decoder = FrameDecoder::new(DEFAULT_MAX_MESSAGE_BYTES);
            decoder.feed(&frame);
            match decoder.next_message().unwrap() {
                DecodeEvent::Message(msg) => prop_assert_eq!(msg.payload, payload),
                _ => prop_assert!(false, "expected a decoded message"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn masked_frame(fin: bool, opcode: Opcode, payload: &[u8], mask: [u8; 4]) -> Vec<u8> {
        let mut out = Vec::new();
        let first_byte = if fin { 0x80 } else { 0x00 } | opcode.as_u8();
        out.push(first_byte);
        let len = payload.len();
        assert!(len <= 125, "test helper only supports short frames");
        out.push(0x80 | len as u8);
        out.extend_from_slice(&mask);
        let mut masked_payload = payload.to_vec();
        unmask(&mut masked_payload, mask);
        out.extend_from_slice(&masked_payload);
        out
    }

    #[test]
    fn decodes_single_text_frame() {
        let mut decoder = FrameDecoder::new(DEFAULT_MAX_MESSAGE_BYTES);
        let frame = masked_frame(true, Opcode::Text, b"hello", [1, 2, 3, 4]);
        decoder.feed(&frame);
        match decoder.next_message().unwrap() {
            DecodeEvent::Message(msg) => {
                assert!(matches!(msg.opcode, Opcode::Text));
                assert_eq!(msg.payload, b"hello");
            }
            _ => panic!("expected a message"),
        }
    }

    #[test]
    fn reassembles_fragmented_message() {
        let mut decoder = FrameDecoder::new(DEFAULT_MAX_MESSAGE_BYTES);
        decoder.feed(&masked_frame(false, Opcode::Text, b"hel", [9, 9, 9, 9]));
        assert!(matches!(
            decoder.next_message().unwrap(),
            DecodeEvent::Incomplete
        ));
        decoder.feed(&masked_frame(true, Opcode::Continuation, b"lo", [1, 1, 1, 1]));
        match decoder.next_message().unwrap() {
            DecodeEvent::Message(msg) => assert_eq!(msg.payload, b"hello"),
            _ => panic!("expected reassembled message"),
        }
    }

    #[test]
    fn rejects_unmasked_client_frame() {
        let mut decoder = FrameDecoder::new(DEFAULT_MAX_MESSAGE_BYTES);
        // FIN + text opcode, mask bit unset, length 0.
        decoder.feed(&[0x81, 0x00]);
        assert!(decoder.next_message().is_err());
    }

    #[test]
    fn oversize_declared_length_overflows() {
        let mut decoder = FrameDecoder::new(16);
        // Declare a 64-bit length of 1000 bytes, far over the 16-byte bound.
        let mut frame = vec![0x82, 0xFF];
        frame.extend_from_slice(&1000u64.to_be_bytes());
        frame.extend_from_slice(&[0, 0, 0, 0]); // mask
        decoder.feed(&frame);
        match decoder.next_message().unwrap() {
            DecodeEvent::Overflow(CloseCode::MessageTooBig) => {}
            _ => panic!("expected overflow"),
        }
    }

    #[test]
    fn ping_echoes_as_pong() {
        let echoed = encode_pong(b"abc");
        // Server frames are unmasked: opcode pong, length 3, raw payload.
        assert_eq!(echoed, vec![0x8A, 0x03, b'a', b'b', b'c']);
    }

    #[test]
    fn control_frame_interleaved_with_fragmented_message() {
        let mut decoder = FrameDecoder::new(DEFAULT_MAX_MESSAGE_BYTES);
        decoder.feed(&masked_frame(false, Opcode::Text, b"par", [2, 2, 2, 2]));
        assert!(matches!(
            decoder.next_message().unwrap(),
            DecodeEvent::Incomplete
        ));
        decoder.feed(&masked_frame(true, Opcode::Ping, b"hi", [3, 3, 3, 3]));
        match decoder.next_message().unwrap() {
            DecodeEvent::Message(msg) => assert!(matches!(msg.opcode, Opcode::Ping)),
            _ => panic!("expected ping to be delivered without disturbing the pending fragment"),
        }
        decoder.feed(&masked_frame(true, Opcode::Continuation, b"t", [4, 4, 4, 4]));
        match decoder.next_message().unwrap() {
            DecodeEvent::Message(msg) => assert_eq!(msg.payload, b"part"),
            _ => panic!("expected the fragmented message to complete"),
        }
    }
}
