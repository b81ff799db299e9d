//! Duplex-socket transport server (§4.1, §4.1.1).
//!
//! Binds a single [`TcpListener`] and accepts exactly one probe connection
//! per session. Once accepted, a dedicated reader thread owns the socket
//! and runs the codec's blocking read loop, forwarding decoded messages to
//! the router over an [`mpsc`] channel — the worker-thread-plus-channel
//! shape `tessera-ui`'s profiler uses for its own background writer
//! (`profiler.rs::worker_loop`). Outbound frames are written synchronously
//! through a [`parking_lot::Mutex`]-guarded clone of the stream, so the
//! reader thread can answer pings/pongs without waiting on the owner
//! thread.

use std::io::{ErrorKind, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use reactcheck_protocol::frame::{
    encode_close, encode_pong, CloseCode, DecodeEvent, FrameDecoder, Opcode,
};
use reactcheck_protocol::handshake::{build_switching_protocols_response, HandshakeRequest};
use reactcheck_protocol::ProtocolError;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
const IDLE_PING_TIMEOUT: Duration = Duration::from_secs(60);
const PONG_TIMEOUT: Duration = Duration::from_secs(15);

/// One decoded occurrence the reader thread hands to the router.
#[derive(Debug)]
pub enum TransportEvent {
    Text(String),
    /// The probe (or the host itself, via a malformed-header/overflow
    /// condition) closed the connection with this code.
    Closed(CloseCode),
    /// The socket was reset or hit EOF without a close handshake.
    PeerReset,
}

/// A handle to the single accepted probe connection for a session.
pub struct Connection {
    writer: Arc<Mutex<TcpStream>>,
    pub events: mpsc::Receiver<TransportEvent>,
    stopped: Arc<AtomicBool>,
}

impl Connection {
    /// Performs the handshake on `listener`'s next incoming connection and
    /// spawns the reader thread. Blocks until a connection arrives.
    pub fn accept(
        listener: &TcpListener,
        max_message_bytes: usize,
    ) -> Result<Connection, ProtocolError> {
        let (stream, addr) = listener
            .accept()
            .map_err(|e| ProtocolError::MalformedHandshake(e.to_string()))?;
        tracing::info!(%addr, "probe connection accepted");

        stream
            .set_read_timeout(Some(HANDSHAKE_TIMEOUT))
            .map_err(|e| ProtocolError::MalformedHandshake(e.to_string()))?;

        let mut reader = stream
            .try_clone()
            .map_err(|e| ProtocolError::MalformedHandshake(e.to_string()))?;
        let raw_request = read_handshake_request(&mut reader)?;
        let request = HandshakeRequest::parse(&raw_request)?;
        let response = build_switching_protocols_response(&request.key);

        let writer = Arc::new(Mutex::new(stream));
        writer
            .lock()
            .write_all(response.as_bytes())
            .map_err(|e| ProtocolError::MalformedHandshake(e.to_string()))?;

        reader
            .set_read_timeout(Some(IDLE_PING_TIMEOUT))
            .map_err(|e| ProtocolError::MalformedHandshake(e.to_string()))?;

        let (sender, events) = mpsc::channel();
        let stopped = Arc::new(AtomicBool::new(false));
        let reader_writer = writer.clone();
        let reader_stopped = stopped.clone();
        std::thread::Builder::new()
            .name("reactcheck-reader".to_string())
            .spawn(move || reader_loop(reader, reader_writer, max_message_bytes, sender, reader_stopped))
            .map_err(|e| ProtocolError::MalformedHandshake(e.to_string()))?;

        Ok(Connection {
            writer,
            events,
            stopped,
        })
    }

    /// Writes a pre-encoded server frame (text, ping, config push, ...) to
    /// the probe.
    pub fn send(&self, frame: &[u8]) -> std::io::Result<()> {
        self.writer.lock().write_all(frame)
    }

    /// Sends a close frame and marks the connection stopped so the reader
    /// thread exits at its next read timeout or EOF.
    pub fn close(&self, code: CloseCode) {
        let frame = encode_close(code);
        let _ = self.writer.lock().write_all(&frame);
        self.stopped.store(true, Ordering::SeqCst);
    }
}

fn read_handshake_request(stream: &mut TcpStream) -> Result<String, ProtocolError> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream
            .read(&mut chunk)
            .map_err(|e| ProtocolError::MalformedHandshake(e.to_string()))?;
        if n == 0 {
            return Err(ProtocolError::MalformedHandshake(
                "connection closed during handshake".to_string(),
            ));
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
        if buf.len() > 64 * 1024 {
            return Err(ProtocolError::MalformedHandshake(
                "handshake request too large".to_string(),
            ));
        }
    }
    String::from_utf8(buf).map_err(|e| ProtocolError::MalformedHandshake(e.to_string()))
}

fn reader_loop(
    mut stream: TcpStream,
    writer: Arc<Mutex<TcpStream>>,
    max_message_bytes: usize,
    sender: mpsc::Sender<TransportEvent>,
    stopped: Arc<AtomicBool>,
) {
    let mut decoder = FrameDecoder::new(max_message_bytes);
    let mut awaiting_pong = false;
    let mut chunk = [0u8; 4096];

    loop {
        if stopped.load(Ordering::SeqCst) {
            return;
        }

        match stream.read(&mut chunk) {
            Ok(0) => {
                let _ = sender.send(TransportEvent::PeerReset);
                return;
            }
            Ok(n) => {
                decoder.feed(&chunk[..n]);
                awaiting_pong = false;
                let _ = stream.set_read_timeout(Some(IDLE_PING_TIMEOUT));
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => {
                if awaiting_pong {
                    tracing::warn!("no pong within timeout, closing connection");
                    let frame = encode_close(CloseCode::GoingAway);
                    let _ = writer.lock().write_all(&frame);
                    let _ = sender.send(TransportEvent::Closed(CloseCode::GoingAway));
                    return;
                }
                tracing::debug!("idle timeout reached, sending ping");
                let frame = reactcheck_protocol::frame::encode_ping(&[]);
                if writer.lock().write_all(&frame).is_err() {
                    let _ = sender.send(TransportEvent::PeerReset);
                    return;
                }
                awaiting_pong = true;
                let _ = stream.set_read_timeout(Some(PONG_TIMEOUT));
                continue;
            }
            Err(_) => {
                let _ = sender.send(TransportEvent::PeerReset);
                return;
            }
        }

        loop {
            match decoder.next_message() {
                Ok(DecodeEvent::Incomplete) => break,
                Ok(DecodeEvent::Message(message)) => match message.opcode {
                    Opcode::Text => match String::from_utf8(message.payload) {
                        Ok(text) => {
                            if sender.send(TransportEvent::Text(text)).is_err() {
                                return;
                            }
                        }
                        Err(_) => {
                            tracing::warn!("discarding non-UTF-8 text frame");
                        }
                    },
                    Opcode::Binary => {
                        tracing::debug!("dropping reserved binary frame");
                    }
                    Opcode::Ping => {
                        let frame = encode_pong(&message.payload);
                        if writer.lock().write_all(&frame).is_err() {
                            let _ = sender.send(TransportEvent::PeerReset);
                            return;
                        }
                    }
                    Opcode::Pong => {
                        awaiting_pong = false;
                        let _ = stream.set_read_timeout(Some(IDLE_PING_TIMEOUT));
                    }
                    Opcode::Close => {
                        let frame = encode_close(CloseCode::Normal);
                        let _ = writer.lock().write_all(&frame);
                        let _ = sender.send(TransportEvent::Closed(CloseCode::Normal));
                        return;
                    }
                    Opcode::Continuation => {}
                },
                Ok(DecodeEvent::Overflow(code)) => {
                    let frame = encode_close(code);
                    let _ = writer.lock().write_all(&frame);
                    let _ = sender.send(TransportEvent::Closed(code));
                    return;
                }
                Err(ProtocolError::MalformedHeader) => {
                    tracing::warn!("malformed frame header, closing with 1002");
                    let frame = encode_close(CloseCode::ProtocolError);
                    let _ = writer.lock().write_all(&frame);
                    let _ = sender.send(TransportEvent::Closed(CloseCode::ProtocolError));
                    return;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "frame decode error, closing with 1002");
                    let frame = encode_close(CloseCode::ProtocolError);
                    let _ = writer.lock().write_all(&frame);
                    let _ = sender.send(TransportEvent::Closed(CloseCode::ProtocolError));
                    return;
                }
            }
        }
    }
}
