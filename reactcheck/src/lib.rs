//! # ReactCheck host
//!
//! Wires the duplex-socket [`transport`], the [`router`], and the
//! [`orchestrator`]'s [`orchestrator::Session`] into a running host process.
//! `reactcheck-protocol` and `reactcheck-core` do not know about each other
//! or about sockets; this crate is where the three meet.

pub mod error;
pub mod orchestrator;
pub mod router;
pub mod transport;

pub use error::{ExitCode, ReactCheckError};
pub use orchestrator::{Session, SessionState};

use std::io::Write;
use std::net::TcpListener;
use std::path::Path;

use reactcheck_protocol::frame::DEFAULT_MAX_MESSAGE_BYTES;
use reactcheck_protocol::message::Inbound;

use transport::{Connection, TransportEvent};

/// Inbound events queued but not yet applied to the session are bounded by
/// this count; past it the host coalesces by dropping the oldest
/// non-critical entry rather than growing unboundedly (§5 "Back-pressure").
const INBOUND_QUEUE_BOUND: usize = 10_000;

/// Serializes `report` as pretty JSON to `path`, the report-writing half of
/// the CLI's `--output` flag (§6.4).
pub fn write_report_to_path(
    report: &reactcheck_core::SessionReport,
    path: impl AsRef<Path>,
) -> Result<(), ReactCheckError> {
    let mut file = std::fs::File::create(path)?;
    let json = serde_json::to_vec_pretty(report)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    file.write_all(&json)?;
    Ok(())
}

/// One message queued for the orchestrator, tagged with whether dropping it
/// under back-pressure would discard information the coalescing policy
/// must preserve (§5: root-of-chain and `necessary` renders are never the
/// ones dropped).
struct Pending {
    message: Inbound,
    protected: bool,
}

fn is_protected(message: &Inbound) -> bool {
    match message {
        Inbound::Render { payload } => payload.necessary,
        Inbound::Ready { .. } | Inbound::Error { .. } | Inbound::ComponentTree { .. } => true,
        Inbound::Chain { .. } | Inbound::Fps { .. } | Inbound::Unknown => false,
    }
}

fn apply(session: &mut Session, message: Inbound) {
    match message {
        Inbound::Render { payload } => session.ingest_render(payload),
        Inbound::Chain { .. } => session.ingest_chain_hint(),
        Inbound::Fps { payload } => session.ingest_fps(payload),
        Inbound::ComponentTree { payload } => session.ingest_component_tree(&payload),
        Inbound::Ready { payload } => session.ingest_ready(payload.react_version),
        Inbound::Error { payload } => session.ingest_probe_error(payload.message, payload.code),
        Inbound::Unknown => {}
    }
}

/// Accepts one probe connection on `listener`, drains its decoded messages
/// into `session` until the connection closes, and returns the assembled
/// [`reactcheck_core::SessionReport`].
///
/// This is the single-owner-thread driving loop (§4.1.1, §5): the reader
/// thread spawned by [`transport::Connection::accept`] only ever forwards
/// raw text over its channel, and this function is the only place that
/// turns those messages into calls on `session`.
pub fn run_session(
    listener: &TcpListener,
    session: &mut Session,
) -> Result<reactcheck_core::SessionReport, ReactCheckError> {
    let connection = Connection::accept(listener, DEFAULT_MAX_MESSAGE_BYTES)
        .map_err(|e| ReactCheckError::ConnectionFailed(e.to_string()))?;

    session.start();

    let mut queue: std::collections::VecDeque<Pending> = std::collections::VecDeque::new();

    for event in connection.events.iter() {
        match event {
            TransportEvent::Text(text) => {
                if let Some(message) = router::decode(&text) {
                    enqueue(&mut queue, message, session);
                }
            }
            TransportEvent::Closed(_) | TransportEvent::PeerReset => break,
        }

        while let Some(pending) = queue.pop_front() {
            apply(session, pending.message);
        }
    }

    while let Some(pending) = queue.pop_front() {
        apply(session, pending.message);
    }

    Ok(session.stop())
}

/// Pushes `message` onto `queue`, coalescing by dropping the oldest
/// unprotected entry when the bound is exceeded (§5). Drops are recorded on
/// `session` so the final summary's `dropped_events` reflects them.
fn enqueue(queue: &mut std::collections::VecDeque<Pending>, message: Inbound, session: &mut Session) {
    let protected = is_protected(&message);
    if queue.len() >= INBOUND_QUEUE_BOUND {
        let drop_index = queue.iter().position(|p| !p.protected);
        match drop_index {
            Some(index) => {
                queue.remove(index);
                session.record_dropped(1);
            }
            None => {
                // Every queued message is protected; the incoming one is
                // sacrificed instead rather than growing past the bound.
                session.record_dropped(1);
                return;
            }
        }
    }
    queue.push_back(Pending { message, protected });
}
