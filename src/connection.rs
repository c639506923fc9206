//! Session errors and connection establishment over TCP.
//!
//! - [`connect`]: active open with the same back-off budget as the CONNECT
//!   handshake, returning a [`TcpLink`] ready for a [`crate::sender::Sender`].
//! - [`serve`]: accept loop; every peer gets its own
//!   [`crate::receiver::Receiver`] in its own task, and reports back through
//!   a channel when its session ends.  Sessions share nothing.

use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::mpsc;

use crate::config::ArqConfig;
use crate::frame::{FrameError, FrameKind};
use crate::link::{LinkError, TcpLink};
use crate::receiver::{Receiver, ReceiverStats};
use crate::timer::{Backoff, TimerConfig};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that end a session.
#[derive(Debug, Error)]
pub enum ConnError {
    #[error(transparent)]
    Link(#[from] LinkError),
    #[error("handshake frame unreadable: {0}")]
    Frame(#[from] FrameError),
    #[error("no answer after {0} connection attempts")]
    HandshakeFailed(u32),
    #[error("peer rejected the connection")]
    HandshakeRejected,
    #[error("expected CONNECT, got {0}")]
    UnexpectedHandshake(FrameKind),
    #[error("connection lost: {0} retransmissions without progress")]
    ConnectionLost(u32),
}

// ---------------------------------------------------------------------------
// Active open
// ---------------------------------------------------------------------------

/// Open a TCP connection to `addr`, retrying with exponential back-off.
pub async fn connect<A>(addr: A, timers: &TimerConfig) -> Result<TcpLink, ConnError>
where
    A: ToSocketAddrs + Clone,
{
    let attempts = timers.connect_attempts;
    let mut backoff = Backoff::for_connect(timers);

    for attempt in 1..=attempts {
        match TcpStream::connect(addr.clone()).await {
            Ok(stream) => {
                let link = TcpLink::new(stream)?;
                log::info!("[connect] connected to {}", link.peer_addr());
                return Ok(link);
            }
            Err(e) => {
                log::warn!("[connect] attempt {attempt}/{attempts} failed: {e}");
                if attempt < attempts {
                    tokio::time::sleep(backoff.current()).await;
                    backoff.back_off();
                }
            }
        }
    }
    Err(ConnError::HandshakeFailed(attempts))
}

// ---------------------------------------------------------------------------
// Passive open
// ---------------------------------------------------------------------------

/// How one receiving session ended.
#[derive(Debug)]
pub struct SessionReport {
    pub peer: SocketAddr,
    /// Records delivered in order, including those before a failure.
    pub records: Vec<Vec<u8>>,
    pub stats: ReceiverStats,
    pub outcome: Result<(), ConnError>,
}

/// Accept peers on `listener` until `reports` is closed.
///
/// Only a failing `accept` ends the loop with an error; session failures are
/// delivered in the [`SessionReport`].
pub async fn serve(
    listener: TcpListener,
    config: ArqConfig,
    reports: mpsc::UnboundedSender<SessionReport>,
) -> Result<(), ConnError> {
    log::info!(
        "[serve] listening on {}; window={}",
        listener.local_addr().map_err(LinkError::from)?,
        config.window_size()
    );

    loop {
        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => accepted.map_err(LinkError::from)?,
            _ = reports.closed() => return Ok(()),
        };
        log::info!("[serve] accepted {peer}");

        let reports = reports.clone();
        tokio::spawn(async move {
            let report = run_session(stream, peer, config).await;
            if reports.send(report).is_err() {
                log::debug!("[serve] report for {peer} discarded");
            }
        });
    }
}

async fn run_session(stream: TcpStream, peer: SocketAddr, config: ArqConfig) -> SessionReport {
    let link = match TcpLink::new(stream) {
        Ok(link) => link,
        Err(e) => {
            return SessionReport {
                peer,
                records: Vec::new(),
                stats: ReceiverStats::default(),
                outcome: Err(e.into()),
            }
        }
    };

    let mut receiver = Receiver::new(link, &config);
    let outcome = receiver.run().await.map(|_| ());
    let records = receiver.take_delivered();
    log::info!("[serve] session with {peer} ended; {} records", records.len());
    SessionReport {
        peer,
        records,
        stats: receiver.stats().clone(),
        outcome,
    }
}
