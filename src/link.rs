//! Segment transport.
//!
//! A *segment* is one line of `'0'`/`'1'` text holding one or more encoded
//! frames; on a byte stream it is terminated by `'\n'`.  [`Link`] is the
//! seam between the protocol state machines and the actual transport:
//!
//! - [`TcpLink`]: newline-delimited segments over a TCP stream.
//! - [`ChannelLink`]: an in-memory duplex pair for tests.
//! - [`crate::simulator::FaultyLink`]: wraps any link and injects faults.
//!
//! All protocol logic lives elsewhere; this module owns only segment I/O.

use std::io;
use std::net::SocketAddr;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

/// Largest segment accepted, excluding the terminator.
pub const MAX_SEGMENT_LEN: usize = 1 << 20;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("link I/O error: {0}")]
    Io(#[from] io::Error),
    /// The peer went away.
    #[error("link closed by peer")]
    Closed,
    #[error("segment exceeds {MAX_SEGMENT_LEN} bytes")]
    Oversized,
}

// ---------------------------------------------------------------------------
// Link trait
// ---------------------------------------------------------------------------

/// A bidirectional, ordered carrier of segments.
#[async_trait]
pub trait Link: Send {
    /// Send one segment.  `segment` must not contain a newline.
    async fn send_segment(&mut self, segment: &str) -> Result<(), LinkError>;

    /// Wait for the next segment, without its terminator.
    async fn recv_segment(&mut self) -> Result<String, LinkError>;
}

// ---------------------------------------------------------------------------
// TcpLink
// ---------------------------------------------------------------------------

/// Newline-delimited segments over TCP.
#[derive(Debug)]
pub struct TcpLink {
    peer: SocketAddr,
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl TcpLink {
    pub fn new(stream: TcpStream) -> Result<Self, LinkError> {
        let peer = stream.peer_addr()?;
        // Segments are written whole; no point in waiting to coalesce.
        stream.set_nodelay(true)?;
        let (read, writer) = stream.into_split();
        Ok(Self {
            peer,
            reader: BufReader::new(read),
            writer,
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

#[async_trait]
impl Link for TcpLink {
    async fn send_segment(&mut self, segment: &str) -> Result<(), LinkError> {
        if segment.len() > MAX_SEGMENT_LEN {
            return Err(LinkError::Oversized);
        }
        self.writer.write_all(segment.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn recv_segment(&mut self) -> Result<String, LinkError> {
        let mut line = String::new();
        // One byte of slack for the terminator, one more to detect overflow.
        let limit = (MAX_SEGMENT_LEN + 2) as u64;
        let n = (&mut self.reader).take(limit).read_line(&mut line).await?;
        if n == 0 {
            return Err(LinkError::Closed);
        }
        if !line.ends_with('\n') {
            return if n as u64 >= limit {
                Err(LinkError::Oversized)
            } else {
                // EOF in the middle of a segment.
                Err(LinkError::Closed)
            };
        }
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
        if line.len() > MAX_SEGMENT_LEN {
            return Err(LinkError::Oversized);
        }
        Ok(line)
    }
}

// ---------------------------------------------------------------------------
// ChannelLink
// ---------------------------------------------------------------------------

/// One end of an in-memory duplex link.
#[derive(Debug)]
pub struct ChannelLink {
    tx: mpsc::UnboundedSender<String>,
    rx: mpsc::UnboundedReceiver<String>,
}

impl ChannelLink {
    /// Two connected ends: whatever one sends, the other receives.
    pub fn pair() -> (Self, Self) {
        let (tx_a, rx_b) = mpsc::unbounded_channel();
        let (tx_b, rx_a) = mpsc::unbounded_channel();
        (
            Self { tx: tx_a, rx: rx_a },
            Self { tx: tx_b, rx: rx_b },
        )
    }
}

#[async_trait]
impl Link for ChannelLink {
    async fn send_segment(&mut self, segment: &str) -> Result<(), LinkError> {
        if segment.len() > MAX_SEGMENT_LEN {
            return Err(LinkError::Oversized);
        }
        self.tx
            .send(segment.to_owned())
            .map_err(|_| LinkError::Closed)
    }

    async fn recv_segment(&mut self) -> Result<String, LinkError> {
        self.rx.recv().await.ok_or(LinkError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn channel_pair_is_duplex() {
        let (mut a, mut b) = ChannelLink::pair();
        a.send_segment("0101").await.unwrap();
        b.send_segment("1010").await.unwrap();
        assert_eq!(b.recv_segment().await.unwrap(), "0101");
        assert_eq!(a.recv_segment().await.unwrap(), "1010");
    }

    #[tokio::test]
    async fn dropped_channel_end_reports_closed() {
        let (mut a, b) = ChannelLink::pair();
        drop(b);
        assert!(matches!(a.recv_segment().await, Err(LinkError::Closed)));
        assert!(matches!(a.send_segment("0").await, Err(LinkError::Closed)));
    }

    #[tokio::test]
    async fn tcp_link_frames_segments_by_newline() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut link = TcpLink::new(stream).unwrap();
            let first = link.recv_segment().await.unwrap();
            let second = link.recv_segment().await.unwrap();
            link.send_segment("111").await.unwrap();
            (first, second)
        });

        let mut client = TcpLink::new(TcpStream::connect(addr).await.unwrap()).unwrap();
        assert_eq!(client.peer_addr(), addr);
        client.send_segment("0110").await.unwrap();
        client.send_segment("").await.unwrap();
        assert_eq!(client.recv_segment().await.unwrap(), "111");

        let (first, second) = server.await.unwrap();
        assert_eq!(first, "0110");
        assert_eq!(second, "");
    }

    #[tokio::test]
    async fn tcp_link_reports_peer_shutdown() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            drop(stream);
        });

        let mut client = TcpLink::new(TcpStream::connect(addr).await.unwrap()).unwrap();
        server.await.unwrap();
        assert!(matches!(client.recv_segment().await, Err(LinkError::Closed)));
    }

    #[tokio::test]
    async fn oversized_segment_is_refused_before_sending() {
        let (mut a, _b) = ChannelLink::pair();
        let huge = "0".repeat(MAX_SEGMENT_LEN + 1);
        assert!(matches!(a.send_segment(&huge).await, Err(LinkError::Oversized)));
    }
}
