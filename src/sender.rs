//! Sending side of a session.
//!
//! [`Sender`] drives one [`Link`] through
//! `IDLE → CONNECTING → TRANSMITTING → DRAINING → CLOSED`:
//!
//! 1. **Handshake**: write a CONNECT and wait for any ACK, doubling the wait
//!    after every silent attempt.  A REJ ends the session.
//! 2. **Transfer**: fill the window with I-frames (written together as one
//!    segment), then wait for the peer's response segment.  The highest
//!    ACK in it slides the window; the lowest in-window REJ, or a timeout,
//!    resends everything from that frame on.
//! 3. **Finish**: once every record is acknowledged, write a single FIN.
//!
//! All window bookkeeping lives in [`SenderWindow`]; this module owns the
//! waiting and the I/O.

use tokio::time::{timeout, timeout_at, Instant};

use crate::config::ArqConfig;
use crate::connection::ConnError;
use crate::frame::{Frame, FrameError, FrameFormat, FrameKind};
use crate::gbn_sender::SenderWindow;
use crate::link::Link;
use crate::state::SenderPhase;
use crate::timer::{Backoff, TimerConfig};

/// Counters for one sending session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SenderStats {
    /// New I-frames written (retransmissions excluded).
    pub frames_sent: u64,
    /// I-frames written again.
    pub retransmissions: u64,
    /// Ack waits that expired.
    pub timeouts: u64,
    /// In-window REJ frames acted upon.
    pub rejects_received: u64,
}

/// How an ack wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wait {
    /// `base` moved and nothing was rejected.
    Advanced,
    /// Resend from `index`; `advanced` tells whether `base` also moved.
    Rejected { index: u64, advanced: bool },
    TimedOut,
}

// ---------------------------------------------------------------------------
// Sender
// ---------------------------------------------------------------------------

/// The transmitting end of a session over `L`.
pub struct Sender<L: Link> {
    link: L,
    format: FrameFormat,
    timers: TimerConfig,
    window: SenderWindow,
    phase: SenderPhase,
    stats: SenderStats,
    /// Consecutive ack waits that ended without progress.
    stalls: u32,
}

impl<L: Link> Sender<L> {
    pub fn new(link: L, config: &ArqConfig) -> Self {
        Self {
            link,
            format: FrameFormat::new(config.framing),
            timers: config.timers,
            window: SenderWindow::new(config.window_size()),
            phase: SenderPhase::Idle,
            stats: SenderStats::default(),
            stalls: 0,
        }
    }

    pub fn phase(&self) -> SenderPhase {
        self.phase
    }

    pub fn window(&self) -> &SenderWindow {
        &self.window
    }

    pub fn stats(&self) -> &SenderStats {
        &self.stats
    }

    /// Handshake, transfer every record, then FIN.
    ///
    /// Any failure leaves the sender in [`SenderPhase::Closed`].
    pub async fn run<I>(&mut self, records: I) -> Result<SenderStats, ConnError>
    where
        I: IntoIterator<Item = Vec<u8>>,
    {
        if let Err(e) = self.session(records).await {
            log::warn!("[sender] session failed: {e}");
            self.phase = SenderPhase::Closed;
            return Err(e);
        }
        Ok(self.stats.clone())
    }

    async fn session<I>(&mut self, records: I) -> Result<(), ConnError>
    where
        I: IntoIterator<Item = Vec<u8>>,
    {
        self.establish().await?;
        self.transmit(records).await?;
        self.finish().await
    }

    // -----------------------------------------------------------------------
    // Handshake
    // -----------------------------------------------------------------------

    /// Send CONNECT until an ACK comes back or the attempt budget runs out.
    pub async fn establish(&mut self) -> Result<(), ConnError> {
        self.phase = SenderPhase::Connecting;
        let connect = self.format.encode(&Frame::connect());
        let attempts = self.timers.connect_attempts;
        let mut backoff = Backoff::for_connect(&self.timers);

        for attempt in 1..=attempts {
            log::debug!("[sender] → CONNECT (attempt {attempt}/{attempts})");
            self.link.send_segment(&connect).await?;

            match timeout(backoff.current(), self.await_handshake_reply()).await {
                Ok(Ok(())) => {
                    log::info!("[sender] connected; window={}", self.window.size());
                    self.phase = SenderPhase::Transmitting;
                    return Ok(());
                }
                Ok(Err(e)) => {
                    self.phase = SenderPhase::Closed;
                    return Err(e);
                }
                Err(_elapsed) => {
                    log::warn!(
                        "[sender] no answer to CONNECT within {:?}",
                        backoff.current()
                    );
                    backoff.back_off();
                }
            }
        }

        self.phase = SenderPhase::Closed;
        Err(ConnError::HandshakeFailed(attempts))
    }

    /// Read segments until one carries an ACK (done) or a REJ (refused).
    /// An ACK anywhere in the segment wins over a REJ.
    async fn await_handshake_reply(&mut self) -> Result<(), ConnError> {
        loop {
            let segment = self.link.recv_segment().await?;
            let mut rejected = false;
            for frame in self.format.frames(&segment) {
                match frame {
                    Ok(Frame { kind: FrameKind::Ack, .. }) => {
                        log::debug!("[sender] ← ACK of CONNECT");
                        return Ok(());
                    }
                    Ok(Frame { kind: FrameKind::Reject, .. }) => rejected = true,
                    Ok(other) => log::debug!("[sender] ignoring {other} during handshake"),
                    Err(e) => log::debug!("[sender] dropping reply: {e}"),
                }
            }
            if rejected {
                log::warn!("[sender] ← REJ of CONNECT");
                return Err(ConnError::HandshakeRejected);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Transfer
    // -----------------------------------------------------------------------

    /// Go-Back-N transfer of `records`, one I-frame each.
    ///
    /// Returns once every record has been acknowledged.
    pub async fn transmit<I>(&mut self, records: I) -> Result<(), ConnError>
    where
        I: IntoIterator<Item = Vec<u8>>,
    {
        let mut records = records.into_iter().peekable();
        self.phase = SenderPhase::Transmitting;

        loop {
            let mut segment = String::new();
            let mut fresh = 0u64;
            while self.window.can_send() {
                let Some(record) = records.next() else { break };
                let frame = self.window.build_information(record);
                let wire = self.format.encode(&frame);
                log::debug!(
                    "[sender] → DATA seq={} (#{}) len={}",
                    frame.seq,
                    self.window.next,
                    frame.payload.len()
                );
                segment.push_str(&wire);
                self.window.record_sent(wire);
                fresh += 1;
            }
            if fresh > 0 {
                self.link.send_segment(&segment).await?;
                self.stats.frames_sent += fresh;
            }

            if records.peek().is_none() {
                self.phase = SenderPhase::Draining;
            }
            if !self.window.has_unacked() {
                return Ok(());
            }

            match self.await_acks().await? {
                Wait::Advanced => self.stalls = 0,
                Wait::Rejected { index, advanced } => {
                    self.stats.rejects_received += 1;
                    if advanced {
                        self.stalls = 0;
                    } else {
                        self.stall()?;
                    }
                    self.retransmit_from(index).await?;
                }
                Wait::TimedOut => {
                    self.stats.timeouts += 1;
                    log::warn!(
                        "[sender] ack timeout; base={} next={}",
                        self.window.base,
                        self.window.next
                    );
                    self.stall()?;
                    self.retransmit_from(self.window.base).await?;
                }
            }
        }
    }

    /// Count a wait without progress; fails once the budget is spent.
    fn stall(&mut self) -> Result<(), ConnError> {
        self.stalls += 1;
        if self.stalls > self.timers.max_retransmissions {
            self.phase = SenderPhase::Closed;
            return Err(ConnError::ConnectionLost(self.timers.max_retransmissions));
        }
        Ok(())
    }

    /// Wait up to `ack_timeout` for a response segment that moves the window
    /// or asks for a resend.  Segments that do neither do not restart the
    /// clock.
    async fn await_acks(&mut self) -> Result<Wait, ConnError> {
        let deadline = Instant::now() + self.timers.ack_timeout;
        loop {
            let segment = match timeout_at(deadline, self.link.recv_segment()).await {
                Ok(segment) => segment?,
                Err(_elapsed) => return Ok(Wait::TimedOut),
            };

            let (acked, rejected) = self.absorb(&segment);
            if let Some(index) = rejected {
                return Ok(Wait::Rejected {
                    index,
                    advanced: acked > 0,
                });
            }
            if acked > 0 {
                return Ok(Wait::Advanced);
            }
        }
    }

    /// Apply one response segment: the furthest-reaching ACK first, then
    /// pick the earliest REJ that still names an in-flight frame.
    ///
    /// Returns the number of frames acknowledged and the resend point.
    fn absorb(&mut self, segment: &str) -> (usize, Option<u64>) {
        let space = self.window.space();
        let base = self.window.base;
        let in_flight = self.window.in_flight() as u64;

        let mut best_ack: Option<u8> = None;
        let mut rejects = Vec::new();
        for frame in self.format.frames(segment) {
            match frame {
                Ok(Frame { kind: FrameKind::Ack, seq, .. }) => {
                    let reach = space.distance(base, seq);
                    if reach > in_flight {
                        log::debug!("[sender] ← stale ACK {seq}");
                        continue;
                    }
                    if best_ack.map_or(true, |b| reach > space.distance(base, b)) {
                        best_ack = Some(seq);
                    }
                }
                Ok(Frame { kind: FrameKind::Reject, seq, .. }) => rejects.push(seq),
                Ok(other) => log::debug!("[sender] ignoring {other}"),
                Err(FrameError::ChecksumMismatch { seq, .. }) => {
                    log::debug!("[sender] dropping damaged response (seq {seq})")
                }
                Err(e) => log::debug!("[sender] dropping response: {e}"),
            }
        }

        let acked = best_ack.map_or(0, |seq| self.window.on_ack(seq));
        if acked > 0 {
            log::debug!(
                "[sender] ← ACK {} (slid {acked}); base={}",
                self.window.space().wire(self.window.base),
                self.window.base
            );
        }

        let rejected = rejects
            .into_iter()
            .filter_map(|seq| {
                let index = self.window.resolve(seq);
                match index {
                    Some(i) => log::debug!("[sender] ← REJ seq={seq} (#{i})"),
                    None => log::debug!("[sender] ← REJ seq={seq} outside window; ignored"),
                }
                index
            })
            .min();
        (acked, rejected)
    }

    /// Resend every in-flight frame from `index` on, as one segment.
    async fn retransmit_from(&mut self, index: u64) -> Result<(), ConnError> {
        let frames: Vec<&str> = self
            .window
            .frames_from(index)
            .map(|p| p.wire.as_str())
            .collect();
        if frames.is_empty() {
            return Ok(());
        }
        let count = frames.len() as u64;
        let segment = frames.concat();
        let attempt = self
            .window
            .frames_from(index)
            .map(|p| p.tx_count + 1)
            .max()
            .unwrap_or(1);

        log::debug!(
            "[sender] → RETRANSMIT #{}..#{} ({count} frames, transmission {attempt})",
            index,
            self.window.next - 1
        );
        self.link.send_segment(&segment).await?;
        self.window.mark_retransmitted(index);
        self.stats.retransmissions += count;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Close
    // -----------------------------------------------------------------------

    /// Write the closing FIN.  It is not acknowledged.
    pub async fn finish(&mut self) -> Result<(), ConnError> {
        let fin = Frame::finish(self.window.next_wire());
        log::debug!("[sender] → FIN seq={}", fin.seq);
        self.link.send_segment(&self.format.encode(&fin)).await?;
        self.phase = SenderPhase::Closed;
        log::info!(
            "[sender] closed; {} frames sent, {} retransmitted",
            self.stats.frames_sent,
            self.stats.retransmissions
        );
        Ok(())
    }
}
