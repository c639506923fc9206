//! Receiving side of a session.
//!
//! [`Receiver`] drives one [`Link`] through
//! `AWAITING_CONNECT → RECEIVING → CLOSED`.  Every inbound segment is
//! scanned for frames, each frame is handled in order, and a single
//! response segment goes back: the REJs collected along the way followed
//! by one cumulative ACK.  A segment carrying a valid FIN closes the
//! session and gets no response.
//!
//! | Frame                          | Action                              |
//! |--------------------------------|-------------------------------------|
//! | I, `seq == expected`           | deliver (plus any buffered run)     |
//! | I, up to `N - 1` ahead         | buffer (no ACK of its own)          |
//! | I, anything else               | REJ `seq`                           |
//! | checksum mismatch              | REJ `seq`                           |
//! | malformed                      | drop                                |
//! | CONNECT / POLL                 | covered by the cumulative ACK       |
//! | FIN                            | close, stop processing the segment  |
//!
//! A buffered frame is only acknowledged by the cumulative ACK, once the gap
//! in front of it has been filled.

use crate::config::ArqConfig;
use crate::connection::ConnError;
use crate::frame::{Frame, FrameError, FrameFormat, FrameKind, Malformation};
use crate::gbn_receiver::{Disposition, ReceiverState};
use crate::link::Link;
use crate::state::ReceiverPhase;

/// Counters for one receiving session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceiverStats {
    /// I-frames accepted in order.
    pub frames_accepted: u64,
    /// I-frames held out of order.
    pub frames_buffered: u64,
    pub rejects_sent: u64,
    /// Frames that could not be parsed at all.
    pub malformed_dropped: u64,
}

/// What [`Receiver::process_segment`] decided for one segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentOutcome {
    /// Frames to send back, in order.  Empty once `finished` is set.
    pub responses: Vec<Frame>,
    /// A valid FIN was seen.
    pub finished: bool,
}

// ---------------------------------------------------------------------------
// Receiver
// ---------------------------------------------------------------------------

/// The receiving end of a session over `L`.
pub struct Receiver<L: Link> {
    link: L,
    format: FrameFormat,
    state: ReceiverState,
    phase: ReceiverPhase,
    stats: ReceiverStats,
}

impl<L: Link> Receiver<L> {
    pub fn new(link: L, config: &ArqConfig) -> Self {
        Self {
            link,
            format: FrameFormat::new(config.framing),
            state: ReceiverState::new(config.window_size()),
            phase: ReceiverPhase::AwaitingConnect,
            stats: ReceiverStats::default(),
        }
    }

    pub fn phase(&self) -> ReceiverPhase {
        self.phase
    }

    pub fn stats(&self) -> &ReceiverStats {
        &self.stats
    }

    pub fn state(&self) -> &ReceiverState {
        &self.state
    }

    /// Records delivered in order since the last call.
    pub fn take_delivered(&mut self) -> Vec<Vec<u8>> {
        self.state.take_delivered()
    }

    /// Accept the handshake, then receive until FIN.
    ///
    /// Any failure leaves the receiver in [`ReceiverPhase::Closed`]; records
    /// delivered before it stay available through
    /// [`take_delivered`](Self::take_delivered).
    pub async fn run(&mut self) -> Result<ReceiverStats, ConnError> {
        let result = match self.accept().await {
            Ok(()) => self.receive().await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            log::warn!("[receiver] session failed: {e}");
            self.phase = ReceiverPhase::Closed;
            return Err(e);
        }
        Ok(self.stats.clone())
    }

    /// Wait for the first segment and check that it opens with CONNECT.
    ///
    /// Anything else is answered with a REJ and ends the session.
    pub async fn accept(&mut self) -> Result<(), ConnError> {
        self.phase = ReceiverPhase::AwaitingConnect;
        let segment = self.link.recv_segment().await?;
        let first = self
            .format
            .frames(&segment)
            .next()
            .unwrap_or(Err(Malformation::MissingFlags.into()));

        match first {
            Ok(Frame { kind: FrameKind::Connect, .. }) => {
                let ack = Frame::ack(self.state.ack_seq());
                self.link.send_segment(&self.format.encode(&ack)).await?;
                self.phase = ReceiverPhase::Receiving;
                log::info!("[receiver] ← CONNECT; → ACK; window={}", self.state.size());
                Ok(())
            }
            Ok(other) => {
                log::warn!("[receiver] expected CONNECT, got {other}");
                self.refuse(other.seq).await?;
                Err(ConnError::UnexpectedHandshake(other.kind))
            }
            Err(e) => {
                log::warn!("[receiver] unreadable handshake: {e}");
                let seq = match &e {
                    FrameError::ChecksumMismatch { seq, .. } => *seq,
                    FrameError::Malformed(_) => 0,
                };
                self.refuse(seq).await?;
                Err(e.into())
            }
        }
    }

    async fn refuse(&mut self, seq: u8) -> Result<(), ConnError> {
        self.phase = ReceiverPhase::Closed;
        self.stats.rejects_sent += 1;
        let reject = self.format.encode(&Frame::reject(seq));
        self.link.send_segment(&reject).await?;
        Ok(())
    }

    /// Handle segments until a FIN arrives.
    pub async fn receive(&mut self) -> Result<(), ConnError> {
        loop {
            let segment = self.link.recv_segment().await?;
            let outcome = self.process_segment(&segment);
            if outcome.finished {
                return Ok(());
            }

            let response = self.format.encode_segment(&outcome.responses);
            self.link.send_segment(&response).await?;
        }
    }

    /// Run every frame of `segment` through the window and collect the
    /// response.  Performs no I/O.
    pub fn process_segment(&mut self, segment: &str) -> SegmentOutcome {
        let mut responses = Vec::new();

        for frame in self.format.frames(segment) {
            let frame = match frame {
                Ok(frame) => frame,
                Err(FrameError::ChecksumMismatch { seq, carried, computed }) => {
                    log::debug!(
                        "[receiver] ← corrupted frame seq={seq} (crc {carried} != {computed}); → REJ"
                    );
                    responses.push(Frame::reject(seq));
                    self.stats.rejects_sent += 1;
                    continue;
                }
                Err(FrameError::Malformed(m)) => {
                    log::warn!("[receiver] dropping malformed frame: {m}");
                    self.stats.malformed_dropped += 1;
                    continue;
                }
            };

            match frame.kind {
                FrameKind::Finish => {
                    log::info!(
                        "[receiver] ← FIN seq={}; closing after {} frames",
                        frame.seq,
                        self.stats.frames_accepted
                    );
                    self.phase = ReceiverPhase::Closed;
                    return SegmentOutcome {
                        responses: Vec::new(),
                        finished: true,
                    };
                }
                FrameKind::Information => {
                    let seq = frame.seq;
                    match self.state.on_information(seq, frame.payload) {
                        Disposition::Delivered(n) => {
                            self.stats.frames_accepted += 1;
                            log::debug!(
                                "[receiver] ← DATA seq={seq} delivered {n}; expecting #{}",
                                self.state.expected
                            );
                        }
                        Disposition::Buffered => {
                            self.stats.frames_buffered += 1;
                            log::debug!("[receiver] ← DATA seq={seq} buffered");
                        }
                        disposition @ (Disposition::Duplicate | Disposition::OutOfWindow) => {
                            log::debug!("[receiver] ← DATA seq={seq} {disposition:?}; → REJ");
                            responses.push(Frame::reject(seq));
                            self.stats.rejects_sent += 1;
                        }
                    }
                }
                FrameKind::Poll => log::debug!("[receiver] ← POLL seq={}", frame.seq),
                FrameKind::Connect => log::debug!("[receiver] ← repeated CONNECT"),
                FrameKind::Ack | FrameKind::Reject => {
                    log::debug!("[receiver] ignoring stray {frame}")
                }
            }
        }

        let ack = Frame::ack(self.state.ack_seq());
        log::debug!("[receiver] → ACK {}", ack.seq);
        responses.push(ack);
        SegmentOutcome {
            responses,
            finished: false,
        }
    }
}
