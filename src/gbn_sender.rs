//! Go-Back-N send-side state machine.
//!
//! [`SenderWindow`] keeps up to `N` encoded I-frames that are awaiting
//! acknowledgement.  It performs no I/O: [`crate::sender::Sender`] writes the
//! segments and feeds the window with whatever comes back.
//!
//! # Protocol contract
//!
//! - At most `size` frames are in flight at once.
//! - ACKs are **cumulative**: `ACK k` means every frame before `k` arrived
//!   and `k` is the next one expected, so it moves `base` to `k`.
//! - On timeout or `REJ k`, the caller retransmits every frame from the
//!   named one up to `next` (go back N).
//! - Indices are absolute `u64` counters; the wire only carries them modulo
//!   `2N` (see [`crate::seq`]).  Incoming numbers are resolved against
//!   `base`, and anything that does not fall inside `[base, next]` is stale.

use std::collections::VecDeque;

use crate::frame::Frame;
use crate::seq::SeqSpace;

// ---------------------------------------------------------------------------
// PendingFrame
// ---------------------------------------------------------------------------

/// One unacknowledged frame occupying a slot in the window.
#[derive(Debug, Clone)]
pub struct PendingFrame {
    /// Absolute index of the frame.
    pub index: u64,
    /// Encoded text, resent verbatim on retransmission.
    pub wire: String,
    /// Total number of times this frame has been written.
    pub tx_count: u32,
}

// ---------------------------------------------------------------------------
// SenderWindow
// ---------------------------------------------------------------------------

/// Go-Back-N send-side state for one session.
///
/// ```text
///    base               next
///      │                  │
///  ────┼──────────────────┼──────────────────▶ frame index
///      │ <── in flight ──▶│ <── sendable ───▶
///      │ <────────── size ──────────▶│
/// ```
#[derive(Debug)]
pub struct SenderWindow {
    /// Index of the oldest unacknowledged frame.
    pub base: u64,
    /// Index the next new frame will get.
    pub next: u64,
    size: usize,
    space: SeqSpace,
    pending: VecDeque<PendingFrame>,
}

impl SenderWindow {
    /// Empty window starting at index 0.
    ///
    /// # Panics
    ///
    /// Panics if `size` is outside `1..=MAX_WINDOW`.
    pub fn new(size: usize) -> Self {
        Self {
            base: 0,
            next: 0,
            size,
            space: SeqSpace::for_window(size),
            pending: VecDeque::with_capacity(size),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn space(&self) -> SeqSpace {
        self.space
    }

    /// `true` when another frame fits in the window.
    pub fn can_send(&self) -> bool {
        self.pending.len() < self.size
    }

    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    pub fn has_unacked(&self) -> bool {
        !self.pending.is_empty()
    }

    /// I-frame for `payload` numbered with the next index.
    ///
    /// Call [`record_sent`](Self::record_sent) once it has been written.
    pub fn build_information(&self, payload: Vec<u8>) -> Frame {
        Frame::information(self.space.wire(self.next), payload)
    }

    /// Wire value of the next index, used for the closing FIN.
    pub fn next_wire(&self) -> u8 {
        self.space.wire(self.next)
    }

    /// Place a just-written frame into the window and advance `next`.
    pub fn record_sent(&mut self, wire: String) {
        debug_assert!(
            self.can_send(),
            "record_sent called on a full window ({} / {})",
            self.pending.len(),
            self.size
        );
        self.pending.push_back(PendingFrame {
            index: self.next,
            wire,
            tx_count: 1,
        });
        self.next += 1;
    }

    /// Process a cumulative `ACK seq`.
    ///
    /// Returns the number of newly acknowledged frames; `0` for a duplicate
    /// or stale ack, which leaves `base` untouched.
    pub fn on_ack(&mut self, seq: u8) -> usize {
        let advance = self.space.distance(self.base, seq) as usize;
        if advance == 0 || advance > self.pending.len() {
            return 0;
        }
        self.pending.drain(..advance);
        self.base += advance as u64;
        advance
    }

    /// Absolute index of the in-flight frame with wire number `seq`, if any.
    pub fn resolve(&self, seq: u8) -> Option<u64> {
        let offset = self.space.distance(self.base, seq);
        (offset < self.pending.len() as u64).then_some(self.base + offset)
    }

    /// In-flight frames from `index` up to `next`, oldest first.
    pub fn frames_from(&self, index: u64) -> impl Iterator<Item = &PendingFrame> {
        let skip = index.saturating_sub(self.base) as usize;
        self.pending.iter().skip(skip)
    }

    /// Bump the transmission count of every frame from `index` onward.
    ///
    /// Call this right after resending them.
    pub fn mark_retransmitted(&mut self, index: u64) {
        let skip = index.saturating_sub(self.base) as usize;
        for entry in self.pending.iter_mut().skip(skip) {
            entry.tx_count += 1;
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameKind;

    /// Helper: record `n` placeholder frames in `w`.
    fn fill(w: &mut SenderWindow, n: usize) {
        for _ in 0..n {
            let wire = format!("frame-{}", w.next);
            w.record_sent(wire);
        }
    }

    #[test]
    fn initial_state() {
        let w = SenderWindow::new(4);
        assert_eq!((w.base, w.next), (0, 0));
        assert!(w.can_send());
        assert!(!w.has_unacked());
        assert_eq!(w.in_flight(), 0);
    }

    #[test]
    fn build_information_uses_wire_number() {
        let mut w = SenderWindow::new(2);
        fill(&mut w, 2);
        w.on_ack(2);
        fill(&mut w, 2);
        w.on_ack(0); // 4 mod 4
        let frame = w.build_information(b"x".to_vec());
        assert_eq!(frame.kind, FrameKind::Information);
        assert_eq!(w.next, 4);
        assert_eq!(frame.seq, 0);
    }

    #[test]
    fn window_full_blocks_send() {
        let mut w = SenderWindow::new(2);
        fill(&mut w, 2);
        assert!(!w.can_send());
        assert_eq!(w.in_flight(), 2);
    }

    #[test]
    fn cumulative_ack_slides_multiple() {
        let mut w = SenderWindow::new(4);
        fill(&mut w, 4);
        assert_eq!(w.on_ack(3), 3);
        assert_eq!(w.base, 3);
        assert_eq!(w.in_flight(), 1);
        assert_eq!(w.on_ack(4), 1);
        assert!(!w.has_unacked());
    }

    #[test]
    fn duplicate_ack_is_a_no_op() {
        let mut w = SenderWindow::new(4);
        fill(&mut w, 3);
        assert_eq!(w.on_ack(2), 2);
        assert_eq!(w.on_ack(2), 0);
        assert_eq!(w.on_ack(1), 0); // behind base
        assert_eq!(w.base, 2);
    }

    #[test]
    fn ack_beyond_next_is_ignored() {
        let mut w = SenderWindow::new(4);
        fill(&mut w, 2);
        assert_eq!(w.on_ack(5), 0);
        assert_eq!(w.base, 0);
    }

    #[test]
    fn acks_survive_wrap_around() {
        let mut w = SenderWindow::new(3); // modulus 6
        for round in 0..5u64 {
            fill(&mut w, 3);
            let ack = w.space().wire(w.next);
            assert_eq!(w.on_ack(ack), 3, "round {round}");
        }
        assert_eq!(w.base, 15);
    }

    #[test]
    fn resolve_maps_wire_numbers_in_flight() {
        let mut w = SenderWindow::new(4);
        fill(&mut w, 4);
        w.on_ack(2);
        fill(&mut w, 2); // indices 2..6 in flight, wire 2..6
        assert_eq!(w.resolve(2), Some(2));
        assert_eq!(w.resolve(5), Some(5));
        assert_eq!(w.resolve(6), None); // == next
        assert_eq!(w.resolve(1), None); // already acked
    }

    #[test]
    fn frames_from_yields_the_tail() {
        let mut w = SenderWindow::new(4);
        fill(&mut w, 4);
        let tail: Vec<u64> = w.frames_from(2).map(|p| p.index).collect();
        assert_eq!(tail, [2, 3]);
        assert_eq!(w.frames_from(0).next().map(|p| p.wire.as_str()), Some("frame-0"));
    }

    #[test]
    fn mark_retransmitted_counts_only_the_tail() {
        let mut w = SenderWindow::new(4);
        fill(&mut w, 3);
        w.mark_retransmitted(1);
        let counts: Vec<u32> = w.frames_from(0).map(|p| p.tx_count).collect();
        assert_eq!(counts, [1, 2, 2]);
    }
}
