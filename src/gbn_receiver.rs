//! Go-Back-N receive-side state machine.
//!
//! [`ReceiverState`] decides what happens to each valid I-frame:
//!
//! - `seq == expected`: delivered, together with any buffered run that now
//!   follows it contiguously.
//! - `seq` up to `size - 1` frames ahead: held until the gap fills.
//! - Anything else is a duplicate or a number this window cannot produce.
//!
//! After a whole segment the caller sends one cumulative ACK carrying
//! [`ReceiverState::ack_seq`].  This module performs no I/O; the same split
//! as [`crate::gbn_sender`].

use std::collections::{BTreeMap, VecDeque};

use crate::seq::SeqSpace;

/// Outcome of [`ReceiverState::on_information`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// In order; this many records (the frame plus any buffered run) were
    /// handed to the application.
    Delivered(usize),
    /// Ahead of `expected` but inside the window; held back.
    Buffered,
    /// Already delivered.
    Duplicate,
    /// Not a number the agreed window ever uses.
    OutOfWindow,
}

// ---------------------------------------------------------------------------
// ReceiverState
// ---------------------------------------------------------------------------

/// Go-Back-N receive-side state for one session.
#[derive(Debug)]
pub struct ReceiverState {
    /// Absolute index of the next in-order frame.
    pub expected: u64,
    size: usize,
    space: SeqSpace,
    out_of_order: BTreeMap<u64, Vec<u8>>,
    delivered: VecDeque<Vec<u8>>,
}

impl ReceiverState {
    /// # Panics
    ///
    /// Panics if `size` is outside `1..=MAX_WINDOW`.
    pub fn new(size: usize) -> Self {
        Self {
            expected: 0,
            size,
            space: SeqSpace::for_window(size),
            out_of_order: BTreeMap::new(),
            delivered: VecDeque::new(),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Process a checksum-valid I-frame.
    pub fn on_information(&mut self, seq: u8, payload: Vec<u8>) -> Disposition {
        if !self.space.contains(seq) {
            return Disposition::OutOfWindow;
        }

        let ahead = self.space.distance(self.expected, seq);
        if ahead == 0 {
            self.delivered.push_back(payload);
            self.expected += 1;
            let mut count = 1;
            while let Some(held) = self.out_of_order.remove(&self.expected) {
                self.delivered.push_back(held);
                self.expected += 1;
                count += 1;
            }
            Disposition::Delivered(count)
        } else if ahead < self.size as u64 {
            // A retransmission of a frame already held changes nothing.
            self.out_of_order
                .entry(self.expected + ahead)
                .or_insert(payload);
            Disposition::Buffered
        } else {
            Disposition::Duplicate
        }
    }

    /// Sequence number for the cumulative ACK: the next frame expected.
    pub fn ack_seq(&self) -> u8 {
        self.space.wire(self.expected)
    }

    /// Frames held out of order.
    pub fn buffered(&self) -> usize {
        self.out_of_order.len()
    }

    /// Drain the records delivered so far, in order.
    pub fn take_delivered(&mut self) -> Vec<Vec<u8>> {
        self.delivered.drain(..).collect()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
