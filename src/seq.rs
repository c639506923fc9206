//! Sequence-number space.
//!
//! Both sessions count frames with unbounded `u64` indices; only the wire
//! carries the reduced value `index mod 2N` for a window of `N` frames.  A
//! received wire value is interpreted as a forward distance from a local
//! reference index (`base` on the sender, `expected` on the receiver).
//!
//! With at most `N` frames in flight, every legitimate wire value lies
//! within `N` of the reference, so the `2N` modulus keeps new and stale
//! numbers apart.

/// Largest window whose modulus (`2N`) still fits the 8-bit `seq` field.
pub const MAX_WINDOW: usize = 128;

/// Modular arithmetic for one window size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeqSpace {
    modulus: u64,
}

impl SeqSpace {
    /// # Panics
    ///
    /// Panics unless `1 <= window <= MAX_WINDOW`; validate with
    /// [`crate::config::ArqConfig::new`] first.
    pub fn for_window(window: usize) -> Self {
        assert!(
            (1..=MAX_WINDOW).contains(&window),
            "window must be in 1..={MAX_WINDOW}, got {window}"
        );
        Self {
            modulus: 2 * window as u64,
        }
    }

    pub fn modulus(&self) -> u64 {
        self.modulus
    }

    /// `true` if `seq` is a value this space can put on the wire.
    pub fn contains(&self, seq: u8) -> bool {
        u64::from(seq) < self.modulus
    }

    /// Wire value for absolute frame `index`.
    #[inline]
    pub fn wire(&self, index: u64) -> u8 {
        (index % self.modulus) as u8
    }

    /// Forward distance from absolute `from` to the wire value `seq`,
    /// in `0..modulus`.
    #[inline]
    pub fn distance(&self, from: u64, seq: u8) -> u64 {
        let seq = u64::from(seq) % self.modulus;
        (seq + self.modulus - from % self.modulus) % self.modulus
    }
}
