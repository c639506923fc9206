//! Bit-string helpers: bit stuffing and byte ↔ bit conversion.
//!
//! A bit string is plain ASCII text over `'0'` and `'1'`, which is also what
//! travels on the wire.  Nothing here knows about frames or flags; the
//! [`crate::frame`] module composes these pieces.
//!
//! # Stuffing rule
//!
//! After every run of exactly `run_limit` consecutive `1`s (5 by default) the
//! stuffer inserts a `0` and restarts the count.  The unstuffer mirrors this:
//! once it has emitted `run_limit` ones in a row it swallows the following
//! bit if (and only if) that bit is a `0`.

use thiserror::Error;

/// Run length after which a `0` is inserted.
pub const DEFAULT_RUN_LIMIT: usize = 5;

/// Errors returned by [`from_bits`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BitsError {
    /// Length is not a whole number of bytes.
    #[error("bit string of length {0} is not a multiple of 8")]
    Unaligned(usize),
    /// Something other than `'0'` or `'1'` appeared.
    #[error("invalid bit character {ch:?} at offset {offset}")]
    InvalidChar { ch: char, offset: usize },
}

// ---------------------------------------------------------------------------
// BitCodec
// ---------------------------------------------------------------------------

/// Stuffs and unstuffs runs of `1` bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitCodec {
    run_limit: usize,
}

impl Default for BitCodec {
    fn default() -> Self {
        Self::new(DEFAULT_RUN_LIMIT)
    }
}

impl BitCodec {
    /// Create a codec that stuffs after `run_limit` consecutive ones.
    ///
    /// # Panics
    ///
    /// Panics if `run_limit` is zero.
    pub fn new(run_limit: usize) -> Self {
        assert!(run_limit >= 1, "run_limit must be at least 1");
        Self { run_limit }
    }

    pub fn run_limit(&self) -> usize {
        self.run_limit
    }

    /// Insert a `0` after every run of `run_limit` ones.
    pub fn stuff(&self, bits: &str) -> String {
        let mut out = String::with_capacity(bits.len() + bits.len() / self.run_limit);
        let mut ones = 0usize;

        for bit in bits.chars() {
            out.push(bit);
            if bit == '1' {
                ones += 1;
                if ones == self.run_limit {
                    out.push('0');
                    ones = 0;
                }
            } else {
                ones = 0;
            }
        }
        out
    }

    /// Remove the `0`s inserted by [`stuff`](Self::stuff).
    ///
    /// A truncated stream that ends right after a run of ones, or a run that
    /// is followed by a `1`, is passed through untouched.
    pub fn unstuff(&self, bits: &str) -> String {
        let mut out = String::with_capacity(bits.len());
        let mut ones = 0usize;
        let mut iter = bits.chars().peekable();

        while let Some(bit) = iter.next() {
            out.push(bit);
            if bit == '1' {
                ones += 1;
                if ones == self.run_limit {
                    if iter.peek() == Some(&'0') {
                        iter.next();
                    }
                    ones = 0;
                }
            } else {
                ones = 0;
            }
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Byte conversion
// ---------------------------------------------------------------------------

/// Render every byte as 8 bits, MSB first.
pub fn to_bits(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 8);
    for byte in bytes {
        out.push_str(&format!("{byte:08b}"));
    }
    out
}

/// Fail on the first character that is not `'0'` or `'1'`.
///
/// `offset` counts characters, not bytes.
pub fn check_bits(bits: &str) -> Result<(), BitsError> {
    match bits.chars().enumerate().find(|&(_, c)| c != '0' && c != '1') {
        Some((offset, ch)) => Err(BitsError::InvalidChar { ch, offset }),
        None => Ok(()),
    }
}

/// Parse a byte-aligned bit string back into bytes.
pub fn from_bits(bits: &str) -> Result<Vec<u8>, BitsError> {
    if bits.len() % 8 != 0 {
        return Err(BitsError::Unaligned(bits.len()));
    }

    bits.as_bytes()
        .chunks(8)
        .enumerate()
        .map(|(i, chunk)| {
            chunk.iter().enumerate().try_fold(0u8, |acc, (j, &c)| match c {
                b'0' => Ok(acc << 1),
                b'1' => Ok((acc << 1) | 1),
                other => Err(BitsError::InvalidChar {
                    ch: other as char,
                    offset: i * 8 + j,
                }),
            })
        })
        .collect()
}

/// Pack bits 8 at a time, MSB first; a trailing partial group is padded with
/// zeros on the right.  Non-`'1'` characters count as `0`.
pub(crate) fn pack_padded(bits: &str) -> Vec<u8> {
    bits.as_bytes()
        .chunks(8)
        .map(|chunk| {
            chunk
                .iter()
                .enumerate()
                .fold(0u8, |acc, (i, &c)| if c == b'1' { acc | (0x80 >> i) } else { acc })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stuff_inserts_zero_after_five_ones() {
        let codec = BitCodec::default();
        assert_eq!(codec.stuff("011111011"), "0111110011");
    }

    #[test]
    fn unstuff_removes_inserted_zero() {
        let codec = BitCodec::default();
        assert_eq!(codec.unstuff("0111110011"), "011111011");
    }

    #[test]
    fn stuff_is_noop_below_threshold() {
        let codec = BitCodec::default();
        for bits in ["", "0", "1111", "0111101111", "1011110111101111"] {
            assert_eq!(codec.stuff(bits), bits);
        }
    }

    #[test]
    fn long_run_of_ones_is_stuffed_repeatedly() {
        let codec = BitCodec::default();
        let stuffed = codec.stuff(&"1".repeat(12));
        assert_eq!(stuffed, "11111011111011");
        assert_eq!(codec.unstuff(&stuffed), "1".repeat(12));
    }

    #[test]
    fn flag_pattern_never_survives_stuffing() {
        let codec = BitCodec::default();
        let stuffed = codec.stuff("0111111001111110");
        assert!(!stuffed.contains("01111110"));
        assert_eq!(codec.unstuff(&stuffed), "0111111001111110");
    }

    #[test]
    fn round_trip_over_all_short_strings() {
        let codec = BitCodec::default();
        for len in 0..=12u32 {
            for n in 0..(1u32 << len) {
                let bits: String = (0..len)
                    .rev()
                    .map(|i| if n >> i & 1 == 1 { '1' } else { '0' })
                    .collect();
                assert_eq!(codec.unstuff(&codec.stuff(&bits)), bits, "input {bits}");
            }
        }
    }

    #[test]
    fn truncated_run_is_passed_through() {
        let codec = BitCodec::default();
        assert_eq!(codec.unstuff("11111"), "11111");
        assert_eq!(codec.unstuff("111111"), "111111");
    }

    #[test]
    fn custom_run_limit() {
        let codec = BitCodec::new(3);
        assert_eq!(codec.stuff("1111"), "11101");
        assert_eq!(codec.unstuff("11101"), "1111");
    }

    #[test]
    fn to_bits_is_msb_first_and_padded() {
        assert_eq!(to_bits(&[0x01, 0xA5]), "0000000110100101");
        assert_eq!(to_bits(b"I"), "01001001");
        assert_eq!(to_bits(&[]), "");
    }

    #[test]
    fn from_bits_inverts_to_bits() {
        let bytes = b"hello, world".to_vec();
        assert_eq!(from_bits(&to_bits(&bytes)).unwrap(), bytes);
    }

    #[test]
    fn from_bits_rejects_unaligned_input() {
        assert_eq!(from_bits("0101"), Err(BitsError::Unaligned(4)));
    }

    #[test]
    fn from_bits_rejects_non_binary_characters() {
        assert_eq!(
            from_bits("0000000x"),
            Err(BitsError::InvalidChar { ch: 'x', offset: 7 })
        );
    }

    #[test]
    fn check_bits_reports_multibyte_characters() {
        assert_eq!(check_bits("0110"), Ok(()));
        assert_eq!(
            check_bits("01é1"),
            Err(BitsError::InvalidChar { ch: 'é', offset: 2 })
        );
    }

    #[test]
    fn pack_padded_pads_trailing_group() {
        assert_eq!(pack_padded("101"), vec![0b1010_0000]);
        assert_eq!(pack_padded("111111111"), vec![0xFF, 0x80]);
        assert!(pack_padded("").is_empty());
    }
}
