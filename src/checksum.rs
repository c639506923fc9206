//! CRC-16 frame check sequence.
//!
//! The default algorithm is CRC-16/CCITT-FALSE: polynomial `0x1021`, register
//! initialised to `0xFFFF`, no reflection and no final XOR.  The algorithm is
//! injected so tests and alternate framings can swap it out.

use std::fmt;

use ::crc::{Algorithm, Crc, CRC_16_IBM_3740};

use crate::bits::pack_padded;

/// Polynomial 0x1021, init 0xFFFF, no final XOR.
pub const CRC_CCITT: &Algorithm<u16> = &CRC_16_IBM_3740;

/// Width of the checksum field on the wire, in bits.
pub const CHECKSUM_BITS: usize = 16;

/// A 16-bit checksum value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Checksum(pub u16);

impl Checksum {
    /// The 16-bit field as it appears in a frame, MSB first.
    pub fn to_bits(self) -> String {
        format!("{:016b}", self.0)
    }

    /// Parse a 16-character bit field.
    pub fn from_bits(bits: &str) -> Option<Self> {
        if bits.len() != CHECKSUM_BITS {
            return None;
        }
        u16::from_str_radix(bits, 2).ok().map(Checksum)
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04X}", self.0)
    }
}

/// Computes and checks [`Checksum`]s over bit strings.
pub struct CrcEngine {
    crc: Crc<u16>,
}

impl Default for CrcEngine {
    fn default() -> Self {
        Self::new(CRC_CCITT)
    }
}

impl fmt::Debug for CrcEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrcEngine")
            .field("poly", &format_args!("{:#06x}", self.crc.algorithm.poly))
            .field("init", &format_args!("{:#06x}", self.crc.algorithm.init))
            .finish()
    }
}

impl CrcEngine {
    pub fn new(algorithm: &'static Algorithm<u16>) -> Self {
        Self {
            crc: Crc::<u16>::new(algorithm),
        }
    }

    /// CRC of `bits`, consumed 8 bits at a time.
    ///
    /// A trailing group shorter than 8 bits is zero-padded on the right.
    pub fn compute(&self, bits: &str) -> Checksum {
        Checksum(self.crc.checksum(&pack_padded(bits)))
    }

    /// `true` when `crc` matches the checksum of `bits`.
    pub fn verify(&self, bits: &str, crc: Checksum) -> bool {
        self.compute(bits) == crc
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
