//! Frame wire format: serialise a [`Frame`] to flag-delimited, bit-stuffed
//! text and locate / parse frames in a received segment.
//!
//! No I/O happens here — this is pure data transformation.
//!
//! # Wire format
//!
//! ```text
//!  FLAG ‖ stuff( type(8) ‖ seq(8) ‖ payload(8·n) ‖ crc(16) ) ‖ FLAG
//! ```
//!
//! `FLAG` is `01111110`.  The CRC covers `type ‖ seq ‖ payload` before
//! stuffing.  Frames may be concatenated back to back (`F a F F b F`) or
//! share the flag between them (`F a F b F`); [`FrameFormat::frames`] accepts
//! both.

use std::fmt;

use ::crc::Algorithm;
use thiserror::Error;

use crate::bits::{self, BitCodec, BitsError, DEFAULT_RUN_LIMIT};
use crate::checksum::{Checksum, CrcEngine, CHECKSUM_BITS, CRC_CCITT};

/// Default frame delimiter.
pub const FLAG: &str = "01111110";

const KIND_BITS: usize = 8;
const SEQ_BITS: usize = 8;
/// Smallest unstuffed content: type + seq + checksum, empty payload.
pub const MIN_CONTENT_BITS: usize = KIND_BITS + SEQ_BITS + CHECKSUM_BITS;

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

/// Frame type, carried as one ASCII letter on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    /// `I` — carries one payload record.
    Information,
    /// `A` — cumulative acknowledgement; `seq` is the next frame expected.
    Ack,
    /// `R` — the frame `seq` arrived corrupted or out of window.
    Reject,
    /// `C` — connection request.
    Connect,
    /// `F` — end of communication.
    Finish,
    /// `P` — in-band poll; answered by the receiver's cumulative ack.
    Poll,
}

impl FrameKind {
    pub fn code(self) -> u8 {
        match self {
            FrameKind::Information => b'I',
            FrameKind::Ack => b'A',
            FrameKind::Reject => b'R',
            FrameKind::Connect => b'C',
            FrameKind::Finish => b'F',
            FrameKind::Poll => b'P',
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            b'I' => Some(FrameKind::Information),
            b'A' => Some(FrameKind::Ack),
            b'R' => Some(FrameKind::Reject),
            b'C' => Some(FrameKind::Connect),
            b'F' => Some(FrameKind::Finish),
            b'P' => Some(FrameKind::Poll),
            _ => None,
        }
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FrameKind::Information => "I",
            FrameKind::Ack => "ACK",
            FrameKind::Reject => "REJ",
            FrameKind::Connect => "CONNECT",
            FrameKind::Finish => "FIN",
            FrameKind::Poll => "POLL",
        };
        f.write_str(name)
    }
}

/// One logical frame.  The checksum is not stored: it is computed by
/// [`FrameFormat::encode`] and verified by [`FrameFormat::decode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: FrameKind,
    pub seq: u8,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(kind: FrameKind, seq: u8, payload: Vec<u8>) -> Self {
        Self { kind, seq, payload }
    }

    pub fn information(seq: u8, payload: Vec<u8>) -> Self {
        Self::new(FrameKind::Information, seq, payload)
    }

    pub fn ack(seq: u8) -> Self {
        Self::new(FrameKind::Ack, seq, Vec::new())
    }

    pub fn reject(seq: u8) -> Self {
        Self::new(FrameKind::Reject, seq, Vec::new())
    }

    pub fn connect() -> Self {
        Self::new(FrameKind::Connect, 0, Vec::new())
    }

    pub fn finish(seq: u8) -> Self {
        Self::new(FrameKind::Finish, seq, Vec::new())
    }

    pub fn poll(seq: u8) -> Self {
        Self::new(FrameKind::Poll, seq, Vec::new())
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} seq={} len={}", self.kind, self.seq, self.payload.len())
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why a frame could not be parsed at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Malformation {
    #[error("fewer than two flags in stream")]
    MissingFlags,
    #[error("no frame after flag occurrence {index} ({flags} flags found)")]
    NoSuchOccurrence { index: usize, flags: usize },
    #[error("only {0} bits after unstuffing")]
    TooShort(usize),
    #[error("unknown frame type code {0:#04x}")]
    UnknownKind(u8),
    #[error(transparent)]
    Bits(#[from] BitsError),
}

/// Errors returned when decoding a frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] Malformation),
    /// The recomputed CRC disagrees with the transmitted one.  `seq` is the
    /// raw (possibly damaged) sequence field, used to address a reject.
    #[error("checksum mismatch on seq {seq}: carried {carried}, computed {computed}")]
    ChecksumMismatch {
        seq: u8,
        carried: Checksum,
        computed: Checksum,
    },
}

impl From<BitsError> for FrameError {
    fn from(e: BitsError) -> Self {
        FrameError::Malformed(Malformation::Bits(e))
    }
}

// ---------------------------------------------------------------------------
// FrameFormat
// ---------------------------------------------------------------------------

/// Framing constants, fixed for the lifetime of a session.
#[derive(Clone, Copy)]
pub struct FramingParams {
    pub flag: &'static str,
    pub run_limit: usize,
    pub crc: &'static Algorithm<u16>,
}

impl Default for FramingParams {
    fn default() -> Self {
        Self {
            flag: FLAG,
            run_limit: DEFAULT_RUN_LIMIT,
            crc: CRC_CCITT,
        }
    }
}

impl fmt::Debug for FramingParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FramingParams")
            .field("flag", &self.flag)
            .field("run_limit", &self.run_limit)
            .field("crc_poly", &format_args!("{:#06x}", self.crc.poly))
            .finish()
    }
}

/// Encoder / decoder for one set of [`FramingParams`].
#[derive(Debug)]
pub struct FrameFormat {
    flag: &'static str,
    stuffing: BitCodec,
    crc: CrcEngine,
}

impl Default for FrameFormat {
    fn default() -> Self {
        Self::new(FramingParams::default())
    }
}

impl FrameFormat {
    pub fn new(params: FramingParams) -> Self {
        Self {
            flag: params.flag,
            stuffing: BitCodec::new(params.run_limit),
            crc: CrcEngine::new(params.crc),
        }
    }

    pub fn flag(&self) -> &'static str {
        self.flag
    }

    pub fn stuffing(&self) -> &BitCodec {
        &self.stuffing
    }

    pub fn crc(&self) -> &CrcEngine {
        &self.crc
    }

    /// Serialise `frame` as `FLAG ‖ stuffed content ‖ FLAG`.
    pub fn encode(&self, frame: &Frame) -> String {
        let mut content = bits::to_bits(&[frame.kind.code(), frame.seq]);
        content.push_str(&bits::to_bits(&frame.payload));
        let crc = self.crc.compute(&content);
        content.push_str(&crc.to_bits());

        let stuffed = self.stuffing.stuff(&content);
        let mut out = String::with_capacity(stuffed.len() + 2 * self.flag.len());
        out.push_str(self.flag);
        out.push_str(&stuffed);
        out.push_str(self.flag);
        out
    }

    /// Encode several frames back to back into one segment.
    pub fn encode_segment<'a, I>(&self, frames: I) -> String
    where
        I: IntoIterator<Item = &'a Frame>,
    {
        frames.into_iter().map(|f| self.encode(f)).collect()
    }

    /// Byte offsets of every (non-overlapping) flag occurrence.
    pub fn locate_flags(&self, stream: &str) -> Vec<usize> {
        stream.match_indices(self.flag).map(|(i, _)| i).collect()
    }

    /// Decode the frame between flag occurrence `occurrence` and the next one.
    pub fn decode(&self, stream: &str, occurrence: usize) -> Result<Frame, FrameError> {
        let flags = self.locate_flags(stream);
        if flags.len() < 2 {
            return Err(Malformation::MissingFlags.into());
        }
        if occurrence + 1 >= flags.len() {
            return Err(Malformation::NoSuchOccurrence {
                index: occurrence,
                flags: flags.len(),
            }
            .into());
        }

        let start = flags[occurrence] + self.flag.len();
        let end = flags[occurrence + 1];
        self.decode_content(&stream[start..end])
    }

    /// Parse the stuffed text found strictly between two flags.
    pub fn decode_content(&self, stuffed: &str) -> Result<Frame, FrameError> {
        let content = self.stuffing.unstuff(stuffed);
        // Everything below slices by byte offset.
        bits::check_bits(&content)?;
        if content.len() < MIN_CONTENT_BITS {
            return Err(Malformation::TooShort(content.len()).into());
        }

        let (body, fcs) = content.split_at(content.len() - CHECKSUM_BITS);
        let header = bits::from_bits(&body[..KIND_BITS + SEQ_BITS])?;
        let payload_bits = &body[KIND_BITS + SEQ_BITS..];
        if payload_bits.len() % 8 != 0 {
            return Err(BitsError::Unaligned(payload_bits.len()).into());
        }

        let carried = fcs_field(fcs)?;
        let computed = self.crc.compute(body);
        if carried != computed {
            return Err(FrameError::ChecksumMismatch {
                seq: header[1],
                carried,
                computed,
            });
        }

        let kind = FrameKind::from_code(header[0]).ok_or(Malformation::UnknownKind(header[0]))?;
        Ok(Frame {
            kind,
            seq: header[1],
            payload: bits::from_bits(payload_bits)?,
        })
    }

    /// Stuffed contents of every non-empty span between consecutive flags.
    pub fn spans<'a>(&self, stream: &'a str) -> Vec<&'a str> {
        let len = self.flag.len();
        self.locate_flags(stream)
            .windows(2)
            .map(|pair| &stream[pair[0] + len..pair[1]])
            .filter(|span| !span.is_empty())
            .collect()
    }

    /// Number of frames present in `stream`.
    pub fn count_frames(&self, stream: &str) -> usize {
        self.spans(stream).len()
    }

    /// Decode every frame in `stream`, in order.
    pub fn frames<'a>(&'a self, stream: &'a str) -> impl Iterator<Item = Result<Frame, FrameError>> + 'a {
        self.spans(stream).into_iter().map(move |span| self.decode_content(span))
    }
}

/// Parse the checksum field, rejecting non-binary characters.
fn fcs_field(bits: &str) -> Result<Checksum, FrameError> {
    let bytes = bits::from_bits(bits)?;
    Ok(Checksum(u16::from_be_bytes([bytes[0], bytes[1]])))
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> FrameFormat {
        FrameFormat::default()
    }

    #[test]
    fn encode_decode_roundtrip_all_kinds() {
        let f = codec();
        let frames = [
            Frame::information(3, b"hello".to_vec()),
            Frame::ack(7),
            Frame::reject(2),
            Frame::connect(),
            Frame::finish(5),
            Frame::poll(1),
            Frame::information(0, Vec::new()),
            Frame::information(255, vec![0xFF; 32]),
        ];
        for frame in frames {
            assert_eq!(f.decode(&f.encode(&frame), 0), Ok(frame));
        }
    }

    #[test]
    fn encoded_frame_is_flag_delimited_binary_text() {
        let f = codec();
        let wire = f.encode(&Frame::information(1, b"abc".to_vec()));
        assert!(wire.starts_with(FLAG));
        assert!(wire.ends_with(FLAG));
        assert!(wire.bytes().all(|b| b == b'0' || b == b'1'));
        assert_eq!(f.locate_flags(&wire).len(), 2);
    }

    #[test]
    fn ones_heavy_payload_never_fakes_a_flag() {
        let f = codec();
        let frame = Frame::information(0x7E, vec![0x7E, 0xFF, 0x7E, 0xFF]);
        let wire = f.encode(&frame);
        assert_eq!(f.locate_flags(&wire), vec![0, wire.len() - FLAG.len()]);
        assert_eq!(f.decode(&wire, 0), Ok(frame));
    }

    #[test]
    fn minimal_content_is_32_bits() {
        let f = codec();
        let wire = f.encode(&Frame::ack(0));
        let span = &wire[FLAG.len()..wire.len() - FLAG.len()];
        assert_eq!(f.stuffing().unstuff(span).len(), MIN_CONTENT_BITS);
    }

    #[test]
    fn decode_requires_two_flags() {
        let f = codec();
        assert_eq!(
            f.decode("0101", 0),
            Err(FrameError::Malformed(Malformation::MissingFlags))
        );
        assert_eq!(
            f.decode(FLAG, 0),
            Err(FrameError::Malformed(Malformation::MissingFlags))
        );
    }

    #[test]
    fn decode_rejects_out_of_range_occurrence() {
        let f = codec();
        let wire = f.encode(&Frame::ack(0));
        assert_eq!(
            f.decode(&wire, 1),
            Err(FrameError::Malformed(Malformation::NoSuchOccurrence { index: 1, flags: 2 }))
        );
    }

    #[test]
    fn decode_rejects_short_content() {
        let f = codec();
        let stream = format!("{FLAG}0101010101{FLAG}");
        assert_eq!(
            f.decode(&stream, 0),
            Err(FrameError::Malformed(Malformation::TooShort(10)))
        );
    }

    #[test]
    fn non_binary_text_between_flags_is_malformed() {
        let f = codec();
        let stream = format!("{FLAG}{}é{}{FLAG}", "0".repeat(15), "0".repeat(15));
        assert_eq!(
            f.decode(&stream, 0),
            Err(FrameError::Malformed(Malformation::Bits(BitsError::InvalidChar {
                ch: 'é',
                offset: 15,
            })))
        );
        assert_eq!(f.frames(&stream).count(), 1);
    }

    #[test]
    fn decode_rejects_unaligned_payload() {
        let f = codec();
        // type + seq + 3 stray bits + checksum
        let stream = format!("{FLAG}{}{}{FLAG}", "0100100100000000010", "0".repeat(16));
        assert!(matches!(
            f.decode(&stream, 0),
            Err(FrameError::Malformed(Malformation::Bits(BitsError::Unaligned(3))))
        ));
    }

    #[test]
    fn flipped_payload_bit_is_a_checksum_mismatch() {
        let f = codec();
        let wire = f.encode(&Frame::information(2, b"data".to_vec()));
        let span = &wire[FLAG.len()..wire.len() - FLAG.len()];

        let mut content = f.stuffing().unstuff(span).into_bytes();
        content[20] ^= 1; // '0' <-> '1' inside the payload
        let damaged = f.stuffing().stuff(std::str::from_utf8(&content).unwrap());
        let stream = format!("{FLAG}{damaged}{FLAG}");

        match f.decode(&stream, 0) {
            Err(FrameError::ChecksumMismatch { seq, carried, computed }) => {
                assert_eq!(seq, 2);
                assert_ne!(carried, computed);
            }
            other => panic!("expected checksum mismatch, got {other:?}"),
        }
    }

    #[test]
    fn unknown_kind_with_valid_checksum_is_malformed() {
        let f = codec();
        let mut content = bits::to_bits(&[b'Z', 0]);
        content.push_str(&f.crc().compute(&content).to_bits());
        let stream = format!("{FLAG}{}{FLAG}", f.stuffing().stuff(&content));
        assert_eq!(
            f.decode(&stream, 0),
            Err(FrameError::Malformed(Malformation::UnknownKind(b'Z')))
        );
    }

    #[test]
    fn back_to_back_frames_decode_by_occurrence() {
        let f = codec();
        let a = Frame::information(0, b"first".to_vec());
        let b = Frame::information(1, b"second".to_vec());
        let stream = f.encode_segment([&a, &b]);

        assert_eq!(f.locate_flags(&stream).len(), 4);
        assert_eq!(f.decode(&stream, 0), Ok(a.clone()));
        // Occurrence 1 is the empty gap between the two frames.
        assert!(f.decode(&stream, 1).is_err());
        assert_eq!(f.decode(&stream, 2), Ok(b.clone()));
        assert_eq!(f.count_frames(&stream), 2);
        assert_eq!(f.frames(&stream).collect::<Vec<_>>(), vec![Ok(a), Ok(b)]);
    }

    #[test]
    fn shared_flags_between_frames_are_supported() {
        let f = codec();
        let a = f.encode(&Frame::ack(1));
        let b = f.encode(&Frame::reject(2));
        // Drop b's leading flag so a's closing flag opens b.
        let stream = format!("{a}{}", &b[FLAG.len()..]);

        let decoded: Vec<_> = f.frames(&stream).collect();
        assert_eq!(decoded, vec![Ok(Frame::ack(1)), Ok(Frame::reject(2))]);
    }

    #[test]
    fn garbage_outside_flags_is_ignored() {
        let f = codec();
        let wire = f.encode(&Frame::poll(4));
        let stream = format!("0010{wire}11");
        assert_eq!(f.frames(&stream).collect::<Vec<_>>(), vec![Ok(Frame::poll(4))]);
    }

    #[test]
    fn alternate_crc_is_injected() {
        let xmodem = FrameFormat::new(FramingParams {
            crc: &::crc::CRC_16_XMODEM,
            ..FramingParams::default()
        });
        let frame = Frame::information(9, b"xmodem".to_vec());
        let wire = xmodem.encode(&frame);
        assert_eq!(xmodem.decode(&wire, 0), Ok(frame));
        assert!(matches!(
            codec().decode(&wire, 0),
            Err(FrameError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn kind_codes_round_trip() {
        for kind in [
            FrameKind::Information,
            FrameKind::Ack,
            FrameKind::Reject,
            FrameKind::Connect,
            FrameKind::Finish,
            FrameKind::Poll,
        ] {
            assert_eq!(FrameKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(FrameKind::from_code(b'x'), None);
    }
}
