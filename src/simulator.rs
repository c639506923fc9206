//! Fault injection for exercising retransmission.
//!
//! [`FaultyLink`] wraps any [`Link`] and tampers with the frames it sends.
//! Every outbound frame gets an ordinal (0, 1, 2, … across the life of the
//! link); a scripted [`Fault`] for that ordinal wins, otherwise the random
//! model in [`SimulatorConfig`] decides:
//!
//! | Fault      | Effect                                                  |
//! |------------|---------------------------------------------------------|
//! | Pass       | Delivered untouched, whatever the random model says.    |
//! | Drop       | The frame is removed from its segment.                  |
//! | Corrupt    | One bit of the unstuffed payload (or of `seq` when the  |
//! |            | payload is empty) is flipped, then the content is       |
//! |            | re-stuffed, so the peer sees a checksum mismatch.       |
//!
//! A segment whose frames are all dropped is not written at all.  Inbound
//! segments pass through untouched.  The RNG is seeded, so a failing run
//! can be replayed.

use std::collections::HashMap;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::frame::{FrameFormat, FramingParams, MIN_CONTENT_BITS};
use crate::link::{Link, LinkError};

/// Random fault model.  Probabilities are clamped to `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulatorConfig {
    /// Probability that a frame is dropped.
    pub loss_rate: f64,
    /// Probability that a surviving frame is corrupted.
    pub corruption_rate: f64,
    pub seed: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        // Transparent pass-through.
        Self {
            loss_rate: 0.0,
            corruption_rate: 0.0,
            seed: 0,
        }
    }
}

/// What happens to one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Pass,
    Drop,
    Corrupt,
}

/// Counts of injected faults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaultStats {
    pub frames_seen: u64,
    pub dropped: u64,
    pub corrupted: u64,
}

/// A fault-injecting wrapper around another link.
pub struct FaultyLink<L> {
    inner: L,
    format: FrameFormat,
    config: SimulatorConfig,
    rng: StdRng,
    script: HashMap<u64, Fault>,
    stats: FaultStats,
}

impl<L: Link> FaultyLink<L> {
    pub fn new(inner: L, config: SimulatorConfig) -> Self {
        Self::with_framing(inner, config, FramingParams::default())
    }

    /// Like [`new`](Self::new) for links that use non-default framing.
    pub fn with_framing(inner: L, config: SimulatorConfig, framing: FramingParams) -> Self {
        Self {
            inner,
            format: FrameFormat::new(framing),
            rng: StdRng::seed_from_u64(config.seed),
            config,
            script: HashMap::new(),
            stats: FaultStats::default(),
        }
    }

    /// Apply `fault` to outbound frame number `ordinal` (0-based).
    pub fn inject(mut self, ordinal: u64, fault: Fault) -> Self {
        self.script.insert(ordinal, fault);
        self
    }

    pub fn stats(&self) -> FaultStats {
        self.stats
    }

    fn pick_fault(&mut self, ordinal: u64) -> Option<Fault> {
        if let Some(fault) = self.script.remove(&ordinal) {
            return Some(fault);
        }
        if self.rng.random_bool(self.config.loss_rate.clamp(0.0, 1.0)) {
            Some(Fault::Drop)
        } else if self.rng.random_bool(self.config.corruption_rate.clamp(0.0, 1.0)) {
            Some(Fault::Corrupt)
        } else {
            None
        }
    }

    /// Flip one bit inside the checksummed content of `span`.
    fn corrupt(&mut self, span: &str) -> String {
        let stuffing = self.format.stuffing();
        let mut content = stuffing.unstuff(span).into_bytes();
        if content.len() < MIN_CONTENT_BITS {
            return span.to_owned();
        }

        let payload_bits = content.len() - MIN_CONTENT_BITS;
        let pos = if payload_bits > 0 {
            16 + self.rng.random_range(0..payload_bits)
        } else {
            8 + self.rng.random_range(0..8)
        };
        content[pos] = if content[pos] == b'1' { b'0' } else { b'1' };

        let content = String::from_utf8_lossy(&content);
        self.format.stuffing().stuff(&content)
    }
}

#[async_trait]
impl<L: Link> Link for FaultyLink<L> {
    async fn send_segment(&mut self, segment: &str) -> Result<(), LinkError> {
        let flag = self.format.flag();
        let mut out = String::with_capacity(segment.len());

        for span in self.format.spans(segment) {
            let ordinal = self.stats.frames_seen;
            self.stats.frames_seen += 1;

            match self.pick_fault(ordinal) {
                None | Some(Fault::Pass) => {
                    out.push_str(flag);
                    out.push_str(span);
                    out.push_str(flag);
                }
                Some(Fault::Drop) => {
                    log::debug!("[sim] dropping frame #{ordinal}");
                    self.stats.dropped += 1;
                }
                Some(Fault::Corrupt) => {
                    log::debug!("[sim] corrupting frame #{ordinal}");
                    self.stats.corrupted += 1;
                    let damaged = self.corrupt(span);
                    out.push_str(flag);
                    out.push_str(&damaged);
                    out.push_str(flag);
                }
            }
        }

        if out.is_empty() && !segment.is_empty() {
            log::debug!("[sim] whole segment dropped");
            return Ok(());
        }
        self.inner.send_segment(&out).await
    }

    async fn recv_segment(&mut self) -> Result<String, LinkError> {
        self.inner.recv_segment().await
    }
}
