//! Session phases for both ends of a link.
//!
//! Transitions are driven by [`crate::sender::Sender`] and
//! [`crate::receiver::Receiver`]; this module only names the states.
//!
//! ```text
//!  Sender:
//!    IDLE ──CONNECT sent──▶ CONNECTING ──ACK──▶ TRANSMITTING ──records done──▶ DRAINING
//!                               │                     │                           │
//!                               │ budget / REJ        │ retries exhausted         │ all acked,
//!                               ▼                     ▼                           ▼ FIN sent
//!                             CLOSED ◀────────────── CLOSED ◀──────────────────── CLOSED
//!
//!  Receiver:
//!    AWAITING_CONNECT ──CONNECT──▶ RECEIVING ──FIN──▶ CLOSED
//! ```

use std::fmt;

/// Where a [`crate::sender::Sender`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SenderPhase {
    /// Nothing sent yet.
    #[default]
    Idle,
    /// CONNECT sent; waiting for the acknowledging ACK.
    Connecting,
    /// Window open; new I-frames may still be admitted.
    Transmitting,
    /// Every record is queued; waiting for the outstanding acks.
    Draining,
    /// FIN sent, or the session failed.
    Closed,
}

/// Where a [`crate::receiver::Receiver`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReceiverPhase {
    #[default]
    AwaitingConnect,
    Receiving,
    /// FIN received.
    Closed,
}

impl fmt::Display for SenderPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SenderPhase::Idle => "IDLE",
            SenderPhase::Connecting => "CONNECTING",
            SenderPhase::Transmitting => "TRANSMITTING",
            SenderPhase::Draining => "DRAINING",
            SenderPhase::Closed => "CLOSED",
        };
        f.write_str(name)
    }
}

impl fmt::Display for ReceiverPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReceiverPhase::AwaitingConnect => "AWAITING_CONNECT",
            ReceiverPhase::Receiving => "RECEIVING",
            ReceiverPhase::Closed => "CLOSED",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_start_at_the_beginning() {
        assert_eq!(SenderPhase::default(), SenderPhase::Idle);
        assert_eq!(ReceiverPhase::default(), ReceiverPhase::AwaitingConnect);
    }

    #[test]
    fn display_uses_upper_snake_case() {
        assert_eq!(SenderPhase::Transmitting.to_string(), "TRANSMITTING");
        assert_eq!(ReceiverPhase::AwaitingConnect.to_string(), "AWAITING_CONNECT");
    }
}
