//! Timeout parameters and exponential back-off.
//!
//! Two waits exist in a session:
//! - the connect wait, which doubles on every unanswered CONNECT up to
//!   [`TimerConfig::max_backoff`];
//! - the ack wait while transmitting, which stays fixed at
//!   [`TimerConfig::ack_timeout`].  Go-Back-N already resends the whole
//!   window on a timeout, so the retry budget bounds the session instead.

use std::time::Duration;

/// Adjustable timeout parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerConfig {
    /// How long to wait for any ACK or REJ while frames are outstanding.
    pub ack_timeout: Duration,
    /// First wait after a CONNECT.
    pub connect_timeout: Duration,
    /// Ceiling for the doubled connect wait.
    pub max_backoff: Duration,
    /// CONNECT frames sent before giving up.
    pub connect_attempts: u32,
    /// Consecutive waits without progress before the session is declared lost.
    pub max_retransmissions: u32,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            ack_timeout: Duration::from_secs(3),
            connect_timeout: Duration::from_secs(3),
            max_backoff: Duration::from_secs(60),
            connect_attempts: 5,
            max_retransmissions: 10,
        }
    }
}

/// A doubling wait, capped at a maximum.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            max,
            current: initial.min(max),
        }
    }

    /// Back-off for the connect phase of `config`.
    pub fn for_connect(config: &TimerConfig) -> Self {
        Self::new(config.connect_timeout, config.max_backoff)
    }

    pub fn current(&self) -> Duration {
        self.current
    }

    /// Double the wait, capped at the maximum.
    pub fn back_off(&mut self) {
        self.current = (self.current * 2).min(self.max);
    }
}
