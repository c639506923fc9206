//! Session configuration shared by sender and receiver.

use thiserror::Error;

use crate::frame::FramingParams;
use crate::seq::MAX_WINDOW;
use crate::timer::TimerConfig;

/// Default number of frames in flight.
pub const DEFAULT_WINDOW: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("window size {0} is outside 1..={MAX_WINDOW}")]
    WindowSize(usize),
}

/// Everything a session needs besides its link.
#[derive(Debug, Clone, Copy)]
pub struct ArqConfig {
    window_size: usize,
    pub timers: TimerConfig,
    pub framing: FramingParams,
}

impl Default for ArqConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW,
            timers: TimerConfig::default(),
            framing: FramingParams::default(),
        }
    }
}

impl ArqConfig {
    /// Default timers and framing with the given window.
    pub fn new(window_size: usize) -> Result<Self, ConfigError> {
        if !(1..=MAX_WINDOW).contains(&window_size) {
            return Err(ConfigError::WindowSize(window_size));
        }
        Ok(Self {
            window_size,
            ..Self::default()
        })
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn with_timers(mut self, timers: TimerConfig) -> Self {
        self.timers = timers;
        self
    }

    pub fn with_framing(mut self, framing: FramingParams) -> Self {
        self.framing = framing;
        self
    }
}
