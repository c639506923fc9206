//! `gbn-link` — bit-stuffed, CRC-checked framing with Go-Back-N ARQ over a
//! byte stream.
//!
//! # Architecture
//!
//! ```text
//!  ┌──────────┐  I-frames, CONNECT, FIN  ┌──────────┐
//!  │  Sender  │─────────────────────────▶│ Receiver │
//!  └────┬─────┘                          └─────┬────┘
//!       │           ACK / REJ                  │
//!       │◀─────────────────────────────────────┘
//!       │
//!  ┌────▼────────────────────────────────────────────────┐
//!  │ FrameFormat: FLAG ‖ stuff(type‖seq‖data‖crc) ‖ FLAG │
//!  └────┬────────────────────────────────────────────────┘
//!       │ segments: '0'/'1' text, one per line
//!  ┌────▼──────┐
//!  │   Link    │  (TCP, in-memory channel, or fault-injecting wrapper)
//!  └───────────┘
//! ```
//!
//! Each module has a single responsibility:
//! - [`bits`]          — bit stuffing and byte ↔ bit conversion
//! - [`checksum`]      — CRC-16/CCITT over bit strings
//! - [`frame`]         — frame wire format (serialise / locate / parse)
//! - [`seq`]           — modular sequence-number arithmetic
//! - [`gbn_sender`]    — Go-Back-N outbound window state machine
//! - [`gbn_receiver`]  — Go-Back-N inbound window state machine
//! - [`state`]         — session phase types
//! - [`sender`]        — sending session over a link
//! - [`receiver`]      — receiving session over a link
//! - [`connection`]    — session errors, TCP connect and accept loop
//! - [`link`]          — segment transport abstraction
//! - [`simulator`]     — fault-injecting link for testing
//! - [`config`]        — session configuration
//! - [`timer`]         — timeouts and back-off

pub mod bits;
pub mod checksum;
pub mod config;
pub mod connection;
pub mod frame;
pub mod gbn_receiver;
pub mod gbn_sender;
pub mod link;
pub mod receiver;
pub mod sender;
pub mod seq;
pub mod simulator;
pub mod state;
pub mod timer;

pub use config::ArqConfig;
pub use connection::{connect, serve, ConnError, SessionReport};
pub use frame::{Frame, FrameError, FrameFormat, FrameKind};
pub use link::{ChannelLink, Link, LinkError, TcpLink};
pub use receiver::Receiver;
pub use sender::Sender;
